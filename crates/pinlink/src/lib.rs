//! Host-side driver for pinlink peripheral controllers.
//!
//! This is the "just works" layer. Configure pins over any reliable,
//! ordered byte transport, write and read values, exchange I2C data.
//! Flow control and request correlation are handled underneath by
//! `pinlink-core`.
//!
//! The transport stays outside: outbound frames go through the [`Link`]
//! trait, inbound frames are fed to [`Device::handle_inbound`] by whatever
//! thread the transport reads on.

pub mod device;
pub mod error;
pub mod link;
pub mod pins;

pub use device::{Device, DeviceConfig, DEFAULT_EVENT_QUEUE_CAPACITY};
pub use error::{DeviceError, Result};
pub use link::Link;
pub use pins::InputCommunication;

pub use pinlink_core::{Delivery, PortKind};
pub use pinlink_proto::{Message, PortEvent};
