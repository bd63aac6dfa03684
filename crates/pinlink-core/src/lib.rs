//! Concurrency and correlation core of the pinlink host driver.
//!
//! One inbound-delivery thread (driven by the transport) feeds the
//! [`Dispatcher`]; any number of caller threads issue requests. Each
//! component owns exactly one lock and never waits on another component's
//! lock while holding its own.

pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod port;
pub mod queue;
pub mod registry;
pub mod throttler;

pub use correlator::RequestCorrelator;
pub use dispatch::{Delivery, Dispatcher};
pub use error::{CoreError, Result};
pub use port::{Port, PortKind};
pub use queue::EventQueue;
pub use registry::PortRegistry;
pub use throttler::{
    Throttler, DEFAULT_MAX_OUTSTANDING, DEFAULT_MEMORY_SIZE, MESSAGE_OVERHEAD,
};
