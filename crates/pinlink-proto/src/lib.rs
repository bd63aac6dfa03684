//! Wire message model and binary codec for the pinlink peripheral protocol.
//!
//! Every frame carries a fixed 8-byte header:
//! - A 2-byte little-endian total size (header + variant body + trailer)
//! - A 1-byte kind tag and a reserved byte
//! - A 2-byte channel ID and a 2-byte request ID
//!
//! Four message kinds follow the header; two of them (port requests and
//! port events) carry a variable-length trailing data block. Unrecognized
//! kind tags decode to [`Message::Unknown`] instead of failing, so newer
//! peripheral firmware never crashes the host.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode_exact, decode_message, encode_message};
pub use error::{ProtoError, Result};
pub use message::{
    channel_kind, config_action, event_kind, kind, module_kind, port_action, query_property,
    result_code, ConfigRequest,
    ConfigResponse, Message, PortEvent, PortRequest, UnknownFrame, CONFIG_REQUEST_SIZE,
    CONFIG_RESPONSE_SIZE, HEADER_SIZE, PORT_EVENT_FIXED_SIZE, PORT_REQUEST_FIXED_SIZE,
};
