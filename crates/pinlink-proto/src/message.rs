use bytes::Bytes;

/// Common header: total size (2) + kind tag (1) + reserved (1) + channel ID (2) + request ID (2).
pub const HEADER_SIZE: usize = 8;

/// Total wire size of a configuration request.
pub const CONFIG_REQUEST_SIZE: usize = HEADER_SIZE + 12;

/// Total wire size of a configuration response.
pub const CONFIG_RESPONSE_SIZE: usize = HEADER_SIZE + 8;

/// Fixed portion of a port request; the trailing data block follows.
pub const PORT_REQUEST_FIXED_SIZE: usize = HEADER_SIZE + 8;

/// Fixed portion of a port event; the trailing data block follows.
pub const PORT_EVENT_FIXED_SIZE: usize = HEADER_SIZE + 8;

/// Message kind tags.
pub mod kind {
    pub const CONFIG_REQUEST: u8 = 1;
    pub const CONFIG_RESPONSE: u8 = 2;
    pub const PORT_REQUEST: u8 = 3;
    pub const PORT_EVENT: u8 = 4;
}

/// Configuration request actions.
pub mod config_action {
    /// Configure a new channel on the peripheral.
    pub const CONFIGURE: u8 = 1;
    /// Release a configured channel.
    pub const RELEASE: u8 = 2;
    /// Reset the peripheral to its initial state.
    pub const RESET: u8 = 3;
    /// Configure a shared module (e.g. a PWM timer) rather than a channel.
    pub const CONFIGURE_MODULE: u8 = 4;
    /// Query a peripheral property.
    pub const QUERY: u8 = 5;
}

/// Channel kinds carried in configuration requests.
pub mod channel_kind {
    pub const DIGITAL_PIN: u8 = 1;
    pub const ANALOG_IN: u8 = 2;
    pub const PWM: u8 = 3;
    pub const I2C: u8 = 4;
}

/// Module kinds for configure-module requests (shared peripherals that are
/// not channels themselves).
pub mod module_kind {
    pub const PWM_TIMER: u8 = 1;
    pub const PWM_CHANNEL: u8 = 2;
}

/// Properties a query request can ask the peripheral for.
pub mod query_property {
    /// Buffer memory available for queued requests, in bytes.
    pub const MEMORY_SIZE: u16 = 1;
    /// Maximum number of requests the peripheral queues at once.
    pub const MAX_OUTSTANDING: u16 = 2;
    /// Firmware protocol version.
    pub const VERSION: u16 = 3;
}

/// Port request actions.
pub mod port_action {
    /// Set the channel's output value.
    pub const SET_VALUE: u8 = 1;
    /// Read the channel's current value.
    pub const GET_VALUE: u8 = 2;
    /// Transmit the trailing data block on the channel.
    pub const TX_DATA: u8 = 3;
    /// Request data from the channel.
    pub const RX_DATA: u8 = 4;
    /// Transmit the trailing data block, then request data.
    pub const TX_RX_DATA: u8 = 5;
}

/// Port event kinds.
pub mod event_kind {
    pub const NONE: u8 = 0;
    pub const SINGLE_SAMPLE: u8 = 1;
    pub const TX_COMPLETE: u8 = 2;
    pub const DATA_RECEIVED: u8 = 3;
}

/// Configuration response result codes.
pub mod result_code {
    pub const OK: u16 = 0;
    pub const INVALID_DATA: u16 = 1;
}

/// Host-to-peripheral configuration exchange (always request/response).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRequest {
    pub channel_id: u16,
    pub request_id: u16,
    pub action: u8,
    pub channel_kind: u8,
    pub pin_config: u16,
    pub value: u32,
    pub attribute1: u16,
    pub attribute2: u16,
}

/// Peripheral answer to a [`ConfigRequest`] with the same request ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigResponse {
    pub channel_id: u16,
    pub request_id: u16,
    pub result: u16,
    pub optional: u16,
    pub value: u32,
}

/// Host-to-peripheral port operation, optionally carrying data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRequest {
    pub channel_id: u16,
    pub request_id: u16,
    pub action: u8,
    pub action_attribute1: u8,
    pub action_attribute2: u16,
    pub value: u32,
    pub data: Bytes,
}

/// Peripheral-to-host notification, optionally carrying data.
///
/// A non-zero request ID acknowledges completion of the port request that
/// carried the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortEvent {
    pub channel_id: u16,
    pub request_id: u16,
    pub event: u8,
    pub event_attribute1: u8,
    pub event_attribute2: u16,
    pub value: u32,
    pub data: Bytes,
}

/// A frame with an unrecognized kind tag, preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrame {
    pub kind_tag: u8,
    pub channel_id: u16,
    pub request_id: u16,
    pub body: Bytes,
}

/// One complete wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ConfigRequest(ConfigRequest),
    ConfigResponse(ConfigResponse),
    PortRequest(PortRequest),
    PortEvent(PortEvent),
    Unknown(UnknownFrame),
}

impl Message {
    /// The kind tag this message encodes with.
    pub fn kind_tag(&self) -> u8 {
        match self {
            Message::ConfigRequest(_) => kind::CONFIG_REQUEST,
            Message::ConfigResponse(_) => kind::CONFIG_RESPONSE,
            Message::PortRequest(_) => kind::PORT_REQUEST,
            Message::PortEvent(_) => kind::PORT_EVENT,
            Message::Unknown(frame) => frame.kind_tag,
        }
    }

    /// The channel this message addresses.
    pub fn channel_id(&self) -> u16 {
        match self {
            Message::ConfigRequest(m) => m.channel_id,
            Message::ConfigResponse(m) => m.channel_id,
            Message::PortRequest(m) => m.channel_id,
            Message::PortEvent(m) => m.channel_id,
            Message::Unknown(m) => m.channel_id,
        }
    }

    /// The correlation token, 0 when the message is not correlated.
    pub fn request_id(&self) -> u16 {
        match self {
            Message::ConfigRequest(m) => m.request_id,
            Message::ConfigResponse(m) => m.request_id,
            Message::PortRequest(m) => m.request_id,
            Message::PortEvent(m) => m.request_id,
            Message::Unknown(m) => m.request_id,
        }
    }

    /// Total encoded size: fixed portion plus trailing data length.
    pub fn wire_size(&self) -> usize {
        match self {
            Message::ConfigRequest(_) => CONFIG_REQUEST_SIZE,
            Message::ConfigResponse(_) => CONFIG_RESPONSE_SIZE,
            Message::PortRequest(m) => PORT_REQUEST_FIXED_SIZE + m.data.len(),
            Message::PortEvent(m) => PORT_EVENT_FIXED_SIZE + m.data.len(),
            Message::Unknown(m) => HEADER_SIZE + m.body.len(),
        }
    }
}

/// Minimum total size a frame of the given kind must declare.
pub fn fixed_size(kind_tag: u8) -> usize {
    match kind_tag {
        kind::CONFIG_REQUEST => CONFIG_REQUEST_SIZE,
        kind::CONFIG_RESPONSE => CONFIG_RESPONSE_SIZE,
        kind::PORT_REQUEST => PORT_REQUEST_FIXED_SIZE,
        kind::PORT_EVENT => PORT_EVENT_FIXED_SIZE,
        _ => HEADER_SIZE,
    }
}
