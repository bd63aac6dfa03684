use pinlink_core::PortKind;

/// Errors that can occur in device operations.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The transport failed to take an outbound frame.
    #[error("link error: {0}")]
    Link(#[from] std::io::Error),

    /// Core-level error (teardown while blocked, inbound protocol error).
    #[error("core error: {0}")]
    Core(#[from] pinlink_core::CoreError),

    /// An outbound message failed to encode.
    #[error("encoding error: {0}")]
    Proto(#[from] pinlink_proto::ProtoError),

    /// The peripheral answered with a non-OK result code.
    #[error("peripheral rejected the request (result code {result})")]
    RequestFailed { result: u16 },

    /// No port is configured under the given ID.
    #[error("port {0} is not configured")]
    UnknownPort(u16),

    /// The operation does not apply to the port's kind.
    #[error("operation not supported on a {kind:?} port")]
    NotSupported { kind: PortKind },

    /// The peripheral answered the pending operation with an event of an
    /// unexpected kind.
    #[error("unexpected event kind {event} for the pending operation")]
    UnexpectedEvent { event: u8 },
}

pub type Result<T> = std::result::Result<T, DeviceError>;
