/// Errors surfaced by the correlation core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The component was torn down (device reset or disconnect) while the
    /// call was blocked or before it could reserve.
    #[error("device disconnected or reset while waiting")]
    Disconnected,

    /// An inbound frame failed to decode.
    #[error("protocol error: {0}")]
    Proto(#[from] pinlink_proto::ProtoError),

    /// A request frame arrived on the inbound path; the host only ever
    /// receives responses and events.
    #[error("unexpected inbound request frame (kind {kind_tag})")]
    UnexpectedInbound { kind_tag: u8 },
}

pub type Result<T> = std::result::Result<T, CoreError>;
