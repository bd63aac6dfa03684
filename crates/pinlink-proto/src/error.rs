/// Errors that can occur during message encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The declared total size is smaller than the fixed portion of the
    /// claimed message kind.
    #[error("malformed frame: declared size {declared} below minimum {minimum} for kind {kind_tag}")]
    MalformedFrame {
        kind_tag: u8,
        declared: usize,
        minimum: usize,
    },

    /// The buffer length does not match the declared total size.
    #[error("frame length mismatch: declared {declared}, buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The trailing data block exceeds what a 16-bit total size can carry.
    #[error("trailing data too large ({size} bytes, max {max})")]
    DataTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
