use thiserror::Error;

/// Convenience type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while driving a B2F session.
///
/// The session engine maps most of these onto a `;NAK: <reason>` line before
/// tearing the connection down; the protocol defines no retransmit, so a
/// failed session is simply disposable.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket read/write failure or peer reset.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Idle deadline exceeded on a protocol-significant read.
    #[error("timed out waiting for peer data")]
    Timeout,

    /// Malformed line or framing byte where a structured token was required.
    #[error("format error: {0}")]
    Format(&'static str),

    /// A reassembled size disagrees with what the proposal announced.
    #[error("size mismatch: {what} is {actual} bytes, proposal says {expected}")]
    SizeMismatch {
        /// Which measurement disagreed.
        what: &'static str,
        /// Byte count announced by the proposal.
        expected: usize,
        /// Byte count actually observed.
        actual: usize,
    },

    /// The B2 frame trailer check failed.
    #[error("checksum mismatch: calculated {calculated:#04x}, transmitted {transmitted:#04x}")]
    Checksum {
        /// Checksum computed over the reassembled bytes.
        calculated: u8,
        /// Checksum byte found after the EOT marker.
        transmitted: u8,
    },

    /// The decompressor refused the payload.
    #[error("decompress error: {0}")]
    Decompress(&'static str),

    /// Unknown callsign or wrong password.
    #[error("authentication failed")]
    Auth,

    /// Persisting a message's artifacts failed.
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Short reason word used on the wire in `;NAK: <reason>` replies.
    pub fn nak_reason(&self) -> &'static str {
        match self {
            Error::Transport(_) => "Transport",
            Error::Timeout => "Timeout",
            Error::Format(_) => "Format",
            Error::SizeMismatch { .. } => "SizeMismatch",
            Error::Checksum { .. } => "Checksum",
            Error::Decompress(_) => "Decompress",
            Error::Auth => "Auth",
            Error::Store(_) => "Store",
        }
    }
}
