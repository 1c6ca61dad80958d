use thiserror::Error;

/// Errors reported by sockets, protocols and multicast engines.
#[derive(Debug, Error)]
pub enum SocketError {
    /// The operation cannot complete right now (no message available, or no room to send).
    ///  This is the only error a caller is expected to retry.
    #[error("resource temporarily unavailable")]
    WouldBlock,
    /// Invalid caller input, e.g. a header on a protocol that does not support headers.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("protocol {protocol} is not supported in domain {domain}")]
    ProtocolNotSupported { domain: i32, protocol: i32 },
    #[error("no such socket option")]
    NoSuchOption,
    /// Failure inside a multicast engine that does not fit any of the above
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SocketError {
    pub fn is_would_block(&self) -> bool {
        matches!(self, SocketError::WouldBlock)
    }
}
