//! Error types for the relay transport

/// Result type alias for network operations
pub type Result<T> = std::result::Result<T, NetError>;

/// Error type for relay client/server and wire codec failures
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The connect attempt did not complete within the timeout
    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: String },

    /// A frame exceeded the wire buffer limit
    #[error("frame of {len} bytes exceeds the {limit} byte wire buffer")]
    FrameTooLarge { len: usize, limit: usize },

    /// A received frame could not be decoded
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The server did not open the connection with an id grant
    #[error("handshake error: {0}")]
    Handshake(String),

    /// The connection is no longer open
    #[error("connection closed")]
    Closed,
}
