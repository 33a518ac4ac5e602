//! Error types for the IEC 60870-5-104 client.

use thiserror::Error;

/// Result type alias for IEC 104 operations.
pub type Result<T> = std::result::Result<T, Iec104Error>;

/// IEC 60870-5-104 client error types.
#[derive(Debug, Error)]
pub enum Iec104Error {
    /// The remote address could not be resolved
    #[error("Address resolution failed for {address}: {reason}")]
    AddressResolution { address: String, reason: String },

    /// A single dial attempt did not complete in time
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// The configured number of dial attempts was used up
    #[error("Gave up connecting after {0} attempts")]
    ConnectRetriesExhausted(u32),

    /// Peer closed the connection between frames
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid frame format
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid ASDU
    #[error("Invalid ASDU: {0}")]
    InvalidAsdu(String),

    /// Encoded APDU would exceed the protocol limit
    #[error("Frame too large: {0} bytes of content")]
    FrameTooLarge(usize),

    /// The rest of a frame did not arrive before the read deadline
    #[error("Timed out reading frame content")]
    FrameTimeout,

    /// An internal queue was closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session or dial loop was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Iec104Error {
    /// Create an invalid frame error.
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    /// Create an invalid ASDU error.
    pub fn invalid_asdu(msg: impl Into<String>) -> Self {
        Self::InvalidAsdu(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error indicates a connection problem.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::AddressResolution { .. }
                | Self::ConnectionTimeout
                | Self::ConnectRetriesExhausted(_)
                | Self::ConnectionClosed
                | Self::Io(_)
        )
    }

    /// Check if a dial attempt that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionTimeout | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Iec104Error::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed by peer");

        let err = Iec104Error::ConnectRetriesExhausted(3);
        assert_eq!(err.to_string(), "Gave up connecting after 3 attempts");

        let err = Iec104Error::AddressResolution {
            address: "rtu:2404".into(),
            reason: "no such host".into(),
        };
        assert_eq!(
            err.to_string(),
            "Address resolution failed for rtu:2404: no such host"
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Iec104Error::ConnectionClosed.is_connection_error());
        assert!(Iec104Error::ConnectionTimeout.is_connection_error());
        assert!(!Iec104Error::FrameTimeout.is_connection_error());
        assert!(!Iec104Error::invalid_frame("bad start byte").is_connection_error());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Iec104Error::ConnectionTimeout.is_retryable());
        assert!(Iec104Error::Io(std::io::ErrorKind::ConnectionRefused.into()).is_retryable());
        assert!(!Iec104Error::Cancelled.is_retryable());
        assert!(!Iec104Error::AddressResolution {
            address: "x".into(),
            reason: "y".into()
        }
        .is_retryable());
    }
}
