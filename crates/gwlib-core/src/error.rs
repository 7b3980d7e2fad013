//! Error types for gwlib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. The variants follow the layers a
//! command passes through: the transport that carries it, the frame codec
//! that validates the reply, the caller-supplied record fields checked
//! before a write, and the gateway's own acknowledgment of that write.

use std::time::Duration;

/// The error type for all gwlib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection could not be used (refused, reset, timed out).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The gateway answered, but the reply is not a valid frame for the
    /// command that was sent, or a record inside it is malformed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A caller-supplied record field is out of range.
    ///
    /// Raised before the offending write is sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The write round-trip succeeded but the gateway's acknowledgment
    /// reports that the value was not applied.
    #[error("{operation} rejected by gateway (status {status:#04x})")]
    DeviceRejected {
        /// Human-readable name of the write operation.
        operation: &'static str,
        /// The result byte returned by the gateway.
        status: u8,
    },
}

/// Failures of the underlying connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting, sending, or receiving failed at the socket level
    /// (refused connection, reset, DNS failure).
    #[error("connection to {addr} failed: {source}")]
    Connection {
        /// The peer the transport was talking to.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No complete response arrived before the command deadline.
    #[error("timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    /// The transport has already been closed.
    #[error("not connected")]
    NotConnected,
}

/// Failures to validate or decode a gateway reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The gateway closed the connection without sending anything.
    #[error("no response")]
    NoResponse,

    /// The reply is too short to hold a command byte.
    #[error("response too short ({len} bytes)")]
    TooShort {
        /// Number of bytes received.
        len: usize,
    },

    /// The reply does not echo the command that was sent.
    #[error("command mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CommandMismatch {
        /// Command code that was sent.
        expected: u8,
        /// Command code found in the reply.
        actual: u8,
    },

    /// The trailing checksum byte does not match the frame contents.
    #[error("checksum mismatch: computed {expected:#04x}, received {actual:#04x}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u8,
        /// Checksum byte carried by the frame.
        actual: u8,
    },

    /// A record reply is too short to contain meaningful data.
    #[error("invalid data length: {len} bytes (need more than {min})")]
    InvalidLength {
        /// Number of bytes received.
        len: usize,
        /// Length the reply must exceed.
        min: usize,
    },

    /// A record ends before one of its fields.
    #[error("truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        /// The record or field being decoded.
        what: &'static str,
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// An outbound payload does not fit the one-byte size field.
    #[error("payload of {len} bytes does not fit in a frame")]
    PayloadTooLarge {
        /// Payload length in bytes.
        len: usize,
    },
}

/// A caller-supplied record field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the offending field (e.g. `rain_rate`, `protocol`).
    pub field: &'static str,
    /// Why the value was rejected.
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl Error {
    /// Returns `true` if the error came from a command deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Timeout(_)))
    }

    /// The offending field name, if this is a validation error.
    pub fn validation_field(&self) -> Option<&'static str> {
        match self {
            Error::Validation(v) => Some(v.field),
            _ => None,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_connection() {
        let e: Error = TransportError::Connection {
            addr: "192.168.1.20:45000".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        }
        .into();
        assert_eq!(
            e.to_string(),
            "transport error: connection to 192.168.1.20:45000 failed: refused"
        );
    }

    #[test]
    fn error_display_timeout() {
        let e: Error = TransportError::Timeout(Duration::from_millis(2000)).into();
        assert_eq!(e.to_string(), "transport error: timed out after 2000 ms");
        assert!(e.is_timeout());
    }

    #[test]
    fn error_display_command_mismatch() {
        let e: Error = ProtocolError::CommandMismatch {
            expected: 0x27,
            actual: 0x3c,
        }
        .into();
        assert_eq!(
            e.to_string(),
            "protocol error: command mismatch: expected 0x27, got 0x3c"
        );
    }

    #[test]
    fn error_display_checksum_mismatch() {
        let e = ProtocolError::ChecksumMismatch {
            expected: 0x2a,
            actual: 0x2b,
        };
        assert_eq!(
            e.to_string(),
            "checksum mismatch: computed 0x2a, received 0x2b"
        );
    }

    #[test]
    fn error_display_validation() {
        let e: Error = ValidationError::new("rain_rate", "must be a number >= 0").into();
        assert_eq!(e.to_string(), "invalid rain_rate: must be a number >= 0");
        assert_eq!(e.validation_field(), Some("rain_rate"));
        assert!(!e.is_timeout());
    }

    #[test]
    fn error_display_device_rejected() {
        let e = Error::DeviceRejected {
            operation: "soil calibration write",
            status: 1,
        };
        assert_eq!(
            e.to_string(),
            "soil calibration write rejected by gateway (status 0x01)"
        );
        assert_eq!(e.validation_field(), None);
    }

    #[test]
    fn connection_error_keeps_source() {
        use std::error::Error as _;
        let e = TransportError::Connection {
            addr: "gw:45000".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        };
        let source = e.source().expect("source");
        assert!(source.to_string().contains("reset"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn result_alias_works() {
        let ok: Result<u32> = Ok(42);
        assert!(matches!(ok, Ok(42)));

        let err: Result<u32> = Err(ProtocolError::NoResponse.into());
        assert!(err.is_err());
    }
}
