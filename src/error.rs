//! Error types for eppwire.

use thiserror::Error;

/// Main error type for all EPP operations.
#[derive(Debug, Error)]
pub enum EppError {
    /// I/O error from the underlying byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Read or write attempted on a closed connection.
    #[error("operation on closed connection")]
    ClosedConnection,

    /// The owning listener shut down while the operation was pending.
    #[error("server closed")]
    ServerClosed,

    /// Data unit header declared a size below the 4-byte minimum, or the
    /// stream ended before the declared payload was read.
    #[error("truncated data unit")]
    TruncatedFrame,

    /// A server reply carried a client transaction ID that does not match
    /// the exchange at the head of the queue. Diagnostic only under strict
    /// FIFO dispatch; logged, never returned from `exchange`.
    #[error("invalid transaction ID: {id:?}")]
    InvalidTransactionId { id: String },

    /// Two in-flight commands were submitted with the same client
    /// transaction ID.
    #[error("duplicate transaction ID: {id:?}")]
    DuplicateTransactionId { id: String },

    /// A [`Responder`](crate::server::Responder) was invoked more than once.
    #[error("multiple responses to request {index}: {count} > 1")]
    MultipleResponse { index: u64, count: u64 },

    /// The payload could not be decoded as an EPP message.
    #[error("malformed data unit: {cause}")]
    MalformedFrame { cause: String },
}

impl EppError {
    /// Shorthand for [`EppError::MalformedFrame`] with the given cause.
    pub fn malformed(cause: impl Into<String>) -> Self {
        EppError::MalformedFrame {
            cause: cause.into(),
        }
    }
}

impl From<quick_xml::Error> for EppError {
    fn from(err: quick_xml::Error) -> Self {
        EppError::MalformedFrame {
            cause: err.to_string(),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for EppError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        EppError::MalformedFrame {
            cause: err.to_string(),
        }
    }
}

/// Result type alias using EppError.
pub type Result<T> = std::result::Result<T, EppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_response_display() {
        let err = EppError::MultipleResponse { index: 3, count: 2 };
        assert_eq!(err.to_string(), "multiple responses to request 3: 2 > 1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: EppError = io_err.into();
        assert!(matches!(err, EppError::Io(_)));
    }

    #[test]
    fn test_malformed_helper() {
        let err = EppError::malformed("not an <epp> element");
        assert_eq!(err.to_string(), "malformed data unit: not an <epp> element");
    }
}
