//! Error types for RPC operations
//!
//! The framework reports call failures as [`BoxError`]. When the failure is a
//! structured RPC error it is (or wraps) an [`RpcError`], which carries a
//! typed [`Code`], a metadata map and optional typed detail payloads.
//!
//! # Example
//! ```rust,ignore
//! use rpc_devlog::{Code, RpcError};
//!
//! let error = RpcError::new(Code::NotFound, "user not found")
//!     .with_metadata("reason", "missing");
//! let error = RpcError::not_found("user not found"); // Convenience method
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use crate::headers::Headers;
use crate::message::Message;

/// Boxed error returned by wrapped framework operations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Status codes for RPC operations.
///
/// The set matches the sixteen non-OK codes shared by gRPC and Connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Code {
    /// The operation was cancelled, typically by the caller
    Canceled,
    /// Unknown error
    Unknown,
    /// The client specified an invalid argument
    InvalidArgument,
    /// The deadline expired before the operation could complete
    DeadlineExceeded,
    /// Some requested entity was not found
    NotFound,
    /// The entity that a client attempted to create already exists
    AlreadyExists,
    /// The caller does not have permission to execute the operation
    PermissionDenied,
    /// Some resource has been exhausted
    ResourceExhausted,
    /// The system is not in a state required for the operation
    FailedPrecondition,
    /// The operation was aborted
    Aborted,
    /// The operation was attempted past the valid range
    OutOfRange,
    /// The operation is not implemented
    Unimplemented,
    /// Internal error
    Internal,
    /// The service is currently unavailable
    Unavailable,
    /// Unrecoverable data loss or corruption
    DataLoss,
    /// The request does not have valid authentication credentials
    Unauthenticated,
}

impl Code {
    /// Returns the string representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::PermissionDenied => "PermissionDenied",
            Self::ResourceExhausted => "ResourceExhausted",
            Self::FailedPrecondition => "FailedPrecondition",
            Self::Aborted => "Aborted",
            Self::OutOfRange => "OutOfRange",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::DataLoss => "DataLoss",
            Self::Unauthenticated => "Unauthenticated",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured RPC error with code, metadata and detail payloads.
///
/// The logger never constructs or alters these; it only renders them. A
/// wrapped call returning an `RpcError` returns the very same value to its
/// caller after logging.
#[derive(Debug, Clone, Error)]
#[error("[{code}] {message}")]
pub struct RpcError {
    /// Status code
    pub code: Code,
    /// Human-readable error message
    pub message: String,
    /// Error metadata (trailers), rendered like headers
    pub metadata: Headers,
    /// Typed detail payloads attached to the error
    pub details: Vec<Message>,
}

impl RpcError {
    /// Create a new error with code and message.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: Headers::new(),
            details: Vec::new(),
        }
    }

    /// Append a metadata value.
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.append(name, value);
        self
    }

    /// Attach a typed detail payload.
    pub fn with_detail(mut self, detail: Message) -> Self {
        self.details.push(detail);
        self
    }

    /// Create a `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    /// Create an `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    /// Create an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    /// Create an `Unavailable` error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    /// Create a `Canceled` error.
    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(Code::Canceled, message)
    }

    /// Finds the first `RpcError` in an error's `source()` chain, including
    /// the error itself.
    pub fn find_in<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a RpcError> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(rpc) = e.downcast_ref::<RpcError>() {
                return Some(rpc);
            }
            current = e.source();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("transport failed")]
    struct Wrapper(#[source] RpcError);

    #[test]
    fn test_display_includes_code() {
        let err = RpcError::not_found("user 7");
        assert_eq!(err.to_string(), "[NotFound] user 7");
    }

    #[test]
    fn test_find_in_direct() {
        let err: BoxError = Box::new(RpcError::internal("boom"));
        let found = RpcError::find_in(&*err).expect("rpc error");
        assert_eq!(found.code, Code::Internal);
    }

    #[test]
    fn test_find_in_source_chain() {
        let err: BoxError = Box::new(Wrapper(RpcError::unavailable("down")));
        let found = RpcError::find_in(&*err).expect("rpc error");
        assert_eq!(found.code, Code::Unavailable);
    }

    #[test]
    fn test_find_in_plain_error() {
        let err: BoxError = "plain".into();
        assert!(RpcError::find_in(&*err).is_none());
    }

    #[test]
    fn test_code_serializes_as_name() {
        let json = serde_json::to_string(&Code::NotFound).unwrap();
        assert_eq!(json, "\"NotFound\"");
    }
}
