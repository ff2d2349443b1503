//! Error types for torrent-export
//!
//! Two families of failures exist and they propagate differently:
//! - [`Error`] covers everything that can still be reported through an HTTP status
//!   (request validation, torrent lookup, server start-up).
//! - [`EntryError`] covers a single file inside an archive that is already being
//!   streamed. These are logged and counted, never turned into a status code.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for torrent-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for torrent-export
#[derive(Debug, Error)]
pub enum Error {
    /// A required query parameter was absent or empty
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// The torrent reference could not be parsed into an info hash
    #[error("invalid torrent reference: {reason}")]
    InvalidReference {
        /// What was wrong with the reference
        reason: String,
    },

    /// The engine does not track a torrent with this info hash
    #[error("torrent {0} not found")]
    NotFound(String),

    /// Torrent metadata (file list, sizes) did not resolve in time
    #[error("torrent {0} connection timeout")]
    MetadataTimeout(String),

    /// The torrent has metadata but reports no files
    #[error("no files in torrent {0}")]
    NoFiles(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "export.chunk_size")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidReference`]
    pub fn invalid_reference(reason: impl Into<String>) -> Self {
        Error::InvalidReference {
            reason: reason.into(),
        }
    }
}

/// Failure of one file while the archive is being streamed.
///
/// Only [`EntryError::Write`] ends the export; every other variant skips or truncates
/// the affected entry and the loop moves on.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The file-status entry has no addressable file with the same path
    #[error("file not found in torrent")]
    NotMatched,

    /// The engine refused to open a reader for the file
    #[error("cannot create reader for file")]
    ReaderUnavailable,

    /// The archive writer rejected the entry header
    #[error("error creating zip entry: {0}")]
    CreateEntry(#[source] async_zip::error::ZipError),

    /// Reading from the swarm failed part way through the file
    #[error("error copying file to zip after {written} bytes: {source}")]
    Read {
        /// Bytes already copied into the entry
        written: u64,
        /// Underlying reader error
        #[source]
        source: std::io::Error,
    },

    /// A single read waited longer than the configured read timeout
    #[error("read timed out after {written} bytes")]
    ReadTimeout {
        /// Bytes already copied into the entry
        written: u64,
    },

    /// The outgoing sink rejected a write, usually because the client went away
    #[error("response sink closed: {0}")]
    Write(#[source] std::io::Error),
}

impl EntryError {
    /// Bytes kept in the archive when the failure left a truncated entry behind.
    ///
    /// None means no entry was written for the file.
    pub fn partial_bytes(&self) -> Option<u64> {
        match self {
            EntryError::Read { written, .. } | EntryError::ReadTimeout { written } => Some(*written),
            _ => None,
        }
    }
}

/// API error response format
///
/// Preflight failures on the export route are answered with a bare status code.
/// This envelope is used where a body is useful, such as authentication failures.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "unauthorized",
///     "message": "Invalid credentials"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "unauthorized")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - the caller can fix the request
            Error::MissingParameter(_) => 400,
            Error::InvalidReference { .. } => 400,
            Error::NoFiles(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 500 Internal Server Error - engine or server-side issues
            Error::MetadataTimeout(_) => 500,
            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::MissingParameter(_) => "missing_parameter",
            Error::InvalidReference { .. } => "invalid_reference",
            Error::NotFound(_) => "not_found",
            Error::MetadataTimeout(_) => "metadata_timeout",
            Error::NoFiles(_) => "no_files",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error.error_code().to_string(), error.to_string())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (Error::MissingParameter("hash"), 400, "missing_parameter"),
            (
                Error::invalid_reference("bad length"),
                400,
                "invalid_reference",
            ),
            (Error::NotFound("abcd".into()), 404, "not_found"),
            (Error::MetadataTimeout("abcd".into()), 500, "metadata_timeout"),
            (Error::NoFiles("abcd".into()), 400, "no_files"),
            (
                Error::Config {
                    message: "chunk size must be positive".into(),
                    key: Some("export.chunk_size".into()),
                },
                500,
                "config_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_code() {
        for (error, status, _) in all_error_variants() {
            assert_eq!(
                error.status_code(),
                status,
                "unexpected status for {error:?}"
            );
        }
    }

    #[test]
    fn every_variant_maps_to_expected_error_code() {
        for (error, _, code) in all_error_variants() {
            assert_eq!(error.error_code(), code, "unexpected code for {error:?}");
        }
    }

    #[test]
    fn metadata_timeout_is_500_not_504() {
        // web UI treats any 500 from /downloadzip as "torrent not connected"
        assert_eq!(Error::MetadataTimeout("x".into()).status_code(), 500);
    }

    #[test]
    fn no_files_is_a_client_error() {
        assert_eq!(Error::NoFiles("x".into()).status_code(), 400);
    }

    #[test]
    fn api_error_message_matches_error_display() {
        let error = Error::NotFound("deadbeef".into());
        let display = error.to_string();
        let api_error: ApiError = error.into();

        assert_eq!(api_error.error.code, "not_found");
        assert_eq!(api_error.error.message, display);
        assert!(api_error.error.details.is_none());
    }

    #[test]
    fn api_error_without_details_omits_details_in_json() {
        let json = serde_json::to_value(ApiError::unauthorized("nope")).unwrap();
        assert_eq!(json["error"]["code"], "unauthorized");
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn only_read_failures_leave_partial_entries() {
        let read = EntryError::Read {
            written: 10,
            source: std::io::Error::other("peer reset"),
        };
        assert_eq!(read.partial_bytes(), Some(10));
        assert_eq!(EntryError::ReadTimeout { written: 0 }.partial_bytes(), Some(0));
        assert_eq!(EntryError::NotMatched.partial_bytes(), None);
        assert_eq!(EntryError::ReaderUnavailable.partial_bytes(), None);
        assert_eq!(
            EntryError::Write(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).partial_bytes(),
            None
        );
    }
}
