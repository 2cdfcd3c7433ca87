//! Error types for the request pipeline.
//!
//! Builder errors are the only ones that surface as `Err` from public
//! functions. Transport failures are classified into [`ErrorKind`] and end up
//! as status-0 envelopes.

use thiserror::Error;

/// A single validation problem found on a request descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Descriptor field the problem refers to (`url`, `auth`, `body`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors raised while turning a descriptor into a concrete request.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The resolved URL is empty or not an absolute URL.
    #[error("Invalid URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    /// A header name or value cannot be sent on the wire.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The descriptor failed validation.
    #[error("{}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    /// A form-data file attachment could not be decoded.
    #[error("Invalid file attachment '{name}': {reason}")]
    Attachment { name: String, reason: String },
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure taxonomy shared by both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionRefused,
    HostNotFound,
    ConnectionTimeout,
    ConnectionReset,
    /// Header-wait or body-read budget exceeded
    RequestTimeout,
    /// Explicit cancellation, distinct from a timeout
    Cancelled,
    /// The descriptor could not be turned into a request
    InvalidRequest,
    /// Unclassified transport failure
    Network,
    /// Local post-processing of a received response failed
    Processing,
    ProxyConfiguration,
}

impl ErrorKind {
    /// Status text shown on status-0 envelopes
    pub fn status_text(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "Connection Refused",
            ErrorKind::HostNotFound => "Host Not Found",
            ErrorKind::ConnectionTimeout => "Connection Timeout",
            ErrorKind::ConnectionReset => "Connection Reset",
            ErrorKind::RequestTimeout => "Request Timeout",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::InvalidRequest => "Invalid Request",
            ErrorKind::Network => "Network Error",
            ErrorKind::Processing => "Processing Error",
            ErrorKind::ProxyConfiguration => "Proxy Configuration Error",
        }
    }

    /// Map a socket or engine error code (`ECONNREFUSED`, `UND_ERR_*`, ...)
    pub fn from_engine_code(code: &str) -> Option<ErrorKind> {
        match code.to_ascii_uppercase().as_str() {
            "ECONNREFUSED" => Some(ErrorKind::ConnectionRefused),
            "ENOTFOUND" | "EAI_AGAIN" | "EAI_NONAME" => Some(ErrorKind::HostNotFound),
            "ETIMEDOUT" | "UND_ERR_CONNECT_TIMEOUT" => Some(ErrorKind::ConnectionTimeout),
            "ECONNRESET" | "EPIPE" | "UND_ERR_SOCKET" => Some(ErrorKind::ConnectionReset),
            "UND_ERR_HEADERS_TIMEOUT" | "UND_ERR_BODY_TIMEOUT" => Some(ErrorKind::RequestTimeout),
            "ABORT_ERR" | "UND_ERR_ABORTED" => Some(ErrorKind::Cancelled),
            _ => None,
        }
    }
}

/// A classified transport-stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .kind.status_text())]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request was cancelled")
    }

    /// Classify from an engine error code, falling back to the message text.
    pub fn from_engine_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = ErrorKind::from_engine_code(code).unwrap_or_else(|| classify_message(&message));
        Self::new(kind, message)
    }
}

impl From<BuildError> for TransportError {
    fn from(err: BuildError) -> Self {
        TransportError::new(ErrorKind::InvalidRequest, err.to_string())
    }
}

/// Last-resort heuristic on the error text.
pub(crate) fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("aborted") {
        ErrorKind::RequestTimeout
    } else {
        ErrorKind::Network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_codes_map_to_taxonomy() {
        assert_eq!(
            ErrorKind::from_engine_code("ECONNREFUSED"),
            Some(ErrorKind::ConnectionRefused)
        );
        assert_eq!(
            ErrorKind::from_engine_code("enotfound"),
            Some(ErrorKind::HostNotFound)
        );
        assert_eq!(
            ErrorKind::from_engine_code("UND_ERR_CONNECT_TIMEOUT"),
            Some(ErrorKind::ConnectionTimeout)
        );
        assert_eq!(
            ErrorKind::from_engine_code("ECONNRESET"),
            Some(ErrorKind::ConnectionReset)
        );
        assert_eq!(
            ErrorKind::from_engine_code("UND_ERR_BODY_TIMEOUT"),
            Some(ErrorKind::RequestTimeout)
        );
        assert_eq!(ErrorKind::from_engine_code("EWHATEVER"), None);
    }

    #[test]
    fn unknown_code_falls_back_to_message() {
        let err = TransportError::from_engine_code("E_UNKNOWN", "operation was aborted");
        assert_eq!(err.kind, ErrorKind::RequestTimeout);
        let err = TransportError::from_engine_code("E_UNKNOWN", "socket hang up");
        assert_eq!(err.kind, ErrorKind::Network);
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::from_engine_code("ECONNREFUSED", "connect ECONNREFUSED 127.0.0.1:9");
        assert_eq!(
            err.to_string(),
            "Connection Refused: connect ECONNREFUSED 127.0.0.1:9"
        );
    }

    #[test]
    fn validation_error_joins_messages() {
        let err = BuildError::Validation(vec![
            ValidationError::new("url", "URL is required"),
            ValidationError::new("auth", "Bearer token is required"),
        ]);
        assert_eq!(err.to_string(), "URL is required; Bearer token is required");
    }
}
