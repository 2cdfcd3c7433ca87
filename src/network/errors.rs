//! Maps reqwest/hyper failures onto the shared [`ErrorKind`] taxonomy.

use std::error::Error as StdError;
use std::io;

use crate::error::{classify_message, ErrorKind, TransportError};

const ENGINE_CODES: [&str; 8] = [
    "ECONNREFUSED",
    "ENOTFOUND",
    "EAI_AGAIN",
    "ETIMEDOUT",
    "ECONNRESET",
    "EPIPE",
    "UND_ERR_CONNECT_TIMEOUT",
    "UND_ERR_HEADERS_TIMEOUT",
];

const DNS_MARKERS: [&str; 5] = [
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "nodename nor servname",
];

/// Top-level message followed by each cause in the source chain
pub(crate) fn error_chain_message(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn io_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = cause.source();
    }
    None
}

pub(crate) fn classify_reqwest(err: &reqwest::Error) -> TransportError {
    let message = error_chain_message(err);
    TransportError::new(classify_kind(err, &message), message)
}

fn classify_kind(err: &reqwest::Error, message: &str) -> ErrorKind {
    match io_kind(err) {
        Some(io::ErrorKind::ConnectionRefused) => return ErrorKind::ConnectionRefused,
        Some(
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof,
        ) => return ErrorKind::ConnectionReset,
        Some(io::ErrorKind::TimedOut) if err.is_connect() => return ErrorKind::ConnectionTimeout,
        Some(io::ErrorKind::TimedOut) => return ErrorKind::RequestTimeout,
        _ => {}
    }

    let lower = message.to_lowercase();
    if DNS_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorKind::HostNotFound;
    }

    if err.is_timeout() {
        return if err.is_connect() {
            ErrorKind::ConnectionTimeout
        } else {
            ErrorKind::RequestTimeout
        };
    }

    if let Some(kind) = ENGINE_CODES
        .iter()
        .find(|code| message.contains(*code))
        .and_then(|code| ErrorKind::from_engine_code(code))
    {
        return kind;
    }

    if err.is_builder() {
        return ErrorKind::InvalidRequest;
    }

    classify_message(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    fn test_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn test_chain_message_includes_causes() {
        let err = Wrapper(io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused (os error 111)"));
        assert_eq!(
            error_chain_message(&err),
            "client error (Connect): Connection refused (os error 111)"
        );
        assert_eq!(io_kind(&err), Some(io::ErrorKind::ConnectionRefused));
    }

    #[tokio::test]
    async fn test_refused_connection_is_classified() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = test_client()
            .get(format!("http://127.0.0.1:{}/", port))
            .send()
            .await
            .unwrap_err();
        assert_eq!(classify_reqwest(&err).kind, ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_unknown_host_is_classified() {
        let err = test_client()
            .get("http://freeman-does-not-exist.invalid/")
            .send()
            .await
            .unwrap_err();
        assert_eq!(classify_reqwest(&err).kind, ErrorKind::HostNotFound);
    }
}
