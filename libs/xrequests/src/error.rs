use std::fmt;
use thiserror::Error;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Which side of the exchange a content coding was applied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingDirection {
    /// Compressing a request body before sending
    Encode,
    /// Decompressing a response body after receiving
    Decode,
}

impl fmt::Display for CodingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => f.write_str("encoding"),
            Self::Decode => f.write_str("decoding"),
        }
    }
}

/// Request error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RequestError {
    /// URL or proxy scheme outside the supported set
    #[error("unsupported scheme '{scheme}': {reason}")]
    UnsupportedScheme {
        /// The scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to parse
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Header name or value that cannot be put on the wire
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Offending header name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The first read from a connection returned zero bytes
    #[error("Empty response from server")]
    EmptyResponse,

    /// Unknown codec named in a `Content-Encoding` header
    #[error("Unknown encoding type '{encoding}' while {direction} content")]
    UnsupportedEncoding {
        /// The codec name as it appeared in the header
        encoding: String,
        /// Whether the request body or the response body was being processed
        direction: CodingDirection,
    },

    /// Transport error (DNS, connect, read, write, timeout)
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// TLS configuration or handshake error
    #[error("TLS error: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Proxy refused or botched the tunnel negotiation
    #[error("Proxy error: {reason}")]
    Proxy {
        /// Diagnostic message
        reason: String,
    },

    /// Malformed or truncated HTTP message
    #[error("Protocol error: {reason}")]
    Protocol {
        /// Diagnostic message
        reason: String,
    },

    /// Compressed payload could not be processed
    #[error("Content codec failed: {0}")]
    Codec(#[source] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP non-2xx status, produced by [`Response::error_for_status`](crate::Response::error_for_status)
    #[error("HTTP {status} {reason}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Reason phrase sent by the server
        reason: String,
    },
}

impl RequestError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub(crate) fn proxy(reason: impl Into<String>) -> Self {
        Self::Proxy {
            reason: reason.into(),
        }
    }

    /// Errors that describe the request itself rather than the connection.
    ///
    /// Fatal errors are never retried on a fresh connection: replaying the
    /// same request would fail the same way.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedScheme { .. }
                | Self::InvalidUri { .. }
                | Self::InvalidHeader { .. }
                | Self::UnsupportedEncoding { .. }
        )
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Transport(Box::new(err))
    }
}

impl From<rustls::Error> for RequestError {
    fn from(err: rustls::Error) -> Self {
        RequestError::Tls(Box::new(err))
    }
}
