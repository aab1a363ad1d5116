use crate::framing::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_HEADER_SIZE};
use crate::request::DEFAULT_HTTP_VERSION;
use std::time::Duration;

/// Default socket timeout for connect, read and write
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Session configuration, fixed at construction.
///
/// Use [`SessionBuilder`](crate::SessionBuilder) for fluent construction, or
/// one of the presets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Proxy URL: `http`, `https`, `socks` (SOCKS4), `socks5` or `socks5h`
    pub proxy_url: Option<String>,

    /// Socket timeout applied to connect, reads and writes (default: 60s).
    /// `None` or zero blocks indefinitely.
    pub timeout: Option<Duration>,

    /// Upper bound on a single socket read (default: 1 MiB)
    pub max_chunk_size: usize,

    /// Upper bound on a response's status line plus headers (default: 64 KiB)
    pub max_header_size: usize,

    /// Decompress response bodies per `Content-Encoding` (default: true)
    pub decode_content: bool,

    /// Compress request bodies per their `Content-Encoding` header (default: true)
    pub encode_content: bool,

    /// Validate server certificates and hostnames (default: true)
    pub tls_verify: bool,

    /// Trust store used when `tls_verify` is on (default: webpki roots)
    pub tls_roots: TlsRootConfig,

    /// `User-Agent` injected into requests that do not set one (default: none)
    pub user_agent: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            timeout: Some(DEFAULT_TIMEOUT),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            decode_content: true,
            encode_content: true,
            tls_verify: true,
            tls_roots: TlsRootConfig::default(),
            user_agent: None,
        }
    }
}

impl SessionConfig {
    /// Short timeout and small read buffers
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            max_chunk_size: 64 * 1024,
            ..Self::default()
        }
    }

    /// Configuration for tests against local servers.
    ///
    /// **WARNING**: certificate verification is off. Never use in production.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout: Some(Duration::from_secs(5)),
            tls_verify: false,
            ..Self::default()
        }
    }
}

/// Per-call overrides of the session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Socket timeout for this call; `None` uses the session timeout
    pub timeout: Option<Duration>,

    /// TLS verification for this call; `None` uses the session setting
    pub tls_verify: Option<bool>,

    /// Version written into the request line, without the `HTTP/` prefix
    pub version: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            tls_verify: None,
            version: DEFAULT_HTTP_VERSION.to_owned(),
        }
    }
}
