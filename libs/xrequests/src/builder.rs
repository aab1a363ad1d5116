use crate::config::{SessionConfig, TlsRootConfig};
use crate::connector::Connector;
use crate::error::RequestError;
use crate::framing::ResponseParser;
use crate::proxy::ProxyConfig;
use crate::session::Session;
use crate::tls::TlsConfigs;
use std::time::Duration;

/// Builder for constructing a [`Session`]
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Route every connection through this proxy
    #[must_use]
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy_url = Some(proxy_url.into());
        self
    }

    /// Set the socket timeout used for connect, read and write
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Block indefinitely on socket operations
    #[must_use]
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the upper bound on a single socket read
    #[must_use]
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.config.max_chunk_size = size;
        self
    }

    /// Set the upper bound on a response header block
    #[must_use]
    pub fn max_header_size(mut self, size: usize) -> Self {
        self.config.max_header_size = size;
        self
    }

    #[must_use]
    pub fn decode_content(mut self, enabled: bool) -> Self {
        self.config.decode_content = enabled;
        self
    }

    #[must_use]
    pub fn encode_content(mut self, enabled: bool) -> Self {
        self.config.encode_content = enabled;
        self
    }

    /// Set the default TLS verification mode; requests may override it
    #[must_use]
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.config.tls_verify = verify;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Inject this `User-Agent` into requests that do not set one
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Build the session.
    ///
    /// The proxy URL is validated and both TLS configurations are built here,
    /// so a misconfigured session fails before its first request.
    ///
    /// # Errors
    ///
    /// - [`RequestError::UnsupportedScheme`] / [`RequestError::InvalidUri`] for
    ///   a bad proxy URL
    /// - [`RequestError::Tls`] if the trust store cannot be loaded
    pub fn build(self) -> Result<Session, RequestError> {
        let proxy = self
            .config
            .proxy_url
            .as_deref()
            .map(ProxyConfig::parse)
            .transpose()?;
        let tls = TlsConfigs::new(self.config.tls_roots)?;
        let connector = Connector::new(proxy, tls);
        let parser = ResponseParser::new(
            self.config.max_chunk_size,
            self.config.max_header_size,
            self.config.decode_content,
        );

        tracing::debug!(
            proxy = ?connector.proxy().map(ProxyConfig::kind),
            timeout = ?self.config.timeout,
            tls_verify = self.config.tls_verify,
            "session built"
        );
        Ok(Session::from_parts(self.config, connector, parser))
    }
}
