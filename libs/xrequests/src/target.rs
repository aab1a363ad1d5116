//! Request target resolution: URL → scheme, host, port, path and pool key.

use crate::error::{InvalidUriKind, RequestError};
use std::fmt;
use url::{Host, Url};

/// Supported target URL schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Plain HTTP (default port 80)
    Http,
    /// HTTP over TLS (default port 443)
    Https,
}

impl Scheme {
    /// Parse a scheme name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("http") {
            Some(Self::Http)
        } else if name.eq_ignore_ascii_case("https") {
            Some(Self::Https)
        } else {
            None
        }
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }

    #[must_use]
    pub fn is_tls(self) -> bool {
        self == Self::Https
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Identity of a pooled connection slot: lower-cased host plus port.
///
/// The scheme is not part of the key. A session must not talk plain HTTP and
/// TLS to the same `host:port` without closing the slot in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    host: String,
    port: u16,
}

impl PoolKey {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            port,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Where a request goes, derived once from its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    scheme: Scheme,
    /// Lower-cased host; IPv6 literals carry no brackets.
    host: String,
    port: u16,
    /// Path with `?query` appended, exactly as written in the URL. Never
    /// empty.
    path: String,
}

impl Target {
    /// Resolve a URL into a request target.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidUri`] if the URL does not parse or has no host
    /// - [`RequestError::UnsupportedScheme`] if the scheme is not `http`/`https`
    pub fn parse(url: &str) -> Result<Self, RequestError> {
        let parsed = Url::parse(url).map_err(|e| {
            let kind = if e == url::ParseError::RelativeUrlWithoutBase {
                InvalidUriKind::MissingScheme
            } else {
                InvalidUriKind::ParseError
            };
            RequestError::InvalidUri {
                url: url.to_owned(),
                kind,
                reason: e.to_string(),
            }
        })?;

        let scheme =
            Scheme::from_name(parsed.scheme()).ok_or_else(|| RequestError::UnsupportedScheme {
                scheme: parsed.scheme().to_owned(),
                reason: "only http and https targets are supported".to_owned(),
            })?;

        let host = match parsed.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_ascii_lowercase(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => {
                return Err(RequestError::InvalidUri {
                    url: url.to_owned(),
                    kind: InvalidUriKind::MissingAuthority,
                    reason: "URL has no host".to_owned(),
                });
            }
        };

        let port = parsed.port().unwrap_or_else(|| scheme.default_port());

        let mut path = raw_path_and_query(url).to_owned();
        if path.is_empty() || path.starts_with('?') {
            path.insert(0, '/');
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path plus query, as written into the request line.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn pool_key(&self) -> PoolKey {
        PoolKey::new(&self.host, self.port)
    }

    /// Value for the `Host` header: the port is included only when it is not
    /// the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

/// Everything after the authority up to the fragment, untouched.
///
/// `Url` removes dot segments and percent-encodes; the request line carries
/// the path as written.
fn raw_path_and_query(url: &str) -> &str {
    let url = url.trim_matches(|c: char| c.is_ascii_control() || c == ' ');
    let rest = url.split_once(':').map_or(url, |(_, rest)| rest);
    let authority = rest.trim_start_matches(['/', '\\']);
    let tail = authority
        .find(['/', '?', '#', '\\'])
        .map_or("", |start| &authority[start..]);
    tail.split_once('#').map_or(tail, |(before, _)| before)
}
