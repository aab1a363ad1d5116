#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Blocking HTTP/1.1 client on raw sockets
//!
//! `xrequests` keeps one persistent connection per `host:port` and writes and
//! parses HTTP/1.1 messages itself. Only TLS (rustls), proxy tunnels and
//! payload compression are delegated.
//!
//! - Plain and TLS connections, verified or unverified per request
//! - HTTP `CONNECT`, SOCKS4 and SOCKS5 proxies, with remote DNS via `socks5h`
//! - `Content-Length`, chunked and close-delimited response bodies
//! - `br`, `gzip` and `deflate` in both directions
//! - A failure on a reused connection is retried once on a fresh one
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use xrequests::Session;
//!
//! let session = Session::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let resp = session
//!     .get("https://example.com/api")
//!     .header("Accept", "application/json")
//!     .send()?
//!     .error_for_status()?;
//! println!("{resp}: {}", resp.text());
//! # Ok::<(), xrequests::RequestError>(())
//! ```

mod builder;
mod codec;
mod config;
mod connector;
mod error;
mod framing;
mod headers;
mod pool;
mod proxy;
mod request;
mod response;
mod session;
mod target;
mod tls;

pub use builder::SessionBuilder;
pub use codec::{ContentCoding, decode_body, encode_body};
pub use config::{DEFAULT_TIMEOUT, RequestOptions, SessionConfig, TlsRootConfig};
pub use connector::{Connection, Connector};
pub use error::{CodingDirection, InvalidUriKind, RequestError};
pub use framing::{
    BodyFraming, ChunkedDecoder, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_HEADER_SIZE, ParsedResponse,
    ResponseParser,
};
pub use headers::Headers;
pub use pool::{ConnectionPool, PooledConnection};
pub use proxy::{ProxyConfig, ProxyKind};
pub use request::{DEFAULT_HTTP_VERSION, RequestHead};
pub use response::Response;
pub use session::{Request, RequestBuilder, Session};
pub use target::{PoolKey, Scheme, Target};
pub use tls::TlsConfigs;
