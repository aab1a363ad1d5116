use crate::builder::SessionBuilder;
use crate::config::{RequestOptions, SessionConfig};
use crate::connector::Connector;
use crate::error::RequestError;
use crate::framing::ResponseParser;
use crate::headers::{CONTENT_LENGTH, CONTENT_TYPE, HOST, Headers, USER_AGENT};
use crate::pool::{ConnectionPool, PooledConnection};
use crate::request::{self as wire, RequestHead};
use crate::response::Response;
use crate::target::{PoolKey, Target};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// A request ready to be executed by a [`Session`].
#[derive(Debug, Clone)]
pub struct Request {
    pub method: http::Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub options: RequestOptions,
}

impl Request {
    #[must_use]
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            options: RequestOptions::default(),
        }
    }
}

/// Blocking HTTP/1.1 client that keeps one live connection per `host:port`.
///
/// A request that fails on a pooled connection is retried once on a fresh
/// connection: the server or an intermediary may have closed the idle socket
/// since it was last used. Failures on a fresh connection are returned as-is.
///
/// `Session` is `Send + Sync`. Concurrent requests to the same `host:port`
/// each get their own connection; only one of them stays pooled afterwards.
/// A session must not talk plain HTTP and TLS to the same `host:port`
/// without [`close`](Self::close)-ing that slot in between.
///
/// Dropping the session closes every pooled connection.
pub struct Session {
    config: SessionConfig,
    connector: Connector,
    parser: ResponseParser,
    pool: Mutex<ConnectionPool>,
}

impl Session {
    /// Create a session with default configuration
    ///
    /// # Errors
    /// Returns an error if the TLS configuration cannot be built.
    pub fn new() -> Result<Self, RequestError> {
        SessionBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_parts(
        config: SessionConfig,
        connector: Connector,
        parser: ResponseParser,
    ) -> Self {
        Self {
            config,
            connector,
            parser,
            pool: Mutex::new(ConnectionPool::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a request with an arbitrary method
    pub fn request(&self, method: http::Method, url: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::DELETE, url)
    }

    /// Responses to `HEAD` never carry a body, whatever their headers say.
    pub fn head(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::HEAD, url)
    }

    pub fn options(&self, url: &str) -> RequestBuilder<'_> {
        self.request(http::Method::OPTIONS, url)
    }

    /// Send `request` and read its response.
    ///
    /// `Host` is injected when absent, as is `Content-Length` when there is a
    /// body and `User-Agent` when the session has one configured. Suppress a
    /// header with [`Headers::suppress`] to keep it off the wire.
    ///
    /// # Errors
    ///
    /// - [`RequestError::UnsupportedScheme`] / [`RequestError::InvalidUri`]
    ///   before any socket is touched
    /// - [`RequestError::InvalidHeader`] / [`RequestError::UnsupportedEncoding`]
    ///   if the request cannot be serialized
    /// - any transport, TLS, proxy or protocol error from the final attempt
    pub fn execute(&self, request: Request) -> Result<Response, RequestError> {
        let Request {
            method,
            url,
            mut headers,
            body,
            options,
        } = request;

        let target = Target::parse(&url)?;

        headers.set_default(HOST, target.host_header());
        if let Some(user_agent) = &self.config.user_agent {
            headers.set_default(USER_AGENT, user_agent.as_str());
        }

        let body = body
            .as_deref()
            .map(|body| wire::encode_body(&headers, body, self.config.encode_content))
            .transpose()?;
        if let Some(body) = &body {
            headers.set_default(CONTENT_LENGTH, body.len().to_string());
        }

        // Serialized once; a retry replays these exact bytes.
        let payload = RequestHead {
            method: &method,
            path: target.path(),
            version: &options.version,
            headers: &headers,
        }
        .serialize(body.as_deref())?;

        let exchange = Exchange {
            target: &target,
            key: target.pool_key(),
            payload: &payload,
            timeout: options.timeout.or(self.config.timeout),
            tls_verify: options.tls_verify.unwrap_or(self.config.tls_verify),
            expects_body: method != http::Method::HEAD,
        };

        tracing::debug!(%method, key = %exchange.key, path = target.path(), "sending request");
        self.send_with_retry(&exchange)
    }

    /// One attempt on a pooled connection if there is one, then at most one
    /// more on a fresh connection.
    fn send_with_retry(&self, exchange: &Exchange<'_>) -> Result<Response, RequestError> {
        if let Some(conn) = PooledConnection::checkout(&self.pool, &exchange.key) {
            let connection_id = conn.id();
            tracing::debug!(connection_id, key = %exchange.key, "reusing pooled connection");
            match self.round_trip(conn, exchange) {
                Ok(response) => return Ok(response),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        connection_id,
                        key = %exchange.key,
                        error = %err,
                        "reused connection failed; retrying on a fresh connection"
                    );
                }
            }
        }

        let conn = self
            .connector
            .connect(exchange.target, exchange.timeout, exchange.tls_verify)?;
        let conn = PooledConnection::fresh(&self.pool, exchange.key.clone(), conn);
        self.round_trip(conn, exchange)
    }

    /// Send the payload and read the response. The connection goes back to
    /// the pool only if the response left it reusable; on any error it is
    /// closed when `conn` drops.
    fn round_trip(
        &self,
        mut conn: PooledConnection<'_>,
        exchange: &Exchange<'_>,
    ) -> Result<Response, RequestError> {
        if conn.reused() {
            conn.set_timeout(exchange.timeout)?;
        }
        conn.write_all(exchange.payload)?;
        conn.flush()?;

        let parsed = self.parser.read_response(&mut conn, exchange.expects_body)?;
        tracing::debug!(
            connection_id = conn.id(),
            status = parsed.response.status(),
            framing = ?parsed.framing,
            reusable = parsed.reusable,
            "response received"
        );

        if parsed.reusable {
            conn.release();
        } else {
            conn.discard();
        }
        Ok(parsed.response)
    }

    /// Close the pooled connection for `key`. Returns whether one existed.
    pub fn close(&self, key: &PoolKey) -> bool {
        self.pool.lock().evict(key)
    }

    /// Close every pooled connection.
    pub fn clear(&self) {
        self.pool.lock().clear();
    }

    /// Keys that currently hold an idle pooled connection.
    #[must_use]
    pub fn pool_keys(&self) -> Vec<PoolKey> {
        self.pool.lock().keys().cloned().collect()
    }

    /// Id of the idle pooled connection for `key`, if any.
    #[must_use]
    pub fn connection_id(&self, key: &PoolKey) -> Option<u64> {
        self.pool.lock().get(key).map(crate::connector::Connection::id)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pool.get_mut().clear();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("pooled", &self.pool.lock().len())
            .finish_non_exhaustive()
    }
}

/// Everything an attempt needs, computed once per request.
struct Exchange<'a> {
    target: &'a Target,
    key: PoolKey,
    payload: &'a [u8],
    timeout: Option<Duration>,
    tls_verify: bool,
    expects_body: bool,
}

/// Fluent request construction, created by [`Session::get`],
/// [`Session::post`], etc. Finish with [`send`](Self::send).
#[must_use = "a RequestBuilder does nothing until sent"]
pub struct RequestBuilder<'a> {
    session: &'a Session,
    request: Request,
}

impl<'a> RequestBuilder<'a> {
    fn new(session: &'a Session, method: http::Method, url: &str) -> Self {
        Self {
            session,
            request: Request::new(method, url),
        }
    }

    /// Add a header value; repeating a name produces repeated header lines.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request.headers.append(name, value);
        self
    }

    /// Merge `headers` in, replacing same-named entries.
    pub fn headers(mut self, headers: impl Into<Headers>) -> Self {
        self.request.headers.merge(headers.into());
        self
    }

    /// Keep `name` off the wire, including headers the session would inject.
    pub fn suppress_header(mut self, name: &str) -> Self {
        self.request.headers.suppress(name);
        self
    }

    /// Set the body as JSON, with `Content-Type: application/json` unless a
    /// content type was already set.
    ///
    /// # Errors
    /// Returns [`RequestError::Json`] if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, RequestError> {
        let bytes = serde_json::to_vec(body)?;
        self.request
            .headers
            .set_default(CONTENT_TYPE, "application/json");
        self.request.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.request.body = Some(body);
        self
    }

    pub fn body_string(mut self, body: String) -> Self {
        self.request.body = Some(Bytes::from(body));
        self
    }

    /// Override the session timeout for this request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.options.timeout = Some(timeout);
        self
    }

    /// Override the session's TLS verification mode for this request
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.request.options.tls_verify = Some(verify);
        self
    }

    /// Protocol version for the request line, e.g. `"1.0"`
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.request.options.version = version.into();
        self
    }

    /// Finish building without sending.
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }

    /// Send the request.
    ///
    /// # Errors
    /// See [`Session::execute`].
    pub fn send(self) -> Result<Response, RequestError> {
        self.session.execute(self.request)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use tracing_test::traced_test;

    /// Read one request head off `sock`, byte by byte so any body stays
    /// unread. The blank line ending the head is not included.
    fn read_request_head(mut sock: &TcpStream) -> String {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            if sock.read(&mut byte).unwrap() == 0 {
                break;
            }
            head.push(byte[0]);
        }
        head.truncate(head.len().saturating_sub(2));
        String::from_utf8(head).unwrap()
    }

    fn respond(sock: &mut TcpStream, body: &str) {
        write!(
            sock,
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
    }

    fn session() -> Session {
        Session::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_injects_host_and_content_length() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let head = read_request_head(&sock);
            let mut body = [0u8; 5];
            sock.read_exact(&mut body).unwrap();
            respond(&mut sock, "ok");
            (head, body)
        });

        let resp = session()
            .post(&format!("http://127.0.0.1:{port}/submit?x=1"))
            .header("X-Trace", "abc")
            .body_string("hello".to_owned())
            .send()
            .unwrap();
        assert_eq!(resp.text(), "ok");

        let (head, body) = server.join().unwrap();
        assert!(head.starts_with("POST /submit?x=1 HTTP/1.1\r\n"), "{head}");
        assert!(head.contains("X-Trace: abc\r\n"));
        assert!(head.contains(&format!("Host: 127.0.0.1:{port}\r\n")));
        assert!(head.contains("Content-Length: 5\r\n"));
        assert_eq!(&body, b"hello");
    }

    #[test]
    fn test_suppressed_host_is_not_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let head = read_request_head(&sock);
            respond(&mut sock, "");
            head
        });

        session()
            .get(&format!("http://127.0.0.1:{port}/"))
            .suppress_header("host")
            .version("1.0")
            .send()
            .unwrap();

        let head = server.join().unwrap();
        assert_eq!(head, "GET / HTTP/1.0\r\n");
    }

    #[test]
    #[traced_test]
    fn test_stale_pooled_connection_is_retried_once() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            // First connection answers once and goes away.
            let (mut first, _) = listener.accept().unwrap();
            read_request_head(&first);
            respond(&mut first, "one");
            drop(first);

            let (mut second, _) = listener.accept().unwrap();
            read_request_head(&second);
            respond(&mut second, "two");
            second
        });

        let session = session();
        let url = format!("http://127.0.0.1:{port}/");
        let key = PoolKey::new("127.0.0.1", port);

        assert_eq!(session.get(&url).send().unwrap().text(), "one");
        let stale_id = session.connection_id(&key).unwrap();

        assert_eq!(session.get(&url).send().unwrap().text(), "two");
        let fresh_id = session.connection_id(&key).unwrap();
        assert_ne!(stale_id, fresh_id);
        assert_eq!(session.pool_keys(), vec![key]);

        let _keep_open = server.join().unwrap();
        assert!(logs_contain("retrying on a fresh connection"));
    }

    #[test]
    fn test_close_and_clear() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            read_request_head(&sock);
            respond(&mut sock, "hi");
            sock
        });

        let session = session();
        session
            .get(&format!("http://127.0.0.1:{port}/"))
            .send()
            .unwrap();
        let _sock = server.join().unwrap();

        let key = PoolKey::new("127.0.0.1", port);
        assert!(session.connection_id(&key).is_some());
        assert!(session.close(&key));
        assert!(!session.close(&key));
        assert!(session.pool_keys().is_empty());

        session.clear();
        assert!(session.pool_keys().is_empty());
    }

    #[test]
    fn test_session_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Session>();
    }
}
