//! Socket factory: direct or proxied TCP, optionally wrapped in TLS.

use crate::error::RequestError;
use crate::proxy::ProxyConfig;
use crate::target::Target;
use crate::tls::TlsConfigs;
use rustls::{ClientConnection, StreamOwned};
use rustls_pki_types::ServerName;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

enum Stream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// A live, possibly TLS-wrapped, possibly proxied connection.
///
/// Every connection gets a process-unique id so callers can tell a reused
/// connection from a fresh one to the same address.
pub struct Connection {
    id: u64,
    stream: Stream,
}

impl Connection {
    fn new(stream: Stream) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            stream,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self.stream, Stream::Tls(_))
    }

    fn tcp(&self) -> &TcpStream {
        match &self.stream {
            Stream::Plain(sock) => sock,
            Stream::Tls(tls) => &tls.sock,
        }
    }

    /// Apply `timeout` to both reads and writes; `None` blocks indefinitely.
    ///
    /// # Errors
    /// Propagates the socket option error.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout.filter(|t| !t.is_zero());
        let sock = self.tcp();
        sock.set_read_timeout(timeout)?;
        sock.set_write_timeout(timeout)
    }

    /// Best-effort shutdown, then close. Errors are ignored.
    pub fn close(mut self) {
        if let Stream::Tls(tls) = &mut self.stream {
            tls.conn.send_close_notify();
            let _ = tls.conn.write_tls(&mut tls.sock);
        }
        let _ = self.tcp().shutdown(Shutdown::Both);
        tracing::trace!(connection_id = self.id, "connection closed");
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Plain(sock) => sock.read(buf),
            // Peers that drop the socket without close_notify are treated as
            // a clean close; framing decides whether that truncated anything.
            Stream::Tls(tls) => match tls.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                other => other,
            },
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Plain(sock) => sock.write(buf),
            Stream::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            Stream::Plain(sock) => sock.flush(),
            Stream::Tls(tls) => tls.flush(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("tls", &self.is_tls())
            .field("peer", &self.tcp().peer_addr().ok())
            .finish_non_exhaustive()
    }
}

/// Opens new connections for a session.
#[derive(Debug, Clone)]
pub struct Connector {
    proxy: Option<ProxyConfig>,
    tls: TlsConfigs,
}

impl Connector {
    #[must_use]
    pub fn new(proxy: Option<ProxyConfig>, tls: TlsConfigs) -> Self {
        Self { proxy, tls }
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Open a connection to `target`, through the proxy if one is configured,
    /// upgrading to TLS for `https` targets.
    ///
    /// `timeout` bounds the TCP connect and becomes the socket's read/write
    /// timeout. The TLS handshake completes before this returns.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Transport`] for DNS, connect and I/O failures
    /// - [`RequestError::Proxy`] if proxy negotiation fails
    /// - [`RequestError::Tls`] if the handshake fails
    pub fn connect(
        &self,
        target: &Target,
        timeout: Option<Duration>,
        tls_verify: bool,
    ) -> Result<Connection, RequestError> {
        let timeout = timeout.filter(|t| !t.is_zero());

        let sock = match &self.proxy {
            Some(proxy) => {
                let addrs = resolve(proxy.host(), proxy.port())?;
                let mut sock = connect_tcp(&addrs, timeout)?;
                configure(&sock, timeout)?;
                proxy.establish(&mut sock, target.host(), target.port())?;
                sock
            }
            None => {
                let addrs = resolve(target.host(), target.port())?;
                let sock = connect_tcp(&addrs, timeout)?;
                configure(&sock, timeout)?;
                sock
            }
        };

        let stream = if target.scheme().is_tls() {
            Stream::Tls(Box::new(self.handshake(sock, target.host(), tls_verify)?))
        } else {
            Stream::Plain(sock)
        };

        let conn = Connection::new(stream);
        tracing::debug!(
            connection_id = conn.id,
            host = target.host(),
            port = target.port(),
            tls = conn.is_tls(),
            proxied = self.proxy.is_some(),
            "opened connection"
        );
        Ok(conn)
    }

    fn handshake(
        &self,
        sock: TcpStream,
        host: &str,
        verify: bool,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>, RequestError> {
        let server_name =
            ServerName::try_from(host.to_owned()).map_err(|e| RequestError::Tls(Box::new(e)))?;
        let conn = ClientConnection::new(self.tls.select(verify), server_name)?;
        let mut tls = StreamOwned::new(conn, sock);

        while tls.conn.is_handshaking() {
            tls.conn
                .complete_io(&mut tls.sock)
                .map_err(classify_handshake_error)?;
        }
        Ok(tls)
    }
}

/// rustls reports handshake failures as `io::Error` wrapping `rustls::Error`.
fn classify_handshake_error(err: io::Error) -> RequestError {
    let is_tls = err
        .get_ref()
        .is_some_and(|inner| inner.downcast_ref::<rustls::Error>().is_some());
    if is_tls {
        RequestError::Tls(Box::new(err))
    } else {
        RequestError::Transport(Box::new(err))
    }
}

fn configure(sock: &TcpStream, timeout: Option<Duration>) -> io::Result<()> {
    sock.set_read_timeout(timeout)?;
    sock.set_write_timeout(timeout)?;
    sock.set_nodelay(true)
}

/// Resolve `host:port`, short-circuiting IP literals.
///
/// # Errors
/// [`RequestError::Transport`] if the lookup fails or yields nothing.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, RequestError> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {host}"),
        )
        .into());
    }
    Ok(addrs)
}

/// Try each address in turn and return the first stream that connects.
fn connect_tcp(addrs: &[SocketAddr], timeout: Option<Duration>) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        let attempt = match timeout {
            Some(t) => TcpStream::connect_timeout(addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(sock) => return Ok(sock),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses to connect to")))
}
