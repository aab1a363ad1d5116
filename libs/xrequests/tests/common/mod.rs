#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Raw-socket test servers for xrequests integration tests

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use xrequests::Session;

/// A request as the server saw it: the head without its blank line, and the
/// `Content-Length` body.
pub struct ReceivedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Bind a loopback listener and hand it to `handler` on a new thread.
pub fn spawn_server<T, F>(handler: F) -> (u16, JoinHandle<T>)
where
    T: Send + 'static,
    F: FnOnce(TcpListener) -> T + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    (port, thread::spawn(move || handler(listener)))
}

/// Read one request off `sock`. Returns `None` if the client closed the
/// connection before sending anything.
pub fn read_request(sock: &mut TcpStream) -> Option<ReceivedRequest> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if sock.read(&mut byte).unwrap() == 0 {
            return None;
        }
        head.push(byte[0]);
    }
    head.truncate(head.len() - 2);

    let mut request = ReceivedRequest {
        head: String::from_utf8(head).unwrap(),
        body: Vec::new(),
    };
    let length: usize = request
        .header("content-length")
        .map_or(0, |value| value.parse().unwrap());
    request.body = vec![0u8; length];
    sock.read_exact(&mut request.body).unwrap();
    Some(request)
}

/// Write a complete response with a `Content-Length` body.
pub fn respond(sock: &mut TcpStream, status: &str, headers: &[(&str, &str)], body: &[u8]) {
    let mut wire = format!("HTTP/1.1 {status}\r\n");
    for (name, value) in headers {
        wire.push_str(&format!("{name}: {value}\r\n"));
    }
    wire.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    sock.write_all(wire.as_bytes()).unwrap();
    sock.write_all(body).unwrap();
    sock.flush().unwrap();
}

pub fn session() -> Session {
    Session::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub fn url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}
