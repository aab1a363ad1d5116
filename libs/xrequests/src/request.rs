//! HTTP/1.1 request serialization.

use crate::codec;
use crate::error::RequestError;
use crate::headers::{CONTENT_ENCODING, Headers};
use std::borrow::Cow;

/// Protocol version written when the caller does not pick one.
pub const DEFAULT_HTTP_VERSION: &str = "1.1";

/// Everything that goes into the header block of a request.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a http::Method,
    /// Path plus query, sent verbatim
    pub path: &'a str,
    /// Version number without the `HTTP/` prefix, e.g. `1.1`
    pub version: &'a str,
    pub headers: &'a Headers,
}

impl RequestHead<'_> {
    /// Render the request into the exact bytes to transmit.
    ///
    /// Headers go out in insertion order, one line per value; suppressed
    /// headers are skipped. `Content-Length` is never added here. `body` is
    /// appended as-is; run it through [`encode_body`] first when the request
    /// carries a `Content-Encoding`.
    ///
    /// # Errors
    /// Returns [`RequestError::InvalidHeader`] if a header name or value would
    /// break the message framing (CR/LF, colon in the name, empty name).
    pub fn serialize(&self, body: Option<&[u8]>) -> Result<Vec<u8>, RequestError> {
        let mut head = format!(
            "{} {} HTTP/{}\r\n",
            self.method.as_str(),
            self.path,
            self.version
        );

        for (name, value) in self.headers.iter() {
            validate_header(name, value)?;
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut wire = head.into_bytes();
        if let Some(body) = body {
            wire.extend_from_slice(body);
        }
        Ok(wire)
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), RequestError> {
    let reason = if name.is_empty() {
        "empty header name"
    } else if name.bytes().any(|b| b == b':' || b.is_ascii_whitespace()) {
        "header name contains a colon or whitespace"
    } else if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        "header value contains CR or LF"
    } else {
        return Ok(());
    };
    Err(RequestError::InvalidHeader {
        name: name.to_owned(),
        reason: reason.to_owned(),
    })
}

/// Compress a request body according to its `Content-Encoding` header.
///
/// The body is returned untouched when encoding is disabled or the header is
/// absent.
///
/// # Errors
/// [`RequestError::UnsupportedEncoding`] for unknown codec names,
/// [`RequestError::Codec`] if compression fails.
pub fn encode_body<'b>(
    headers: &Headers,
    body: &'b [u8],
    enabled: bool,
) -> Result<Cow<'b, [u8]>, RequestError> {
    match headers.get_joined(CONTENT_ENCODING) {
        Some(value) if enabled => Ok(Cow::Owned(codec::encode_body(body, &value)?)),
        _ => Ok(Cow::Borrowed(body)),
    }
}
