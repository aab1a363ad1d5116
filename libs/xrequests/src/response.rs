use crate::error::RequestError;
use crate::headers::{CONTENT_TYPE, Headers};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt;

/// A fully read HTTP response.
///
/// The body is always materialized, and already decompressed when the
/// session decodes content.
#[derive(Clone)]
pub struct Response {
    status: u16,
    reason: String,
    version: String,
    headers: Headers,
    body: Bytes,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, reason: String, version: String, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            reason,
            version,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status as an [`http::StatusCode`], if it is in the valid range.
    #[must_use]
    pub fn status_code(&self) -> Option<http::StatusCode> {
        http::StatusCode::from_u16(self.status).ok()
    }

    /// Reason phrase; empty when the server sent none.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Protocol version from the status line, e.g. `HTTP/1.1`
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8; invalid sequences become U+FFFD.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON. The status is not checked.
    ///
    /// # Errors
    /// Returns [`RequestError::Json`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn a non-2xx response into [`RequestError::HttpStatus`].
    ///
    /// # Errors
    /// Returns `RequestError::HttpStatus` if the status is not 2xx.
    pub fn error_for_status(self) -> Result<Self, RequestError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(RequestError::HttpStatus {
            status: self.status,
            reason: self.reason,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Response [{}]>", self.status)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}
