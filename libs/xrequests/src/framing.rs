//! HTTP/1.x response parsing.
//!
//! Reads the header block, picks a body framing strategy from the headers,
//! reads exactly that body and finally undoes any `Content-Encoding`.

use crate::codec;
use crate::error::{CodingDirection, RequestError};
use crate::headers::{CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, Headers, TRANSFER_ENCODING};
use crate::response::Response;
use bytes::Bytes;
use std::io::{self, Read};

/// Default upper bound on a single socket read.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Default upper bound on the status line plus headers.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;

/// Largest read buffer allocated up front; `max_chunk_size` only caps it.
const MAX_SCRATCH_SIZE: usize = 64 * 1024;

/// Longest chunk-size or trailer line accepted in a chunked body.
const MAX_CHUNK_LINE: usize = 4096;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// How the end of a response body is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body: `HEAD` responses and 101/204/304 statuses
    Empty,
    /// Exactly this many bytes (`Content-Length`)
    Length(usize),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Everything until the peer closes the connection
    UntilClose,
}

/// A response plus what the exchange means for the connection it came from.
#[derive(Debug)]
pub struct ParsedResponse {
    pub response: Response,
    pub framing: BodyFraming,
    /// Whether the connection is positioned at the start of the next response
    /// and the server did not ask to close it.
    pub reusable: bool,
}

/// Response reader configured with a session's limits.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    max_chunk_size: usize,
    max_header_size: usize,
    decode_content: bool,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            decode_content: true,
        }
    }
}

impl ResponseParser {
    #[must_use]
    pub fn new(max_chunk_size: usize, max_header_size: usize, decode_content: bool) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
            max_header_size,
            decode_content,
        }
    }

    /// Read one complete response from `reader`.
    ///
    /// `expects_body` is `false` for `HEAD` requests, whose responses carry
    /// framing headers but no body. Interim 1xx responses other than
    /// `101 Switching Protocols` are skipped.
    ///
    /// # Errors
    ///
    /// - [`RequestError::EmptyResponse`] if the first read returns zero bytes
    /// - [`RequestError::Protocol`] for malformed or truncated messages and
    ///   conflicting framing headers
    /// - [`RequestError::UnsupportedEncoding`] / [`RequestError::Codec`] when
    ///   decoding the body fails
    /// - [`RequestError::Transport`] for I/O errors, timeouts included
    pub fn read_response<R: Read>(
        &self,
        reader: &mut R,
        expects_body: bool,
    ) -> Result<ParsedResponse, RequestError> {
        let mut scratch = vec![0u8; self.scratch_size()];

        let mut pending = Vec::new();
        let (head, leftover) = loop {
            let (raw, leftover) = self.read_head(reader, &mut scratch, pending)?;
            let head = parse_head(&raw)?;
            if !is_interim(head.status) {
                break (head, leftover);
            }
            tracing::trace!(status = head.status, "skipping interim response");
            pending = leftover;
        };

        let framing = select_framing(&head, expects_body)?;
        tracing::trace!(status = head.status, ?framing, "response head parsed");

        let (body, clean_end) = match framing {
            BodyFraming::Empty => (Vec::new(), leftover.is_empty()),
            BodyFraming::Length(len) => read_exact_body(reader, &mut scratch, leftover, len)?,
            BodyFraming::Chunked => read_chunked_body(reader, &mut scratch, &leftover)?,
            BodyFraming::UntilClose => (read_until_close(reader, &mut scratch, leftover)?, false),
        };

        let reusable = clean_end && head.keep_alive() && head.status != 101;

        let body = match head.headers.get_joined(CONTENT_ENCODING) {
            Some(coding) if self.decode_content => {
                if body.is_empty() {
                    codec::parse_codings(&coding, CodingDirection::Decode)?;
                    body
                } else {
                    codec::decode_body(&body, &coding)?
                }
            }
            _ => body,
        };

        Ok(ParsedResponse {
            response: Response::new(
                head.status,
                head.reason,
                head.version,
                head.headers,
                Bytes::from(body),
            ),
            framing,
            reusable,
        })
    }

    fn scratch_size(&self) -> usize {
        self.max_chunk_size.min(MAX_SCRATCH_SIZE)
    }

    /// Read until the header terminator, starting from bytes already
    /// buffered. Returns the head without the terminator and whatever body
    /// bytes arrived with it.
    fn read_head<R: Read>(
        &self,
        reader: &mut R,
        scratch: &mut [u8],
        mut buf: Vec<u8>,
    ) -> Result<(Vec<u8>, Vec<u8>), RequestError> {
        let mut search_from = 0;
        loop {
            if let Some(pos) = find(&buf[search_from..], HEADER_TERMINATOR) {
                let end = search_from + pos;
                if end > self.max_header_size {
                    return Err(header_too_large(self.max_header_size));
                }
                let leftover = buf.split_off(end + HEADER_TERMINATOR.len());
                buf.truncate(end);
                return Ok((buf, leftover));
            }
            if buf.len() > self.max_header_size {
                return Err(header_too_large(self.max_header_size));
            }

            let n = read_some(reader, scratch)?;
            if n == 0 {
                if buf.is_empty() {
                    return Err(RequestError::EmptyResponse);
                }
                return Err(RequestError::protocol(
                    "connection closed before end of response headers",
                ));
            }

            // The terminator may straddle the previous read.
            search_from = buf.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
            buf.extend_from_slice(&scratch[..n]);
        }
    }
}

/// 1xx heads that precede the final response on the same exchange.
fn is_interim(status: u16) -> bool {
    (100..200).contains(&status) && status != 101
}

fn header_too_large(limit: usize) -> RequestError {
    RequestError::protocol(format!("response header block exceeds {limit} bytes"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, RequestError> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

struct ResponseHead {
    version: String,
    status: u16,
    reason: String,
    headers: Headers,
}

impl ResponseHead {
    fn keep_alive(&self) -> bool {
        if self.headers.has_token(CONNECTION, "close") {
            return false;
        }
        if self.version.eq_ignore_ascii_case("HTTP/1.0") {
            return self.headers.has_token(CONNECTION, "keep-alive");
        }
        true
    }
}

fn parse_head(raw: &[u8]) -> Result<ResponseHead, RequestError> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");

    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(RequestError::protocol(format!(
            "malformed status line: '{status_line}'"
        )));
    }
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..1000).contains(code))
        .ok_or_else(|| {
            RequestError::protocol(format!("malformed status code in '{status_line}'"))
        })?;
    let reason = parts.next().unwrap_or_default().to_owned();

    let mut headers = Headers::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| RequestError::protocol(format!("malformed header line: '{line}'")))?;
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_whitespace()) {
            return Err(RequestError::protocol(format!(
                "malformed header name: '{name}'"
            )));
        }
        let value = value.strip_prefix(' ').unwrap_or(value);
        headers.append(name, value);
    }

    Ok(ResponseHead {
        version: version.to_owned(),
        status,
        reason,
        headers,
    })
}

fn select_framing(head: &ResponseHead, expects_body: bool) -> Result<BodyFraming, RequestError> {
    if !expects_body || (100..200).contains(&head.status) || matches!(head.status, 204 | 304) {
        return Ok(BodyFraming::Empty);
    }

    let chunked = head.headers.has_token(TRANSFER_ENCODING, "chunked");
    let length = content_length(&head.headers)?;

    match (length, chunked) {
        (Some(_), true) => Err(RequestError::protocol(
            "response has both Content-Length and chunked Transfer-Encoding",
        )),
        (Some(len), false) => Ok(BodyFraming::Length(len)),
        (None, true) => Ok(BodyFraming::Chunked),
        (None, false) => Ok(BodyFraming::UntilClose),
    }
}

/// The declared length, if any. Repeated values must agree.
fn content_length(headers: &Headers) -> Result<Option<usize>, RequestError> {
    let mut length = None;
    for raw in headers
        .get_all(CONTENT_LENGTH)
        .iter()
        .flat_map(|v| v.split(','))
    {
        let raw = raw.trim();
        let parsed = raw
            .parse::<u64>()
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| RequestError::protocol(format!("invalid Content-Length: '{raw}'")))?;
        match length {
            Some(previous) if previous != parsed => {
                return Err(RequestError::protocol("conflicting Content-Length values"));
            }
            _ => length = Some(parsed),
        }
    }
    Ok(length)
}

/// Returns the body and whether the stream ended exactly at its last byte.
fn read_exact_body<R: Read>(
    reader: &mut R,
    scratch: &mut [u8],
    mut body: Vec<u8>,
    len: usize,
) -> Result<(Vec<u8>, bool), RequestError> {
    if body.len() > len {
        body.truncate(len);
        return Ok((body, false));
    }

    // Content-Length is untrusted; grow with the data instead.
    body.reserve((len - body.len()).min(DEFAULT_MAX_CHUNK_SIZE));
    while body.len() < len {
        let want = (len - body.len()).min(scratch.len());
        let n = read_some(reader, &mut scratch[..want])?;
        if n == 0 {
            return Err(RequestError::protocol(format!(
                "truncated body: got {} of {len} bytes",
                body.len()
            )));
        }
        body.extend_from_slice(&scratch[..n]);
    }
    Ok((body, true))
}

fn read_chunked_body<R: Read>(
    reader: &mut R,
    scratch: &mut [u8],
    leftover: &[u8],
) -> Result<(Vec<u8>, bool), RequestError> {
    let mut decoder = ChunkedDecoder::new();
    let mut consumed = decoder.feed(leftover)?;
    let mut excess = consumed < leftover.len();

    while !decoder.is_done() {
        let n = read_some(reader, scratch)?;
        if n == 0 {
            decoder.finish()?;
            return Ok((decoder.into_body(), false));
        }
        consumed = decoder.feed(&scratch[..n])?;
        excess = consumed < n;
    }
    Ok((decoder.into_body(), !excess))
}

fn read_until_close<R: Read>(
    reader: &mut R,
    scratch: &mut [u8],
    mut body: Vec<u8>,
) -> Result<Vec<u8>, RequestError> {
    loop {
        let n = read_some(reader, scratch)?;
        if n == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&scratch[..n]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Reading a `<hex>[;ext]\r\n` line
    Size,
    /// This many payload bytes still to come
    Data(usize),
    /// Expecting the CRLF after a payload
    DataEnd,
    /// After the zero chunk: trailer lines until an empty one
    Trailer,
    Done,
}

/// Incremental decoder for `Transfer-Encoding: chunked`.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkState,
    line: Vec<u8>,
    body: Vec<u8>,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ChunkState::Size,
            line: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == ChunkState::Done
    }

    /// Consume framed input. Returns how many bytes were used; anything past
    /// the end of the chunked body is left unconsumed.
    ///
    /// # Errors
    /// [`RequestError::Protocol`] for malformed framing.
    pub fn feed(&mut self, input: &[u8]) -> Result<usize, RequestError> {
        let mut pos = 0;
        while pos < input.len() {
            match self.state {
                ChunkState::Done => break,
                ChunkState::Data(remaining) => {
                    let take = remaining.min(input.len() - pos);
                    self.body.extend_from_slice(&input[pos..pos + take]);
                    pos += take;
                    self.state = if take == remaining {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(remaining - take)
                    };
                }
                ChunkState::Size | ChunkState::DataEnd | ChunkState::Trailer => {
                    let byte = input[pos];
                    pos += 1;
                    if byte == b'\n' {
                        self.end_line()?;
                    } else {
                        if self.line.len() >= MAX_CHUNK_LINE {
                            return Err(RequestError::protocol("chunk framing line too long"));
                        }
                        self.line.push(byte);
                    }
                }
            }
        }
        Ok(pos)
    }

    fn end_line(&mut self) -> Result<(), RequestError> {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        self.state = match self.state {
            ChunkState::Size => match parse_chunk_size(&line)? {
                0 => ChunkState::Trailer,
                size => ChunkState::Data(size),
            },
            ChunkState::DataEnd if line.is_empty() => ChunkState::Size,
            ChunkState::DataEnd => {
                return Err(RequestError::protocol("missing CRLF after chunk data"));
            }
            ChunkState::Trailer if line.is_empty() => ChunkState::Done,
            // trailer fields are not surfaced
            ChunkState::Trailer => ChunkState::Trailer,
            state @ (ChunkState::Data(_) | ChunkState::Done) => state,
        };
        Ok(())
    }

    /// Accept end of stream where the body could plausibly be complete.
    ///
    /// # Errors
    /// [`RequestError::Protocol`] if the stream ended inside a chunk.
    pub fn finish(&self) -> Result<(), RequestError> {
        match self.state {
            ChunkState::Size if !self.line.is_empty() => Err(RequestError::protocol(
                "connection closed inside a chunk size line",
            )),
            ChunkState::Data(_) | ChunkState::DataEnd => Err(RequestError::protocol(
                "connection closed inside chunk data",
            )),
            ChunkState::Size | ChunkState::Trailer | ChunkState::Done => Ok(()),
        }
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, RequestError> {
    let text = String::from_utf8_lossy(line);
    let digits = text.split(';').next().unwrap_or_default().trim();
    if digits.is_empty() {
        return Err(RequestError::protocol("empty chunk size"));
    }
    usize::from_str_radix(digits, 16)
        .map_err(|_| RequestError::protocol(format!("invalid chunk size: '{digits}'")))
}
