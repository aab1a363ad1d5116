//! Payload compression for `Content-Encoding`: `br`, `gzip` and `deflate`.

use crate::error::{CodingDirection, RequestError};
use flate2::Compression;
use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io::{self, Read, Write};

/// A supported content coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Brotli,
    Gzip,
    /// zlib-wrapped deflate, as RFC 9110 defines it
    Deflate,
}

impl ContentCoding {
    /// Look up a coding by its `Content-Encoding` token, ignoring case.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("br") {
            Some(Self::Brotli)
        } else if token.eq_ignore_ascii_case("gzip") {
            Some(Self::Gzip)
        } else if token.eq_ignore_ascii_case("deflate") {
            Some(Self::Deflate)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    /// Compress `data` with this coding.
    ///
    /// # Errors
    /// Returns the underlying I/O error from the compressor.
    pub fn encode(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Brotli => {
                let mut out = Vec::new();
                let params = brotli::enc::BrotliEncoderParams::default();
                brotli::BrotliCompress(&mut &data[..], &mut out, &params)?;
                Ok(out)
            }
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }

    /// Decompress `data` with this coding.
    ///
    /// `deflate` accepts both zlib-wrapped and raw deflate streams; servers
    /// disagree on which one the token means.
    ///
    /// # Errors
    /// Returns `InvalidData`-style I/O errors for corrupt payloads.
    pub fn decode(self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::Brotli => {
                brotli::BrotliDecompress(&mut &data[..], &mut out)?;
            }
            Self::Gzip => {
                MultiGzDecoder::new(data).read_to_end(&mut out)?;
            }
            Self::Deflate => {
                if ZlibDecoder::new(data).read_to_end(&mut out).is_err() {
                    out.clear();
                    DeflateDecoder::new(data).read_to_end(&mut out)?;
                }
            }
        }
        Ok(out)
    }
}

/// Parse a `Content-Encoding` value into the codings it lists, in header order.
///
/// # Errors
/// Returns [`RequestError::UnsupportedEncoding`] naming the first unknown token.
pub fn parse_codings(
    value: &str,
    direction: CodingDirection,
) -> Result<Vec<ContentCoding>, RequestError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            ContentCoding::from_token(token).ok_or_else(|| RequestError::UnsupportedEncoding {
                encoding: token.to_owned(),
                direction,
            })
        })
        .collect()
}

/// Apply every coding listed in `value`, in order.
///
/// # Errors
/// [`RequestError::UnsupportedEncoding`] for unknown tokens,
/// [`RequestError::Codec`] if a compressor fails.
pub fn encode_body(body: &[u8], value: &str) -> Result<Vec<u8>, RequestError> {
    let codings = parse_codings(value, CodingDirection::Encode)?;
    let mut data = body.to_vec();
    for coding in codings {
        data = coding.encode(&data).map_err(RequestError::Codec)?;
    }
    Ok(data)
}

/// Undo every coding listed in `value`, last applied first.
///
/// # Errors
/// [`RequestError::UnsupportedEncoding`] for unknown tokens,
/// [`RequestError::Codec`] for corrupt payloads.
pub fn decode_body(body: &[u8], value: &str) -> Result<Vec<u8>, RequestError> {
    let codings = parse_codings(value, CodingDirection::Decode)?;
    let mut data = body.to_vec();
    for coding in codings.into_iter().rev() {
        data = coding.decode(&data).map_err(RequestError::Codec)?;
    }
    Ok(data)
}
