//! HTTP response head building module
//!
//! [`ResponseBuilder`] accumulates a status line and ordered headers, then
//! serializes them into the exact byte block written to the socket. One
//! builder is owned by each worker and cleared between responses so its
//! buffers are reused.

use bytes::Bytes;
use std::fmt::Write as _;

use super::header::{CONNECTION, CONTENT_LENGTH, CRLF, HTTP_VERSION, KEEP_ALIVE};
use super::status::StatusCode;

/// A header value: text, or an integer such as `Content-Length`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    Int(u64),
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for HeaderValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for HeaderValue {
    fn from(value: usize) -> Self {
        Self::Int(u64::try_from(value).unwrap_or(u64::MAX))
    }
}

impl std::fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Reusable response head builder
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(&'static str, HeaderValue)>,
    scratch: String,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset status and headers, keeping allocations
    pub fn clear(&mut self) {
        self.status = StatusCode::Ok;
        self.headers.clear();
        self.scratch.clear();
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Append a header; order is preserved on the wire
    pub fn add_header(&mut self, name: &'static str, value: impl Into<HeaderValue>) -> &mut Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Serialize status line, headers and the blank-line terminator
    pub fn serialize(&mut self) -> Bytes {
        self.scratch.clear();
        // Writing into a String cannot fail
        let _ = write!(self.scratch, "{HTTP_VERSION} {}\r\n", self.status);
        for (name, value) in &self.headers {
            let _ = write!(self.scratch, "{name}: {value}\r\n");
        }
        let mut out = Vec::with_capacity(self.scratch.len() + CRLF.len());
        out.extend_from_slice(self.scratch.as_bytes());
        out.extend_from_slice(CRLF);
        Bytes::from(out)
    }
}

/// Build an empty-bodied error head (`Content-Length: 0`) with the given status
pub fn build_error_head(builder: &mut ResponseBuilder, status: StatusCode) -> Bytes {
    builder.clear();
    builder
        .set_status(status)
        .add_header(CONNECTION, KEEP_ALIVE)
        .add_header(CONTENT_LENGTH, 0u64);
    builder.serialize()
}
