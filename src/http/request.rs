//! Incremental HTTP request head parser
//!
//! One [`RequestParser`] lives per connection and is fed raw socket segments
//! in arrival order. It accumulates bytes until the request line and the
//! complete header block (terminated by an empty line) are present, then
//! exposes the parsed [`Request`]. Request bodies are never parsed.
//!
//! Only one request is "ready" at a time. Bytes that arrive after a complete
//! head stay buffered until [`RequestParser::reset`] is called for the next
//! cycle; [`RequestParser::advance`] then parses them without new input.
//!
//! ```
//! use reactor_httpd::http::request::RequestParser;
//!
//! let mut parser = RequestParser::new(8192);
//! assert!(!parser.append_segment(b"GET /index.html HTTP/1.1\r\n").unwrap());
//! assert!(parser.append_segment(b"Accept-Encoding: gzip\r\n\r\n").unwrap());
//!
//! let request = parser.request().unwrap();
//! assert_eq!(request.path(), "/index.html");
//! assert_eq!(request.header("accept-encoding"), Some("gzip"));
//! ```

use std::fmt;

use thiserror::Error;

use super::header::HEAD_TERMINATOR;

/// Errors produced while parsing a request head
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
    #[error("request head is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),
}

/// HTTP request method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Other(String),
}

impl Method {
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Other(s) => s,
        }
    }

    /// Only `GET` responses carry a body; every other method gets headers only
    pub const fn sends_body(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, parsed request head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    version: String,
    headers: Vec<(String, String)>,
}

impl Request {
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Raw resource path from the request line, query string included
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Case-insensitive header lookup; the first occurrence wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_count(&self) -> usize {
        self.headers.len()
    }
}

/// Per-connection incremental parse state
#[derive(Debug)]
pub struct RequestParser {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for the head terminator
    scanned: usize,
    ready: Option<Request>,
    max_head_size: usize,
}

impl RequestParser {
    pub const fn new(max_head_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            ready: None,
            max_head_size,
        }
    }

    /// Append a segment and report whether a request head just became complete
    ///
    /// Returns `Ok(true)` exactly once per logical request. While a request is
    /// ready the bytes are only buffered and `Ok(false)` is returned.
    pub fn append_segment(&mut self, bytes: &[u8]) -> Result<bool, ParseError> {
        self.buffer.extend_from_slice(bytes);
        self.advance()
    }

    /// Try to complete a request from already-buffered bytes
    pub fn advance(&mut self) -> Result<bool, ParseError> {
        if self.ready.is_some() {
            return Ok(false);
        }

        // The terminator may straddle the previous scan boundary
        let start = self.scanned.saturating_sub(HEAD_TERMINATOR.len() - 1);
        let Some(offset) = find(&self.buffer[start..], HEAD_TERMINATOR) else {
            self.scanned = self.buffer.len();
            if self.buffer.len() > self.max_head_size {
                return Err(ParseError::HeadTooLarge {
                    limit: self.max_head_size,
                });
            }
            return Ok(false);
        };

        let head_end = start + offset;
        let consumed = head_end + HEAD_TERMINATOR.len();
        if consumed > self.max_head_size {
            return Err(ParseError::HeadTooLarge {
                limit: self.max_head_size,
            });
        }

        let head: Vec<u8> = self.buffer.drain(..consumed).collect();
        self.scanned = 0;
        let request = parse_head(&head[..head_end])?;
        self.ready = Some(request);
        Ok(true)
    }

    /// The ready request, if the head is complete
    pub const fn request(&self) -> Option<&Request> {
        self.ready.as_ref()
    }

    pub const fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Drop the ready request; buffered follow-on bytes are kept
    pub fn reset(&mut self) {
        self.ready = None;
    }

    /// Drop everything, e.g. after a parse error
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.ready = None;
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_head(head: &[u8]) -> Result<Request, ParseError> {
    let text = std::str::from_utf8(head).map_err(|_| ParseError::InvalidUtf8)?;
    // Stray CRLFs between keep-alive requests are allowed before the request line
    let mut lines = text.trim_start_matches("\r\n").split("\r\n");

    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_ascii_whitespace();
    let (Some(method), Some(path), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::MalformedRequestLine(request_line.to_string()));
    };
    if !version.starts_with("HTTP/") {
        return Err(ParseError::MalformedRequestLine(request_line.to_string()));
    }

    let mut headers = Vec::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(ParseError::MalformedHeader(line.to_string()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ParseError::MalformedHeader(line.to_string()));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    Ok(Request {
        method: Method::parse(method),
        path: path.to_string(),
        version: version.to_string(),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 8192;

    #[test]
    fn test_single_segment() {
        let mut parser = RequestParser::new(LIMIT);
        let done = parser
            .append_segment(b"GET /a/b.txt HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap();
        assert!(done);
        let req = parser.request().unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/a/b.txt");
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.header("host"), Some("x"));
        assert_eq!(parser.buffered_len(), 0);
    }

    #[test]
    fn test_split_across_segments() {
        let mut parser = RequestParser::new(LIMIT);
        assert!(!parser.append_segment(b"GET /index.html HTTP/1.1\r\n").unwrap());
        assert!(parser.request().is_none());
        assert!(!parser.append_segment(b"Accept-Encoding: gz").unwrap());
        assert!(!parser.append_segment(b"ip\r\n").unwrap());
        assert!(!parser.is_ready());
        assert!(parser.append_segment(b"\r\n").unwrap());
        assert_eq!(parser.request().unwrap().header("Accept-Encoding"), Some("gzip"));
    }

    #[test]
    fn test_terminator_split_byte_by_byte() {
        let raw = b"HEAD / HTTP/1.0\r\nX: 1\r\n\r\n";
        let mut parser = RequestParser::new(LIMIT);
        let mut completions = 0;
        for byte in raw {
            if parser.append_segment(std::slice::from_ref(byte)).unwrap() {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
        assert_eq!(parser.request().unwrap().method(), &Method::Head);
    }

    #[test]
    fn test_header_lookup_rules() {
        let mut parser = RequestParser::new(LIMIT);
        parser
            .append_segment(b"GET / HTTP/1.1\r\nX-Dup:  first \r\nx-dup: second\r\n\r\n")
            .unwrap();
        let req = parser.request().unwrap();
        assert_eq!(req.header("X-DUP"), Some("first"));
        assert_eq!(req.header("missing"), None);
        assert_eq!(req.header_count(), 2);
    }

    #[test]
    fn test_second_request_buffered_until_reset() {
        let mut parser = RequestParser::new(LIMIT);
        let done = parser
            .append_segment(b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n")
            .unwrap();
        assert!(done);
        assert_eq!(parser.request().unwrap().path(), "/one");

        // More bytes while a request is ready are only buffered
        assert!(!parser.append_segment(b"").unwrap());
        assert_eq!(parser.request().unwrap().path(), "/one");

        parser.reset();
        assert!(parser.advance().unwrap());
        assert_eq!(parser.request().unwrap().path(), "/two");
    }

    #[test]
    fn test_reset_then_new_request() {
        let mut parser = RequestParser::new(LIMIT);
        assert!(parser.append_segment(b"GET /one HTTP/1.1\r\n\r\n").unwrap());
        parser.reset();
        assert!(!parser.advance().unwrap());
        assert!(parser.append_segment(b"\r\nGET /two HTTP/1.1\r\n\r\n").unwrap());
        assert_eq!(parser.request().unwrap().path(), "/two");
    }

    #[test]
    fn test_other_methods() {
        let mut parser = RequestParser::new(LIMIT);
        parser.append_segment(b"BREW /pot HTTP/1.1\r\n\r\n").unwrap();
        let method = parser.request().unwrap().method().clone();
        assert_eq!(method, Method::Other("BREW".to_string()));
        assert!(!method.sends_body());
        assert!(Method::Get.sends_body());
        assert!(!Method::Head.sends_body());
    }

    #[test]
    fn test_malformed_request_line() {
        let mut parser = RequestParser::new(LIMIT);
        let err = parser.append_segment(b"GARBAGE\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedRequestLine(_)));

        let mut parser = RequestParser::new(LIMIT);
        let err = parser.append_segment(b"GET / FTP/1.0\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedRequestLine(_)));
    }

    #[test]
    fn test_malformed_header() {
        let mut parser = RequestParser::new(LIMIT);
        let err = parser
            .append_segment(b"GET / HTTP/1.1\r\nno colon here\r\n\r\n")
            .unwrap_err();
        assert_eq!(err, ParseError::MalformedHeader("no colon here".to_string()));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut parser = RequestParser::new(LIMIT);
        let err = parser.append_segment(b"GET /\xff HTTP/1.1\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseError::InvalidUtf8);
    }

    #[test]
    fn test_head_too_large() {
        let mut parser = RequestParser::new(32);
        assert!(!parser.append_segment(b"GET / HTTP/1.1\r\n").unwrap());
        let err = parser
            .append_segment(b"X-Long: aaaaaaaaaaaaaaaaaaaaaaaa")
            .unwrap_err();
        assert_eq!(err, ParseError::HeadTooLarge { limit: 32 });

        parser.discard();
        assert_eq!(parser.buffered_len(), 0);
        assert!(parser.append_segment(b"GET / HTTP/1.1\r\n\r\n").unwrap());
    }
}
