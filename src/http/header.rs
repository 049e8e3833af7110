//! Protocol constants shared by the parser, builder and workers

pub const HTTP_VERSION: &str = "HTTP/1.1";
pub const CRLF: &[u8] = b"\r\n";
pub const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

// Request headers
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";

// Response headers
pub const CONNECTION: &str = "Connection";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const LAST_MODIFIED: &str = "Last-Modified";

// Values
pub const KEEP_ALIVE: &str = "keep-alive";
pub const GZIP: &str = "gzip";

/// Appended to a file path to key its gzip variant in the response cache.
/// Path resolution rejects `#` in decoded segments, so no resolved file path
/// can end with it.
pub const GZIP_KEY_SUFFIX: &str = "#gzip";
