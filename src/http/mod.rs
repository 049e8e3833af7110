//! HTTP protocol layer module
//!
//! Request head parsing, response head building and the protocol constants
//! they share, decoupled from sockets and files.

pub mod date;
pub mod header;
pub mod mime;
pub mod request;
pub mod response;
pub mod status;

// Re-export commonly used types
pub use date::format_http_date;
pub use request::{Method, ParseError, Request, RequestParser};
pub use response::{build_error_head, HeaderValue, ResponseBuilder};
pub use status::StatusCode;
