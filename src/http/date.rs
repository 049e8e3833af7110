//! RFC 1123 date formatting for `Last-Modified`

use chrono::{DateTime, Utc};
use std::time::SystemTime;

const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a file modification time, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(time: SystemTime) -> String {
    let dt: DateTime<Utc> = time.into();
    dt.format(RFC1123_FORMAT).to_string()
}
