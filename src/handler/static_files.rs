//! Static file serving module
//!
//! Resolves request paths under the document root, reads file bodies
//! (gzip-compressing them in-stream when asked) and classifies failures
//! into response statuses.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

use crate::http::header::GZIP_KEY_SUFFIX;
use crate::http::StatusCode;

/// Request-level failures, each mapped to an error status
#[derive(Debug, Error)]
pub enum ServeError {
    /// Missing, unreadable, or not a regular file
    #[error("cannot read {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Request path that does not map into the document root
    #[error("rejected request path {0:?}")]
    InvalidPath(String),
    /// Anything else that went wrong while building the response
    #[error("{0}")]
    Internal(String),
}

impl ServeError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::InvalidPath(_) => StatusCode::NotFound,
            Self::Internal(_) => StatusCode::InternalServerError,
        }
    }
}

/// Read-only view of the filesystem used by the workers
pub trait FileSystem: Send + Sync + 'static {
    type File: Read;

    /// Open a regular file for reading
    fn open(&self, path: &Path) -> io::Result<Self::File>;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    type File = BufReader<File>;

    fn open(&self, path: &Path) -> io::Result<Self::File> {
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
        }
        Ok(BufReader::new(file))
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }
}

/// Map a raw request path onto a file under `root`
///
/// Query string and fragment are dropped, percent-escapes decoded, `.` and
/// empty segments skipped. Any `..` segment is rejected rather than resolved,
/// as is any decoded segment still carrying a `?` or `#`.
/// Paths ending in `/` get `index_file` appended.
pub fn resolve_path(root: &Path, raw_path: &str, index_file: &str) -> Result<PathBuf, ServeError> {
    let invalid = || ServeError::InvalidPath(raw_path.to_string());
    let path = raw_path.split(['?', '#']).next().unwrap_or_default();
    if !path.starts_with('/') {
        return Err(invalid());
    }
    let decoded = urlencoding::decode(path).map_err(|_| invalid())?;

    let mut resolved = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(invalid()),
            // `#` would alias the gzip cache key suffix
            s if s.contains(['\\', '\0', '?', '#']) => return Err(invalid()),
            s => resolved.push(s),
        }
    }
    if decoded.ends_with('/') {
        resolved.push(index_file);
    }
    Ok(resolved)
}

/// Cache key for a resolved file and encoding
pub fn cache_key(path: &Path, gzip: bool) -> String {
    let mut key = path.to_string_lossy().into_owned();
    if gzip {
        key.push_str(GZIP_KEY_SUFFIX);
    }
    key
}

/// Whether an `Accept-Encoding` value admits gzip
pub fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    accept_encoding.is_some_and(|value| value.contains("gzip"))
}

/// Read a whole file, gzip-compressing it while streaming when `gzip` is set
pub fn load_body<F: FileSystem>(fs: &F, path: &Path, gzip: bool) -> Result<Vec<u8>, ServeError> {
    let not_found = |source| ServeError::NotFound {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = fs.open(path).map_err(not_found)?;

    if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        io::copy(&mut reader, &mut encoder).map_err(not_found)?;
        encoder
            .finish()
            .map_err(|e| ServeError::Internal(format!("gzip {}: {e}", path.display())))
    } else {
        let mut body = Vec::new();
        reader.read_to_end(&mut body).map_err(not_found)?;
        Ok(body)
    }
}
