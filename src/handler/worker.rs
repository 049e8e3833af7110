// Worker module
// Parses request heads per connection, serves files through the shared cache
// and hands the response bytes back to the reactor.

use bytes::Bytes;
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::pool::{Job, PendingSegment};
use super::static_files::{accepts_gzip, cache_key, load_body, resolve_path, FileSystem, ServeError};
use crate::cache::{CacheEntry, ResponseCache};
use crate::config::Config;
use crate::http::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, GZIP, KEEP_ALIVE,
    LAST_MODIFIED,
};
use crate::http::{build_error_head, format_http_date, mime, Request, RequestParser, ResponseBuilder, StatusCode};
use crate::logger;
use crate::server::{ConnectionId, ResponseSink};

/// Per-request settings shared by all workers
#[derive(Debug, Clone)]
pub struct ServeSettings {
    pub root: PathBuf,
    pub index_file: String,
    pub max_head_size: usize,
    pub access_log: bool,
}

impl ServeSettings {
    pub fn from_config(config: &Config) -> Self {
        let root = PathBuf::from(&config.server.root);
        Self {
            root: root.canonicalize().unwrap_or(root),
            index_file: config.http.index_file.clone(),
            max_head_size: config.http.max_head_size,
            access_log: config.logging.access_log,
        }
    }
}

pub struct Worker<S, F> {
    id: usize,
    sink: S,
    cache: Arc<ResponseCache>,
    fs: Arc<F>,
    settings: Arc<ServeSettings>,
    parsers: HashMap<ConnectionId, RequestParser>,
    builder: ResponseBuilder,
}

impl<S: ResponseSink, F: FileSystem> Worker<S, F> {
    pub fn new(id: usize, sink: S, cache: Arc<ResponseCache>, fs: Arc<F>, settings: Arc<ServeSettings>) -> Self {
        Self {
            id,
            sink,
            cache,
            fs,
            settings,
            parsers: HashMap::new(),
            builder: ResponseBuilder::new(),
        }
    }

    /// Process jobs until every sender is dropped
    pub fn run(mut self, jobs: &Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            self.handle_job(job);
        }
        tracing::debug!("worker {} exiting", self.id);
    }

    pub fn handle_job(&mut self, job: Job) {
        match job {
            Job::Segment(PendingSegment { connection, data }) => self.handle_segment(connection, &data),
            Job::Closed(connection) => {
                self.parsers.remove(&connection);
            }
        }
    }

    /// Number of connections with live parse state
    pub fn tracked_connections(&self) -> usize {
        self.parsers.len()
    }

    fn handle_segment(&mut self, connection: ConnectionId, data: &[u8]) {
        let mut parser = self
            .parsers
            .remove(&connection)
            .unwrap_or_else(|| RequestParser::new(self.settings.max_head_size));

        let mut complete = parser.append_segment(data);
        loop {
            match complete {
                Ok(true) => {
                    if let Some(request) = parser.request() {
                        self.respond(connection, request);
                    }
                    // A pipelined request may already be buffered
                    parser.reset();
                    complete = parser.advance();
                }
                Ok(false) => break,
                Err(e) => {
                    logger::log_bad_request(connection, &e);
                    parser.discard();
                    let header = build_error_head(&mut self.builder, StatusCode::BadRequest);
                    self.sink.send(connection, header);
                    break;
                }
            }
        }

        self.parsers.insert(connection, parser);
    }

    fn respond(&mut self, connection: ConnectionId, request: &Request) {
        let served = panic::catch_unwind(AssertUnwindSafe(|| self.serve(request)));
        let entry = match served {
            Ok(Ok(entry)) => entry,
            Ok(Err(err)) => {
                match err.status() {
                    StatusCode::NotFound => logger::log_not_found(request.path(), &err),
                    _ => logger::log_internal_error(request.path(), &err),
                }
                self.error_entry(err.status())
            }
            Err(_) => {
                logger::log_internal_error(request.path(), &"panic while serving request");
                self.error_entry(StatusCode::InternalServerError)
            }
        };

        self.sink.send(connection, entry.header);
        if request.method().sends_body() && !entry.body.is_empty() {
            self.sink.send(connection, entry.body);
        }
    }

    fn serve(&mut self, request: &Request) -> Result<CacheEntry, ServeError> {
        let path = resolve_path(&self.settings.root, request.path(), &self.settings.index_file)?;
        let content_type = mime::content_type_for(&path);
        let gzip = mime::is_compressible(content_type) && accepts_gzip(request.header(ACCEPT_ENCODING));
        let key = cache_key(&path, gzip);

        if let Some(entry) = self.cache.get(&key) {
            logger::log_cache_hit(&key);
            return Ok(entry);
        }
        logger::log_cache_miss(&key);

        match self.build(&path, content_type, gzip) {
            Ok(entry) => {
                if self.settings.access_log {
                    logger::log_request(request.method().as_str(), request.path(), &path, content_type);
                }
                self.cache.put(&key, entry.header.clone(), entry.body.clone());
                Ok(entry)
            }
            Err(err @ ServeError::NotFound { .. }) => {
                logger::log_not_found(request.path(), &err);
                let entry = self.error_entry(StatusCode::NotFound);
                self.cache.put(&key, entry.header.clone(), entry.body.clone());
                Ok(entry)
            }
            Err(err) => Err(err),
        }
    }

    fn build(&mut self, path: &Path, content_type: &'static str, gzip: bool) -> Result<CacheEntry, ServeError> {
        let body = load_body(&*self.fs, path, gzip)?;
        let modified = self.fs.modified(path).map_err(|source| ServeError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

        self.builder.clear();
        self.builder
            .add_header(CONNECTION, KEEP_ALIVE)
            .add_header(CONTENT_TYPE, content_type)
            .add_header(CONTENT_LENGTH, body.len());
        if gzip {
            self.builder.add_header(CONTENT_ENCODING, GZIP);
        }
        self.builder.add_header(LAST_MODIFIED, format_http_date(modified));

        Ok(CacheEntry {
            header: self.builder.serialize(),
            body: Bytes::from(body),
        })
    }

    fn error_entry(&mut self, status: StatusCode) -> CacheEntry {
        CacheEntry {
            header: build_error_head(&mut self.builder, status),
            body: Bytes::new(),
        }
    }
}
