// Configuration module entry point
// Loads server configuration from file, environment, and command line

mod types;

use std::net::SocketAddr;
use std::num::NonZeroUsize;

pub use types::{CacheConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

use crate::error::ServerError;

/// Environment variable naming the config file (without extension)
pub const CONFIG_PATH_ENV: &str = "RHTTPD_CONFIG";

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
{
    config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.root", ".")?
        .set_default("server.backlog", 1024)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("cache.max_bytes", 64 * 1024 * 1024)? // 64MB
        .set_default("http.index_file", "index.html")?
        .set_default("http.max_head_size", 64 * 1024)
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// A missing file is fine; defaults and `SERVER_*` env vars still apply
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = builder_with_defaults()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("SERVER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Load using `RHTTPD_CONFIG` or the default "config" file
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Parse a TOML document on top of the defaults (no env, no files)
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        builder_with_defaults()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Defaults only
    pub fn defaults() -> Result<Self, config::ConfigError> {
        builder_with_defaults()?.build()?.try_deserialize()
    }

    /// Apply positional overrides: `[port] [root]`
    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref root) = args.root {
            self.server.root.clone_from(root);
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ServerError::InvalidAddress(format!("{}:{}: {e}", self.server.host, self.server.port)))
    }

    /// Configured worker count, falling back to available parallelism
    pub fn worker_count(&self) -> usize {
        match self.server.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

/// Command line arguments: `[--config <path>] [port] [root]`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<String>,
    pub port: Option<u16>,
    pub root: Option<String>,
}

impl CliArgs {
    pub fn parse<I>(args: I) -> Result<Self, ServerError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut positional = Vec::new();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            if arg == "--config" || arg == "-c" {
                let path = iter.next().ok_or_else(|| {
                    ServerError::Config(config::ConfigError::Message(format!("{arg} requires a path")))
                })?;
                parsed.config_path = Some(path);
            } else {
                positional.push(arg);
            }
        }

        let mut positional = positional.into_iter();
        if let Some(port) = positional.next() {
            let port = port.parse::<u16>().map_err(|e| {
                ServerError::Config(config::ConfigError::Message(format!("invalid port {port:?}: {e}")))
            })?;
            parsed.port = Some(port);
        }
        parsed.root = positional.next();

        Ok(parsed)
    }
}
