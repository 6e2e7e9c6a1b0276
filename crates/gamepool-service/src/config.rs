//! Service configuration.

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use gamepool_core::DEFAULT_MAX_FRAME_BYTES;

/// Tunables of the caching engine (insert buffer, cursors, cooldown queue).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Buffered inserts per game that trigger an immediate flush.
    pub insert_count: usize,

    /// Page size used when replenishing a cursor window.
    pub query_count: usize,

    /// Interval of the periodic insert-buffer flush, in seconds.
    pub flush_interval_seconds: u64,

    /// Cursor positions are persisted whenever they cross a multiple of this.
    pub counter_persist_every: i64,

    /// Workers applying cooldown timestamp updates.
    pub cooldown_workers: usize,

    /// Capacity of the cooldown update queue.
    pub cooldown_queue_size: usize,
}

impl CacheConfig {
    /// Flush interval as a [`Duration`].
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            insert_count: 100,
            query_count: 500,
            flush_interval_seconds: 300,
            counter_persist_every: 200,
            cooldown_workers: 4,
            cooldown_queue_size: 10_000,
        }
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address of the binary protocol listener (default: "0.0.0.0:9000").
    pub tcp_addr: String,

    /// Address of the HTTP listener (default: "0.0.0.0:8080").
    pub http_addr: String,

    /// PostgreSQL connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    pub db_max_connections: u32,

    /// Workers in the request pool.
    pub worker_count: usize,

    /// Capacity of each request queue (high and normal).
    pub worker_queue_size: usize,

    /// Largest accepted frame, header included.
    pub max_frame_bytes: usize,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Engine tunables.
    pub cache: CacheConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tcp_addr: "0.0.0.0:9000".into(),
            http_addr: "0.0.0.0:8080".into(),
            database_url: None,
            db_max_connections: 20,
            worker_count: 100,
            worker_queue_size: 10_000,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            cache: CacheConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the optional config file and the environment.
    ///
    /// The JSON file named by `GAMEPOOL_CONFIG` provides the base values;
    /// environment variables override individual settings.
    #[must_use]
    pub fn from_env() -> Self {
        let base = match std::env::var("GAMEPOOL_CONFIG") {
            Ok(path) => match load_config_file::<Self>(&path) {
                Ok(config) => {
                    tracing::info!(path = %path, "Loaded config file");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Ignoring unreadable config file");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        base.with_env_overrides()
    }

    /// Apply environment variable overrides on top of `self`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let cache = self.cache;
        Self {
            tcp_addr: std::env::var("TCP_ADDR").unwrap_or(self.tcp_addr),
            http_addr: std::env::var("HTTP_ADDR").unwrap_or(self.http_addr),
            database_url: std::env::var("DATABASE_URL").ok().or(self.database_url),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", self.db_max_connections),
            worker_count: env_or("WORKER_COUNT", self.worker_count),
            worker_queue_size: env_or("WORKER_QUEUE_SIZE", self.worker_queue_size),
            max_frame_bytes: env_or("MAX_FRAME_BYTES", self.max_frame_bytes),
            cors_origins: std::env::var("CORS_ORIGINS").map_or(self.cors_origins, |s| {
                s.split(',').map(|s| s.trim().to_string()).collect()
            }),
            max_body_bytes: env_or("MAX_BODY_BYTES", self.max_body_bytes),
            request_timeout_seconds: env_or(
                "REQUEST_TIMEOUT_SECONDS",
                self.request_timeout_seconds,
            ),
            cache: CacheConfig {
                insert_count: env_or("INSERT_COUNT", cache.insert_count),
                query_count: env_or("QUERY_COUNT", cache.query_count),
                flush_interval_seconds: env_or(
                    "FLUSH_INTERVAL_SECONDS",
                    cache.flush_interval_seconds,
                ),
                counter_persist_every: env_or(
                    "COUNTER_PERSIST_EVERY",
                    cache.counter_persist_every,
                ),
                cooldown_workers: env_or("COOLDOWN_WORKERS", cache.cooldown_workers),
                cooldown_queue_size: env_or("COOLDOWN_QUEUE_SIZE", cache.cooldown_queue_size),
            },
        }
    }
}

/// Parse an environment variable, keeping `default` when unset or invalid.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Load configuration from a JSON file.
fn load_config_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Config file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
