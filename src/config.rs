use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8087";
/// Default ceiling for a single upload (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;
/// Default session lifetime; also used as the cookie max-age.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
/// Default period of the session reaper.
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 10 * 60;
/// Default number of items shown per gallery render.
pub const DEFAULT_CATALOG_LIMIT: usize = 1000;

/// The application's configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// The URL of the PostgreSQL database holding the uniqueness index.
    pub database_url: String,
    /// The maximum number of pooled database connections.
    pub database_pool_size: usize,
    /// Root directory of the uploaded videos, served under `/static`.
    pub media_root: PathBuf,
    /// Directory holding one generated thumbnail per video.
    pub thumbnail_dir: PathBuf,
    /// Directory served under `/styles`.
    pub styles_dir: PathBuf,
    /// The gallery page template.
    pub template_path: PathBuf,
    /// Scratch directory for uploads that are still being hashed.
    pub staging_dir: PathBuf,
    /// The largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// The number of uploads processed at the same time.
    pub max_concurrent_uploads: usize,
    /// Idle time after which a session is no longer valid.
    pub session_ttl: Duration,
    /// Period of the background session reaper.
    pub reap_interval: Duration,
    /// The maximum number of items in one catalog listing.
    pub catalog_limit: usize,
    /// The external thumbnailing command.
    pub thumbnail_tool: String,
    /// Deadline for a single thumbnail tool run.
    pub thumbnail_timeout: Duration,
    /// The number of thumbnail tool runs allowed at once.
    pub thumbnail_workers: usize,
    /// Whether the session cookie carries the `Secure` attribute.
    pub secure_cookies: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary key lookup.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value for a key, if set.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let media_root = PathBuf::from(lookup("MEDIA_ROOT").unwrap_or_else(|| "./static".into()));
        let thumbnail_dir = lookup("THUMBNAIL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| media_root.join("thumbnails"));

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("Invalid BIND_ADDR")?;

        let is_production = lookup("APP_ENV").as_deref() == Some("production");

        Ok(Self {
            bind_addr,
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_pool_size: parse_or(&lookup, "DATABASE_POOL_SIZE", 16)?,
            media_root,
            thumbnail_dir,
            styles_dir: PathBuf::from(lookup("STYLES_DIR").unwrap_or_else(|| "./styles".into())),
            template_path: PathBuf::from(
                lookup("TEMPLATE_PATH").unwrap_or_else(|| "./templates/index.html".into()),
            ),
            staging_dir: PathBuf::from(
                lookup("STAGING_DIR").unwrap_or_else(|| "./data/staging".into()),
            ),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            max_concurrent_uploads: parse_or(&lookup, "MAX_CONCURRENT_UPLOADS", 8)?,
            session_ttl: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?),
            reap_interval: Duration::from_secs(parse_or(
                &lookup,
                "SESSION_REAP_INTERVAL_SECS",
                DEFAULT_REAP_INTERVAL_SECS,
            )?),
            catalog_limit: parse_or(&lookup, "CATALOG_LIMIT", DEFAULT_CATALOG_LIMIT)?,
            thumbnail_tool: lookup("THUMBNAIL_TOOL").unwrap_or_else(|| "ffmpeg".into()),
            thumbnail_timeout: Duration::from_secs(parse_or(
                &lookup,
                "THUMBNAIL_TIMEOUT_SECS",
                30,
            )?),
            thumbnail_workers: parse_or(&lookup, "THUMBNAIL_WORKERS", 4)?,
            secure_cookies: is_production,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
