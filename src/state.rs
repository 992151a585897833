use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use crate::config::Config;
use crate::db;
use crate::error::{AppError, Result};
use crate::repositories::uniqueness::{PgUniquenessIndex, UniquenessIndex};
use crate::services::sessions::{SessionService, SessionStore};
use crate::services::thumbnails::ThumbnailCache;
use crate::services::uploads::UploadPipeline;

/// Bounds how many uploads are staged and committed at the same time.
#[derive(Clone)]
pub struct UploadRateLimiter {
    semaphore: Arc<Semaphore>,
}

impl UploadRateLimiter {
    /// Creates a new `UploadRateLimiter`.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Acquires a permit from the semaphore.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|e| AppError::Internal(format!("Upload limiter closed: {}", e)))
    }
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    /// The session store shared with the reaper.
    pub sessions: Arc<dyn SessionService>,
    /// The upload deduplication pipeline.
    pub uploads: Arc<UploadPipeline>,
    /// The thumbnail cache.
    pub thumbnails: Arc<ThumbnailCache>,
    /// The upload rate limiter.
    pub upload_limiter: UploadRateLimiter,
}

impl AppState {
    /// Creates a new `AppState` backed by PostgreSQL.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(&config.database_url, config.database_pool_size)?;
        db::ensure_schema(&pool).await?;
        tracing::info!("✅ PostgreSQL pool initialized (max {} connections)", config.database_pool_size);

        let sessions = Arc::new(SessionStore::new(config.session_ttl));
        Ok(Self::with_parts(
            config,
            sessions,
            Arc::new(PgUniquenessIndex::new(pool)),
        ))
    }

    /// Assembles the state from an existing session service and index.
    pub fn with_parts(
        config: &Config,
        sessions: Arc<dyn SessionService>,
        index: Arc<dyn UniquenessIndex>,
    ) -> Self {
        let upload_limiter = UploadRateLimiter::new(config.max_concurrent_uploads);
        tracing::info!(
            "✅ Upload limiter initialized ({} concurrent uploads)",
            config.max_concurrent_uploads
        );

        AppState {
            config: Arc::new(config.clone()),
            sessions,
            uploads: Arc::new(UploadPipeline::new(config, index)),
            thumbnails: Arc::new(ThumbnailCache::new(config)),
            upload_limiter,
        }
    }
}
