use deadpool_postgres::Pool;
use futures::future::BoxFuture;
use tokio_postgres::error::SqlState;

use crate::error::{AppError, Result};
use crate::models::upload::UniquenessRecord;

/// Durable mapping from content hash to stored filename.
///
/// The store itself enforces that a hash appears at most once; `insert`
/// reports a colliding hash as `AppError::Conflict` so callers can tell a lost
/// race apart from a failure.
pub trait UniquenessIndex: Send + Sync {
    /// Looks up the record for `content_hash`.
    fn find<'a>(&'a self, content_hash: &'a str) -> BoxFuture<'a, Result<Option<UniquenessRecord>>>;

    /// Inserts `record`, failing with `AppError::Conflict` if its hash is taken.
    fn insert<'a>(&'a self, record: &'a UniquenessRecord) -> BoxFuture<'a, Result<()>>;
}

/// PostgreSQL-backed uniqueness index over the `file_hashes` table.
#[derive(Clone)]
pub struct PgUniquenessIndex {
    pool: Pool,
}

impl PgUniquenessIndex {
    /// Creates an index on top of an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

impl UniquenessIndex for PgUniquenessIndex {
    fn find<'a>(&'a self, content_hash: &'a str) -> BoxFuture<'a, Result<Option<UniquenessRecord>>> {
        Box::pin(async move {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    SELECT hash, filename, upload_date
                    FROM file_hashes
                    WHERE hash = $1
                    "#,
                )
                .await?;

            let row = client.query_opt(&stmt, &[&content_hash]).await?;

            Ok(row.map(|row| UniquenessRecord {
                content_hash: row.get("hash"),
                stored_filename: row.get("filename"),
                upload_date: row.get("upload_date"),
            }))
        })
    }

    fn insert<'a>(&'a self, record: &'a UniquenessRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let client = self.pool.get().await?;
            let stmt = client
                .prepare_cached(
                    r#"
                    INSERT INTO file_hashes (hash, filename, upload_date)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .await?;

            match client
                .execute(
                    &stmt,
                    &[
                        &record.content_hash,
                        &record.stored_filename,
                        &record.upload_date,
                    ],
                )
                .await
            {
                Ok(_) => Ok(()),
                Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Err(AppError::Conflict(
                    format!("Content {} is already stored", record.content_hash),
                )),
                Err(e) => Err(AppError::Database(e)),
            }
        })
    }
}
