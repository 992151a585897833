use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use chrono::{DateTime, Local, Utc};
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::upload::UniquenessRecord,
    repositories::uniqueness::UniquenessIndex,
};

/// The only extension accepted for uploads.
pub const UPLOAD_EXTENSION: &str = ".mp4";

/// Timestamp layout inserted between the base name and the extension.
const STORED_NAME_TIMESTAMP: &str = "%Y_%m_%d_%H_%M_%S";

/// The client-supplied filename, split into a safe base and its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadName {
    pub base: String,
    pub ext: String,
}

impl UploadName {
    /// Parses a client filename, keeping only its final path component.
    ///
    /// # Arguments
    ///
    /// * `filename` - The filename from the multipart part.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `UploadName`, or `AppError::Validation` if
    /// the extension is not `.mp4` or no usable base name remains.
    pub fn parse(filename: &str) -> Result<Self> {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();

        let (base, ext) = match name.rfind('.') {
            Some(dot) => name.split_at(dot),
            None => (name, ""),
        };

        if !ext.eq_ignore_ascii_case(UPLOAD_EXTENSION) {
            return Err(AppError::Validation("Only MP4 files are allowed".to_string()));
        }

        if base.is_empty() || base.chars().all(|c| c == '.') || base.chars().any(char::is_control) {
            return Err(AppError::Validation("Invalid file name".to_string()));
        }

        Ok(Self {
            base: base.to_string(),
            ext: ext.to_string(),
        })
    }

    /// `<base>_<YYYY_MM_DD_HH_MM_SS><ext>`, with `_<attempt>` before the
    /// extension once the plain name is taken.
    pub fn stored_filename(&self, at: DateTime<Local>, attempt: u32) -> String {
        let stamp = at.format(STORED_NAME_TIMESTAMP);
        if attempt == 0 {
            format!("{}_{}{}", self.base, stamp, self.ext)
        } else {
            format!("{}_{}_{}{}", self.base, stamp, attempt, self.ext)
        }
    }
}

/// An upload fully written to the staging area and hashed.
///
/// `UploadPipeline::commit` removes the staging file; a value dropped without
/// being committed or discarded removes it on drop.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    content_hash: String,
    size: u64,
}

impl StagedUpload {
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the staging file.
    pub async fn discard(mut self) {
        let path = std::mem::take(&mut self.path);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("⚠️ Could not remove staging file {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for StagedUpload {
    // Only reached with a path still set when the upload future is cancelled.
    fn drop(&mut self) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("⚠️ Could not remove staging file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Hash-then-check-then-commit ingestion of uploaded videos.
pub struct UploadPipeline {
    index: Arc<dyn UniquenessIndex>,
    media_root: PathBuf,
    staging_dir: PathBuf,
    max_upload_bytes: u64,
}

impl UploadPipeline {
    /// Creates a pipeline writing into `config.media_root`.
    pub fn new(config: &Config, index: Arc<dyn UniquenessIndex>) -> Self {
        Self {
            index,
            media_root: config.media_root.clone(),
            staging_dir: config.staging_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Streams `body` into a staging file while hashing it.
    ///
    /// The whole stream is consumed before this returns; stopping early only
    /// happens when the byte ceiling is crossed.
    ///
    /// # Arguments
    ///
    /// * `body` - The file part's byte chunks.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `StagedUpload`.
    pub async fn stage<S>(&self, body: S) -> Result<StagedUpload>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        fs::create_dir_all(&self.staging_dir).await?;

        let staged_path = self.staging_dir.join(format!("{}.part", Uuid::new_v4()));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staged_path)
            .await?;

        let mut staged = StagedUpload {
            path: staged_path,
            content_hash: String::new(),
            size: 0,
        };

        let written = async {
            let mut writer = BufWriter::new(file);
            let mut hasher = Sha256::new();
            let mut body = std::pin::pin!(body);
            let mut size = 0u64;

            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                size += chunk.len() as u64;
                if size > self.max_upload_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "File exceeds the maximum size of {} bytes",
                        self.max_upload_bytes
                    )));
                }
                hasher.update(&chunk);
                writer.write_all(&chunk).await?;
            }

            writer.flush().await?;
            Ok::<_, AppError>((hex::encode(hasher.finalize()), size))
        }
        .await;

        match written {
            Ok((content_hash, size)) => {
                staged.content_hash = content_hash;
                staged.size = size;
            }
            Err(e) => {
                staged.discard().await;
                return Err(e);
            }
        }

        tracing::debug!(
            "📥 Staged upload {} ({} bytes, sha256 {})",
            staged.path.display(),
            staged.size,
            staged.content_hash
        );

        Ok(staged)
    }

    /// Persists a staged upload unless its content is already stored.
    ///
    /// # Arguments
    ///
    /// * `name` - The parsed client filename.
    /// * `staged` - The hashed upload; its staging file is removed on return.
    ///
    /// # Returns
    ///
    /// A `Result` containing the inserted `UniquenessRecord`. Duplicate
    /// content, whether found up front or by the index at insert time, is
    /// `AppError::Conflict`.
    pub async fn commit(&self, name: &UploadName, staged: StagedUpload) -> Result<UniquenessRecord> {
        let result = self.persist(name, &staged).await;
        staged.discard().await;
        result
    }

    async fn persist(&self, name: &UploadName, staged: &StagedUpload) -> Result<UniquenessRecord> {
        if let Some(existing) = self.index.find(staged.content_hash()).await? {
            tracing::info!(
                "🔁 Duplicate upload of {} rejected, content stored as {}",
                staged.content_hash(),
                existing.stored_filename
            );
            return Err(AppError::Conflict(
                "This file has already been uploaded".to_string(),
            ));
        }

        fs::create_dir_all(&self.media_root).await?;
        let (stored_filename, mut destination) = self.create_destination(name).await?;
        let destination_path = self.media_root.join(&stored_filename);

        let written = async {
            let mut source = File::open(staged.path()).await?;
            tokio::io::copy(&mut source, &mut destination).await?;
            destination.flush().await?;
            destination.sync_all().await?;
            Ok::<_, std::io::Error>(fs::metadata(&destination_path).await?.len())
        }
        .await;

        let written = match written {
            Ok(len) => len,
            Err(e) => {
                remove_quietly(&destination_path).await;
                return Err(AppError::Internal(format!(
                    "Failed to persist {}: {}",
                    destination_path.display(),
                    e
                )));
            }
        };

        if written > self.max_upload_bytes {
            remove_quietly(&destination_path).await;
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_upload_bytes
            )));
        }

        let record = UniquenessRecord {
            content_hash: staged.content_hash().to_string(),
            stored_filename,
            upload_date: Utc::now(),
        };

        match self.index.insert(&record).await {
            Ok(()) => {
                tracing::info!(
                    "✅ Stored {} ({} bytes, sha256 {})",
                    record.stored_filename,
                    written,
                    record.content_hash
                );
                Ok(record)
            }
            Err(AppError::Conflict(_)) => {
                // A concurrent identical upload won the race; this copy stays
                // on disk for offline cleanup.
                tracing::warn!(
                    "⚠️ Lost uniqueness race for {}, leaving orphan {}",
                    record.content_hash,
                    destination_path.display()
                );
                Err(AppError::Conflict(
                    "This file has already been uploaded".to_string(),
                ))
            }
            Err(e) => {
                tracing::error!(
                    "❌ Index insert failed for {}: {}",
                    record.stored_filename,
                    e
                );
                remove_quietly(&destination_path).await;
                Err(e)
            }
        }
    }

    async fn create_destination(&self, name: &UploadName) -> Result<(String, File)> {
        let now = Local::now();
        for attempt in 0..100 {
            let filename = name.stored_filename(now, attempt);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.media_root.join(&filename))
                .await
            {
                Ok(file) => return Ok((filename, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(format!(
            "No free file name for {}{}",
            name.base, name.ext
        )))
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        tracing::warn!("⚠️ Could not remove {}: {}", path.display(), e);
    }
}
