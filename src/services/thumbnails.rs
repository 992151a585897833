use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::config::Config;

/// Offset into the video the still is taken from.
const EXTRACTION_POINT: &str = "00:00:05";
/// Extension of generated thumbnails.
const THUMBNAIL_EXT: &str = "jpg";

/// What `ThumbnailCache::ensure` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// The thumbnail was already on disk.
    Cached(PathBuf),
    /// The tool produced a new thumbnail.
    Generated(PathBuf),
    /// Another task is generating this thumbnail right now.
    InProgress,
    /// The tool failed or timed out; nothing was written.
    Failed,
}

/// Lazily generated, never evicted, one-still-per-video cache.
pub struct ThumbnailCache {
    media_root: PathBuf,
    dir: PathBuf,
    tool: String,
    timeout: Duration,
    workers: Semaphore,
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl ThumbnailCache {
    /// Creates a cache rooted at `config.thumbnail_dir`.
    pub fn new(config: &Config) -> Self {
        Self {
            media_root: config.media_root.clone(),
            dir: config.thumbnail_dir.clone(),
            tool: config.thumbnail_tool.clone(),
            timeout: config.thumbnail_timeout,
            workers: Semaphore::new(config.thumbnail_workers.max(1)),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The cache path for a video: its file name plus `.jpg`.
    pub fn thumbnail_path(&self, video_relative_path: &Path) -> PathBuf {
        let mut name = video_relative_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(THUMBNAIL_EXT);
        self.dir.join(name)
    }

    /// Makes sure a thumbnail exists for `video_relative_path`.
    ///
    /// Failures are logged and reported as `ThumbnailOutcome::Failed`; the
    /// next call retries.
    pub async fn ensure(&self, video_relative_path: &Path) -> ThumbnailOutcome {
        let target = self.thumbnail_path(video_relative_path);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return ThumbnailOutcome::Cached(target);
        }

        let Some(_claim) = InFlight::claim(&self.in_flight, &target) else {
            tracing::debug!("Thumbnail for {} already in progress", video_relative_path.display());
            return ThumbnailOutcome::InProgress;
        };

        self.generate(video_relative_path, &target).await
    }

    async fn generate(&self, video_relative_path: &Path, target: &Path) -> ThumbnailOutcome {
        let Ok(_permit) = self.workers.acquire().await else {
            return ThumbnailOutcome::Failed;
        };

        // Another task may have finished it while we waited for a worker.
        if tokio::fs::try_exists(target).await.unwrap_or(false) {
            return ThumbnailOutcome::Cached(target.to_path_buf());
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::error!(
                "❌ Cannot create thumbnail directory {}: {}",
                self.dir.display(),
                e
            );
            return ThumbnailOutcome::Failed;
        }

        let source = self.media_root.join(video_relative_path);
        let partial = partial_path(target);

        let run = Command::new(&self.tool)
            .arg("-y")
            .args(["-loglevel", "error"])
            .args(["-ss", EXTRACTION_POINT])
            .arg("-i")
            .arg(&source)
            .args(["-frames:v", "1"])
            .args(["-q:v", "2"])
            .args(["-f", "image2", "-update", "1"])
            .arg(&partial)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let failure = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => {
                match tokio::fs::rename(&partial, target).await {
                    Ok(()) => {
                        tracing::info!("🖼️ Generated thumbnail {}", target.display());
                        return ThumbnailOutcome::Generated(target.to_path_buf());
                    }
                    Err(e) => format!("tool reported success but output is unusable: {}", e),
                }
            }
            Ok(Ok(output)) => format!(
                "{} exited with {}: {}",
                self.tool,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Ok(Err(e)) => format!("failed to run {}: {}", self.tool, e),
            Err(_) => format!("{} timed out after {:?}", self.tool, self.timeout),
        };

        let _ = tokio::fs::remove_file(&partial).await;
        tracing::warn!(
            "⚠️ Thumbnail generation failed for {}: {}",
            source.display(),
            failure
        );
        ThumbnailOutcome::Failed
    }
}

/// Marks a thumbnail as being generated until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<PathBuf>>,
    target: PathBuf,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a Mutex<HashSet<PathBuf>>, target: &Path) -> Option<Self> {
        if !set.lock().insert(target.to_path_buf()) {
            return None;
        }
        Some(Self {
            set,
            target: target.to_path_buf(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.target);
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
