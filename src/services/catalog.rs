use std::path::{Component, Path, PathBuf};

use futures::stream::{self, StreamExt};
use rand::Rng;
use rand::seq::SliceRandom;
use walkdir::WalkDir;

use crate::error::{AppError, Result};
use crate::models::media::MediaItem;
use crate::services::thumbnails::ThumbnailCache;

/// Extensions listed in the gallery (compared case-insensitively).
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "mov", "webm", "avi"];

/// How many thumbnails a single catalog build checks at once.
const THUMBNAIL_CONCURRENCY: usize = 8;

/// Returns `true` if `path` has one of the listed video extensions.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Walks `root` and returns every video file's path relative to it.
///
/// Nothing is written. A missing root yields an empty list; unreadable
/// entries are skipped with a warning.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("⚠️ Skipping unreadable media entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_video_file(entry.path()))
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}

/// Uniformly shuffles `items` and keeps at most `limit` of them.
pub fn shuffle_and_limit<T, R: Rng + ?Sized>(mut items: Vec<T>, limit: usize, rng: &mut R) -> Vec<T> {
    if items.len() > 1 {
        items.shuffle(rng);
    }
    items.truncate(limit);
    items
}

/// `/`-separated form of a relative path, as used in `/static/` URLs.
pub fn to_url_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds one randomized gallery listing.
///
/// # Arguments
///
/// * `media_root` - The directory to scan.
/// * `thumbnails` - Cache used to make sure every listed video has a still.
/// * `limit` - The maximum number of items returned.
///
/// # Returns
///
/// A `Result` containing the shuffled, bounded list of `MediaItem`s.
pub async fn build_catalog(
    media_root: &Path,
    thumbnails: &ThumbnailCache,
    limit: usize,
) -> Result<Vec<MediaItem>> {
    let root = media_root.to_path_buf();
    let discovered = tokio::task::spawn_blocking(move || discover(&root))
        .await
        .map_err(|e| AppError::Internal(format!("media scan task failed: {}", e)))?;

    tracing::debug!("📂 Discovered {} video(s) under {}", discovered.len(), media_root.display());

    let items: Vec<MediaItem> = stream::iter(discovered)
        .map(|relative| async move {
            thumbnails.ensure(&relative).await;
            MediaItem {
                relative_path: to_url_path(&relative),
            }
        })
        .buffer_unordered(THUMBNAIL_CONCURRENCY)
        .collect()
        .await;

    Ok(shuffle_and_limit(items, limit, &mut rand::thread_rng()))
}

/// Substitutes the comma-joined catalog into every `{{VIDEO_LIST}}` of `template`.
pub fn render_gallery(template: &str, items: &[MediaItem]) -> String {
    let list = items
        .iter()
        .map(|item| item.relative_path.as_str())
        .collect::<Vec<_>>()
        .join(",");
    template.replace("{{VIDEO_LIST}}", &list)
}
