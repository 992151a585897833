/// A video discovered under the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Path relative to the media root, `/`-separated.
    pub relative_path: String,
}
