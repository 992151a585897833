use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the uniqueness index: one stored file per content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessRecord {
    /// Hex-encoded SHA-256 of the full file bytes.
    pub content_hash: String,
    /// The name the file was persisted under inside the media root.
    pub stored_filename: String,
    /// When the record was created.
    pub upload_date: DateTime<Utc>,
}

/// The response payload for an accepted upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}
