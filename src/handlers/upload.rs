use std::path::PathBuf;

use axum::{
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;

use crate::{
    error::{AppError, Result},
    models::upload::UploadResponse,
    services::uploads::UploadName,
    state::AppState,
};

/// The multipart part that must carry the video.
pub const UPLOAD_FIELD: &str = "multimedia-upload";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Multipart(e.body_text())
    }
}

/// Handles `POST /upload`.
///
/// The body must hold exactly one part, `multimedia-upload`, with an `.mp4`
/// filename. The response is only sent once both the file and its index
/// record are committed.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response> {
    let _permit = state.upload_limiter.acquire().await?;

    let field = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
        .ok_or_else(|| AppError::Multipart("Missing file part".to_string()))?;

    if field.name() != Some(UPLOAD_FIELD) {
        return Err(AppError::Multipart(format!(
            "Expected a single '{}' file part",
            UPLOAD_FIELD
        )));
    }

    let filename = field
        .file_name()
        .ok_or_else(|| AppError::Multipart("File part has no file name".to_string()))?
        .to_string();
    let name = UploadName::parse(&filename)?;

    tracing::info!("📤 Upload started: {}", filename);

    let staged = state.uploads.stage(field.map_err(multipart_error)).await?;

    match multipart.next_field().await {
        Ok(None) => {}
        Ok(Some(_)) => {
            staged.discard().await;
            return Err(AppError::Multipart(format!(
                "Expected a single '{}' file part",
                UPLOAD_FIELD
            )));
        }
        Err(e) => {
            staged.discard().await;
            return Err(multipart_error(e));
        }
    }

    let record = state.uploads.commit(&name, staged).await?;

    let thumbnails = state.thumbnails.clone();
    let relative = PathBuf::from(&record.stored_filename);
    tokio::spawn(async move {
        thumbnails.ensure(&relative).await;
    });

    let response = sonic_rs::to_string(&UploadResponse {
        message: "File uploaded successfully".to_string(),
        filename: record.stored_filename,
    })
    .map_err(|e| AppError::Internal(format!("Response serialization failed: {}", e)))?;

    Ok((StatusCode::OK, response).into_response())
}
