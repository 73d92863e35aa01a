use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use axum_extra::extract::WithRejection;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::services::{upload_images, UploadEvent, UploadItem, MAX_FILES, MAX_FILE_BYTES};
use crate::{
    auth::{services::require_account, AuthUser},
    error::{AppError, AppResult},
    state::AppState,
};

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(MAX_FILES * MAX_FILE_BYTES + 64 * 1024))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub urls: Vec<String>,
}

/// POST /upload, multipart with one or more `images` fields.
#[instrument(skip(state, mp))]
pub async fn upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    WithRejection(mut mp, _): WithRejection<Multipart, AppError>,
) -> AppResult<Json<UploadResponse>> {
    require_account(state.users.as_ref(), user_id).await?;

    let mut items = Vec::new();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if !matches!(field.name(), Some("images") | Some("images[]") | Some("image")) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation(format!("{file_name} is not an image")));
        }
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {file_name}: {e}")))?;
        if body.len() > MAX_FILE_BYTES {
            return Err(AppError::Validation(
                "Image size should be less than 2MB".into(),
            ));
        }
        items.push(UploadItem {
            file_name,
            body,
            content_type,
        });
        if items.len() > MAX_FILES {
            return Err(AppError::Validation(format!(
                "You can upload a maximum of {MAX_FILES} images"
            )));
        }
    }
    if items.is_empty() {
        return Err(AppError::Validation("images is required".into()));
    }

    let mut task = upload_images(state.storage.clone(), user_id, items);
    while let Some(event) = task.next().await {
        match event {
            UploadEvent::Progress(pct) => debug!(%user_id, progress = pct, "upload progress"),
            UploadEvent::Completed(urls) => {
                info!(%user_id, count = urls.len(), "images uploaded");
                return Ok(Json(UploadResponse {
                    success: true,
                    urls,
                }));
            }
            UploadEvent::Failed(msg) => {
                return Err(AppError::Persistence(anyhow::anyhow!(msg)));
            }
        }
    }
    Err(AppError::Persistence(anyhow::anyhow!("upload ended without result")))
}
