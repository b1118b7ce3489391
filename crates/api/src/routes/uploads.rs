//! Upload and download routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderValue},
    },
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;
use dropzone_core::upload::{
    Disposition, DownloadTarget, IncomingFile, MAX_FILES_PER_BATCH, SubmitUploadInput,
    UploadService,
};
use dropzone_db::repositories::UploadRepository;
use dropzone_shared::AppError;

/// Body ceiling for one multipart submission: a full batch of maximum-size
/// files plus multipart framing overhead.
const MAX_UPLOAD_BODY_BYTES: usize = (MAX_FILES_PER_BATCH + 2) * 50 * 1024 * 1024;

/// Creates the upload and download routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/zones/{id}/upload",
            post(upload_files).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
        )
        .route(
            "/zones/{zone_id}/files/{file_id}/download",
            get(download_file),
        )
}

/// Builds an upload service bound to the request's state.
fn upload_service(state: &AppState) -> UploadService<UploadRepository> {
    let repo = UploadRepository::new((*state.db).clone());
    UploadService::new(state.storage.clone(), Arc::new(repo), state.hub.clone())
}

/// Query parameters for downloading a file.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// `inline` for preview; anything else forces a download.
    pub mode: Option<String>,
}

/// POST `/zones/{id}/upload` - submit a batch of files.
///
/// Multipart fields: `username`, optional `message`, and one or more
/// `files` parts carrying the file content.
async fn upload_files(
    State(state): State<AppState>,
    Path(zone_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut username = String::new();
    let mut message = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(AppError::Validation(e.to_string())))?
    {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };
        match name.as_str() {
            "username" => {
                username = field
                    .text()
                    .await
                    .map_err(|e| ApiError(AppError::Validation(e.to_string())))?;
            }
            "message" => {
                message = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError(AppError::Validation(e.to_string())))?,
                );
            }
            "files" => {
                let original_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or("unnamed")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError(AppError::Validation(e.to_string())))?;
                files.push(IncomingFile {
                    original_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let service = upload_service(&state);
    let batch = service
        .submit_upload(SubmitUploadInput {
            zone_id,
            uploader_username: username,
            message,
            files,
        })
        .await?;

    info!(
        zone_id = %zone_id,
        batch_id = %batch.id,
        files = batch.files.len(),
        "Upload batch created"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Files uploaded successfully",
            "batch": batch,
        })),
    ))
}

/// GET `/zones/{zone_id}/files/{file_id}/download` - download or preview a
/// file.
///
/// Redirects to a provider-signed URL where the storage gateway supports
/// presigning; otherwise streams the blob with the original filename and
/// content type.
async fn download_file(
    State(state): State<AppState>,
    Path((zone_id, file_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let inline = query.mode.as_deref() == Some("inline");

    let service = upload_service(&state);
    let descriptor = service
        .download_descriptor(zone_id, file_id, inline)
        .await?;

    match descriptor.target {
        DownloadTarget::Redirect { url } => Ok(Redirect::temporary(&url).into_response()),
        DownloadTarget::Stream { storage_key } => {
            let bytes = state.storage.read(&storage_key).await?;

            let content_type = HeaderValue::from_str(&descriptor.file.mime_type)
                .unwrap_or(HeaderValue::from_static("application/octet-stream"));
            let disposition = HeaderValue::from_str(&content_disposition(
                descriptor.disposition,
                &descriptor.file.original_name,
            ))
            .unwrap_or(HeaderValue::from_static("attachment"));

            let mut response = bytes.into_response();
            response.headers_mut().insert(CONTENT_TYPE, content_type);
            response
                .headers_mut()
                .insert(CONTENT_DISPOSITION, disposition);
            Ok(response)
        }
    }
}

/// Content-Disposition header value for a streamed file.
fn content_disposition(disposition: Disposition, filename: &str) -> String {
    let safe_name: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    match disposition {
        Disposition::Inline => "inline".to_string(),
        Disposition::Attachment => format!("attachment; filename=\"{safe_name}\""),
    }
}
