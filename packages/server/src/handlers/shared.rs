//! Pieces shared by the dashboard and public storage handlers.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::{StatusCode, header};
use axum::response::Response;
use common::storage::{ObjectKey, ObjectStore};
use sea_orm::*;
use tokio_util::io::ReaderStream;
use tracing::warn;
use uuid::Uuid;

use crate::entity::stored_file;
use crate::error::AppError;
use crate::files::NewUpload;
use crate::models::shared::{PageQuery, Pagination};
use crate::models::storage::{FileListResponse, FileResponse};
use crate::state::AppState;
use crate::usage::TransferStats;
use crate::utils::filename::content_disposition_value;

/// Body limit for upload routes, from `storage.max_upload_bytes`.
pub fn upload_body_limit(state: &AppState) -> DefaultBodyLimit {
    DefaultBodyLimit::max(state.config.storage.max_upload_bytes as usize)
}

/// Parsed multipart upload form.
///
/// Fields: `file` (required), `filename` (optional rename), `is_public`
/// (`true`/`1`), `upload_session` (optional correlation id).
pub struct UploadForm {
    pub data: Vec<u8>,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub custom_filename: Option<String>,
    pub is_public: bool,
    pub upload_session: Option<String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut file: Option<(Vec<u8>, String, Option<String>)> = None;
        let mut custom_filename = None;
        let mut is_public = false;
        let mut upload_session = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        {
            match field.name() {
                Some("file") => {
                    if file.is_some() {
                        return Err(AppError::Validation(
                            "Only one 'file' field is allowed per request".into(),
                        ));
                    }
                    let name = field
                        .file_name()
                        .map(str::to_string)
                        .ok_or_else(|| {
                            AppError::Validation("File field must have a filename".into())
                        })?;
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                    file = Some((bytes.to_vec(), name, content_type));
                }
                Some("filename") => {
                    let text = field_text(field).await?;
                    custom_filename = Some(text).filter(|t| !t.trim().is_empty());
                }
                Some("is_public") => {
                    let text = field_text(field).await?;
                    is_public = matches!(text.trim(), "true" | "1" | "on" | "yes");
                }
                Some("upload_session") => {
                    let text = field_text(field).await?;
                    upload_session = Some(text).filter(|t| !t.trim().is_empty());
                }
                _ => {} // Ignore unknown fields.
            }
        }

        let (data, original_filename, content_type) =
            file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

        Ok(Self {
            data,
            original_filename,
            content_type,
            custom_filename,
            is_public,
            upload_session,
        })
    }

    pub fn into_upload(
        self,
        owner_id: i32,
        container_id: Uuid,
        max_file_size: Option<i64>,
    ) -> NewUpload {
        NewUpload {
            owner_id,
            container_id,
            original_filename: self.original_filename,
            custom_filename: self.custom_filename,
            content_type: self.content_type,
            is_public: self.is_public,
            upload_session: self.upload_session,
            max_file_size,
            data: self.data,
        }
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))
}

/// Time-limited URL for a stored file.
pub async fn file_url(state: &AppState, file: &stored_file::Model) -> Result<String, AppError> {
    presign(state.object_store.as_ref(), presign_ttl(state), &file.storage_key).await
}

/// URL for a file that was just committed. A presign failure must not turn a
/// stored upload into an error, so it is logged and reported as `None`.
pub async fn upload_url(
    store: &dyn ObjectStore,
    ttl: Duration,
    file: &stored_file::Model,
) -> Option<String> {
    presign_or_log(store, ttl, file.id, &file.storage_key).await
}

async fn presign_or_log(
    store: &dyn ObjectStore,
    ttl: Duration,
    file_id: Uuid,
    storage_key: &str,
) -> Option<String> {
    match presign(store, ttl, storage_key).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(file_id = %file_id, error = ?e, "Failed to presign uploaded file");
            None
        }
    }
}

pub fn presign_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.config.storage.presign_ttl_secs)
}

async fn presign(
    store: &dyn ObjectStore,
    ttl: Duration,
    storage_key: &str,
) -> Result<String, AppError> {
    let key = ObjectKey::parse(storage_key)?;
    Ok(store.presigned_url(&key, ttl).await?)
}

/// One page of a container's active files, newest first.
pub async fn list_files<C: ConnectionTrait>(
    db: &C,
    container_id: Uuid,
    query: &PageQuery,
) -> Result<FileListResponse, AppError> {
    let (page, per_page) = query.resolve();

    let base = stored_file::Entity::find()
        .filter(stored_file::Column::ContainerId.eq(container_id))
        .filter(stored_file::Column::IsActive.eq(true));

    let total = base.clone().count(db).await?;
    let files = base
        .order_by_desc(stored_file::Column::CreatedAt)
        .offset((page - 1) * per_page)
        .limit(per_page)
        .all(db)
        .await?;

    Ok(FileListResponse {
        success: true,
        data: files.into_iter().map(FileResponse::from).collect(),
        pagination: Pagination::new(page, per_page, total),
    })
}

/// Stream a stored file back to the client.
pub async fn download_response(
    store: &dyn ObjectStore,
    file: &stored_file::Model,
) -> Result<Response, AppError> {
    let key = ObjectKey::parse(&file.storage_key)?;
    let reader = store.get_stream(&key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &file.mime_type)
        .header(header::CONTENT_LENGTH, file.size)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&file.filename, "attachment"),
        );
    if let Some(checksum) = &file.checksum {
        builder = builder.header(header::ETAG, format!("\"{checksum}\""));
    }

    let mut response = builder
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;
    response
        .extensions_mut()
        .insert(TransferStats::download(file.size));
    Ok(response)
}
