//! Storage operations scoped to the container the caller authenticated for.
//!
//! Every handler here runs behind `api_auth::middleware::public_api_auth`,
//! which places an [`ApiPrincipal`] in the request extensions.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::api_auth::{ApiPrincipal, Permission};
use crate::entity::public_api_key;
use crate::error::{AppError, ErrorBody};
use crate::files::{FileService, find_active_file};
use crate::models::api_key::{ApiUsageResponse, UsageQuery};
use crate::models::shared::{MessageResponse, PageQuery};
use crate::models::storage::*;
use crate::state::AppState;
use crate::usage::TransferStats;

use super::api_key::usage_report;
use super::shared::{
    UploadForm, download_response, file_url, list_files, presign_ttl, upload_url,
};

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Public API",
    operation_id = "publicUpload",
    summary = "Upload a file",
    description = "Multipart upload into the authenticated container. Requires the `write` \
        permission. Same fields and renaming rules as the dashboard upload.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Missing or invalid credentials (API_KEY_MISSING, API_KEY_INVALID)", body = ErrorBody),
        (status = 403, description = "Bad signature or missing permission (SIGNATURE_INVALID, PERMISSION_DENIED)", body = ErrorBody),
        (status = 429, description = "Rate or storage limit (RATE_LIMITED, QUOTA_EXCEEDED)", body = ErrorBody),
        (status = 500, description = "Object store failure (STORAGE_ERROR)", body = ErrorBody),
    ),
    security(("api_key" = []), ("jwt" = [])),
)]
#[instrument(skip_all, fields(container_id = %principal.container().id))]
pub async fn upload(
    Extension(principal): Extension<ApiPrincipal>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    principal.require(Permission::Write)?;
    let form = UploadForm::read(multipart).await?;

    let upload = form.into_upload(
        principal.owner_id(),
        principal.container().id,
        principal.max_file_size(),
    );
    let stored = FileService::new(
        &state.db,
        state.object_store.as_ref(),
        state.config.public_api.quota_basis,
    )
    .upload(principal.limits(), upload)
    .await?;

    let size = stored.size;
    let url = upload_url(state.object_store.as_ref(), presign_ttl(&state), &stored).await;
    let mut response =
        (StatusCode::CREATED, Json(UploadResponse::new(stored, url))).into_response();
    response.extensions_mut().insert(TransferStats::upload(size));
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/files",
    tag = "Public API",
    operation_id = "publicListFiles",
    summary = "List active files",
    params(PageQuery),
    responses(
        (status = 200, description = "Files", body = FileListResponse),
        (status = 401, description = "Missing or invalid credentials (API_KEY_MISSING, API_KEY_INVALID)", body = ErrorBody),
        (status = 403, description = "Bad signature or missing permission (SIGNATURE_INVALID, PERMISSION_DENIED)", body = ErrorBody),
        (status = 429, description = "Rate limited (RATE_LIMITED)", body = ErrorBody),
    ),
    security(("api_key" = []), ("jwt" = [])),
)]
#[instrument(skip_all, fields(container_id = %principal.container().id))]
pub async fn list(
    Extension(principal): Extension<ApiPrincipal>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    principal.require(Permission::Read)?;
    Ok(Json(
        list_files(&state.db, principal.container().id, &query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/files/{file_id}",
    tag = "Public API",
    operation_id = "publicGetFile",
    summary = "File metadata with a presigned URL",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File", body = FileUrlResponse),
        (status = 401, description = "Missing or invalid credentials (API_KEY_MISSING, API_KEY_INVALID)", body = ErrorBody),
        (status = 403, description = "Bad signature or missing permission (SIGNATURE_INVALID, PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("api_key" = []), ("jwt" = [])),
)]
#[instrument(skip_all, fields(container_id = %principal.container().id, %file_id))]
pub async fn metadata(
    Extension(principal): Extension<ApiPrincipal>,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<FileUrlResponse>, AppError> {
    principal.require(Permission::Read)?;
    let file = find_active_file(&state.db, principal.container().id, file_id).await?;
    let url = file_url(&state, &file).await?;

    Ok(Json(FileUrlResponse {
        success: true,
        file: FileResponse::from(file),
        url,
        expires_in: state.config.storage.presign_ttl_secs,
    }))
}

#[utoipa::path(
    get,
    path = "/files/{file_id}/download",
    tag = "Public API",
    operation_id = "publicDownload",
    summary = "Download a file",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File content"),
        (status = 401, description = "Missing or invalid credentials (API_KEY_MISSING, API_KEY_INVALID)", body = ErrorBody),
        (status = 403, description = "Bad signature or missing permission (SIGNATURE_INVALID, PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("api_key" = []), ("jwt" = [])),
)]
#[instrument(skip_all, fields(container_id = %principal.container().id, %file_id))]
pub async fn download(
    Extension(principal): Extension<ApiPrincipal>,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Response, AppError> {
    principal.require(Permission::Read)?;
    let file = find_active_file(&state.db, principal.container().id, file_id).await?;
    download_response(state.object_store.as_ref(), &file).await
}

#[utoipa::path(
    delete,
    path = "/files/{file_id}",
    tag = "Public API",
    operation_id = "publicDeleteFile",
    summary = "Delete a file",
    params(("file_id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid credentials (API_KEY_MISSING, API_KEY_INVALID)", body = ErrorBody),
        (status = 403, description = "Bad signature or missing permission (SIGNATURE_INVALID, PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("api_key" = []), ("jwt" = [])),
)]
#[instrument(skip_all, fields(container_id = %principal.container().id, %file_id))]
pub async fn delete(
    Extension(principal): Extension<ApiPrincipal>,
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    principal.require(Permission::Delete)?;
    let file = FileService::new(
        &state.db,
        state.object_store.as_ref(),
        state.config.public_api.quota_basis,
    )
    .delete(principal.owner_id(), principal.container().id, file_id)
    .await?;

    Ok(Json(MessageResponse::ok(format!(
        "File {} deleted",
        file.filename
    ))))
}

#[utoipa::path(
    get,
    path = "/usage",
    tag = "Public API",
    operation_id = "publicUsage",
    summary = "Usage statistics for the container's API key",
    params(UsageQuery),
    responses(
        (status = 200, description = "Usage over the requested window", body = ApiUsageResponse),
        (status = 401, description = "Missing or invalid credentials (API_KEY_MISSING, API_KEY_INVALID)", body = ErrorBody),
        (status = 404, description = "Container has no API key (NOT_FOUND)", body = ErrorBody),
    ),
    security(("api_key" = []), ("jwt" = [])),
)]
#[instrument(skip_all, fields(container_id = %principal.container().id))]
pub async fn usage(
    Extension(principal): Extension<ApiPrincipal>,
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ApiUsageResponse>, AppError> {
    let key = match &principal {
        ApiPrincipal::ApiKey { key, .. } => key.clone(),
        ApiPrincipal::User { container, .. } => public_api_key::Entity::find()
            .filter(public_api_key::Column::ContainerId.eq(container.id))
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("This container has no API key".into()))?,
    };
    Ok(Json(usage_report(&state.db, &key, query.days()).await?))
}
