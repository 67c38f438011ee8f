use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::storage_container;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::files::{FileService, find_active_file, lock_container, recalculate};
use crate::models::shared::{MessageResponse, PageQuery};
use crate::models::storage::*;
use crate::quota::{QuotaLedger, lock_owner, plan_limits};
use crate::state::AppState;
use crate::utils::token;

use super::shared::{
    UploadForm, download_response, file_url, list_files, presign_ttl, upload_url,
};

/// Container owned by the caller, or 404.
async fn find_container<C: ConnectionTrait>(
    db: &C,
    owner_id: i32,
    id: Uuid,
) -> Result<storage_container::Model, AppError> {
    storage_container::Entity::find_by_id(id)
        .filter(storage_container::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Container not found".into()))
}

fn file_service(state: &AppState) -> FileService<'_> {
    FileService::new(
        &state.db,
        state.object_store.as_ref(),
        state.config.public_api.quota_basis,
    )
}

#[utoipa::path(
    post,
    path = "/containers",
    tag = "Storage",
    operation_id = "createContainer",
    summary = "Create a storage container",
    description = "Container names are unique per owner. The number of containers is capped by plan.",
    request_body = CreateContainerRequest,
    responses(
        (status = 201, description = "Container created", body = ContainerResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 409, description = "Name already used (CONFLICT)", body = ErrorBody),
        (status = 429, description = "Container limit reached (QUOTA_EXCEEDED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, name = %payload.name))]
pub async fn create_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateContainerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let limits = plan_limits(&state.db, &auth_user.plan).await?;

    let txn = state.db.begin().await?;
    lock_owner(&txn, auth_user.user_id).await?;
    QuotaLedger::new(&txn, state.config.public_api.quota_basis)
        .can_create_container(auth_user.user_id, &limits)
        .await?
        .require()?;

    let now = Utc::now();
    let model = storage_container::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(auth_user.user_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        container_key: Set(token::container_key()),
        files_count: Set(0),
        total_size: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let created = match model.insert(&txn).await {
        Ok(created) => created,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict(
                "A container with this name already exists".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ContainerResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/containers",
    tag = "Storage",
    operation_id = "listContainers",
    summary = "List own containers",
    responses(
        (status = 200, description = "Containers", body = ContainerListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_containers(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ContainerListResponse>, AppError> {
    let containers = storage_container::Entity::find()
        .filter(storage_container::Column::OwnerId.eq(auth_user.user_id))
        .order_by_asc(storage_container::Column::Name)
        .all(&state.db)
        .await?;

    Ok(Json(ContainerListResponse {
        data: containers.into_iter().map(ContainerResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/containers/{id}",
    tag = "Storage",
    operation_id = "getContainer",
    summary = "Get a container",
    params(("id" = Uuid, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Container", body = ContainerResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn get_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContainerResponse>, AppError> {
    let container = find_container(&state.db, auth_user.user_id, id).await?;
    Ok(Json(ContainerResponse::from(container)))
}

#[utoipa::path(
    delete,
    path = "/containers/{id}",
    tag = "Storage",
    operation_id = "deleteContainer",
    summary = "Delete a container",
    description = "Removes the container, its files, and its API key. Stored objects are \
        deleted best-effort after the database commit.",
    params(("id" = Uuid, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn delete_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = file_service(&state)
        .delete_container(auth_user.user_id, id)
        .await?;
    Ok(Json(MessageResponse::ok(format!(
        "Container deleted with {removed} files"
    ))))
}

#[utoipa::path(
    post,
    path = "/containers/{id}/files",
    tag = "Storage",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Multipart upload. Fields: `file` (required), `filename` (optional rename), \
        `is_public`, `upload_session`. A name already used in the container gets a numeric \
        suffix (`a.txt`, `a_1.txt`, `a_2.txt`).",
    params(("id" = Uuid, Path, description = "Container ID")),
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Container not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Storage quota exceeded (QUOTA_EXCEEDED)", body = ErrorBody),
        (status = 500, description = "Object store failure (STORAGE_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id, %id))]
pub async fn upload_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = UploadForm::read(multipart).await?;
    let limits = plan_limits(&state.db, &auth_user.plan).await?;

    let stored = file_service(&state)
        .upload(&limits, form.into_upload(auth_user.user_id, id, None))
        .await?;
    let url = upload_url(state.object_store.as_ref(), presign_ttl(&state), &stored).await;

    Ok((StatusCode::CREATED, Json(UploadResponse::new(stored, url))))
}

#[utoipa::path(
    get,
    path = "/containers/{id}/files",
    tag = "Storage",
    operation_id = "listFiles",
    summary = "List active files",
    params(("id" = Uuid, Path, description = "Container ID"), PageQuery),
    responses(
        (status = 200, description = "Files", body = FileListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Container not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id, %id))]
pub async fn list_container_files(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    find_container(&state.db, auth_user.user_id, id).await?;
    Ok(Json(list_files(&state.db, id, &query).await?))
}

#[utoipa::path(
    get,
    path = "/containers/{id}/files/{file_id}",
    tag = "Storage",
    operation_id = "getFile",
    summary = "File metadata with a presigned URL",
    params(
        ("id" = Uuid, Path, description = "Container ID"),
        ("file_id" = Uuid, Path, description = "File ID"),
    ),
    responses(
        (status = 200, description = "File", body = FileUrlResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id, %file_id))]
pub async fn get_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FileUrlResponse>, AppError> {
    find_container(&state.db, auth_user.user_id, id).await?;
    let file = find_active_file(&state.db, id, file_id).await?;
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
    path = "/containers/{id}/files/{file_id}/download",
    tag = "Storage",
    operation_id = "downloadFile",
    summary = "Download a file",
    params(
        ("id" = Uuid, Path, description = "Container ID"),
        ("file_id" = Uuid, Path, description = "File ID"),
    ),
    responses(
        (status = 200, description = "File content"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id, %file_id))]
pub async fn download_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    find_container(&state.db, auth_user.user_id, id).await?;
    let file = find_active_file(&state.db, id, file_id).await?;
    download_response(state.object_store.as_ref(), &file).await
}

#[utoipa::path(
    delete,
    path = "/containers/{id}/files/{file_id}",
    tag = "Storage",
    operation_id = "deleteFile",
    summary = "Delete a file",
    description = "Soft-deletes the file record and refreshes the container counters. \
        The stored object is removed best-effort; a store failure does not fail the request.",
    params(
        ("id" = Uuid, Path, description = "Container ID"),
        ("file_id" = Uuid, Path, description = "File ID"),
    ),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id, %file_id))]
pub async fn delete_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, file_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    let file = file_service(&state)
        .delete(auth_user.user_id, id, file_id)
        .await?;
    Ok(Json(MessageResponse::ok(format!(
        "File {} deleted",
        file.filename
    ))))
}

#[utoipa::path(
    post,
    path = "/containers/{id}/recalculate",
    tag = "Storage",
    operation_id = "recalculateContainer",
    summary = "Recompute container counters",
    description = "Recomputes `files_count` and `total_size` from active files. \
        A no-op when the counters are already consistent.",
    params(("id" = Uuid, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Recomputed counters", body = RecalculateResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn recalculate_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecalculateResponse>, AppError> {
    let txn = state.db.begin().await?;
    let before = lock_container(&txn, auth_user.user_id, id).await?;
    let totals = recalculate(&txn, id).await?;
    txn.commit().await?;

    Ok(Json(RecalculateResponse {
        success: true,
        files_count: totals.files_count,
        total_size: totals.total_size,
        previous_files_count: before.files_count,
        previous_total_size: before.total_size,
        corrected: before.files_count != totals.files_count
            || before.total_size != totals.total_size,
    }))
}

#[utoipa::path(
    get,
    path = "/usage",
    tag = "Storage",
    operation_id = "getStorageUsage",
    summary = "Storage usage and quota",
    responses(
        (status = 200, description = "Usage summary", body = StorageUsageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn storage_usage(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StorageUsageResponse>, AppError> {
    let limits = plan_limits(&state.db, &auth_user.plan).await?;
    let summary = QuotaLedger::new(&state.db, state.config.public_api.quota_basis)
        .summary(auth_user.user_id, &limits)
        .await?;
    Ok(Json(StorageUsageResponse::new(summary, &limits)))
}
