use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, Utc};
use sea_orm::*;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api_auth::default_permissions;
use crate::entity::{api_request_log, public_api_key, storage_container};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::api_key::*;
use crate::models::shared::MessageResponse;
use crate::quota::plan_limits;
use crate::state::AppState;
use crate::usage::{UsageAggregator, summarize};
use crate::utils::token;

/// The key of a container the caller owns, or 404 for either.
async fn find_key(
    db: &DatabaseConnection,
    owner_id: i32,
    container_id: Uuid,
) -> Result<public_api_key::Model, AppError> {
    let container = storage_container::Entity::find_by_id(container_id)
        .filter(storage_container::Column::OwnerId.eq(owner_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Container not found".into()))?;

    public_api_key::Entity::find()
        .filter(public_api_key::Column::ContainerId.eq(container.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("This container has no API key".into()))
}

#[utoipa::path(
    post,
    path = "/containers/{id}/api-key",
    tag = "API Keys",
    operation_id = "createApiKey",
    summary = "Issue the container's API key",
    description = "Each container has at most one key. The secret is returned only in this \
        response; store it to sign requests.",
    params(("id" = Uuid, Path, description = "Container ID")),
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "Key created", body = ApiKeyCreatedResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Plan has no API access (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Container not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Key already exists (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id, %id))]
pub async fn create_api_key(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let container = storage_container::Entity::find_by_id(id)
        .filter(storage_container::Column::OwnerId.eq(auth_user.user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Container not found".into()))?;

    let limits = plan_limits(&state.db, &auth_user.plan).await?;
    if !limits.api_access {
        return Err(AppError::PermissionDenied(
            "Your plan does not include API access".into(),
        ));
    }

    let existing = public_api_key::Entity::find()
        .filter(public_api_key::Column::ContainerId.eq(container.id))
        .count(&state.db)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict(
            "This container already has an API key".into(),
        ));
    }

    let secret = token::api_secret();
    let model = public_api_key::ActiveModel {
        container_id: Set(container.id),
        key: Set(token::api_key()),
        secret: Set(secret.clone()),
        permissions: Set(payload.permissions.unwrap_or_else(default_permissions)),
        rate_limit: Set(payload.rate_limit.unwrap_or(limits.requests_per_hour)),
        max_file_size: Set(payload.max_file_size),
        is_active: Set(true),
        total_requests: Set(0),
        last_used_at: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    // Two concurrent creates race on the unique container_id.
    let created = match model.insert(&state.db).await {
        Ok(created) => created,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict(
                "This container already has an API key".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    info!(api_key_id = created.id, "API key issued");

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyCreatedResponse {
            success: true,
            api_key: ApiKeyResponse::from(created),
            secret,
            message: "Store the secret now; it will not be shown again".into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/containers/{id}/api-key",
    tag = "API Keys",
    operation_id = "getApiKey",
    summary = "Show the container's API key",
    params(("id" = Uuid, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Key without its secret", body = ApiKeyResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn get_api_key(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let key = find_key(&state.db, auth_user.user_id, id).await?;
    Ok(Json(ApiKeyResponse::from(key)))
}

#[utoipa::path(
    post,
    path = "/containers/{id}/api-key/regenerate",
    tag = "API Keys",
    operation_id = "regenerateApiKeySecret",
    summary = "Replace the signing secret",
    description = "The key itself is unchanged. Requests signed with the old secret fail immediately.",
    params(("id" = Uuid, Path, description = "Container ID")),
    responses(
        (status = 200, description = "New secret", body = ApiKeyCreatedResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn regenerate_secret(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyCreatedResponse>, AppError> {
    let key = find_key(&state.db, auth_user.user_id, id).await?;

    let secret = token::api_secret();
    let mut active: public_api_key::ActiveModel = key.into();
    active.secret = Set(secret.clone());
    let updated = active.update(&state.db).await?;
    info!(api_key_id = updated.id, "API key secret regenerated");

    Ok(Json(ApiKeyCreatedResponse {
        success: true,
        api_key: ApiKeyResponse::from(updated),
        secret,
        message: "Secret regenerated; update your clients".into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/containers/{id}/api-key",
    tag = "API Keys",
    operation_id = "deactivateApiKey",
    summary = "Deactivate the container's API key",
    description = "The key is kept with its history but rejected with `API_KEY_INVALID`.",
    params(("id" = Uuid, Path, description = "Container ID")),
    responses(
        (status = 200, description = "Deactivated", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id, %id))]
pub async fn deactivate_api_key(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let key = find_key(&state.db, auth_user.user_id, id).await?;
    let key_id = key.id;

    let mut active: public_api_key::ActiveModel = key.into();
    active.is_active = Set(false);
    active.update(&state.db).await?;
    info!(api_key_id = key_id, "API key deactivated");

    Ok(Json(MessageResponse::ok("API key deactivated")))
}

#[utoipa::path(
    get,
    path = "/containers/{id}/api-key/usage",
    tag = "API Keys",
    operation_id = "getApiKeyUsage",
    summary = "Usage statistics for the container's API key",
    params(("id" = Uuid, Path, description = "Container ID"), UsageQuery),
    responses(
        (status = 200, description = "Usage over the requested window", body = ApiUsageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(user_id = auth_user.user_id, %id))]
pub async fn api_key_usage(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ApiUsageResponse>, AppError> {
    let key = find_key(&state.db, auth_user.user_id, id).await?;
    Ok(Json(usage_report(&state.db, &key, query.days()).await?))
}

/// Aggregated usage for a key over the last `days` days, today included.
pub async fn usage_report(
    db: &DatabaseConnection,
    key: &public_api_key::Model,
    days: i64,
) -> Result<ApiUsageResponse, AppError> {
    let now = Utc::now();
    let since = (now - Duration::days(days - 1)).date_naive();

    let rows = UsageAggregator::new(db).daily(key.id, since).await?;
    let totals = summarize(&rows);

    let requests_last_hour = api_request_log::Entity::find()
        .filter(api_request_log::Column::ApiKeyId.eq(key.id))
        .filter(api_request_log::Column::CreatedAt.gte(now - Duration::hours(1)))
        .count(db)
        .await?;

    Ok(ApiUsageResponse::new(
        days,
        totals,
        rows,
        requests_last_hour,
        key.rate_limit,
    ))
}
