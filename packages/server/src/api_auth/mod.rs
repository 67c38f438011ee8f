//! Authentication for the public storage API.
//!
//! Two schemes share the `/api/public/v1` namespace: an `X-API-Key` (optionally
//! HMAC-signed) bound to one container, and a user bearer token naming one of
//! the user's containers in `X-Container-Id`.

pub mod middleware;
pub mod signature;

use std::cmp;

use axum::http::{HeaderMap, Method};
use chrono::{Duration, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::*;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{api_request_log, plan_limit, public_api_key, storage_container, user};
use crate::error::AppError;
use crate::extractors::auth::{AuthUser, bearer_token};
use crate::quota::plan_limits;
use crate::state::AppState;
use crate::usage::UsageAggregator;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const CONTAINER_HEADER: &str = "X-Container-Id";

/// Capability granted by an API key's permission map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Delete,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
        }
    }
}

/// Default permission map for new keys.
pub fn default_permissions() -> serde_json::Value {
    serde_json::json!({ "read": true, "write": true, "delete": true })
}

/// Authenticated caller of the public API, stored in request extensions.
#[derive(Debug, Clone)]
pub enum ApiPrincipal {
    ApiKey {
        key: public_api_key::Model,
        container: storage_container::Model,
        limits: plan_limit::Model,
    },
    User {
        user: AuthUser,
        container: storage_container::Model,
        limits: plan_limit::Model,
    },
}

impl ApiPrincipal {
    pub fn container(&self) -> &storage_container::Model {
        match self {
            ApiPrincipal::ApiKey { container, .. } | ApiPrincipal::User { container, .. } => {
                container
            }
        }
    }

    pub fn owner_id(&self) -> i32 {
        self.container().owner_id
    }

    pub fn limits(&self) -> &plan_limit::Model {
        match self {
            ApiPrincipal::ApiKey { limits, .. } | ApiPrincipal::User { limits, .. } => limits,
        }
    }

    /// Set for API-key callers only; these are the requests that get logged.
    pub fn api_key_id(&self) -> Option<i32> {
        match self {
            ApiPrincipal::ApiKey { key, .. } => Some(key.id),
            ApiPrincipal::User { .. } => None,
        }
    }

    /// Per-key file size override, if any.
    pub fn max_file_size(&self) -> Option<i64> {
        match self {
            ApiPrincipal::ApiKey { key, .. } => key.max_file_size,
            ApiPrincipal::User { .. } => None,
        }
    }

    /// Container owners hold every permission.
    pub fn can(&self, permission: Permission) -> bool {
        match self {
            ApiPrincipal::ApiKey { key, .. } => key
                .permissions
                .get(permission.as_str())
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            ApiPrincipal::User { .. } => true,
        }
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "API key lacks the '{}' permission",
                permission.as_str()
            )))
        }
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Authenticate a public API request.
///
/// A presented but invalid credential is always an error; requests with no
/// credential at all are rejected with `API_KEY_MISSING`.
pub async fn authenticate(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Result<ApiPrincipal, AppError> {
    if let Some(raw_key) = header(headers, API_KEY_HEADER) {
        return authenticate_key(state, method, path, headers, raw_key).await;
    }
    if let Some(token) = bearer_token(headers)? {
        return authenticate_user(state, headers, token).await;
    }
    Err(AppError::ApiKeyMissing)
}

async fn authenticate_key(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    raw_key: &str,
) -> Result<ApiPrincipal, AppError> {
    let key = public_api_key::Entity::find()
        .filter(public_api_key::Column::Key.eq(raw_key))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::ApiKeyInvalid("Invalid API key".into()))?;
    if !key.is_active {
        return Err(AppError::ApiKeyInvalid("API key is inactive".into()));
    }

    check_rate_limit(&state.db, &key).await?;
    verify_signature(state, &key, method, path, headers)?;

    let container = storage_container::Entity::find_by_id(key.container_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::ApiKeyInvalid("API key has no container".into()))?;
    let owner = user::Entity::find_by_id(container.owner_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::ApiKeyInvalid("API key owner no longer exists".into()))?;
    let limits = plan_limits(&state.db, &owner.plan).await?;
    if !limits.api_access {
        return Err(AppError::PermissionDenied(
            "Your plan does not include API access".into(),
        ));
    }
    check_daily_limit(&state.db, &key, &limits).await?;

    mark_used(&state.db, key.id).await?;
    debug!(api_key_id = key.id, container_id = %container.id, "API key authenticated");

    Ok(ApiPrincipal::ApiKey {
        key,
        container,
        limits,
    })
}

fn verify_signature(
    state: &AppState,
    key: &public_api_key::Model,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Result<(), AppError> {
    let config = &state.config.public_api;

    let Some(provided) = header(headers, SIGNATURE_HEADER) else {
        if config.require_signature {
            return Err(AppError::SignatureInvalid(
                "X-Signature and X-Timestamp headers are required".into(),
            ));
        }
        return Ok(());
    };

    let raw_timestamp = header(headers, TIMESTAMP_HEADER).ok_or_else(|| {
        AppError::SignatureInvalid("X-Timestamp is required with X-Signature".into())
    })?;
    let timestamp: i64 = raw_timestamp
        .parse()
        .map_err(|_| AppError::SignatureInvalid("X-Timestamp must be unix seconds".into()))?;

    if !signature::timestamp_fresh(timestamp, Utc::now().timestamp(), config.signature_window_secs)
    {
        return Err(AppError::SignatureInvalid(format!(
            "Request timestamp is more than {} seconds from server time",
            config.signature_window_secs
        )));
    }

    if !signature::verify(&key.secret, method.as_str(), path, raw_timestamp, provided) {
        return Err(AppError::SignatureInvalid("Signature does not match".into()));
    }
    Ok(())
}

/// Sliding one-hour window over the request log.
pub async fn check_rate_limit<C: ConnectionTrait>(
    db: &C,
    key: &public_api_key::Model,
) -> Result<(), AppError> {
    let window_start = Utc::now() - Duration::hours(1);

    let count = api_request_log::Entity::find()
        .filter(api_request_log::Column::ApiKeyId.eq(key.id))
        .filter(api_request_log::Column::CreatedAt.gte(window_start))
        .count(db)
        .await?;

    let limit = std::cmp::Ord::max(key.rate_limit, 0) as u64;
    if count < limit {
        return Ok(());
    }

    let oldest = api_request_log::Entity::find()
        .filter(api_request_log::Column::ApiKeyId.eq(key.id))
        .filter(api_request_log::Column::CreatedAt.gte(window_start))
        .order_by_asc(api_request_log::Column::CreatedAt)
        .one(db)
        .await?;

    let retry_after = oldest
        .map(|row| {
            let expires = row.created_at + Duration::hours(1);
            cmp::max((expires - Utc::now()).num_seconds(), 1) as u64
        })
        .unwrap_or(3600);

    Err(AppError::RateLimited {
        retry_after,
        message: format!(
            "Rate limit exceeded: {limit} requests per hour, 0 remaining. Retry in {retry_after} seconds"
        ),
    })
}

async fn check_daily_limit<C: ConnectionTrait>(
    db: &C,
    key: &public_api_key::Model,
    limits: &plan_limit::Model,
) -> Result<(), AppError> {
    let today = UsageAggregator::new(db).requests_today(key.id).await?;
    if today < i64::from(limits.requests_per_day) {
        return Ok(());
    }

    let now = Utc::now();
    let retry_after = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|midnight| cmp::max((midnight.and_utc() - now).num_seconds(), 1) as u64)
        .unwrap_or(3600);

    Err(AppError::RateLimited {
        retry_after,
        message: format!(
            "Daily limit of {} requests reached for the {} plan",
            limits.requests_per_day, limits.plan
        ),
    })
}

/// Count a successful authentication against the key.
async fn mark_used<C: ConnectionTrait>(db: &C, key_id: i32) -> Result<(), DbErr> {
    public_api_key::Entity::update_many()
        .col_expr(
            public_api_key::Column::TotalRequests,
            Expr::col(public_api_key::Column::TotalRequests).add(1),
        )
        .col_expr(public_api_key::Column::LastUsedAt, Expr::value(Some(Utc::now())))
        .filter(public_api_key::Column::Id.eq(key_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn authenticate_user(
    state: &AppState,
    headers: &HeaderMap,
    token: &str,
) -> Result<ApiPrincipal, AppError> {
    let user = AuthUser::from_token(state, token).await?;

    let container_id: Uuid = header(headers, CONTAINER_HEADER)
        .ok_or_else(|| {
            AppError::Validation("X-Container-Id is required with bearer authentication".into())
        })?
        .parse()
        .map_err(|_| AppError::Validation("X-Container-Id must be a UUID".into()))?;

    let container = storage_container::Entity::find_by_id(container_id)
        .filter(storage_container::Column::OwnerId.eq(user.user_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Container not found".into()))?;
    let limits = plan_limits(&state.db, &user.plan).await?;

    Ok(ApiPrincipal::User {
        user,
        container,
        limits,
    })
}
