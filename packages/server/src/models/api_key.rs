use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{api_usage_daily, public_api_key};
use crate::error::AppError;
use crate::usage::UsageTotals;

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct CreateApiKeyRequest {
    /// Requests per trailing hour. Defaults to the plan's hourly limit.
    pub rate_limit: Option<i32>,
    /// Per-file ceiling in bytes, overriding the plan's.
    pub max_file_size: Option<i64>,
    /// Map of `read` / `write` / `delete` to bool. Defaults to all granted.
    #[schema(value_type = Option<Object>)]
    pub permissions: Option<serde_json::Value>,
}

impl CreateApiKeyRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(limit) = self.rate_limit
            && limit <= 0
        {
            return Err(AppError::Validation("rate_limit must be positive".into()));
        }
        if let Some(size) = self.max_file_size
            && size <= 0
        {
            return Err(AppError::Validation("max_file_size must be positive".into()));
        }
        if let Some(perms) = &self.permissions {
            let Some(map) = perms.as_object() else {
                return Err(AppError::Validation("permissions must be an object".into()));
            };
            if map
                .iter()
                .any(|(k, v)| !matches!(k.as_str(), "read" | "write" | "delete") || !v.is_boolean())
            {
                return Err(AppError::Validation(
                    "permissions may only map read, write and delete to booleans".into(),
                ));
            }
        }
        Ok(())
    }
}

/// An API key without its secret.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApiKeyResponse {
    pub id: i32,
    pub container_id: Uuid,
    #[schema(example = "pk_3f9a0c...")]
    pub key: String,
    #[schema(value_type = Object)]
    pub permissions: serde_json::Value,
    pub rate_limit: i32,
    pub max_file_size: Option<i64>,
    pub is_active: bool,
    pub total_requests: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<public_api_key::Model> for ApiKeyResponse {
    fn from(model: public_api_key::Model) -> Self {
        Self {
            id: model.id,
            container_id: model.container_id,
            key: model.key,
            permissions: model.permissions,
            rate_limit: model.rate_limit,
            max_file_size: model.max_file_size,
            is_active: model.is_active,
            total_requests: model.total_requests,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
        }
    }
}

/// Returned once, on creation or regeneration. The secret is not retrievable later.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ApiKeyCreatedResponse {
    pub success: bool,
    pub api_key: ApiKeyResponse,
    #[schema(example = "sk_8c1e...")]
    pub secret: String,
    pub message: String,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct UsageQuery {
    /// Days of history, 1-90. Default 30.
    pub days: Option<i64>,
}

impl UsageQuery {
    pub fn days(&self) -> i64 {
        self.days.unwrap_or(30).clamp(1, 90)
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DailyApiUsage {
    pub date: NaiveDate,
    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    pub files_uploaded: i64,
    pub files_downloaded: i64,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub average_response_time_ms: i64,
    #[schema(value_type = Object)]
    pub endpoint_hits: serde_json::Value,
}

impl From<api_usage_daily::Model> for DailyApiUsage {
    fn from(model: api_usage_daily::Model) -> Self {
        Self {
            date: model.date,
            total_requests: model.total_requests,
            successful_requests: model.successful_requests,
            failed_requests: model.failed_requests,
            files_uploaded: model.files_uploaded,
            files_downloaded: model.files_downloaded,
            bytes_uploaded: model.bytes_uploaded,
            bytes_downloaded: model.bytes_downloaded,
            average_response_time_ms: model.average_response_time_ms,
            endpoint_hits: model.endpoint_hits,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EndpointHits {
    pub endpoint: String,
    pub hits: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ApiUsageResponse {
    pub success: bool,
    pub days: i64,
    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    /// Percentage, one decimal.
    #[schema(example = 98.5)]
    pub success_rate: f64,
    pub average_response_time_ms: i64,
    pub files_uploaded: i64,
    pub files_downloaded: i64,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub popular_endpoints: Vec<EndpointHits>,
    /// Requests counted against the hourly rate limit right now.
    pub requests_last_hour: u64,
    pub rate_limit: i32,
    pub daily: Vec<DailyApiUsage>,
}

impl ApiUsageResponse {
    pub fn new(
        days: i64,
        totals: UsageTotals,
        rows: Vec<api_usage_daily::Model>,
        requests_last_hour: u64,
        rate_limit: i32,
    ) -> Self {
        Self {
            success: true,
            days,
            total_requests: totals.total_requests,
            successful_requests: totals.successful_requests,
            failed_requests: totals.failed_requests,
            success_rate: totals.success_rate,
            average_response_time_ms: totals.average_response_time_ms,
            files_uploaded: totals.files_uploaded,
            files_downloaded: totals.files_downloaded,
            bytes_uploaded: totals.bytes_uploaded,
            bytes_downloaded: totals.bytes_downloaded,
            popular_endpoints: totals
                .popular_endpoints
                .into_iter()
                .map(|(endpoint, hits)| EndpointHits { endpoint, hits })
                .collect(),
            requests_last_hour,
            rate_limit,
            daily: rows.into_iter().map(DailyApiUsage::from).collect(),
        }
    }
}
