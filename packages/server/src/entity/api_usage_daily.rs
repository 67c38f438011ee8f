use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Additive per-key, per-day counters. `(api_key_id, date)` is unique.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_usage_daily")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub api_key_id: i32,
    pub date: Date,

    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    pub files_uploaded: i64,
    pub files_downloaded: i64,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub total_response_time_ms: i64,
    /// Always `total_response_time_ms / total_requests`.
    pub average_response_time_ms: i64,

    /// Object mapping endpoint path to hit count.
    #[sea_orm(column_type = "JsonBinary")]
    pub endpoint_hits: serde_json::Value,
}

impl ActiveModelBehavior for ActiveModel {}
