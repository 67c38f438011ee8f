use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Credential for the public storage API. Exactly one per container.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "public_api_key")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub container_id: Uuid,
    #[sea_orm(belongs_to, from = "container_id", to = "id")]
    pub container: HasOne<super::storage_container::Entity>,

    /// Sent by clients in `X-API-Key`.
    #[sea_orm(unique)]
    pub key: String,
    /// HMAC signing secret. Never transmitted after creation.
    #[serde(skip_serializing)]
    pub secret: String,

    /// Map of permission name to bool: `read`, `write`, `delete`.
    #[sea_orm(column_type = "JsonBinary")]
    pub permissions: serde_json::Value,

    /// Requests allowed in any trailing 60-minute window.
    pub rate_limit: i32,
    /// Overrides the plan's per-file ceiling when set. Bytes.
    pub max_file_size: Option<i64>,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    #[sea_orm(default_value = 0)]
    pub total_requests: i64,
    pub last_used_at: Option<DateTimeUtc>,

    #[sea_orm(has_many)]
    pub request_logs: HasMany<super::api_request_log::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
