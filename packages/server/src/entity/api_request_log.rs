use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable record of one public API request.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_request_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub api_key_id: i32,
    #[sea_orm(belongs_to, from = "api_key_id", to = "id")]
    pub api_key: HasOne<super::public_api_key::Entity>,

    pub method: String,
    pub endpoint: String,
    pub status_code: i32,
    pub response_time_ms: i64,
    pub request_size: i64,
    pub response_size: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    #[sea_orm(indexed)]
    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
