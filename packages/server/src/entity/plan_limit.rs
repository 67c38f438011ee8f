use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-tier limits. Seeded on startup, edited by administrators.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_limit")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub plan: String,

    pub requests_per_hour: i32,
    pub requests_per_day: i32,
    /// Bytes.
    pub max_file_size: i64,
    pub max_files_per_request: i32,
    /// Bytes. NULL means unlimited.
    pub storage_limit: Option<i64>,
    /// NULL means unlimited.
    pub max_containers: Option<i32>,

    pub api_access: bool,
    pub custom_domains: bool,
    pub advanced_analytics: bool,
}

impl ActiveModelBehavior for ActiveModel {}
