use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-user, per-day storage activity. `(user_id, date)` is unique.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_usage_daily")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(indexed)]
    pub user_id: i32,
    pub date: Date,

    pub files_uploaded: i64,
    pub bytes_uploaded: i64,
    pub files_deleted: i64,
    pub bytes_deleted: i64,
}

impl ActiveModelBehavior for ActiveModel {}
