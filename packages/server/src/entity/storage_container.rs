use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage_container")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// `(owner_id, name)` is unique; see `seed::ensure_indexes`.
    #[sea_orm(indexed)]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Public lookup key. Not a credential.
    #[sea_orm(unique)]
    pub container_key: String,

    /// Cached COUNT of active files, refreshed on every mutation.
    #[sea_orm(default_value = 0)]
    pub files_count: i64,
    /// Cached SUM of active file sizes in bytes, refreshed on every mutation.
    #[sea_orm(default_value = 0)]
    pub total_size: i64,

    #[sea_orm(has_many)]
    pub files: HasMany<super::stored_file::Entity>,

    #[sea_orm(has_one)]
    pub api_key: HasOne<super::public_api_key::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
