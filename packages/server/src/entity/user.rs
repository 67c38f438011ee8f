use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Platform account. Owned by the identity service; this crate only reads it.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    pub email: String,

    /// Plan tier: "standard", "premium" or "pro".
    pub plan: String,

    #[sea_orm(has_many)]
    pub portfolios: HasMany<super::portfolio::Entity>,

    #[sea_orm(has_many)]
    pub containers: HasMany<super::storage_container::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
