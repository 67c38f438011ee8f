use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per (portfolio, client IP). Gates the view counter.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "portfolio_view")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub portfolio_id: Uuid,
    #[sea_orm(belongs_to, from = "portfolio_id", to = "id")]
    pub portfolio: HasOne<super::portfolio::Entity>,

    pub ip_address: String,

    /// Set when the viewer was signed in.
    pub user_id: Option<i32>,

    pub first_viewed_at: DateTimeUtc,
    /// Last time this row incremented the counter.
    pub counted_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
