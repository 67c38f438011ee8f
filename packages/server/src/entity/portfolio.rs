use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "portfolio")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    /// Globally unique; doubles as the subdomain label.
    #[sea_orm(unique)]
    pub slug: String,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "Text")]
    pub html_content: String,
    #[sea_orm(column_type = "Text")]
    pub css_content: String,
    #[sea_orm(column_type = "Text")]
    pub js_content: String,

    #[sea_orm(default_value = false)]
    pub is_public: bool,

    /// JSON array of strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    #[sea_orm(default_value = 0)]
    pub views_count: i64,
    #[sea_orm(default_value = 0)]
    pub likes_count: i64,

    #[sea_orm(has_many)]
    pub views: HasMany<super::portfolio_view::Entity>,
    #[sea_orm(has_many)]
    pub likes: HasMany<super::portfolio_like::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn tag_list(&self) -> Vec<String> {
        serde_json::from_value(self.tags.clone()).unwrap_or_default()
    }
}

impl ActiveModelBehavior for ActiveModel {}
