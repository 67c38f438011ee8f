use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stored_file")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub container_id: Uuid,
    #[sea_orm(belongs_to, from = "container_id", to = "id")]
    pub container: HasOne<super::storage_container::Entity>,

    /// Unique within the container, including soft-deleted rows.
    pub filename: String,
    /// Name as supplied by the client.
    pub original_filename: String,

    pub storage_key: String,
    pub size: i64,
    pub mime_type: String,

    #[sea_orm(default_value = false)]
    pub is_public: bool,
    /// False once soft-deleted.
    #[sea_orm(default_value = true, indexed)]
    pub is_active: bool,

    /// Hex SHA-256 of the stored bytes.
    pub checksum: Option<String>,
    pub upload_session: Option<String>,

    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
