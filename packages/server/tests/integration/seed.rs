use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use uuid::Uuid;

use server::entity::storage_container;

use crate::common::TestApp;

fn container(owner_id: i32, name: &str, key: &str) -> storage_container::ActiveModel {
    let now = Utc::now();
    storage_container::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        name: Set(name.to_string()),
        description: Set(String::new()),
        container_key: Set(key.to_string()),
        files_count: Set(0),
        total_size: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[tokio::test]
async fn ensure_indexes_is_idempotent() {
    let app = TestApp::spawn().await;
    server::seed::ensure_indexes(&app.db)
        .await
        .expect("indexes already present should be accepted");
}

#[tokio::test]
async fn ensure_indexes_fails_when_a_unique_index_cannot_be_built() {
    let app = TestApp::spawn().await;
    let (owner_id, _) = app.create_user("ivan", "standard").await;

    app.db
        .execute_unprepared("DROP INDEX uq_storage_container_owner_name")
        .await
        .unwrap();
    container(owner_id, "dup", "key-one").insert(&app.db).await.unwrap();
    container(owner_id, "dup", "key-two").insert(&app.db).await.unwrap();

    let result = server::seed::ensure_indexes(&app.db).await;
    assert!(result.is_err(), "duplicate rows must block the unique index");
}
