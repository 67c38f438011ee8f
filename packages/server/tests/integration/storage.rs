use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use uuid::Uuid;

use server::config::QuotaBasis;
use server::entity::{storage_container, storage_usage_daily, stored_file};

use crate::common::{TestApp, routes};

const MB: i64 = 1024 * 1024;

/// Insert an active file row without touching the object store or the
/// container counters.
async fn insert_file_row(app: &TestApp, container_id: &str, filename: &str, size: i64) {
    let id = Uuid::new_v4();
    stored_file::ActiveModel {
        id: Set(id),
        container_id: Set(container_id.parse().unwrap()),
        filename: Set(filename.to_string()),
        original_filename: Set(filename.to_string()),
        storage_key: Set(format!("seeded/{id}")),
        size: Set(size),
        mime_type: Set("application/octet-stream".to_string()),
        is_public: Set(false),
        is_active: Set(true),
        checksum: Set(None),
        upload_session: Set(None),
        created_at: Set(Utc::now()),
        deleted_at: Set(None),
    }
    .insert(&app.db)
    .await
    .expect("Failed to insert file row");
}

async fn container_row(app: &TestApp, container_id: &str) -> storage_container::Model {
    storage_container::Entity::find_by_id(container_id.parse::<Uuid>().unwrap())
        .one(&app.db)
        .await
        .unwrap()
        .expect("container should exist")
}

async fn today_usage(app: &TestApp, user_id: i32) -> storage_usage_daily::Model {
    storage_usage_daily::Entity::find()
        .filter(storage_usage_daily::Column::UserId.eq(user_id))
        .filter(storage_usage_daily::Column::Date.eq(Utc::now().date_naive()))
        .one(&app.db)
        .await
        .unwrap()
        .expect("today's usage row should exist")
}

mod containers {
    use super::*;

    #[tokio::test]
    async fn create_list_and_get() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("alice", "standard").await;

        let id = app.create_container(&token, "invoices").await;

        let list = app.get_with_token(routes::CONTAINERS, &token).await;
        assert_eq!(list.status, 200);
        assert_eq!(list.body["data"].as_array().unwrap().len(), 1);

        let got = app.get_with_token(&routes::container(&id), &token).await;
        assert_eq!(got.body["name"], "invoices");
        assert_eq!(got.body["files_count"], 0);
        assert!(got.body["container_key"].as_str().unwrap().starts_with("ck_"));
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("bob", "standard").await;

        app.create_container(&token, "photos").await;
        let res = app
            .post_with_token(routes::CONTAINERS, &json!({"name": "photos"}), &token)
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["error_code"], "CONFLICT");
    }

    #[tokio::test]
    async fn standard_plan_is_capped_at_three_containers() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("carol", "standard").await;

        for name in ["a", "b", "c"] {
            app.create_container(&token, name).await;
        }
        let res = app
            .post_with_token(routes::CONTAINERS, &json!({"name": "d"}), &token)
            .await;
        assert_eq!(res.status, 429);
        assert_eq!(res.body["error_code"], "QUOTA_EXCEEDED");
    }

    #[tokio::test]
    async fn concurrent_creates_respect_the_container_cap() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("cora", "standard").await;

        for name in ["a", "b"] {
            app.create_container(&token, name).await;
        }
        let body_x = json!({"name": "x"});
        let body_y = json!({"name": "y"});
        let (x, y) = tokio::join!(
            app.post_with_token(routes::CONTAINERS, &body_x, &token),
            app.post_with_token(routes::CONTAINERS, &body_y, &token),
        );
        let mut statuses = [x.status, y.status];
        statuses.sort();
        assert_eq!(statuses, [201, 429], "{} / {}", x.text, y.text);

        let list = app.get_with_token(routes::CONTAINERS, &token).await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn containers_of_other_users_are_hidden() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("dana", "standard").await;
        let (_, other) = app.create_user("eli", "standard").await;
        let id = app.create_container(&owner, "private").await;

        let res = app.get_with_token(&routes::container(&id), &other).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn delete_removes_files() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("fay", "standard").await;
        let id = app.create_container(&token, "temp").await;
        app.upload_with_token(&id, "a.txt", b"hello".to_vec(), &token)
            .await;

        let res = app.delete_with_token(&routes::container(&id), &token).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let gone = app.get_with_token(&routes::container(&id), &token).await;
        assert_eq!(gone.status, 404);
        let remaining = stored_file::Entity::find().all(&app.db).await.unwrap();
        assert!(remaining.is_empty());
    }
}

mod uploads {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips_bytes() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("gus", "standard").await;
        let id = app.create_container(&token, "docs").await;

        let res = app
            .upload_with_token(&id, "notes.txt", b"some notes".to_vec(), &token)
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["success"], true);
        assert_eq!(res.body["file"]["filename"], "notes.txt");
        assert_eq!(res.body["file"]["mime_type"], "text/plain");
        let file_id = res.body["file"]["id"].as_str().unwrap().to_string();

        let download = app
            .client
            .get(app.url(&routes::container_file_download(&id, &file_id)))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(download.status(), 200);
        let disposition = download.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("notes.txt"));
        assert_eq!(download.bytes().await.unwrap().as_ref(), b"some notes");

        let meta = app
            .get_with_token(&routes::container_file(&id, &file_id), &token)
            .await;
        assert_eq!(meta.status, 200);
        assert_eq!(meta.body["file"]["size"], 10);
        assert_eq!(meta.body["expires_in"], 3600);
        assert!(meta.body["file"]["checksum"].as_str().unwrap().len() == 64);
    }

    #[tokio::test]
    async fn colliding_names_get_numeric_suffixes() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("hal", "standard").await;
        let id = app.create_container(&token, "reports").await;

        let mut names = Vec::new();
        for _ in 0..3 {
            let res = app
                .upload_with_token(&id, "report.pdf", b"%PDF".to_vec(), &token)
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
            names.push(res.body["file"]["filename"].as_str().unwrap().to_string());
        }

        assert_eq!(names, ["report.pdf", "report_1.pdf", "report_2.pdf"]);
    }

    #[tokio::test]
    async fn custom_filename_is_validated() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("ida", "standard").await;
        let id = app.create_container(&token, "misc").await;

        let res = app
            .upload(
                &routes::container_files(&id),
                "x.txt",
                b"x".to_vec(),
                Some("../etc/passwd"),
                &[("Authorization", format!("Bearer {token}"))],
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["error_code"], "VALIDATION_ERROR");

        let renamed = app
            .upload(
                &routes::container_files(&id),
                "x.txt",
                b"x".to_vec(),
                Some("renamed.txt"),
                &[("Authorization", format!("Bearer {token}"))],
            )
            .await;
        assert_eq!(renamed.status, 201, "{}", renamed.text);
        assert_eq!(renamed.body["file"]["filename"], "renamed.txt");
    }

    #[tokio::test]
    async fn storage_ceiling_rejects_upload_that_would_overflow() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("jon", "standard").await;
        let id = app.create_container(&token, "full").await;

        // Standard plan: 100 MB. Leave a little under 1 MB free.
        insert_file_row(&app, &id, "big.bin", 100 * MB - 512 * 1024).await;

        let too_big = app
            .upload_with_token(&id, "more.bin", vec![0u8; 1024 * 1024], &token)
            .await;
        assert_eq!(too_big.status, 429, "{}", too_big.text);
        assert_eq!(too_big.body["error_code"], "QUOTA_EXCEEDED");
        assert!(too_big.body["error"].as_str().unwrap().contains("remaining"));

        let fits = app
            .upload_with_token(&id, "small.bin", vec![0u8; 100 * 1024], &token)
            .await;
        assert_eq!(fits.status, 201, "{}", fits.text);
    }

    #[tokio::test]
    async fn file_over_plan_ceiling_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("kim", "standard").await;
        let id = app.create_container(&token, "media").await;

        let res = app
            .upload_with_token(&id, "video.mp4", vec![0u8; (25 * MB + 1) as usize], &token)
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("lou", "standard").await;
        let id = app.create_container(&token, "empty").await;

        let res = app.upload_with_token(&id, "empty.txt", Vec::new(), &token).await;
        assert_eq!(res.status, 400);
    }
}

mod counters {
    use super::*;

    #[tokio::test]
    async fn upload_and_delete_keep_container_totals_exact() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("max", "standard").await;
        let id = app.create_container(&token, "tally").await;

        let a = app
            .upload_with_token(&id, "a.txt", vec![1u8; 300], &token)
            .await;
        app.upload_with_token(&id, "b.txt", vec![2u8; 700], &token)
            .await;

        let container = container_row(&app, &id).await;
        assert_eq!(container.files_count, 2);
        assert_eq!(container.total_size, 1000);

        let file_id = a.body["file"]["id"].as_str().unwrap();
        let deleted = app
            .delete_with_token(&routes::container_file(&id, file_id), &token)
            .await;
        assert_eq!(deleted.status, 200, "{}", deleted.text);

        let container = container_row(&app, &id).await;
        assert_eq!(container.files_count, 1);
        assert_eq!(container.total_size, 700);

        let list = app
            .get_with_token(&routes::container_files(&id), &token)
            .await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(list.body["pagination"]["total"], 1);

        // Soft-deleted files are gone from every read path.
        let again = app
            .delete_with_token(&routes::container_file(&id, file_id), &token)
            .await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn recalculate_repairs_drifted_counters() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("nia", "standard").await;
        let id = app.create_container(&token, "drift").await;

        insert_file_row(&app, &id, "out-of-band.bin", 4096).await;

        let res = app
            .post_with_token(&routes::container_recalculate(&id), &json!({}), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["previous_files_count"], 0);
        assert_eq!(res.body["files_count"], 1);
        assert_eq!(res.body["total_size"], 4096);
        assert_eq!(res.body["corrected"], true);

        let second = app
            .post_with_token(&routes::container_recalculate(&id), &json!({}), &token)
            .await;
        assert_eq!(second.body["corrected"], false);
    }

    #[tokio::test]
    async fn usage_summary_reports_remaining_quota() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("otto", "standard").await;
        let id = app.create_container(&token, "usage").await;
        app.upload_with_token(&id, "a.bin", vec![0u8; 2048], &token)
            .await;

        let res = app.get_with_token(routes::STORAGE_USAGE, &token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["plan"], "standard");
        assert_eq!(res.body["used_bytes"], 2048);
        assert_eq!(res.body["limit_bytes"], 100 * MB);
        assert_eq!(res.body["remaining_bytes"], 100 * MB - 2048);
        assert_eq!(res.body["active_files"], 1);
        assert_eq!(res.body["containers"], 1);
        assert_eq!(res.body["today"]["files_uploaded"], 1);
    }
}

mod daily_quota {
    use super::*;

    #[tokio::test]
    async fn daily_basis_counts_bytes_uploaded_today() {
        let app = TestApp::spawn_with(|c| c.public_api.quota_basis = QuotaBasis::Daily).await;
        let (user_id, token) = app.create_user("dara", "standard").await;
        let id = app.create_container(&token, "daily").await;

        // Standard plan: 100 MB per day, 95 MB already used.
        storage_usage_daily::ActiveModel {
            user_id: Set(user_id),
            date: Set(Utc::now().date_naive()),
            files_uploaded: Set(19),
            bytes_uploaded: Set(95 * MB),
            files_deleted: Set(0),
            bytes_deleted: Set(0),
            ..Default::default()
        }
        .insert(&app.db)
        .await
        .unwrap();

        let rejected = app
            .upload_with_token(&id, "ten.bin", vec![0u8; (10 * MB) as usize], &token)
            .await;
        assert_eq!(rejected.status, 429, "{}", rejected.text);
        assert_eq!(rejected.body["error_code"], "QUOTA_EXCEEDED");

        let accepted = app
            .upload_with_token(&id, "three.bin", vec![0u8; (3 * MB) as usize], &token)
            .await;
        assert_eq!(accepted.status, 201, "{}", accepted.text);

        let usage = today_usage(&app, user_id).await;
        assert_eq!(usage.bytes_uploaded, 98 * MB);
        assert_eq!(usage.files_uploaded, 20);
    }

    #[tokio::test]
    async fn deletes_are_recorded_in_the_daily_ledger() {
        let app = TestApp::spawn().await;
        let (user_id, token) = app.create_user("dirk", "standard").await;
        let id = app.create_container(&token, "ledger").await;

        let res = app
            .upload_with_token(&id, "gone.txt", b"12345".to_vec(), &token)
            .await;
        let file_id = res.body["file"]["id"].as_str().unwrap().to_string();
        let deleted = app
            .delete_with_token(&routes::container_file(&id, &file_id), &token)
            .await;
        assert_eq!(deleted.status, 200, "{}", deleted.text);

        let usage = today_usage(&app, user_id).await;
        assert_eq!(usage.files_uploaded, 1);
        assert_eq!(usage.bytes_uploaded, 5);
        assert_eq!(usage.files_deleted, 1);
        assert_eq!(usage.bytes_deleted, 5);
    }
}
