use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;

use server::entity::{api_request_log, api_usage_daily, public_api_key};

use crate::common::{ApiCredentials, TestApp, routes};

async fn key_id(app: &TestApp, creds: &ApiCredentials) -> i32 {
    public_api_key::Entity::find()
        .filter(public_api_key::Column::Key.eq(creds.key.as_str()))
        .one(&app.db)
        .await
        .unwrap()
        .expect("key should exist")
        .id
}

async fn log_count(app: &TestApp, api_key_id: i32) -> u64 {
    api_request_log::Entity::find()
        .filter(api_request_log::Column::ApiKeyId.eq(api_key_id))
        .count(&app.db)
        .await
        .unwrap()
}

/// Insert a log row as if a request had been served `age` ago.
async fn insert_log(app: &TestApp, api_key_id: i32, age: Duration) {
    api_request_log::ActiveModel {
        api_key_id: Set(api_key_id),
        method: Set("GET".to_string()),
        endpoint: Set("/api/public/v1/files".to_string()),
        status_code: Set(200),
        response_time_ms: Set(5),
        request_size: Set(0),
        response_size: Set(0),
        ip_address: Set(None),
        user_agent: Set(None),
        error_message: Set(None),
        created_at: Set(Utc::now() - age),
        ..Default::default()
    }
    .insert(&app.db)
    .await
    .expect("Failed to insert log row");
}

async fn setup(app: &TestApp, username: &str, key_body: serde_json::Value) -> (String, String, ApiCredentials) {
    let (_, token) = app.create_user(username, "standard").await;
    let container = app.create_container(&token, "public").await;
    let creds = app.create_api_key(&token, &container, key_body).await;
    (token, container, creds)
}

mod authentication {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(routes::PUBLIC_FILES).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["error_code"], "API_KEY_MISSING");
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .get_with_headers(routes::PUBLIC_FILES, &[("X-API-Key", "pk_nope".into())])
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["error_code"], "API_KEY_INVALID");
    }

    #[tokio::test]
    async fn valid_signature_is_accepted() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "alice", json!({})).await;

        let headers = creds.signed_headers(
            "GET",
            routes::PUBLIC_FILES,
            Utc::now().timestamp(),
            &creds.secret,
        );
        let res = app.get_with_headers(routes::PUBLIC_FILES, &headers).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn signature_with_wrong_secret_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "bob", json!({})).await;

        let headers = creds.signed_headers(
            "GET",
            routes::PUBLIC_FILES,
            Utc::now().timestamp(),
            "sk_not_the_secret",
        );
        let res = app.get_with_headers(routes::PUBLIC_FILES, &headers).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["error_code"], "SIGNATURE_INVALID");
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "cara", json!({})).await;

        let stale = Utc::now().timestamp() - 301;
        let headers = creds.signed_headers("GET", routes::PUBLIC_FILES, stale, &creds.secret);
        let res = app.get_with_headers(routes::PUBLIC_FILES, &headers).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["error_code"], "SIGNATURE_INVALID");
    }

    #[tokio::test]
    async fn signature_can_be_required() {
        let app = TestApp::spawn_with(|c| c.public_api.require_signature = true).await;
        let (_, _, creds) = setup(&app, "dina", json!({})).await;

        let unsigned = app
            .get_with_headers(routes::PUBLIC_FILES, &creds.headers())
            .await;
        assert_eq!(unsigned.status, 403);

        let headers = creds.signed_headers(
            "GET",
            routes::PUBLIC_FILES,
            Utc::now().timestamp(),
            &creds.secret,
        );
        let signed = app.get_with_headers(routes::PUBLIC_FILES, &headers).await;
        assert_eq!(signed.status, 200, "{}", signed.text);
    }

    #[tokio::test]
    async fn bearer_token_with_container_header_is_accepted_and_not_logged() {
        let app = TestApp::spawn().await;
        let (token, container, creds) = setup(&app, "egon", json!({})).await;

        let res = app
            .get_with_headers(
                routes::PUBLIC_FILES,
                &[
                    ("Authorization", format!("Bearer {token}")),
                    ("X-Container-Id", container.clone()),
                ],
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let id = key_id(&app, &creds).await;
        assert_eq!(log_count(&app, id).await, 0);
    }
}

mod rate_limiting {
    use super::*;

    #[tokio::test]
    async fn key_over_hourly_limit_gets_429_with_retry_after() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "fred", json!({"rate_limit": 3})).await;

        for _ in 0..3 {
            let res = app
                .get_with_headers(routes::PUBLIC_FILES, &creds.headers())
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
        }

        let limited = app
            .get_with_headers(routes::PUBLIC_FILES, &creds.headers())
            .await;
        assert_eq!(limited.status, 429);
        assert_eq!(limited.body["error_code"], "RATE_LIMITED");
        let retry: u64 = limited.header("retry-after").unwrap().parse().unwrap();
        assert!((1..=3600).contains(&retry));

        // Rejected requests are not logged, so the window does not grow.
        let id = key_id(&app, &creds).await;
        assert_eq!(log_count(&app, id).await, 3);
    }

    #[tokio::test]
    async fn requests_older_than_an_hour_do_not_count() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "gwen", json!({"rate_limit": 2})).await;
        let id = key_id(&app, &creds).await;

        insert_log(&app, id, Duration::minutes(61)).await;
        insert_log(&app, id, Duration::minutes(61)).await;
        insert_log(&app, id, Duration::minutes(30)).await;

        let res = app
            .get_with_headers(routes::PUBLIC_FILES, &creds.headers())
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let limited = app
            .get_with_headers(routes::PUBLIC_FILES, &creds.headers())
            .await;
        assert_eq!(limited.status, 429);
    }
}

mod operations {
    use super::*;

    #[tokio::test]
    async fn upload_list_download_delete() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "hugo", json!({})).await;

        let up = app
            .upload(
                routes::PUBLIC_UPLOAD,
                "data.csv",
                b"a,b\n1,2\n".to_vec(),
                None,
                &creds.headers(),
            )
            .await;
        assert_eq!(up.status, 201, "{}", up.text);
        let file_id = up.body["file"]["id"].as_str().unwrap().to_string();

        let list = app
            .get_with_headers(routes::PUBLIC_FILES, &creds.headers())
            .await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 1);

        let meta = app
            .get_with_headers(&routes::public_file(&file_id), &creds.headers())
            .await;
        assert_eq!(meta.status, 200);
        assert_eq!(meta.body["file"]["filename"], "data.csv");
        assert!(meta.body["url"].as_str().is_some());

        let download = app
            .get_with_headers(&routes::public_download(&file_id), &creds.headers())
            .await;
        assert_eq!(download.status, 200);
        assert_eq!(download.text, "a,b\n1,2\n");

        let deleted = app
            .client
            .delete(app.url(&routes::public_file(&file_id)))
            .header("X-API-Key", creds.key.as_str())
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), 200);

        let id = key_id(&app, &creds).await;
        let today = api_usage_daily::Entity::find()
            .filter(api_usage_daily::Column::ApiKeyId.eq(id))
            .one(&app.db)
            .await
            .unwrap()
            .expect("daily row should exist");
        assert_eq!(today.total_requests, 5);
        assert_eq!(today.files_uploaded, 1);
        assert_eq!(today.files_downloaded, 1);
        assert_eq!(today.bytes_uploaded, 8);
        assert_eq!(today.bytes_downloaded, 8);
    }

    #[tokio::test]
    async fn missing_permission_is_denied() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(
            &app,
            "iris",
            json!({"permissions": {"read": true, "write": false, "delete": false}}),
        )
        .await;

        let up = app
            .upload(
                routes::PUBLIC_UPLOAD,
                "x.txt",
                b"x".to_vec(),
                None,
                &creds.headers(),
            )
            .await;
        assert_eq!(up.status, 403);
        assert_eq!(up.body["error_code"], "PERMISSION_DENIED");

        // Permission failures happen after authentication and are logged.
        let id = key_id(&app, &creds).await;
        let failed = api_request_log::Entity::find()
            .filter(api_request_log::Column::ApiKeyId.eq(id))
            .one(&app.db)
            .await
            .unwrap()
            .expect("request should be logged");
        assert_eq!(failed.status_code, 403);
        assert!(failed.error_message.unwrap().contains("write"));
    }

    #[tokio::test]
    async fn key_max_file_size_overrides_plan() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "jack", json!({"max_file_size": 10})).await;

        let res = app
            .upload(
                routes::PUBLIC_UPLOAD,
                "big.txt",
                vec![b'a'; 11],
                None,
                &creds.headers(),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
    }

    #[tokio::test]
    async fn key_max_file_size_cannot_exceed_plan() {
        let app = TestApp::spawn().await;
        // Standard plan ceiling is 25 MB; the key asks for 200 MB.
        let (_, _, creds) =
            setup(&app, "jules", json!({"max_file_size": 200 * 1024 * 1024})).await;

        let res = app
            .upload(
                routes::PUBLIC_UPLOAD,
                "large.bin",
                vec![0u8; 25 * 1024 * 1024 + 1],
                None,
                &creds.headers(),
            )
            .await;
        assert_eq!(res.status, 400, "{}", res.text);
        assert_eq!(res.body["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn usage_endpoint_reports_own_key() {
        let app = TestApp::spawn().await;
        let (_, _, creds) = setup(&app, "kira", json!({})).await;

        app.get_with_headers(routes::PUBLIC_FILES, &creds.headers())
            .await;
        let res = app
            .get_with_headers(routes::PUBLIC_USAGE, &creds.headers())
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["total_requests"], 1);
        assert_eq!(res.body["rate_limit"], 100);
    }
}
