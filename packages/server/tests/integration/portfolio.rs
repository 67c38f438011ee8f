use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;

use server::entity::{portfolio_like, portfolio_view};

use crate::common::{TestApp, routes};

mod portfolio_creation {
    use super::*;

    #[tokio::test]
    async fn slugs_are_derived_from_title_and_suffixed_on_collision() {
        let app = TestApp::spawn().await;
        let (_, alice) = app.create_user("alice", "standard").await;
        let (_, bob) = app.create_user("bob", "standard").await;

        let first = app.create_portfolio(&alice, "My Work", true).await;
        let second = app.create_portfolio(&bob, "My Work", true).await;
        let third = app.create_portfolio(&alice, "My  Work!", true).await;

        assert_eq!(first["slug"], "my-work");
        assert_eq!(second["slug"], "my-work-1");
        assert_eq!(third["slug"], "my-work-2");
        assert_eq!(first["url"], "http://my-work.localhost:3000");
        assert_eq!(first["views_count"], 0);
        assert_eq!(first["likes_count"], 0);
    }

    #[tokio::test]
    async fn sixth_portfolio_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("carol", "standard").await;

        for i in 0..5 {
            app.create_portfolio(&token, &format!("Site {i}"), false).await;
        }

        let res = app
            .post_with_token(routes::PORTFOLIOS, &json!({"title": "One too many"}), &token)
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["error_code"], "CONFLICT");

        let list = app.get_with_token(routes::PORTFOLIOS, &token).await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 5);
        assert_eq!(list.body["remaining"], 0);
    }

    #[tokio::test]
    async fn concurrent_creates_respect_the_cap() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("cleo", "standard").await;

        for i in 0..4 {
            app.create_portfolio(&token, &format!("Site {i}"), false).await;
        }

        let left = json!({"title": "Left"});
        let right = json!({"title": "Right"});
        let (a, b) = tokio::join!(
            app.post_with_token(routes::PORTFOLIOS, &left, &token),
            app.post_with_token(routes::PORTFOLIOS, &right, &token),
        );
        let mut statuses = [a.status, b.status];
        statuses.sort();
        assert_eq!(statuses, [201, 409], "{} / {}", a.text, b.text);

        let list = app.get_with_token(routes::PORTFOLIOS, &token).await;
        assert_eq!(list.body["data"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("dave", "standard").await;

        let res = app
            .post_with_token(routes::PORTFOLIOS, &json!({"title": "   "}), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn requires_bearer_token() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(routes::PORTFOLIOS).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["error_code"], "TOKEN_MISSING");
    }
}

mod portfolio_editing {
    use super::*;

    #[tokio::test]
    async fn update_keeps_slug_and_unset_fields() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("erin", "standard").await;
        let created = app.create_portfolio(&token, "Erin's Site", false).await;
        let id = created["id"].as_str().unwrap();

        let res = app
            .put_with_token(
                &routes::portfolio(id),
                &json!({"title": "Renamed", "is_public": true}),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["title"], "Renamed");
        assert_eq!(res.body["slug"], created["slug"]);
        assert_eq!(res.body["html_content"], "<h1>Hello</h1>");
        assert_eq!(res.body["is_public"], true);
    }

    #[tokio::test]
    async fn autosave_touches_only_content() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("frank", "standard").await;
        let created = app.create_portfolio(&token, "Draft", false).await;
        let id = created["id"].as_str().unwrap();

        let res = app
            .patch_with_token(
                &routes::portfolio_autosave(id),
                &json!({"css_content": "body { margin: 0; }"}),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let fetched = app.get_with_token(&routes::portfolio(id), &token).await;
        assert_eq!(fetched.body["css_content"], "body { margin: 0; }");
        assert_eq!(fetched.body["html_content"], "<h1>Hello</h1>");
        assert_eq!(fetched.body["title"], "Draft");
    }

    #[tokio::test]
    async fn other_users_cannot_see_or_edit() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("gina", "standard").await;
        let (_, other) = app.create_user("hank", "standard").await;
        let created = app.create_portfolio(&owner, "Private", false).await;
        let id = created["id"].as_str().unwrap();

        let get = app.get_with_token(&routes::portfolio(id), &other).await;
        assert_eq!(get.status, 404);

        let save = app
            .patch_with_token(
                &routes::portfolio_autosave(id),
                &json!({"html_content": "pwned"}),
                &other,
            )
            .await;
        assert_eq!(save.status, 404);
    }

    #[tokio::test]
    async fn delete_removes_views_and_likes() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("ivan", "standard").await;
        let (_, fan) = app.create_user("jane", "standard").await;
        let created = app.create_portfolio(&owner, "Gone Soon", true).await;
        let id = created["id"].as_str().unwrap();
        let slug = created["slug"].as_str().unwrap();

        let portfolio_id: Uuid = id.parse().unwrap();

        app.get_on_host(&format!("{slug}.folio.test"), "/", "192.0.2.40")
            .await;
        app.get_without_token(&routes::portfolio_by_slug(slug)).await;
        app.post_with_token(&routes::portfolio_like(id), &json!({}), &fan)
            .await;

        let views = portfolio_view::Entity::find()
            .filter(portfolio_view::Column::PortfolioId.eq(portfolio_id));
        let likes = portfolio_like::Entity::find()
            .filter(portfolio_like::Column::PortfolioId.eq(portfolio_id));
        assert_eq!(views.clone().count(&app.db).await.unwrap(), 2);
        assert_eq!(likes.clone().count(&app.db).await.unwrap(), 1);

        let res = app.delete_with_token(&routes::portfolio(id), &owner).await;
        assert_eq!(res.status, 204);

        assert_eq!(views.count(&app.db).await.unwrap(), 0);
        assert_eq!(likes.count(&app.db).await.unwrap(), 0);

        let public = app.get_without_token(&routes::portfolio_by_slug(slug)).await;
        assert_eq!(public.status, 404);

        let page = app
            .get_on_host(&format!("{slug}.folio.test"), "/", "192.0.2.40")
            .await;
        assert_eq!(page.status, 404);
        assert_eq!(page.header("content-type"), Some("text/html; charset=utf-8"));
    }
}

mod likes {
    use super::*;

    #[tokio::test]
    async fn like_toggles_and_counts() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("kate", "standard").await;
        let (_, fan) = app.create_user("liam", "standard").await;
        let created = app.create_portfolio(&owner, "Likeable", true).await;
        let id = created["id"].as_str().unwrap();

        let liked = app
            .post_with_token(&routes::portfolio_like(id), &json!({}), &fan)
            .await;
        assert_eq!(liked.status, 200, "{}", liked.text);
        assert_eq!(liked.body["liked"], true);
        assert_eq!(liked.body["likes_count"], 1);

        let by_owner = app
            .post_with_token(&routes::portfolio_like(id), &json!({}), &owner)
            .await;
        assert_eq!(by_owner.body["likes_count"], 2);

        let unliked = app
            .post_with_token(&routes::portfolio_like(id), &json!({}), &fan)
            .await;
        assert_eq!(unliked.body["liked"], false);
        assert_eq!(unliked.body["likes_count"], 1);
    }

    #[tokio::test]
    async fn private_portfolio_cannot_be_liked_by_others() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("mona", "standard").await;
        let (_, fan) = app.create_user("nick", "standard").await;
        let created = app.create_portfolio(&owner, "Hidden", false).await;
        let id = created["id"].as_str().unwrap();

        let res = app
            .post_with_token(&routes::portfolio_like(id), &json!({}), &fan)
            .await;
        assert_eq!(res.status, 404);
    }
}

mod public_detail {
    use super::*;

    #[tokio::test]
    async fn views_are_deduplicated_per_ip() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("olga", "standard").await;
        let created = app.create_portfolio(&owner, "Popular", true).await;
        let slug = created["slug"].as_str().unwrap();
        let path = routes::portfolio_by_slug(slug);

        let first = app
            .get_with_headers(&path, &[("X-Forwarded-For", "203.0.113.5".into())])
            .await;
        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(first.body["views_count"], 1);
        assert_eq!(first.body["author"], "olga");

        let repeat = app
            .get_with_headers(&path, &[("X-Forwarded-For", "203.0.113.5".into())])
            .await;
        assert_eq!(repeat.body["views_count"], 1);

        let other_ip = app
            .get_with_headers(&path, &[("X-Forwarded-For", "198.51.100.7".into())])
            .await;
        assert_eq!(other_ip.body["views_count"], 2);
    }

    #[tokio::test]
    async fn private_portfolio_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_user("pete", "standard").await;
        let created = app.create_portfolio(&owner, "Secret", false).await;
        let slug = created["slug"].as_str().unwrap();

        let res = app.get_without_token(&routes::portfolio_by_slug(slug)).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["error_code"], "NOT_FOUND");
    }
}
