use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::portfolio;
use crate::error::AppError;

use super::shared::{validate_tags, validate_title};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreatePortfolioRequest {
    #[schema(example = "Alice's Portfolio")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub html_content: String,
    #[serde(default)]
    pub css_content: String,
    #[serde(default)]
    pub js_content: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePortfolioRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(&self.title)?;
        validate_tags(&self.tags)
    }
}

/// Full update. Absent fields keep their current value; the slug never changes.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdatePortfolioRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub html_content: Option<String>,
    pub css_content: Option<String>,
    pub js_content: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl UpdatePortfolioRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        Ok(())
    }
}

/// Editor autosave: only the three content blobs.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct AutosaveRequest {
    pub html_content: Option<String>,
    pub css_content: Option<String>,
    pub js_content: Option<String>,
}

impl AutosaveRequest {
    pub fn is_empty(&self) -> bool {
        self.html_content.is_none() && self.css_content.is_none() && self.js_content.is_none()
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PortfolioResponse {
    pub id: Uuid,
    #[schema(example = "alice-s-portfolio")]
    pub slug: String,
    /// Public address on the tenant subdomain.
    #[schema(example = "http://alice-s-portfolio.localhost:3000")]
    pub url: String,
    pub title: String,
    pub description: String,
    pub html_content: String,
    pub css_content: String,
    pub js_content: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub views_count: i64,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioResponse {
    pub fn new(model: portfolio::Model, url: String) -> Self {
        let tags = model.tag_list();
        Self {
            id: model.id,
            slug: model.slug,
            url,
            title: model.title,
            description: model.description,
            html_content: model.html_content,
            css_content: model.css_content,
            js_content: model.js_content,
            is_public: model.is_public,
            tags,
            views_count: model.views_count,
            likes_count: model.likes_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// List entry without the content blobs.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PortfolioSummary {
    pub id: Uuid,
    pub slug: String,
    pub url: String,
    pub title: String,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub views_count: i64,
    pub likes_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioSummary {
    pub fn new(model: portfolio::Model, url: String) -> Self {
        let tags = model.tag_list();
        Self {
            id: model.id,
            slug: model.slug,
            url,
            title: model.title,
            is_public: model.is_public,
            tags,
            views_count: model.views_count,
            likes_count: model.likes_count,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct PortfolioListResponse {
    pub data: Vec<PortfolioSummary>,
    /// Portfolios the owner may still create.
    pub remaining: u64,
}

/// Published portfolio as seen by visitors.
#[derive(Serialize, utoipa::ToSchema)]
pub struct PublicPortfolioResponse {
    pub id: Uuid,
    pub slug: String,
    pub url: String,
    pub title: String,
    pub description: String,
    #[schema(example = "alice")]
    pub author: String,
    pub html_content: String,
    pub css_content: String,
    pub js_content: String,
    pub tags: Vec<String>,
    pub views_count: i64,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
}

impl PublicPortfolioResponse {
    pub fn new(model: portfolio::Model, author: String, url: String) -> Self {
        let tags = model.tag_list();
        Self {
            id: model.id,
            slug: model.slug,
            url,
            title: model.title,
            description: model.description,
            author,
            html_content: model.html_content,
            css_content: model.css_content,
            js_content: model.js_content,
            tags,
            views_count: model.views_count,
            likes_count: model.likes_count,
            created_at: model.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LikeResponse {
    /// Whether the caller now likes the portfolio.
    pub liked: bool,
    pub likes_count: i64,
}
