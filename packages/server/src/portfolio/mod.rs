pub mod views;

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, OnConflict};
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{portfolio, portfolio_like, portfolio_view, user};
use crate::error::AppError;
use crate::quota::lock_owner;
use crate::utils::slug::{next_available, slugify};

pub use views::record_view;

/// Insert attempts before giving up on a slug race.
const SLUG_ATTEMPTS: usize = 3;

/// Fields for a new portfolio.
#[derive(Debug, Clone, Default)]
pub struct NewPortfolio {
    pub title: String,
    pub description: String,
    pub html_content: String,
    pub css_content: String,
    pub js_content: String,
    pub is_public: bool,
    pub tags: Vec<String>,
}

pub struct PortfolioService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PortfolioService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Smallest free slug derived from `title`: `foo`, then `foo-1`, `foo-2`, ...
    pub async fn unique_slug(&self, title: &str) -> Result<String, DbErr> {
        let mut base = slugify(title);
        if base.is_empty() {
            base = "portfolio".to_string();
        }

        let taken: HashSet<String> = portfolio::Entity::find()
            .select_only()
            .column(portfolio::Column::Slug)
            .filter(portfolio::Column::Slug.starts_with(&base))
            .into_tuple::<String>()
            .all(self.conn)
            .await?
            .into_iter()
            .collect();

        Ok(next_available(&base, &taken))
    }

    /// Portfolio owned by `owner_id`, or 404.
    pub async fn find_owned(&self, owner_id: i32, id: Uuid) -> Result<portfolio::Model, AppError> {
        portfolio::Entity::find_by_id(id)
            .filter(portfolio::Column::OwnerId.eq(owner_id))
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Portfolio not found".into()))
    }

    /// Published portfolio and its owner's username, by slug.
    pub async fn find_published(
        &self,
        slug: &str,
    ) -> Result<Option<(portfolio::Model, String)>, DbErr> {
        let Some(found) = portfolio::Entity::find()
            .filter(portfolio::Column::Slug.eq(slug))
            .filter(portfolio::Column::IsPublic.eq(true))
            .one(self.conn)
            .await?
        else {
            return Ok(None);
        };

        let owner_name = user::Entity::find_by_id(found.owner_id)
            .one(self.conn)
            .await?
            .map(|u| u.username)
            .unwrap_or_default();

        Ok(Some((found, owner_name)))
    }
}

impl<'a, C: ConnectionTrait + TransactionTrait> PortfolioService<'a, C> {
    /// Create a portfolio for `owner_id`, enforcing the per-owner cap.
    ///
    /// The owner row stays locked until commit so concurrent creates see each
    /// other's inserts when counting.
    pub async fn create(
        &self,
        owner_id: i32,
        input: NewPortfolio,
        max_per_owner: u64,
    ) -> Result<portfolio::Model, AppError> {
        let txn = self.conn.begin().await?;
        lock_owner(&txn, owner_id).await?;

        let owned = portfolio::Entity::find()
            .filter(portfolio::Column::OwnerId.eq(owner_id))
            .count(&txn)
            .await?;
        if owned >= max_per_owner {
            return Err(AppError::Conflict(format!(
                "You can have at most {max_per_owner} portfolios"
            )));
        }

        let now = Utc::now();
        let mut last_err = None;
        for _ in 0..SLUG_ATTEMPTS {
            let slug = PortfolioService::new(&txn).unique_slug(&input.title).await?;
            let model = portfolio::ActiveModel {
                id: Set(Uuid::new_v4()),
                owner_id: Set(owner_id),
                slug: Set(slug),
                title: Set(input.title.clone()),
                description: Set(input.description.clone()),
                html_content: Set(input.html_content.clone()),
                css_content: Set(input.css_content.clone()),
                js_content: Set(input.js_content.clone()),
                is_public: Set(input.is_public),
                tags: Set(serde_json::json!(input.tags)),
                views_count: Set(0),
                likes_count: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
            };

            // Savepoint, so a slug collision does not abort the outer transaction.
            let attempt = txn.begin().await?;
            match model.insert(&attempt).await {
                Ok(created) => {
                    attempt.commit().await?;
                    txn.commit().await?;
                    return Ok(created);
                }
                // Another owner took the slug between lookup and insert.
                Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    attempt.rollback().await?;
                    last_err = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err
            .map(AppError::from)
            .unwrap_or_else(|| AppError::Internal("slug allocation failed".into())))
    }
}

impl PortfolioService<'_, DatabaseConnection> {
    /// Delete a portfolio together with its view and like records.
    pub async fn delete(&self, owner_id: i32, id: Uuid) -> Result<(), AppError> {
        let txn = self.conn.begin().await?;

        let found = portfolio::Entity::find_by_id(id)
            .filter(portfolio::Column::OwnerId.eq(owner_id))
            .lock(sea_orm::sea_query::LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Portfolio not found".into()))?;

        portfolio_view::Entity::delete_many()
            .filter(portfolio_view::Column::PortfolioId.eq(found.id))
            .exec(&txn)
            .await?;
        portfolio_like::Entity::delete_many()
            .filter(portfolio_like::Column::PortfolioId.eq(found.id))
            .exec(&txn)
            .await?;
        portfolio::Entity::delete_by_id(found.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }

    /// Like or unlike. Returns the new state and the refreshed counter.
    pub async fn toggle_like(&self, portfolio_id: Uuid, user_id: i32) -> Result<(bool, i64), AppError> {
        let txn = self.conn.begin().await?;

        let removed = portfolio_like::Entity::delete_many()
            .filter(portfolio_like::Column::PortfolioId.eq(portfolio_id))
            .filter(portfolio_like::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?
            .rows_affected;

        let (liked, delta) = if removed > 0 {
            (false, -1)
        } else {
            let inserted = portfolio_like::Entity::insert(portfolio_like::ActiveModel {
                portfolio_id: Set(portfolio_id),
                user_id: Set(user_id),
                created_at: Set(Utc::now()),
            })
            .on_conflict(
                OnConflict::columns([
                    portfolio_like::Column::PortfolioId,
                    portfolio_like::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
            (true, if inserted > 0 { 1 } else { 0 })
        };

        if delta != 0 {
            portfolio::Entity::update_many()
                .col_expr(
                    portfolio::Column::LikesCount,
                    Expr::col(portfolio::Column::LikesCount).add(delta),
                )
                .filter(portfolio::Column::Id.eq(portfolio_id))
                .exec(&txn)
                .await?;
        }

        let likes = portfolio::Entity::find_by_id(portfolio_id)
            .one(&txn)
            .await?
            .map(|p| p.likes_count)
            .unwrap_or_default();

        txn.commit().await?;
        Ok((liked, likes))
    }
}
