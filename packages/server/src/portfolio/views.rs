use chrono::{Duration, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, OnConflict};
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{portfolio, portfolio_view};

/// Count a view of `portfolio_id` from `ip` unless that IP was already
/// counted inside `window`. Returns whether the counter moved.
///
/// The view row is unique on `(portfolio_id, ip_address)`; both the insert and
/// the window refresh are single statements, so two concurrent requests from
/// the same IP cannot both count.
pub async fn record_view(
    db: &DatabaseConnection,
    portfolio_id: Uuid,
    ip: &str,
    user_id: Option<i32>,
    window: Duration,
) -> Result<bool, DbErr> {
    let now = Utc::now();
    let txn = db.begin().await?;

    let inserted = portfolio_view::Entity::insert(portfolio_view::ActiveModel {
        portfolio_id: Set(portfolio_id),
        ip_address: Set(ip.to_string()),
        user_id: Set(user_id),
        first_viewed_at: Set(now),
        counted_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            portfolio_view::Column::PortfolioId,
            portfolio_view::Column::IpAddress,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    let counted = if inserted > 0 {
        true
    } else {
        let mut refresh = portfolio_view::Entity::update_many()
            .col_expr(portfolio_view::Column::CountedAt, Expr::value(now))
            .filter(portfolio_view::Column::PortfolioId.eq(portfolio_id))
            .filter(portfolio_view::Column::IpAddress.eq(ip))
            .filter(portfolio_view::Column::CountedAt.lt(now - window));
        if user_id.is_some() {
            refresh = refresh.col_expr(portfolio_view::Column::UserId, Expr::value(user_id));
        }
        refresh.exec(&txn).await?.rows_affected > 0
    };

    if counted {
        portfolio::Entity::update_many()
            .col_expr(
                portfolio::Column::ViewsCount,
                Expr::col(portfolio::Column::ViewsCount).add(1),
            )
            .filter(portfolio::Column::Id.eq(portfolio_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(counted)
}
