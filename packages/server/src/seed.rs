use sea_orm::sea_query::{Index, IndexCreateStatement, OnConflict, PostgresQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::{
    api_request_log, api_usage_daily, plan_limit, portfolio_view, storage_container,
    storage_usage_daily, stored_file,
};
use crate::quota::PlanTier;

/// Insert the built-in limits for every plan tier. Existing rows are left
/// untouched so administrator edits survive restarts.
pub async fn seed_plan_limits(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut inserted = 0u64;
    for tier in PlanTier::ALL {
        let model: plan_limit::ActiveModel = tier.default_limits().into();

        let result = plan_limit::Entity::insert(model)
            .on_conflict(
                OnConflict::column(plan_limit::Column::Plan)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(rows) => inserted += rows,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if inserted > 0 {
        info!("Seeded {} plan limit rows", inserted);
    }

    Ok(())
}

async fn create_index(
    db: &DatabaseConnection,
    name: &str,
    stmt: IndexCreateStatement,
) -> Result<(), DbErr> {
    let sql = stmt.to_string(PostgresQueryBuilder);
    db.execute_unprepared(&sql).await?;
    info!("Ensured index {} exists", name);
    Ok(())
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite indexes, so we create them
/// manually on startup. Several upserts rely on the unique ones for their
/// `ON CONFLICT` target, so failing to create one of those is fatal; only the
/// lookup index is allowed to fail with a warning.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // One dedupe row per viewer IP and portfolio.
    create_index(
        db,
        "uq_portfolio_view_portfolio_ip",
        Index::create()
            .if_not_exists()
            .unique()
            .name("uq_portfolio_view_portfolio_ip")
            .table(portfolio_view::Entity)
            .col(portfolio_view::Column::PortfolioId)
            .col(portfolio_view::Column::IpAddress)
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        "uq_storage_container_owner_name",
        Index::create()
            .if_not_exists()
            .unique()
            .name("uq_storage_container_owner_name")
            .table(storage_container::Entity)
            .col(storage_container::Column::OwnerId)
            .col(storage_container::Column::Name)
            .to_owned(),
    )
    .await?;

    // Covers soft-deleted rows too: their names stay reserved.
    create_index(
        db,
        "uq_stored_file_container_filename",
        Index::create()
            .if_not_exists()
            .unique()
            .name("uq_stored_file_container_filename")
            .table(stored_file::Entity)
            .col(stored_file::Column::ContainerId)
            .col(stored_file::Column::Filename)
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        "uq_api_usage_daily_key_date",
        Index::create()
            .if_not_exists()
            .unique()
            .name("uq_api_usage_daily_key_date")
            .table(api_usage_daily::Entity)
            .col(api_usage_daily::Column::ApiKeyId)
            .col(api_usage_daily::Column::Date)
            .to_owned(),
    )
    .await?;

    create_index(
        db,
        "uq_storage_usage_daily_user_date",
        Index::create()
            .if_not_exists()
            .unique()
            .name("uq_storage_usage_daily_user_date")
            .table(storage_usage_daily::Entity)
            .col(storage_usage_daily::Column::UserId)
            .col(storage_usage_daily::Column::Date)
            .to_owned(),
    )
    .await?;

    // Rate limiting scans the trailing hour of a key's log:
    // SELECT COUNT(*) FROM api_request_log WHERE api_key_id = ? AND created_at >= ?
    if let Err(e) = create_index(
        db,
        "idx_api_request_log_key_created",
        Index::create()
            .if_not_exists()
            .name("idx_api_request_log_key_created")
            .table(api_request_log::Entity)
            .col(api_request_log::Column::ApiKeyId)
            .col(api_request_log::Column::CreatedAt)
            .to_owned(),
    )
    .await
    {
        warn!("Failed to create index idx_api_request_log_key_created: {}", e);
    }

    Ok(())
}
