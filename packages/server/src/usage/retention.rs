use std::time::Duration;

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use tracing::{error, info};

use crate::config::PublicApiConfig;
use crate::entity::api_request_log;

/// Periodically delete request-log rows older than the retention period.
/// Daily aggregates are never pruned.
pub async fn run_log_retention(db: DatabaseConnection, config: PublicApiConfig) {
    let period = Duration::from_secs(config.retention_interval_secs.max(1));

    info!(
        retention_days = config.log_retention_days,
        interval_secs = config.retention_interval_secs,
        "Starting request log retention"
    );

    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        match prune_request_logs(&db, config.log_retention_days).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Pruned expired request logs"),
            Err(e) => error!(error = %e, "Request log pruning failed"),
        }
    }
}

/// Delete log rows created more than `retention_days` ago.
pub async fn prune_request_logs(db: &DatabaseConnection, retention_days: i64) -> Result<u64, DbErr> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);

    let result = api_request_log::Entity::delete_many()
        .filter(api_request_log::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
