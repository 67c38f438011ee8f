//! Plan-based storage ceilings and the per-user daily storage ledger.

pub mod plan;

use chrono::{NaiveDate, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, LockType, OnConflict, Query as SeaQuery};
use sea_orm::*;

use crate::config::QuotaBasis;
use crate::entity::{plan_limit, storage_container, storage_usage_daily, stored_file, user};
use crate::error::AppError;
use crate::utils::units::bytes_to_mb;

pub use plan::{PlanTier, plan_limits};

/// Lock the owner's user row until the transaction ends.
///
/// Every count-then-insert capacity check takes this lock first, so two
/// concurrent requests from the same owner cannot both pass a ceiling.
pub async fn lock_owner<C: ConnectionTrait>(conn: &C, user_id: i32) -> Result<(), AppError> {
    user::Entity::find_by_id(user_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Outcome of a capacity check.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub message: String,
}

impl QuotaDecision {
    fn allow(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: message.into(),
        }
    }

    fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
        }
    }

    /// `Ok(())` when allowed, otherwise `QuotaExceeded` with the message.
    pub fn require(self) -> Result<(), AppError> {
        if self.allowed {
            Ok(())
        } else {
            Err(AppError::QuotaExceeded(self.message))
        }
    }
}

/// Byte ceiling check. `limit = None` is unlimited.
pub fn evaluate_storage(used: i64, candidate: i64, limit: Option<i64>) -> QuotaDecision {
    let Some(limit) = limit else {
        return QuotaDecision::allow("Unlimited storage");
    };
    let remaining = std::cmp::Ord::max(limit - used, 0);
    if used.saturating_add(candidate) > limit {
        QuotaDecision::deny(format!(
            "Storage quota exceeded: {} MB of {} MB used, {} MB remaining, file is {} MB",
            bytes_to_mb(used),
            bytes_to_mb(limit),
            bytes_to_mb(remaining),
            bytes_to_mb(candidate)
        ))
    } else {
        QuotaDecision::allow(format!(
            "{} MB remaining",
            bytes_to_mb(remaining - candidate)
        ))
    }
}

/// Per-file ceiling check.
pub fn evaluate_file_size(size: i64, limit: i64) -> QuotaDecision {
    if size > limit {
        QuotaDecision::deny(format!(
            "File is {} MB; the maximum file size is {} MB",
            bytes_to_mb(size),
            bytes_to_mb(limit)
        ))
    } else {
        QuotaDecision::allow("File size within limit")
    }
}

/// Container-count ceiling check. `max = None` is unlimited.
pub fn evaluate_container_count(current: u64, max: Option<i32>) -> QuotaDecision {
    match max {
        Some(max) if current >= std::cmp::Ord::max(max, 0) as u64 => QuotaDecision::deny(format!(
            "Your plan allows at most {max} storage containers"
        )),
        _ => QuotaDecision::allow("Container limit not reached"),
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Upload,
    Delete,
}

/// Inputs and result of the byte-quota decision for one user.
#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub basis: QuotaBasis,
    pub used_bytes: i64,
    pub limit_bytes: Option<i64>,
    pub remaining_bytes: Option<i64>,
    pub active_files: i64,
    pub containers: u64,
    pub today: Option<storage_usage_daily::Model>,
}

pub struct QuotaLedger<'a, C: ConnectionTrait> {
    conn: &'a C,
    basis: QuotaBasis,
}

impl<'a, C: ConnectionTrait> QuotaLedger<'a, C> {
    pub fn new(conn: &'a C, basis: QuotaBasis) -> Self {
        Self { conn, basis }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Sum and count of active file sizes across all of the user's containers.
    async fn active_totals(&self, user_id: i32) -> Result<(i64, i64), DbErr> {
        let totals = stored_file::Entity::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(SUM(size), 0)::BIGINT"), "bytes")
            .column_as(Expr::cust("COUNT(*)::BIGINT"), "files")
            .filter(stored_file::Column::IsActive.eq(true))
            .filter(
                stored_file::Column::ContainerId.in_subquery(
                    SeaQuery::select()
                        .column(storage_container::Column::Id)
                        .from(storage_container::Entity)
                        .and_where(storage_container::Column::OwnerId.eq(user_id))
                        .to_owned(),
                ),
            )
            .into_tuple::<(i64, i64)>()
            .one(self.conn)
            .await?;
        Ok(totals.unwrap_or((0, 0)))
    }

    /// Today's ledger row, if any activity happened today.
    pub async fn today_row(
        &self,
        user_id: i32,
    ) -> Result<Option<storage_usage_daily::Model>, DbErr> {
        storage_usage_daily::Entity::find()
            .filter(storage_usage_daily::Column::UserId.eq(user_id))
            .filter(storage_usage_daily::Column::Date.eq(Self::today()))
            .one(self.conn)
            .await
    }

    /// Bytes counted against the ceiling under the configured basis.
    pub async fn used_bytes(&self, user_id: i32) -> Result<i64, DbErr> {
        match self.basis {
            QuotaBasis::Lifetime => Ok(self.active_totals(user_id).await?.0),
            QuotaBasis::Daily => Ok(self
                .today_row(user_id)
                .await?
                .map(|row| row.bytes_uploaded)
                .unwrap_or(0)),
        }
    }

    /// Whether `size` more bytes fit under the user's plan ceiling.
    pub async fn can_upload(
        &self,
        user_id: i32,
        limits: &plan_limit::Model,
        size: i64,
    ) -> Result<QuotaDecision, DbErr> {
        if limits.storage_limit.is_none() {
            return Ok(evaluate_storage(0, size, None));
        }
        let used = self.used_bytes(user_id).await?;
        Ok(evaluate_storage(used, size, limits.storage_limit))
    }

    /// Whether the user may create another container.
    pub async fn can_create_container(
        &self,
        user_id: i32,
        limits: &plan_limit::Model,
    ) -> Result<QuotaDecision, DbErr> {
        let current = storage_container::Entity::find()
            .filter(storage_container::Column::OwnerId.eq(user_id))
            .count(self.conn)
            .await?;
        Ok(evaluate_container_count(current, limits.max_containers))
    }

    /// Add an upload or delete to today's ledger row.
    pub async fn apply(
        &self,
        user_id: i32,
        kind: UsageKind,
        bytes: i64,
        files: i64,
    ) -> Result<(), DbErr> {
        let today = Self::today();

        storage_usage_daily::Entity::insert(storage_usage_daily::ActiveModel {
            user_id: Set(user_id),
            date: Set(today),
            files_uploaded: Set(0),
            bytes_uploaded: Set(0),
            files_deleted: Set(0),
            bytes_deleted: Set(0),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                storage_usage_daily::Column::UserId,
                storage_usage_daily::Column::Date,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(self.conn)
        .await?;

        let (files_col, bytes_col) = match kind {
            UsageKind::Upload => (
                storage_usage_daily::Column::FilesUploaded,
                storage_usage_daily::Column::BytesUploaded,
            ),
            UsageKind::Delete => (
                storage_usage_daily::Column::FilesDeleted,
                storage_usage_daily::Column::BytesDeleted,
            ),
        };

        storage_usage_daily::Entity::update_many()
            .col_expr(files_col, Expr::col(files_col).add(files))
            .col_expr(bytes_col, Expr::col(bytes_col).add(bytes))
            .filter(storage_usage_daily::Column::UserId.eq(user_id))
            .filter(storage_usage_daily::Column::Date.eq(today))
            .exec(self.conn)
            .await?;

        Ok(())
    }

    pub async fn record_upload(&self, user_id: i32, bytes: i64) -> Result<(), DbErr> {
        self.apply(user_id, UsageKind::Upload, bytes, 1).await
    }

    pub async fn record_delete(&self, user_id: i32, bytes: i64) -> Result<(), DbErr> {
        self.apply(user_id, UsageKind::Delete, bytes, 1).await
    }

    /// Everything the dashboard shows about the user's storage usage.
    pub async fn summary(
        &self,
        user_id: i32,
        limits: &plan_limit::Model,
    ) -> Result<UsageSummary, DbErr> {
        let (active_bytes, active_files) = self.active_totals(user_id).await?;
        let today = self.today_row(user_id).await?;
        let containers = storage_container::Entity::find()
            .filter(storage_container::Column::OwnerId.eq(user_id))
            .count(self.conn)
            .await?;

        let used_bytes = match self.basis {
            QuotaBasis::Lifetime => active_bytes,
            QuotaBasis::Daily => today.as_ref().map(|t| t.bytes_uploaded).unwrap_or(0),
        };

        Ok(UsageSummary {
            basis: self.basis,
            used_bytes,
            limit_bytes: limits.storage_limit,
            remaining_bytes: limits.storage_limit.map(|l| std::cmp::Ord::max(l - used_bytes, 0)),
            active_files,
            containers,
            today,
        })
    }
}
