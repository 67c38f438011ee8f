//! Per-request logging and per-key daily aggregates for the public API.

pub mod retention;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, OnConflict};
use sea_orm::*;

use crate::entity::{api_request_log, api_usage_daily};

/// Transfer counters a handler attaches to its response as an extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub files_uploaded: i64,
    pub files_downloaded: i64,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
}

impl TransferStats {
    pub fn upload(bytes: i64) -> Self {
        Self {
            files_uploaded: 1,
            bytes_uploaded: bytes,
            ..Self::default()
        }
    }

    pub fn download(bytes: i64) -> Self {
        Self {
            files_downloaded: 1,
            bytes_downloaded: bytes,
            ..Self::default()
        }
    }
}

/// Error text attached to a failed response, for the request log.
#[derive(Debug, Clone)]
pub struct ErrorNote(pub String);

/// One completed request on the public API.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub api_key_id: i32,
    pub method: String,
    pub endpoint: String,
    pub status_code: u16,
    pub duration: Duration,
    pub request_size: i64,
    pub response_size: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error_message: Option<String>,
    pub transfer: TransferStats,
}

impl RequestRecord {
    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }
}

/// Totals over a range of daily rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTotals {
    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    pub files_uploaded: i64,
    pub files_downloaded: i64,
    pub bytes_uploaded: i64,
    pub bytes_downloaded: i64,
    pub average_response_time_ms: i64,
    /// Percentage of successful requests, one decimal. 0 when idle.
    pub success_rate: f64,
    /// Endpoints by hit count, most popular first.
    pub popular_endpoints: Vec<(String, i64)>,
}

/// Number of endpoints reported as most popular.
pub const POPULAR_ENDPOINTS: usize = 5;

/// Fold daily rows into totals.
pub fn summarize(rows: &[api_usage_daily::Model]) -> UsageTotals {
    let mut totals = UsageTotals::default();
    let mut response_time = 0i64;
    let mut hits: HashMap<String, i64> = HashMap::new();

    for row in rows {
        totals.total_requests += row.total_requests;
        totals.successful_requests += row.successful_requests;
        totals.failed_requests += row.failed_requests;
        totals.files_uploaded += row.files_uploaded;
        totals.files_downloaded += row.files_downloaded;
        totals.bytes_uploaded += row.bytes_uploaded;
        totals.bytes_downloaded += row.bytes_downloaded;
        response_time += row.total_response_time_ms;

        if let Some(map) = row.endpoint_hits.as_object() {
            for (endpoint, count) in map {
                *hits.entry(endpoint.clone()).or_default() += count.as_i64().unwrap_or(0);
            }
        }
    }

    if totals.total_requests > 0 {
        totals.average_response_time_ms = response_time / totals.total_requests;
        totals.success_rate = (totals.successful_requests as f64 / totals.total_requests as f64
            * 1000.0)
            .round()
            / 10.0;
    }

    let mut popular: Vec<(String, i64)> = hits.into_iter().collect();
    popular.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    popular.truncate(POPULAR_ENDPOINTS);
    totals.popular_endpoints = popular;

    totals
}

pub struct UsageAggregator<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<C: ConnectionTrait + TransactionTrait> UsageAggregator<'_, C> {
    /// Append the log row and fold the request into today's aggregate.
    ///
    /// Every counter moves through column arithmetic in a single UPDATE, so
    /// concurrent requests against the same key never lose increments.
    pub async fn record(&self, record: &RequestRecord) -> Result<(), DbErr> {
        let now = Utc::now();
        let today = now.date_naive();
        let elapsed_ms = record.duration.as_millis().min(i64::MAX as u128) as i64;

        let txn = self.conn.begin().await?;

        api_request_log::ActiveModel {
            api_key_id: Set(record.api_key_id),
            method: Set(record.method.clone()),
            endpoint: Set(record.endpoint.clone()),
            status_code: Set(i32::from(record.status_code)),
            response_time_ms: Set(elapsed_ms),
            request_size: Set(record.request_size),
            response_size: Set(record.response_size),
            ip_address: Set(record.ip_address.clone()),
            user_agent: Set(record.user_agent.clone()),
            error_message: Set(record.error_message.clone()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        api_usage_daily::Entity::insert(api_usage_daily::ActiveModel {
            api_key_id: Set(record.api_key_id),
            date: Set(today),
            total_requests: Set(0),
            successful_requests: Set(0),
            failed_requests: Set(0),
            files_uploaded: Set(0),
            files_downloaded: Set(0),
            bytes_uploaded: Set(0),
            bytes_downloaded: Set(0),
            total_response_time_ms: Set(0),
            average_response_time_ms: Set(0),
            endpoint_hits: Set(serde_json::json!({})),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                api_usage_daily::Column::ApiKeyId,
                api_usage_daily::Column::Date,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        let (ok, failed) = if record.is_success() { (1, 0) } else { (0, 1) };
        let t = record.transfer;

        api_usage_daily::Entity::update_many()
            .col_expr(
                api_usage_daily::Column::TotalRequests,
                Expr::col(api_usage_daily::Column::TotalRequests).add(1),
            )
            .col_expr(
                api_usage_daily::Column::SuccessfulRequests,
                Expr::col(api_usage_daily::Column::SuccessfulRequests).add(ok),
            )
            .col_expr(
                api_usage_daily::Column::FailedRequests,
                Expr::col(api_usage_daily::Column::FailedRequests).add(failed),
            )
            .col_expr(
                api_usage_daily::Column::FilesUploaded,
                Expr::col(api_usage_daily::Column::FilesUploaded).add(t.files_uploaded),
            )
            .col_expr(
                api_usage_daily::Column::FilesDownloaded,
                Expr::col(api_usage_daily::Column::FilesDownloaded).add(t.files_downloaded),
            )
            .col_expr(
                api_usage_daily::Column::BytesUploaded,
                Expr::col(api_usage_daily::Column::BytesUploaded).add(t.bytes_uploaded),
            )
            .col_expr(
                api_usage_daily::Column::BytesDownloaded,
                Expr::col(api_usage_daily::Column::BytesDownloaded).add(t.bytes_downloaded),
            )
            .col_expr(
                api_usage_daily::Column::TotalResponseTimeMs,
                Expr::col(api_usage_daily::Column::TotalResponseTimeMs).add(elapsed_ms),
            )
            // SET sees the pre-update row, so both sides include this request.
            .col_expr(
                api_usage_daily::Column::AverageResponseTimeMs,
                Expr::cust_with_values(
                    "(total_response_time_ms + ?) / (total_requests + 1)",
                    [elapsed_ms],
                ),
            )
            .col_expr(
                api_usage_daily::Column::EndpointHits,
                Expr::cust_with_values(
                    "jsonb_set(endpoint_hits, ARRAY[?]::text[], \
                     to_jsonb(COALESCE((endpoint_hits ->> ?)::bigint, 0) + 1), true)",
                    [record.endpoint.clone(), record.endpoint.clone()],
                ),
            )
            .filter(api_usage_daily::Column::ApiKeyId.eq(record.api_key_id))
            .filter(api_usage_daily::Column::Date.eq(today))
            .exec(&txn)
            .await?;

        txn.commit().await
    }
}

impl<'a, C: ConnectionTrait> UsageAggregator<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Daily rows for a key from `since` onwards, newest first.
    pub async fn daily(
        &self,
        api_key_id: i32,
        since: NaiveDate,
    ) -> Result<Vec<api_usage_daily::Model>, DbErr> {
        api_usage_daily::Entity::find()
            .filter(api_usage_daily::Column::ApiKeyId.eq(api_key_id))
            .filter(api_usage_daily::Column::Date.gte(since))
            .order_by_desc(api_usage_daily::Column::Date)
            .all(self.conn)
            .await
    }

    /// Requests counted today for a key.
    pub async fn requests_today(&self, api_key_id: i32) -> Result<i64, DbErr> {
        Ok(api_usage_daily::Entity::find()
            .filter(api_usage_daily::Column::ApiKeyId.eq(api_key_id))
            .filter(api_usage_daily::Column::Date.eq(Utc::now().date_naive()))
            .one(self.conn)
            .await?
            .map(|row| row.total_requests)
            .unwrap_or(0))
    }

    /// Most recent log rows for a key.
    pub async fn recent_requests(
        &self,
        api_key_id: i32,
        limit: u64,
    ) -> Result<Vec<api_request_log::Model>, DbErr> {
        api_request_log::Entity::find()
            .filter(api_request_log::Column::ApiKeyId.eq(api_key_id))
            .order_by_desc(api_request_log::Column::CreatedAt)
            .limit(limit)
            .all(self.conn)
            .await
    }
}
