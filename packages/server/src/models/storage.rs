use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::QuotaBasis;
use crate::entity::{plan_limit, storage_container, storage_usage_daily, stored_file};
use crate::error::AppError;
use crate::quota::UsageSummary;
use crate::utils::units::{bytes_to_mb, usage_percentage};

use super::shared::Pagination;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateContainerRequest {
    #[schema(example = "invoices")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateContainerRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::Validation(
                "Container name must be 1-100 characters".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ContainerResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Public lookup key for the container. Not a credential.
    pub container_key: String,
    pub files_count: i64,
    /// Bytes.
    pub total_size: i64,
    #[schema(example = 12.5)]
    pub total_size_mb: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<storage_container::Model> for ContainerResponse {
    fn from(model: storage_container::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            container_key: model.container_key,
            files_count: model.files_count,
            total_size: model.total_size,
            total_size_mb: bytes_to_mb(model.total_size),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ContainerListResponse {
    pub data: Vec<ContainerResponse>,
}

/// File summary returned by uploads.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadedFile {
    pub id: Uuid,
    #[schema(example = "report_1.pdf")]
    pub filename: String,
    #[schema(example = 2.4)]
    pub size_mb: f64,
    #[schema(example = "application/pdf")]
    pub mime_type: String,
    pub is_public: bool,
    /// Presigned download URL; `null` if one could not be issued right away.
    pub url: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    #[schema(example = true)]
    pub success: bool,
    pub file: UploadedFile,
    #[schema(example = "File uploaded successfully")]
    pub message: String,
}

impl UploadResponse {
    pub fn new(model: stored_file::Model, url: Option<String>) -> Self {
        let message = if model.filename == model.original_filename {
            "File uploaded successfully".to_string()
        } else {
            format!("File uploaded successfully as {}", model.filename)
        };
        Self {
            success: true,
            file: UploadedFile {
                id: model.id,
                filename: model.filename,
                size_mb: bytes_to_mb(model.size),
                mime_type: model.mime_type,
                is_public: model.is_public,
                url,
            },
            message,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    pub container_id: Uuid,
    pub filename: String,
    pub original_filename: String,
    /// Bytes.
    pub size: i64,
    pub size_mb: f64,
    pub mime_type: String,
    pub is_public: bool,
    /// Hex SHA-256 of the stored bytes.
    pub checksum: Option<String>,
    pub upload_session: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<stored_file::Model> for FileResponse {
    fn from(model: stored_file::Model) -> Self {
        Self {
            id: model.id,
            container_id: model.container_id,
            filename: model.filename,
            original_filename: model.original_filename,
            size: model.size,
            size_mb: bytes_to_mb(model.size),
            mime_type: model.mime_type,
            is_public: model.is_public,
            checksum: model.checksum,
            upload_session: model.upload_session,
            created_at: model.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub success: bool,
    pub data: Vec<FileResponse>,
    pub pagination: Pagination,
}

/// File metadata plus a time-limited download URL.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileUrlResponse {
    pub success: bool,
    pub file: FileResponse,
    pub url: String,
    /// Seconds until `url` stops working.
    #[schema(example = 3600)]
    pub expires_in: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RecalculateResponse {
    pub success: bool,
    pub files_count: i64,
    pub total_size: i64,
    pub previous_files_count: i64,
    pub previous_total_size: i64,
    /// Whether the cached counters had drifted.
    pub corrected: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DailyStorageUsage {
    pub date: NaiveDate,
    pub files_uploaded: i64,
    pub bytes_uploaded: i64,
    pub files_deleted: i64,
    pub bytes_deleted: i64,
}

impl From<storage_usage_daily::Model> for DailyStorageUsage {
    fn from(model: storage_usage_daily::Model) -> Self {
        Self {
            date: model.date,
            files_uploaded: model.files_uploaded,
            bytes_uploaded: model.bytes_uploaded,
            files_deleted: model.files_deleted,
            bytes_deleted: model.bytes_deleted,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageUsageResponse {
    pub success: bool,
    #[schema(example = "standard")]
    pub plan: String,
    /// `lifetime` or `daily`.
    #[schema(example = "lifetime")]
    pub quota_basis: String,
    pub used_bytes: i64,
    pub used_mb: f64,
    /// `null` when unlimited.
    pub limit_bytes: Option<i64>,
    pub limit_mb: Option<f64>,
    pub remaining_bytes: Option<i64>,
    pub usage_percentage: Option<f64>,
    pub active_files: i64,
    pub containers: u64,
    pub max_containers: Option<i32>,
    pub max_file_size_mb: f64,
    pub today: Option<DailyStorageUsage>,
}

impl StorageUsageResponse {
    pub fn new(summary: UsageSummary, limits: &plan_limit::Model) -> Self {
        Self {
            success: true,
            plan: limits.plan.clone(),
            quota_basis: match summary.basis {
                QuotaBasis::Lifetime => "lifetime".into(),
                QuotaBasis::Daily => "daily".into(),
            },
            used_bytes: summary.used_bytes,
            used_mb: bytes_to_mb(summary.used_bytes),
            limit_bytes: summary.limit_bytes,
            limit_mb: summary.limit_bytes.map(bytes_to_mb),
            remaining_bytes: summary.remaining_bytes,
            usage_percentage: usage_percentage(summary.used_bytes, summary.limit_bytes),
            active_files: summary.active_files,
            containers: summary.containers,
            max_containers: limits.max_containers,
            max_file_size_mb: bytes_to_mb(limits.max_file_size),
            today: summary.today.map(DailyStorageUsage::from),
        }
    }
}
