//! Upload and delete of stored files, keeping container aggregates exact.

use std::collections::HashSet;

use chrono::Utc;
use common::storage::{ObjectKey, ObjectStore};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::QuotaBasis;
use crate::entity::{
    api_request_log, api_usage_daily, plan_limit, public_api_key, storage_container, stored_file,
};
use crate::error::AppError;
use crate::quota::{QuotaLedger, UsageKind, evaluate_file_size, lock_owner};
use crate::utils::filename::{next_available, split_extension, validate_flat_filename};

const OCTET_STREAM: &str = "application/octet-stream";

/// One file to store.
pub struct NewUpload {
    pub owner_id: i32,
    pub container_id: Uuid,
    /// Name supplied by the client in the multipart part.
    pub original_filename: String,
    /// Overrides `original_filename` when set.
    pub custom_filename: Option<String>,
    pub content_type: Option<String>,
    pub is_public: bool,
    pub upload_session: Option<String>,
    /// Per-key override of the plan's per-file ceiling.
    pub max_file_size: Option<i64>,
    pub data: Vec<u8>,
}

/// Recomputed aggregates for one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerTotals {
    pub files_count: i64,
    pub total_size: i64,
}

/// Recompute `files_count` and `total_size` from active files and store them.
pub async fn recalculate<C: ConnectionTrait>(
    conn: &C,
    container_id: Uuid,
) -> Result<ContainerTotals, DbErr> {
    let (files_count, total_size) = stored_file::Entity::find()
        .select_only()
        .column_as(Expr::cust("COUNT(*)::BIGINT"), "files_count")
        .column_as(Expr::cust("COALESCE(SUM(size), 0)::BIGINT"), "total_size")
        .filter(stored_file::Column::ContainerId.eq(container_id))
        .filter(stored_file::Column::IsActive.eq(true))
        .into_tuple::<(i64, i64)>()
        .one(conn)
        .await?
        .unwrap_or((0, 0));

    storage_container::Entity::update_many()
        .col_expr(storage_container::Column::FilesCount, Expr::value(files_count))
        .col_expr(storage_container::Column::TotalSize, Expr::value(total_size))
        .col_expr(storage_container::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(storage_container::Column::Id.eq(container_id))
        .exec(conn)
        .await?;

    Ok(ContainerTotals {
        files_count,
        total_size,
    })
}

/// Container owned by `owner_id`, locked for the rest of the transaction.
pub async fn lock_container<C: ConnectionTrait>(
    conn: &C,
    owner_id: i32,
    container_id: Uuid,
) -> Result<storage_container::Model, AppError> {
    storage_container::Entity::find_by_id(container_id)
        .filter(storage_container::Column::OwnerId.eq(owner_id))
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Container not found".into()))
}

/// Active file in a container, or 404.
pub async fn find_active_file<C: ConnectionTrait>(
    conn: &C,
    container_id: Uuid,
    file_id: Uuid,
) -> Result<stored_file::Model, AppError> {
    stored_file::Entity::find_by_id(file_id)
        .filter(stored_file::Column::ContainerId.eq(container_id))
        .filter(stored_file::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))
}

/// Content type from the client, else guessed from the name.
pub fn resolve_mime(filename: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => mime_guess::from_path(filename)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string()),
    }
}

/// The upload and delete pipeline over one database and one object store.
pub struct FileService<'a> {
    db: &'a DatabaseConnection,
    store: &'a dyn ObjectStore,
    basis: QuotaBasis,
}

impl<'a> FileService<'a> {
    pub fn new(db: &'a DatabaseConnection, store: &'a dyn ObjectStore, basis: QuotaBasis) -> Self {
        Self { db, store, basis }
    }

    /// Store the bytes, then record the file.
    ///
    /// No row is written unless the object store accepted the bytes. If the
    /// database step fails afterwards the object is removed again.
    pub async fn upload(
        &self,
        limits: &plan_limit::Model,
        upload: NewUpload,
    ) -> Result<stored_file::Model, AppError> {
        let requested = upload
            .custom_filename
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&upload.original_filename);
        let filename = validate_flat_filename(requested)
            .map_err(|e| AppError::Validation(e.to_string()))?
            .to_string();

        let size = upload.data.len() as i64;
        if size == 0 {
            return Err(AppError::Validation("File is empty".into()));
        }
        // A per-key override may tighten the plan ceiling, never raise it.
        let max_size = upload
            .max_file_size
            .map_or(limits.max_file_size, |m| std::cmp::Ord::min(m, limits.max_file_size));
        let size_decision = evaluate_file_size(size, max_size);
        if !size_decision.allowed {
            return Err(AppError::Validation(size_decision.message));
        }

        QuotaLedger::new(self.db, self.basis)
            .can_upload(upload.owner_id, limits, size)
            .await?
            .require()?;

        // Reject unknown containers before writing any bytes.
        storage_container::Entity::find_by_id(upload.container_id)
            .filter(storage_container::Column::OwnerId.eq(upload.owner_id))
            .one(self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Container not found".into()))?;

        let mime_type = resolve_mime(&filename, upload.content_type.as_deref());
        let file_id = Uuid::new_v4();
        let key = ObjectKey::for_file(upload.owner_id, upload.container_id, file_id, &filename);
        let stored = self.store.upload(&key, &upload.data, &mime_type).await?;

        let record = PendingFile {
            id: file_id,
            filename,
            original_filename: upload.original_filename,
            storage_key: key.to_string(),
            size,
            mime_type,
            is_public: upload.is_public,
            checksum: stored.checksum,
            upload_session: upload.upload_session,
        };

        match self
            .commit_upload(upload.owner_id, upload.container_id, limits, record)
            .await
        {
            Ok(file) => {
                info!(file_id = %file.id, filename = %file.filename, size, "File stored");
                Ok(file)
            }
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&key).await {
                    warn!(key = %key, error = %cleanup, "Failed to remove orphaned object");
                }
                Err(e)
            }
        }
    }

    async fn commit_upload(
        &self,
        owner_id: i32,
        container_id: Uuid,
        limits: &plan_limit::Model,
        file: PendingFile,
    ) -> Result<stored_file::Model, AppError> {
        let txn = self.db.begin().await?;

        // Serialises uploads per owner so the quota re-check below is exact.
        lock_owner(&txn, owner_id).await?;
        lock_container(&txn, owner_id, container_id).await?;

        let ledger = QuotaLedger::new(&txn, self.basis);
        ledger
            .can_upload(owner_id, limits, file.size)
            .await?
            .require()?;

        let (stem, _) = split_extension(&file.filename);
        let taken: HashSet<String> = stored_file::Entity::find()
            .select_only()
            .column(stored_file::Column::Filename)
            .filter(stored_file::Column::ContainerId.eq(container_id))
            .filter(stored_file::Column::Filename.starts_with(stem))
            .into_tuple::<String>()
            .all(&txn)
            .await?
            .into_iter()
            .collect();
        let filename = next_available(&file.filename, &taken);

        let model = stored_file::ActiveModel {
            id: Set(file.id),
            container_id: Set(container_id),
            filename: Set(filename),
            original_filename: Set(file.original_filename),
            storage_key: Set(file.storage_key),
            size: Set(file.size),
            mime_type: Set(file.mime_type),
            is_public: Set(file.is_public),
            is_active: Set(true),
            checksum: Set(Some(file.checksum)),
            upload_session: Set(file.upload_session),
            created_at: Set(Utc::now()),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        recalculate(&txn, container_id).await?;
        ledger.record_upload(owner_id, file.size).await?;

        txn.commit().await?;
        Ok(model)
    }

    /// Soft-delete a file and refresh aggregates; the stored object is
    /// removed afterwards on a best-effort basis.
    pub async fn delete(
        &self,
        owner_id: i32,
        container_id: Uuid,
        file_id: Uuid,
    ) -> Result<stored_file::Model, AppError> {
        let txn = self.db.begin().await?;

        lock_container(&txn, owner_id, container_id).await?;
        let file = find_active_file(&txn, container_id, file_id).await?;

        let now = Utc::now();
        let result = stored_file::Entity::update_many()
            .col_expr(stored_file::Column::IsActive, Expr::value(false))
            .col_expr(stored_file::Column::DeletedAt, Expr::value(Some(now)))
            .filter(stored_file::Column::Id.eq(file.id))
            .filter(stored_file::Column::IsActive.eq(true))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound("File not found".into()));
        }

        recalculate(&txn, container_id).await?;
        QuotaLedger::new(&txn, self.basis)
            .record_delete(owner_id, file.size)
            .await?;
        txn.commit().await?;

        self.remove_object(&file.storage_key).await;

        Ok(stored_file::Model {
            is_active: false,
            deleted_at: Some(now),
            ..file
        })
    }

    /// Remove a container with its files, API key and key usage history.
    /// Returns the number of active files that were removed.
    pub async fn delete_container(&self, owner_id: i32, container_id: Uuid) -> Result<usize, AppError> {
        let txn = self.db.begin().await?;

        lock_container(&txn, owner_id, container_id).await?;
        let active: Vec<stored_file::Model> = stored_file::Entity::find()
            .filter(stored_file::Column::ContainerId.eq(container_id))
            .filter(stored_file::Column::IsActive.eq(true))
            .all(&txn)
            .await?;

        if let Some(key) = public_api_key::Entity::find()
            .filter(public_api_key::Column::ContainerId.eq(container_id))
            .one(&txn)
            .await?
        {
            api_request_log::Entity::delete_many()
                .filter(api_request_log::Column::ApiKeyId.eq(key.id))
                .exec(&txn)
                .await?;
            api_usage_daily::Entity::delete_many()
                .filter(api_usage_daily::Column::ApiKeyId.eq(key.id))
                .exec(&txn)
                .await?;
            public_api_key::Entity::delete_by_id(key.id).exec(&txn).await?;
        }

        stored_file::Entity::delete_many()
            .filter(stored_file::Column::ContainerId.eq(container_id))
            .exec(&txn)
            .await?;
        storage_container::Entity::delete_by_id(container_id)
            .exec(&txn)
            .await?;

        if !active.is_empty() {
            let bytes = active.iter().map(|f| f.size).sum();
            QuotaLedger::new(&txn, self.basis)
                .apply(owner_id, UsageKind::Delete, bytes, active.len() as i64)
                .await?;
        }
        txn.commit().await?;

        for file in &active {
            self.remove_object(&file.storage_key).await;
        }
        info!(%container_id, files = active.len(), "Container deleted");
        Ok(active.len())
    }

    /// Delete a backing object, logging instead of failing.
    pub async fn remove_object(&self, storage_key: &str) {
        let key = match ObjectKey::parse(storage_key) {
            Ok(key) => key,
            Err(e) => {
                warn!(key = %storage_key, error = %e, "Stored key no longer parses");
                return;
            }
        };
        match self.store.delete(&key).await {
            Ok(true) => {}
            Ok(false) => warn!(key = %key, "Object was already absent from the store"),
            Err(e) => warn!(key = %key, error = %e, "Failed to delete object; left for reconciliation"),
        }
    }
}

struct PendingFile {
    id: Uuid,
    filename: String,
    original_filename: String,
    storage_key: String,
    size: i64,
    mime_type: String,
    is_public: bool,
    checksum: String,
    upload_session: Option<String>,
}
