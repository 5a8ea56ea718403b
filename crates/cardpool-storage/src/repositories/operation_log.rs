#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::OperationLog;
use sqlx::SqlitePool;

/// Repository trait for the operation audit trail
///
/// Append-only: there is no update or delete.
pub trait OperationLogRepository: Send + Sync {
    /// Append an audit record, returning its id
    async fn create(&self, log: &OperationLog) -> StorageResult<i64>;

    /// Most recent records for a card
    async fn find_by_imsi(&self, imsi: &str, limit: i64) -> StorageResult<Vec<OperationLog>>;

    /// Most recent records for a user
    async fn find_by_user_id(&self, user_id: &str, limit: i64) -> StorageResult<Vec<OperationLog>>;

    /// Most recent records overall
    async fn find_recent(&self, limit: i64) -> StorageResult<Vec<OperationLog>>;
}

/// SQLite implementation of OperationLogRepository
pub struct SqliteOperationLogRepository {
    pool: SqlitePool,
}

impl SqliteOperationLogRepository {
    /// Create a new SQLite operation log repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl OperationLogRepository for SqliteOperationLogRepository {
    async fn create(&self, log: &OperationLog) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO operation_logs (
                operation_type, user_id, imsi, request_data,
                response_data, result, remarks, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.operation_type)
        .bind(&log.user_id)
        .bind(&log.imsi)
        .bind(&log.request_data)
        .bind(&log.response_data)
        .bind(&log.result)
        .bind(&log.remarks)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_imsi(&self, imsi: &str, limit: i64) -> StorageResult<Vec<OperationLog>> {
        let logs = sqlx::query_as::<_, OperationLog>(
            r#"
            SELECT * FROM operation_logs
            WHERE imsi = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(imsi)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn find_by_user_id(&self, user_id: &str, limit: i64) -> StorageResult<Vec<OperationLog>> {
        let logs = sqlx::query_as::<_, OperationLog>(
            r#"
            SELECT * FROM operation_logs
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    async fn find_recent(&self, limit: i64) -> StorageResult<Vec<OperationLog>> {
        let logs = sqlx::query_as::<_, OperationLog>(
            "SELECT * FROM operation_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
