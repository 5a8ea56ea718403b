#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::ApiCallLog;
use sqlx::SqlitePool;

/// Repository trait for remote API call records
pub trait ApiCallLogRepository: Send + Sync {
    /// Append a call record, returning its id
    async fn create(&self, log: &ApiCallLog) -> StorageResult<i64>;

    /// Most recent calls, optionally restricted to one API path
    async fn find_recent(&self, api_path: Option<&str>, limit: i64) -> StorageResult<Vec<ApiCallLog>>;
}

/// SQLite implementation of ApiCallLogRepository
pub struct SqliteApiCallLogRepository {
    pool: SqlitePool,
}

impl SqliteApiCallLogRepository {
    /// Create a new SQLite API call log repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ApiCallLogRepository for SqliteApiCallLogRepository {
    async fn create(&self, log: &ApiCallLog) -> StorageResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO api_call_logs (
                api_path, method, request_params, response_code, response_data,
                request_time, response_time, execution_time_ms, status, error_message
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&log.api_path)
        .bind(&log.method)
        .bind(&log.request_params)
        .bind(&log.response_code)
        .bind(&log.response_data)
        .bind(log.request_time)
        .bind(log.response_time)
        .bind(log.execution_time_ms)
        .bind(&log.status)
        .bind(&log.error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_recent(&self, api_path: Option<&str>, limit: i64) -> StorageResult<Vec<ApiCallLog>> {
        let logs = sqlx::query_as::<_, ApiCallLog>(
            r#"
            SELECT id, api_path, method, request_params, response_code, response_data,
                   request_time, response_time, execution_time_ms, status, error_message
            FROM api_call_logs
            WHERE ? IS NULL OR api_path = ?
            ORDER BY request_time DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(api_path)
        .bind(api_path)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}
