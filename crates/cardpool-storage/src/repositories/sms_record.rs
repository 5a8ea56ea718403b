#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{Page, SmsRecord, SmsStatus};
use cardpool_core::SmsQuery;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const COLUMNS: &str = "id, msg_id, sender, receiver, content, user_id, imsi, send_time, status, is_outgoing";

/// Repository trait for relayed SMS
pub trait SmsRecordRepository: Send + Sync {
    /// Store a message, returning whether a row was written
    ///
    /// A message id already recorded in the same direction is left as is.
    /// A missing `imsi` is taken from the card bound to the record's user.
    async fn save(&self, record: &SmsRecord) -> StorageResult<bool>;

    /// Set the status of the outgoing message with this id
    async fn update_status(&self, msg_id: &str, status: SmsStatus) -> StorageResult<u64>;

    /// Latest record carrying this message id
    async fn find_by_msg_id(&self, msg_id: &str) -> StorageResult<Option<SmsRecord>>;

    /// List records matching the query filters, newest message first
    async fn list(&self, query: &SmsQuery) -> StorageResult<Page<SmsRecord>>;
}

/// SQLite implementation of SmsRecordRepository
pub struct SqliteSmsRecordRepository {
    pool: SqlitePool,
}

impl SqliteSmsRecordRepository {
    /// Create a new SQLite SMS repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &SmsQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(msg_id) = &query.msg_id {
            builder.push(" AND msg_id = ").push_bind(msg_id.clone());
        }
        if let Some(is_outgoing) = query.is_outgoing {
            builder.push(" AND is_outgoing = ").push_bind(is_outgoing);
        }
    }
}

impl SmsRecordRepository for SqliteSmsRecordRepository {
    async fn save(&self, record: &SmsRecord) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO sms_records (
                msg_id, sender, receiver, content, user_id, imsi,
                send_time, status, is_outgoing
            )
            VALUES (
                ?, ?, ?, ?, ?,
                COALESCE(?, (SELECT imsi FROM sim_cards WHERE user_id = ? AND is_used = 1 LIMIT 1)),
                ?, ?, ?
            )
            "#,
        )
        .bind(&record.msg_id)
        .bind(&record.sender)
        .bind(&record.receiver)
        .bind(&record.content)
        .bind(&record.user_id)
        .bind(&record.imsi)
        .bind(&record.user_id)
        .bind(record.send_time)
        .bind(&record.status)
        .bind(record.is_outgoing)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, msg_id: &str, status: SmsStatus) -> StorageResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sms_records
            SET status = ?, updated_at = datetime('now')
            WHERE msg_id = ? AND is_outgoing = 1
            "#,
        )
        .bind(status.as_str())
        .bind(msg_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_msg_id(&self, msg_id: &str) -> StorageResult<Option<SmsRecord>> {
        let record = sqlx::query_as::<_, SmsRecord>(&format!(
            "SELECT {COLUMNS} FROM sms_records WHERE msg_id = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(msg_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list(&self, query: &SmsQuery) -> StorageResult<Page<SmsRecord>> {
        let pagination = query.pagination();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sms_records");
        Self::push_filters(&mut count, query);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM sms_records"));
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY send_time DESC, id DESC LIMIT ")
            .push_bind(i64::from(pagination.size()))
            .push(" OFFSET ")
            .push_bind(pagination.offset() as i64);
        let records = select
            .build_query_as::<SmsRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(records, pagination, total.max(0) as u64))
    }
}
