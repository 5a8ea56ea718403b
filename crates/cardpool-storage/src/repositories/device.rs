#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{Device, Page};
use crate::transaction;
use cardpool_core::{DevicesQuery, RemoteDevice};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Repository trait for client device operations
pub trait DeviceRepository: Send + Sync {
    /// Find the device registered for a user
    async fn find_by_user_id(&self, user_id: &str) -> StorageResult<Option<Device>>;

    /// List devices matching the query filters, newest update first
    async fn list(&self, query: &DevicesQuery) -> StorageResult<Page<Device>>;

    /// Insert or refresh devices in one transaction, keyed by user id
    ///
    /// Returns the number of records written.
    async fn upsert(&self, devices: &[RemoteDevice]) -> StorageResult<u64>;
}

/// SQLite implementation of DeviceRepository
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new SQLite device repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &DevicesQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(name) = &query.name {
            builder.push(" AND name LIKE ").push_bind(format!("%{}%", name));
        }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    async fn find_by_user_id(&self, user_id: &str) -> StorageResult<Option<Device>> {
        let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(device)
    }

    async fn list(&self, query: &DevicesQuery) -> StorageResult<Page<Device>> {
        let pagination = query.pagination();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM devices");
        Self::push_filters(&mut count, query);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM devices");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY updated_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(pagination.size()))
            .push(" OFFSET ")
            .push_bind(pagination.offset() as i64);
        let devices = select
            .build_query_as::<Device>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(devices, pagination, total.max(0) as u64))
    }

    async fn upsert(&self, devices: &[RemoteDevice]) -> StorageResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for device in devices {
            if transaction::upsert_device(&mut tx, device).await? {
                written += 1;
            }
        }
        tx.commit().await?;

        Ok(written)
    }
}
