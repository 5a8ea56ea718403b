#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use crate::models::{BindingUpdate, Page, SimCard};
use crate::transaction;
use cardpool_core::constants::FUZZY_MIN_DIGITS;
use cardpool_core::{RemoteSimCard, SimCardsQuery};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

/// Repository trait for SIM card operations
///
/// This trait uses native async trait methods (Edition 2024 feature),
/// eliminating the need for the async-trait crate.
pub trait SimCardRepository: Send + Sync {
    /// Find a card by its IMSI
    async fn find_by_imsi(&self, imsi: &str) -> StorageResult<Option<SimCard>>;

    /// Find a card whose stored phone number equals `phone_number`
    async fn find_by_phone_number(&self, phone_number: &str) -> StorageResult<Option<SimCard>>;

    /// Find a card whose digit-only phone number contains `digits` or is
    /// contained in it
    ///
    /// Both sides must have at least [`FUZZY_MIN_DIGITS`] digits. When
    /// several cards match, the first one found wins.
    async fn find_by_phone_digits(&self, digits: &str) -> StorageResult<Option<SimCard>>;

    /// Find the cards currently held by a device
    async fn find_by_device(&self, device_id: &str) -> StorageResult<Vec<SimCard>>;

    /// Find the card a user currently has in use
    async fn find_in_use_by_user(&self, user_id: &str) -> StorageResult<Option<SimCard>>;

    /// List cards matching the query filters, newest update first
    async fn list(&self, query: &SimCardsQuery) -> StorageResult<Page<SimCard>>;

    /// Insert or refresh inventory records in one transaction
    ///
    /// Returns the number of records written.
    async fn upsert_inventory(&self, cards: &[RemoteSimCard]) -> StorageResult<u64>;

    /// Release whatever `device_id` holds and bind `imsi` to it, atomically
    ///
    /// Returns the number of other cards released. Fails with
    /// [`StorageError::BindingConflict`] if another device holds the card,
    /// and with [`StorageError::NotFound`] if the card does not exist.
    async fn claim_for_device(&self, imsi: &str, device_id: &str, user_id: &str)
    -> StorageResult<u64>;

    /// Apply a conditional binding update; `false` if its condition failed
    async fn apply_binding(&self, update: &BindingUpdate) -> StorageResult<bool>;
}

/// SQLite implementation of SimCardRepository
pub struct SqliteSimCardRepository {
    pool: SqlitePool,
}

impl SqliteSimCardRepository {
    /// Create a new SQLite SIM card repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &SimCardsQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(imsi) = &query.imsi {
            builder.push(" AND imsi LIKE ").push_bind(format!("%{}%", imsi));
        }
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(mac) = &query.sim_pool_mac_addr {
            builder.push(" AND sim_pool_mac_addr = ").push_bind(mac.clone());
        }
    }
}

impl SimCardRepository for SqliteSimCardRepository {
    async fn find_by_imsi(&self, imsi: &str) -> StorageResult<Option<SimCard>> {
        let card = sqlx::query_as::<_, SimCard>("SELECT * FROM sim_cards WHERE imsi = ?")
            .bind(imsi)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    async fn find_by_phone_number(&self, phone_number: &str) -> StorageResult<Option<SimCard>> {
        let card = sqlx::query_as::<_, SimCard>(
            "SELECT * FROM sim_cards WHERE phone_number = ? LIMIT 1",
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn find_by_phone_digits(&self, digits: &str) -> StorageResult<Option<SimCard>> {
        if digits.len() < FUZZY_MIN_DIGITS {
            return Ok(None);
        }

        let card = sqlx::query_as::<_, SimCard>(
            r#"
            SELECT * FROM sim_cards
            WHERE length(phone_digits) >= ?1
              AND (instr(phone_digits, ?2) > 0 OR instr(?2, phone_digits) > 0)
            LIMIT 1
            "#,
        )
        .bind(FUZZY_MIN_DIGITS as i64)
        .bind(digits)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn find_by_device(&self, device_id: &str) -> StorageResult<Vec<SimCard>> {
        let cards = sqlx::query_as::<_, SimCard>(
            "SELECT * FROM sim_cards WHERE device_number = ? ORDER BY updated_at DESC",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn find_in_use_by_user(&self, user_id: &str) -> StorageResult<Option<SimCard>> {
        let card = sqlx::query_as::<_, SimCard>(
            r#"
            SELECT * FROM sim_cards
            WHERE user_id = ? AND is_used = 1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn list(&self, query: &SimCardsQuery) -> StorageResult<Page<SimCard>> {
        let pagination = query.pagination();

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sim_cards");
        Self::push_filters(&mut count, query);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM sim_cards");
        Self::push_filters(&mut select, query);
        select
            .push(" ORDER BY updated_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(pagination.size()))
            .push(" OFFSET ")
            .push_bind(pagination.offset() as i64);
        let cards = select
            .build_query_as::<SimCard>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(cards, pagination, total.max(0) as u64))
    }

    async fn upsert_inventory(&self, cards: &[RemoteSimCard]) -> StorageResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for card in cards {
            if transaction::upsert_sim_card(&mut tx, card).await? {
                written += 1;
            }
        }
        tx.commit().await?;

        debug!(received = cards.len(), written, "Inventory upserted");
        Ok(written)
    }

    async fn claim_for_device(
        &self,
        imsi: &str,
        device_id: &str,
        user_id: &str,
    ) -> StorageResult<u64> {
        let mut tx = self.pool.begin().await?;
        let released = transaction::release_device_cards(&mut tx, device_id, imsi).await?;

        if transaction::claim_card(&mut tx, imsi, device_id, user_id).await? {
            tx.commit().await?;
            return Ok(released);
        }
        tx.rollback().await?;

        match self.find_by_imsi(imsi).await? {
            Some(card) => Err(StorageError::BindingConflict {
                imsi: imsi.to_string(),
                holder: card.device_number.unwrap_or_default(),
            }),
            None => Err(StorageError::NotFound {
                entity_type: "SimCard".to_string(),
                field: "imsi".to_string(),
                value: imsi.to_string(),
            }),
        }
    }

    async fn apply_binding(&self, update: &BindingUpdate) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;
        let applied = transaction::apply_binding(&mut tx, update).await?;
        tx.commit().await?;

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use cardpool_core::CardBinding;

    async fn setup_test_db() -> Database {
        Database::in_memory().await.unwrap()
    }

    fn inventory(imsi: &str, phone: &str) -> RemoteSimCard {
        RemoteSimCard {
            imsi: Some(imsi.to_string()),
            phone_number: Some(phone.to_string()),
            is_activate: Some(true),
            ..Default::default()
        }
    }

    async fn seed(repo: &SqliteSimCardRepository, cards: &[(&str, &str)]) {
        let records: Vec<_> = cards
            .iter()
            .map(|(imsi, phone)| inventory(imsi, phone))
            .collect();
        repo.upsert_inventory(&records).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_and_find_by_imsi() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460001234567890", "13800000000")]).await;

        let card = repo.find_by_imsi("460001234567890").await.unwrap().unwrap();
        assert_eq!(card.phone_number.as_deref(), Some("13800000000"));
        assert_eq!(card.phone_digits, "13800000000");
        assert!(card.is_activate);
        assert_eq!(card.binding(), CardBinding::Free);
    }

    #[tokio::test]
    async fn test_upsert_skips_records_without_imsi() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());

        let written = repo
            .upsert_inventory(&[RemoteSimCard::default(), inventory("460000000000001", "1")])
            .await
            .unwrap();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_inventory_refresh_keeps_binding_and_absent_fields() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460001234567890", "13800000000")]).await;
        repo.claim_for_device("460001234567890", "d1", "u1")
            .await
            .unwrap();

        let refresh = RemoteSimCard {
            imsi: Some("460001234567890".to_string()),
            iccid: Some("8986001".to_string()),
            ..Default::default()
        };
        repo.upsert_inventory(&[refresh]).await.unwrap();

        let card = repo.find_by_imsi("460001234567890").await.unwrap().unwrap();
        assert_eq!(card.iccid.as_deref(), Some("8986001"));
        assert_eq!(card.phone_number.as_deref(), Some("13800000000"));
        assert_eq!(card.phone_digits, "13800000000");
        assert!(card.is_activate);
        assert!(card.is_used);
        assert_eq!(card.device_number.as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn test_inventory_user_only_applies_to_free_cards() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460001234567890", "13800000000"), ("460001234567891", "13900000000")]).await;
        repo.claim_for_device("460001234567890", "d1", "u1")
            .await
            .unwrap();

        let reported_by = |imsi: &str, user: &str| RemoteSimCard {
            imsi: Some(imsi.to_string()),
            user_id: Some(user.to_string()),
            ..Default::default()
        };
        repo.upsert_inventory(&[
            reported_by("460001234567890", "u-stale"),
            reported_by("460001234567891", "u9"),
        ])
        .await
        .unwrap();

        let held = repo.find_in_use_by_user("u1").await.unwrap().unwrap();
        assert_eq!(held.imsi, "460001234567890");
        assert!(repo.find_in_use_by_user("u-stale").await.unwrap().is_none());

        let free = repo.find_by_imsi("460001234567891").await.unwrap().unwrap();
        assert_eq!(free.user_id.as_deref(), Some("u9"));
        assert!(!free.is_used);
    }

    #[tokio::test]
    async fn test_find_by_phone_exact_and_fuzzy() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(
            &repo,
            &[
                ("460000000000001", "+86 138-0000-0000"),
                ("460000000000002", "13900000000"),
            ],
        )
        .await;

        let exact = repo.find_by_phone_number("13900000000").await.unwrap();
        assert_eq!(exact.unwrap().imsi, "460000000000002");
        assert!(repo.find_by_phone_number("13800000000").await.unwrap().is_none());

        // query digits contained in stored digits
        let fuzzy = repo.find_by_phone_digits("13800000000").await.unwrap();
        assert_eq!(fuzzy.unwrap().imsi, "460000000000001");

        // stored digits contained in query digits
        let fuzzy = repo.find_by_phone_digits("008613900000000").await.unwrap();
        assert_eq!(fuzzy.unwrap().imsi, "460000000000002");

        assert!(repo.find_by_phone_digits("138").await.unwrap().is_none());
        assert!(repo.find_by_phone_digits("55555555").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_releases_previous_card() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460000000000001", "13800000001"), ("460000000000002", "13800000002")]).await;

        assert_eq!(repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap(), 0);
        assert_eq!(repo.claim_for_device("460000000000002", "d1", "u1").await.unwrap(), 1);

        let first = repo.find_by_imsi("460000000000001").await.unwrap().unwrap();
        let second = repo.find_by_imsi("460000000000002").await.unwrap().unwrap();
        assert_eq!(first.binding(), CardBinding::Free);
        assert!(!first.is_used);
        assert!(second.binding().is_held_by("d1"));

        let held = repo.find_by_device("d1").await.unwrap();
        assert_eq!(held.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_is_idempotent_for_same_device() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460000000000001", "13800000001")]).await;

        repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap();
        let before = repo.find_by_imsi("460000000000001").await.unwrap().unwrap();
        let released = repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap();
        let after = repo.find_by_imsi("460000000000001").await.unwrap().unwrap();

        assert_eq!(released, 0);
        assert_eq!(after.binding(), before.binding());
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn test_claim_conflict_changes_nothing() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460000000000001", "13800000001"), ("460000000000002", "13800000002")]).await;
        repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap();
        repo.claim_for_device("460000000000002", "d2", "u2").await.unwrap();

        let err = repo
            .claim_for_device("460000000000001", "d2", "u2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::BindingConflict { ref holder, .. } if holder == "d1"
        ));

        // d2's own card was not released by the failed attempt
        let second = repo.find_by_imsi("460000000000002").await.unwrap().unwrap();
        assert!(second.binding().is_held_by("d2"));
    }

    #[tokio::test]
    async fn test_claim_unknown_card() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());

        let err = repo.claim_for_device("404", "d1", "u1").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_compensation_only_releases_own_binding() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460000000000001", "13800000001")]).await;
        repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap();

        let foreign = BindingUpdate::compensate("460000000000001", "d9");
        assert!(!repo.apply_binding(&foreign).await.unwrap());

        let own = BindingUpdate::compensate("460000000000001", "d1");
        assert!(repo.apply_binding(&own).await.unwrap());

        let card = repo.find_by_imsi("460000000000001").await.unwrap().unwrap();
        assert_eq!(card.binding(), CardBinding::Free);
        // compensation keeps the user column
        assert_eq!(card.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_release_clears_user() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460000000000001", "13800000001")]).await;
        repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap();

        let found = repo.find_in_use_by_user("u1").await.unwrap().unwrap();
        assert_eq!(found.imsi, "460000000000001");

        let release = BindingUpdate::release("460000000000001", Some("d1"));
        assert!(repo.apply_binding(&release).await.unwrap());

        let card = repo.find_by_imsi("460000000000001").await.unwrap().unwrap();
        assert_eq!(card.user_id, None);
        assert!(repo.find_in_use_by_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirm_binding_is_rejected_when_taken() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        seed(&repo, &[("460000000000001", "13800000001")]).await;
        repo.claim_for_device("460000000000001", "d1", "u1").await.unwrap();

        assert!(repo
            .apply_binding(&BindingUpdate::bind("460000000000001", "d1", "u1"))
            .await
            .unwrap());
        assert!(!repo
            .apply_binding(&BindingUpdate::bind("460000000000001", "d2", "u2"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let db = setup_test_db().await;
        let repo = SqliteSimCardRepository::new(db.pool().clone());
        let records: Vec<_> = (1..=5)
            .map(|i| RemoteSimCard {
                imsi: Some(format!("46000000000000{}", i)),
                sim_pool_mac_addr: Some(if i % 2 == 0 { "aa:bb" } else { "cc:dd" }.to_string()),
                ..Default::default()
            })
            .collect();
        repo.upsert_inventory(&records).await.unwrap();

        let page = repo
            .list(&SimCardsQuery {
                size: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.content.len(), 2);

        let page = repo
            .list(&SimCardsQuery {
                sim_pool_mac_addr: Some("aa:bb".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 2);

        let page = repo
            .list(&SimCardsQuery {
                imsi: Some("0003".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].imsi, "460000000000003");
    }
}
