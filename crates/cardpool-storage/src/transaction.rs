//! Transaction-aware operations for atomic multistep writes.
//!
//! These functions accept a SQLite transaction reference, allowing several
//! writes to be grouped into a single atomic unit. The allocation path uses
//! them to release a device's previous card and claim the new one together,
//! and inventory refreshes use them to upsert a whole page of cards at once.
//!
//! # Usage Pattern
//!
//! ```no_run
//! use cardpool_storage::{Database, DatabaseConfig, transaction};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("cardpool.db")).await?;
//!
//! let mut tx = db.pool().begin().await?;
//! transaction::release_device_cards(&mut tx, "d1", "460001234567890").await?;
//! if transaction::claim_card(&mut tx, "460001234567890", "d1", "u1").await? {
//!     tx.commit().await?;
//! } else {
//!     tx.rollback().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Atomic Guarantees
//!
//! All operations within a transaction either all succeed or all fail. If
//! any operation returns an error, roll the transaction back by dropping it
//! or calling `rollback()`.

use crate::error::StorageResult;
use crate::models::BindingUpdate;
use cardpool_core::{CardBinding, RemoteDevice, RemoteSimCard, digits_only};
use chrono::Utc;
use sqlx::{Sqlite, Transaction};

/// Release every card held by `device_id` except `keep_imsi`
///
/// Returns the number of cards released. The user column is left alone; only
/// a forced return detaches a card from its user.
pub async fn release_device_cards(
    tx: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    keep_imsi: &str,
) -> StorageResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE sim_cards
        SET device_number = NULL, is_used = 0, updated_at = ?
        WHERE device_number = ? AND imsi <> ?
        "#,
    )
    .bind(Utc::now())
    .bind(device_id)
    .bind(keep_imsi)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Bind `imsi` to `(device_id, user_id)` if it is free or already held by
/// `device_id`
///
/// Returns `false` when the card is held by another device or does not
/// exist; nothing is written in that case.
pub async fn claim_card(
    tx: &mut Transaction<'_, Sqlite>,
    imsi: &str,
    device_id: &str,
    user_id: &str,
) -> StorageResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sim_cards
        SET device_number = ?, user_id = ?, is_used = 1, updated_at = ?
        WHERE imsi = ? AND (device_number IS NULL OR device_number = ?)
        "#,
    )
    .bind(device_id)
    .bind(user_id)
    .bind(Utc::now())
    .bind(imsi)
    .bind(device_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Apply a conditional binding update
///
/// Returns `false` when the compare-and-set condition did not hold.
pub async fn apply_binding(
    tx: &mut Transaction<'_, Sqlite>,
    update: &BindingUpdate,
) -> StorageResult<bool> {
    match &update.target {
        CardBinding::Bound { device_id, user_id } => {
            let result = sqlx::query(
                r#"
                UPDATE sim_cards
                SET device_number = ?, user_id = COALESCE(?, user_id), is_used = 1, updated_at = ?
                WHERE imsi = ? AND (device_number IS NULL OR device_number = ?)
                "#,
            )
            .bind(device_id)
            .bind(user_id)
            .bind(Utc::now())
            .bind(&update.imsi)
            .bind(device_id)
            .execute(&mut **tx)
            .await?;

            Ok(result.rows_affected() > 0)
        }
        CardBinding::Free => {
            let result = sqlx::query(
                r#"
                UPDATE sim_cards
                SET device_number = NULL,
                    is_used = 0,
                    user_id = CASE WHEN ? THEN NULL ELSE user_id END,
                    updated_at = ?
                WHERE imsi = ? AND (? IS NULL OR device_number = ?)
                "#,
            )
            .bind(update.clear_user)
            .bind(Utc::now())
            .bind(&update.imsi)
            .bind(&update.expected_device)
            .bind(&update.expected_device)
            .execute(&mut **tx)
            .await?;

            Ok(result.rows_affected() > 0)
        }
    }
}

/// Insert or refresh a card from a remote inventory record
///
/// Fields absent from the record keep their stored value, and the binding
/// columns `device_number`/`is_used` are never touched. `user_id` is only
/// refreshed while the card is free. Records without an IMSI are skipped and
/// reported as `false`.
pub async fn upsert_sim_card(
    tx: &mut Transaction<'_, Sqlite>,
    card: &RemoteSimCard,
) -> StorageResult<bool> {
    let Some(imsi) = card.imsi.as_deref().filter(|imsi| !imsi.is_empty()) else {
        return Ok(false);
    };
    let now = Utc::now();
    let phone_digits = card.phone_number.as_deref().map(digits_only);

    sqlx::query(
        r#"
        INSERT INTO sim_cards (
            imsi, card_id, iccid, mcc, mnc, phone_number, phone_digits,
            is_activate, is_broken, is_disabled, is_in_simpool,
            location_in_sim_pool, sim_pool_mac_addr, user_id, name,
            bind_number, img_md5, operator_id, org_code, update_at,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, COALESCE(?, ''),
                COALESCE(?, 0), COALESCE(?, 0), COALESCE(?, 0), COALESCE(?, 0),
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(imsi) DO UPDATE SET
            card_id = COALESCE(excluded.card_id, sim_cards.card_id),
            iccid = COALESCE(excluded.iccid, sim_cards.iccid),
            mcc = COALESCE(excluded.mcc, sim_cards.mcc),
            mnc = COALESCE(excluded.mnc, sim_cards.mnc),
            phone_number = COALESCE(excluded.phone_number, sim_cards.phone_number),
            phone_digits = CASE WHEN excluded.phone_number IS NULL
                                THEN sim_cards.phone_digits
                                ELSE excluded.phone_digits END,
            is_activate = COALESCE(?, sim_cards.is_activate),
            is_broken = COALESCE(?, sim_cards.is_broken),
            is_disabled = COALESCE(?, sim_cards.is_disabled),
            is_in_simpool = COALESCE(?, sim_cards.is_in_simpool),
            location_in_sim_pool = COALESCE(excluded.location_in_sim_pool, sim_cards.location_in_sim_pool),
            sim_pool_mac_addr = COALESCE(excluded.sim_pool_mac_addr, sim_cards.sim_pool_mac_addr),
            user_id = CASE WHEN sim_cards.is_used = 1
                           THEN sim_cards.user_id
                           ELSE COALESCE(excluded.user_id, sim_cards.user_id) END,
            name = COALESCE(excluded.name, sim_cards.name),
            bind_number = COALESCE(excluded.bind_number, sim_cards.bind_number),
            img_md5 = COALESCE(excluded.img_md5, sim_cards.img_md5),
            operator_id = COALESCE(excluded.operator_id, sim_cards.operator_id),
            org_code = COALESCE(excluded.org_code, sim_cards.org_code),
            update_at = COALESCE(excluded.update_at, sim_cards.update_at),
            updated_at = excluded.updated_at
        "#,
    )
    .bind(imsi)
    .bind(&card.card_id)
    .bind(&card.iccid)
    .bind(&card.mcc)
    .bind(&card.mnc)
    .bind(&card.phone_number)
    .bind(&phone_digits)
    .bind(card.is_activate)
    .bind(card.is_broken)
    .bind(card.is_disabled)
    .bind(card.is_in_simpool)
    .bind(&card.location_in_sim_pool)
    .bind(&card.sim_pool_mac_addr)
    .bind(&card.user_id)
    .bind(&card.name)
    .bind(&card.bind_number)
    .bind(&card.img_md5)
    .bind(&card.operator_id)
    .bind(&card.org_code)
    .bind(&card.update_at)
    .bind(now)
    .bind(now)
    .bind(card.is_activate)
    .bind(card.is_broken)
    .bind(card.is_disabled)
    .bind(card.is_in_simpool)
    .execute(&mut **tx)
    .await?;

    Ok(true)
}

/// Insert or refresh a device, keyed by its user id
///
/// Records without a user id are skipped and reported as `false`.
pub async fn upsert_device(
    tx: &mut Transaction<'_, Sqlite>,
    device: &RemoteDevice,
) -> StorageResult<bool> {
    let Some(user_id) = device.user_id.as_deref().filter(|id| !id.is_empty()) else {
        return Ok(false);
    };
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO devices (
            user_id, device_id, status, name, in_use, device_type, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, COALESCE(?, 0), ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            device_id = excluded.device_id,
            status = excluded.status,
            name = excluded.name,
            in_use = excluded.in_use,
            device_type = excluded.device_type,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(&device.device_id)
    .bind(&device.status)
    .bind(&device.name)
    .bind(device.in_use)
    .bind(&device.device_type)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(true)
}
