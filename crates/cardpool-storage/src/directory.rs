//! Card Directory: resolves what a caller typed into a card record.
//!
//! Phone numbers reach the gateway in every shape (`13800000000`,
//! `+86 138-0000-0000`, `138 0000 0000`). Resolution first tries the stored
//! phone number verbatim and only then falls back to a digit-only
//! containment match, so an exact match always wins.

use crate::error::{StorageError, StorageResult};
use crate::models::SimCard;
use crate::repositories::{SimCardRepository, SqliteSimCardRepository};
use cardpool_core::PhoneNumber;
use sqlx::SqlitePool;
use tracing::debug;

pub struct CardDirectory {
    cards: SqliteSimCardRepository,
}

impl CardDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            cards: SqliteSimCardRepository::new(pool),
        }
    }

    /// Resolve a phone number to a card
    ///
    /// Returns `Ok(None)` when nothing matches; fails with
    /// [`StorageError::Validation`] on blank input and propagates storage
    /// failures.
    pub async fn resolve_by_phone(&self, phone_number: &str) -> StorageResult<Option<SimCard>> {
        let phone = PhoneNumber::new(phone_number)
            .map_err(|e| StorageError::Validation(e.to_string()))?;

        if let Some(card) = self.cards.find_by_phone_number(phone.as_str()).await? {
            debug!(phone = %phone, imsi = %card.imsi, "Phone number matched exactly");
            return Ok(Some(card));
        }

        if !phone.supports_fuzzy_match() {
            debug!(phone = %phone, "Phone number too short for fuzzy lookup");
            return Ok(None);
        }

        let card = self.cards.find_by_phone_digits(&phone.search_key()).await?;
        if let Some(card) = &card {
            debug!(phone = %phone, imsi = %card.imsi, "Phone number matched by digits");
        }
        Ok(card)
    }

    /// Resolve an IMSI to a card
    pub async fn resolve_by_imsi(&self, imsi: &str) -> StorageResult<Option<SimCard>> {
        let imsi = imsi.trim();
        if imsi.is_empty() {
            return Err(StorageError::Validation("empty IMSI".to_string()));
        }
        self.cards.find_by_imsi(imsi).await
    }
}
