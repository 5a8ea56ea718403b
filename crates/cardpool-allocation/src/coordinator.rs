//! Allocation Coordinator: binds a card to a device around the remote switch.
//!
//! # Switch sequence
//!
//! ```text
//! validate ─> resolve card ─> exclusivity check
//!                                   │
//!             ┌─────────────────────┘
//!             ▼
//!   local tx: release device's other cards + compare-and-set bind
//!             │
//!             ▼
//!   remote clientsSpilt ─> translate status ─> return outcome
//!             │
//!             └─> queue: confirm bind + success audit
//!                    or: compensating release + failed audit
//! ```
//!
//! The local bind happens before the remote confirmation, so the two can
//! disagree for the duration of the remote call. A lost compare-and-set is an
//! occupancy conflict; a remote failure queues a release of the card, guarded
//! on the requesting device still holding it. Nothing after the remote call
//! delays the response.

use crate::audit::AuditLogWriter;
use crate::error::{AllocationError, AllocationResult};
use crate::request::{ReturnRequest, SwitchOutcome, SwitchRequest};
use cardpool_core::RemoteResponse;
use cardpool_network::{CardPoolApi, RemoteError};
use cardpool_storage::repositories::{SimCardRepository, SqliteSimCardRepository};
use cardpool_storage::{
    BindingUpdate, CardDirectory, OperationLog, OperationResult, OperationType, StorageError,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AllocationCoordinator<R> {
    remote: Arc<R>,
    directory: CardDirectory,
    cards: SqliteSimCardRepository,
    audit: AuditLogWriter,
}

impl<R: CardPoolApi> AllocationCoordinator<R> {
    pub fn new(pool: SqlitePool, remote: Arc<R>, audit: AuditLogWriter) -> Self {
        Self {
            remote,
            directory: CardDirectory::new(pool.clone()),
            cards: SqliteSimCardRepository::new(pool),
            audit,
        }
    }

    /// Switch the card behind `phoneNumber` to `(deviceId, userId)`
    ///
    /// Returns once the remote call completed, whatever code it reported.
    /// Errors are returned only for failures before or during the remote
    /// call; in the latter case the compensation is already queued.
    pub async fn switch_card(&self, request: &SwitchRequest) -> AllocationResult<SwitchOutcome> {
        let target = request.validate()?;
        let phone_number = target.phone_number.as_str();
        let (user_id, device_id) = (target.user_id, target.device_id);
        info!(user_id, phone_number, device_id, "Switch requested");

        let Some(card) = self
            .directory
            .resolve_by_phone(phone_number)
            .await
            .map_err(AllocationError::Lookup)?
        else {
            warn!(phone_number, "No card for phone number");
            return Err(AllocationError::UnknownPhoneNumber {
                phone_number: phone_number.to_string(),
            });
        };

        if card.is_held_by_other(device_id) {
            let holder = card.device_number.clone().unwrap_or_default();
            warn!(imsi = %card.imsi, holder = %holder, device_id, "Card held by another device");
            return Err(AllocationError::Occupied {
                phone_number: phone_number.to_string(),
                imsi: card.imsi,
                device_number: holder,
            });
        }
        let already_held = card.binding().is_held_by(device_id);

        self.cards
            .claim_for_device(&card.imsi, device_id, user_id)
            .await
            .map_err(|e| match e {
                StorageError::BindingConflict { imsi, holder } => {
                    warn!(imsi = %imsi, holder = %holder, device_id, "Lost the bind race");
                    AllocationError::Occupied {
                        phone_number: phone_number.to_string(),
                        imsi,
                        device_number: holder,
                    }
                }
                other => AllocationError::Persistence(other),
            })?;

        let snapshot = json!({
            "userId": user_id,
            "phoneNumber": phone_number,
            "deviceId": device_id,
            "imsi": card.imsi,
        });
        let compensation = (!already_held).then(|| BindingUpdate::compensate(&card.imsi, device_id));

        let response = match self.remote.clients_split(user_id, &card.imsi).await {
            Ok(response) => response,
            Err(e) => {
                warn!(imsi = %card.imsi, device_id, error = %e, "Remote switch failed");
                let audit = OperationLog::new(
                    OperationType::Switch,
                    Some(user_id.to_string()),
                    Some(card.imsi.clone()),
                    &snapshot,
                    &error_snapshot(&e),
                    OperationResult::Failed,
                    Some(e.to_string()),
                );
                self.audit.settle(compensation, audit);
                return Err(e.into());
            }
        };

        let outcome = SwitchOutcome::from_remote(&response);
        // Binding follows the envelope; the payload code only feeds detailMsg
        let succeeded = response.is_success();
        info!(
            imsi = %card.imsi,
            device_id,
            code = %outcome.code,
            detail = %outcome.detail_msg,
            "Remote switch completed"
        );

        let binding = if succeeded {
            Some(BindingUpdate::bind(&card.imsi, device_id, user_id))
        } else {
            compensation
        };
        let audit = OperationLog::new(
            OperationType::Switch,
            Some(user_id.to_string()),
            Some(card.imsi.clone()),
            &snapshot,
            &response_snapshot(&response),
            succeeded.into(),
            Some(outcome.remarks()),
        );
        self.audit.settle(binding, audit);

        Ok(outcome)
    }

    /// Force the return of the card `userId` holds
    ///
    /// The remote response is returned unmodified. On success the card the
    /// user held locally, if any, is released in the background.
    pub async fn force_return(&self, request: &ReturnRequest) -> AllocationResult<RemoteResponse> {
        let user_id = request.validate()?;
        info!(user_id, need_adjust = ?request.need_adjust, "Forced return requested");

        let imsi = self
            .cards
            .find_in_use_by_user(user_id)
            .await
            .map_err(AllocationError::Lookup)?
            .map(|card| card.imsi);

        let snapshot = serde_json::to_value(request).unwrap_or(Value::Null);

        let response = match self.remote.user_revuim(user_id, request.need_adjust).await {
            Ok(response) => response,
            Err(e) => {
                warn!(user_id, error = %e, "Remote return failed");
                self.audit.record(
                    OperationType::Return,
                    user_id,
                    imsi.as_deref(),
                    &snapshot,
                    &error_snapshot(&e),
                    OperationResult::Failed,
                    Some(e.to_string()),
                );
                return Err(e.into());
            }
        };

        let remarks = response
            .status_code()
            .map(|code| format!("{code} {}", code.describe()));

        match imsi {
            Some(imsi) if response.is_success() => {
                info!(user_id, imsi = %imsi, "Card returned");
                let audit = OperationLog::new(
                    OperationType::Return,
                    Some(user_id.to_string()),
                    Some(imsi.clone()),
                    &snapshot,
                    &response_snapshot(&response),
                    OperationResult::Success,
                    remarks,
                );
                self.audit.settle(Some(BindingUpdate::release(imsi, None)), audit);
            }
            imsi => {
                if response.is_success() {
                    warn!(user_id, "Return succeeded remotely but no local card is in use");
                }
                self.audit.record(
                    OperationType::Return,
                    user_id,
                    imsi.as_deref(),
                    &snapshot,
                    &response_snapshot(&response),
                    OperationResult::Failed,
                    remarks,
                );
            }
        }

        Ok(response)
    }
}

fn response_snapshot(response: &RemoteResponse) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

fn error_snapshot(error: &RemoteError) -> Value {
    json!({
        "error": error.to_string(),
        "status": error.upstream_status(),
        "body": error.upstream_body(),
    })
}
