//! Storage layer for the card-pool gateway.
//!
//! This crate provides SQLite-backed persistence for the local mirror of
//! the remote card pool: SIM cards, client devices, relayed SMS, the
//! operation audit trail and the record of remote API calls.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool manager with embedded migrations
//! - [`SimCardRepository`], [`DeviceRepository`], [`SmsRecordRepository`],
//!   [`OperationLogRepository`], [`ApiCallLogRepository`] - Data access traits
//!   with SQLite implementations
//! - [`CardDirectory`] - Phone number and IMSI resolution
//! - [`transaction`] - Transaction-aware writes for atomic multistep operations
//!
//! # Binding Consistency
//!
//! A card is bound to at most one device. Binding writes are
//! compare-and-set updates (see [`BindingUpdate`]), and the release of a
//! device's previous card happens in the same transaction as the claim of
//! its new one, so two concurrent switches for the same card cannot both
//! win.
//!
//! # Examples
//!
//! ```no_run
//! use cardpool_storage::{CardDirectory, Database, DatabaseConfig};
//! use cardpool_storage::repositories::{SimCardRepository, SqliteSimCardRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("cardpool.db")).await?;
//!
//! let directory = CardDirectory::new(db.pool().clone());
//! if let Some(card) = directory.resolve_by_phone("+86 138-0000-0000").await? {
//!     let cards = SqliteSimCardRepository::new(db.pool().clone());
//!     cards.claim_for_device(&card.imsi, "device-1", "user-1").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod directory;
pub mod error;
pub mod models;
pub mod repositories;
pub mod transaction;

pub use connection::{Database, DatabaseConfig};
pub use directory::CardDirectory;
pub use error::{StorageError, StorageResult};
pub use models::{
    ApiCallLog, BindingUpdate, CallStatus, Device, OperationLog, OperationResult, OperationType,
    Page, SimCard, SmsRecord, SmsStatus,
};
pub use repositories::{
    ApiCallLogRepository, DeviceRepository, OperationLogRepository, SimCardRepository,
    SmsRecordRepository, SqliteApiCallLogRepository, SqliteDeviceRepository,
    SqliteOperationLogRepository, SqliteSimCardRepository, SqliteSmsRecordRepository,
};
