use cardpool_network::RemoteError;
use cardpool_storage::StorageError;
use thiserror::Error;

/// Failures of a switch or forced return that happen before a response is
/// produced.
///
/// Everything after the remote round-trip runs on the background queue and
/// never shows up here.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Required request fields were absent or blank
    #[error("Missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// No card matches the phone number, exactly or fuzzily
    #[error("No card found for phone number {phone_number}")]
    UnknownPhoneNumber { phone_number: String },

    /// The card is held by another device
    #[error("Card {imsi} ({phone_number}) is held by device {device_number}")]
    Occupied {
        phone_number: String,
        imsi: String,
        device_number: String,
    },

    /// Storage failed while resolving the card
    #[error("Card lookup failed: {0}")]
    Lookup(#[source] StorageError),

    /// Storage failed while releasing or binding before the remote call
    #[error("Binding failed: {0}")]
    Persistence(#[source] StorageError),

    /// The remote call did not complete
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Background queue failures visible to the submitter
#[derive(Debug, Error)]
pub enum QueueError {
    /// The worker task is gone
    #[error("Background queue is closed")]
    Closed,
}
