//! Shared vocabulary for the card-pool gateway.
//!
//! Everything here is pure: identifiers and phone normalization, the card
//! binding state machine, the status-code translator, the wire shapes of the
//! remote card-pool API and the user-facing response messages. Storage,
//! network and HTTP concerns live in the sibling crates.

pub mod binding;
pub mod constants;
pub mod error;
pub mod messages;
pub mod status;
pub mod types;
pub mod wire;

pub use binding::CardBinding;
pub use error::{Error, Result};
pub use messages::ResponseMessages;
pub use status::{StatusCode, translate};
pub use types::*;
pub use wire::{
    ClientsQuery, DevicesQuery, Payload, RemoteDevice, RemoteResponse, RemoteSimCard, RemoteSms,
    SendSmsRequest, SimCardsQuery, SmsQuery,
};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
