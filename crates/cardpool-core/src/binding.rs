//! Card binding state machine.
//!
//! A SIM card is either `Free` or `Bound` to exactly one device. The valid
//! transitions are:
//!
//! - `Free → Bound(d)` (bind)
//! - `Bound(d) → Bound(d)` (idempotent re-bind, user may change)
//! - `Bound(d) → Free` (release or forced return)
//! - `Free → Free` (releasing a free card is a no-op)
//!
//! `Bound(a) → Bound(b)` with `a != b` is rejected: the card has to be
//! released by its holder first.
//!
//! # Examples
//!
//! ```
//! use cardpool_core::CardBinding;
//!
//! let free = CardBinding::Free;
//! let bound = CardBinding::bound("d1", Some("u1"));
//!
//! assert!(free.can_transition_to(&bound));
//! assert!(!bound.can_transition_to(&CardBinding::bound("d2", Some("u2"))));
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CardBinding {
    Free,
    Bound {
        device_id: String,
        user_id: Option<String>,
    },
}

impl CardBinding {
    pub fn bound(device_id: impl Into<String>, user_id: Option<&str>) -> Self {
        CardBinding::Bound {
            device_id: device_id.into(),
            user_id: user_id.map(str::to_string),
        }
    }

    /// Build the state from the persisted `device_number`/`user_id` columns.
    ///
    /// A row with no device number is free regardless of its user column,
    /// which the inventory refresh may fill in on its own.
    pub fn from_columns(device_number: Option<&str>, user_id: Option<&str>) -> Self {
        match device_number {
            Some(device) if !device.is_empty() => Self::bound(device, user_id),
            _ => CardBinding::Free,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, CardBinding::Free)
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            CardBinding::Free => None,
            CardBinding::Bound { device_id, .. } => Some(device_id),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            CardBinding::Free => None,
            CardBinding::Bound { user_id, .. } => user_id.as_deref(),
        }
    }

    /// Whether the card is currently held by `device_id`
    pub fn is_held_by(&self, device_id: &str) -> bool {
        self.device_id() == Some(device_id)
    }

    pub fn can_transition_to(&self, next: &CardBinding) -> bool {
        match (self, next) {
            (CardBinding::Free, _) => true,
            (CardBinding::Bound { .. }, CardBinding::Free) => true,
            (
                CardBinding::Bound { device_id: held, .. },
                CardBinding::Bound { device_id: wanted, .. },
            ) => held == wanted,
        }
    }

    /// Validate and return the next state
    pub fn transition_to(&self, next: CardBinding) -> Result<CardBinding> {
        if !self.can_transition_to(&next) {
            return Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        Ok(next)
    }
}

impl fmt::Display for CardBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardBinding::Free => write!(f, "Free"),
            CardBinding::Bound { device_id, .. } => write!(f, "Bound({})", device_id),
        }
    }
}
