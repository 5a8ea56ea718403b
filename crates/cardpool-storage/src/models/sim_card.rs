use cardpool_core::CardBinding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SIM card mirrored from the remote card pool
///
/// Identity is the IMSI. Inventory fields are refreshed from `simCardsList`
/// responses; the binding fields (`device_number`, `is_used`) are written
/// only by the allocation path. `user_id` is also reported by the remote
/// inventory, which may fill it in while the card is free but never
/// overwrites the user of a bound card.
///
/// # Invariant
///
/// `is_used` is true iff `device_number` is set. Every write that touches one
/// touches the other, and the table carries a `CHECK` constraint for it.
///
/// # JSON shape
///
/// Serialized with the remote API's field names (`id` is the remote card id),
/// so local list results look like remote ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SimCard {
    /// Local primary key
    #[serde(skip)]
    pub id: i64,

    pub imsi: String,

    /// Card id assigned by the remote service
    #[serde(rename = "id")]
    pub card_id: Option<String>,

    pub iccid: Option<String>,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub phone_number: Option<String>,

    /// Digit-only copy of `phone_number`, used by the fuzzy lookup
    #[serde(skip)]
    pub phone_digits: String,

    pub is_activate: bool,
    pub is_broken: bool,
    pub is_disabled: bool,
    pub is_in_simpool: bool,
    pub location_in_sim_pool: Option<String>,
    pub sim_pool_mac_addr: Option<String>,

    /// User the card is assigned to
    pub user_id: Option<String>,

    /// Device currently holding the card
    pub device_number: Option<String>,

    pub is_used: bool,

    pub name: Option<String>,
    pub bind_number: Option<String>,
    pub img_md5: Option<String>,
    pub operator_id: Option<String>,
    pub org_code: Option<String>,

    /// Last update time reported by the remote service, verbatim
    pub update_at: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SimCard {
    /// Binding state derived from the binding columns
    pub fn binding(&self) -> CardBinding {
        if !self.is_used {
            return CardBinding::Free;
        }
        CardBinding::from_columns(self.device_number.as_deref(), self.user_id.as_deref())
    }

    /// Whether the card is in use by a device other than `device_id`
    pub fn is_held_by_other(&self, device_id: &str) -> bool {
        let binding = self.binding();
        !binding.is_free() && !binding.is_held_by(device_id)
    }
}

/// Conditional write of a card's binding columns.
///
/// Every update is a compare-and-set: binding only succeeds while the card is
/// free or already held by the same device, and a release with
/// `expected_device` only succeeds while that device still holds the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingUpdate {
    pub imsi: String,
    pub target: CardBinding,
    pub expected_device: Option<String>,
    /// Clear `user_id` along with the device on release
    pub clear_user: bool,
}

impl BindingUpdate {
    /// Bind `imsi` to `(device_id, user_id)`; idempotent for the same device
    pub fn bind(imsi: impl Into<String>, device_id: &str, user_id: &str) -> Self {
        Self {
            imsi: imsi.into(),
            target: CardBinding::bound(device_id, Some(user_id)),
            expected_device: None,
            clear_user: false,
        }
    }

    /// Undo a local bind if `device_id` still holds the card
    pub fn compensate(imsi: impl Into<String>, device_id: &str) -> Self {
        Self {
            imsi: imsi.into(),
            target: CardBinding::Free,
            expected_device: Some(device_id.to_string()),
            clear_user: false,
        }
    }

    /// Free the card and detach it from its user (forced return)
    pub fn release(imsi: impl Into<String>, expected_device: Option<&str>) -> Self {
        Self {
            imsi: imsi.into(),
            target: CardBinding::Free,
            expected_device: expected_device.map(str::to_string),
            clear_user: true,
        }
    }
}
