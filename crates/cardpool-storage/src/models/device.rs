use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client device mirrored from the remote card pool, one per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(skip)]
    pub id: i64,

    /// Device id as reported remotely
    #[serde(rename = "id")]
    pub device_id: Option<String>,

    pub user_id: String,
    pub status: Option<String>,
    pub name: Option<String>,

    #[serde(rename = "inUser")]
    pub in_use: bool,

    #[serde(rename = "type")]
    pub device_type: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
