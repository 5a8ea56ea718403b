//! Wire shapes of the remote card-pool API.
//!
//! The remote service is loose about types: codes come back as strings or
//! numbers, flags as booleans, `0/1` or strings, and `data` either as a JSON
//! value or as a JSON document serialized into a string. Everything is
//! normalized here, at the boundary, so the rest of the gateway works with
//! one shape.

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, REMOTE_SUCCESS_CODE};
use crate::status::StatusCode;
use crate::types::Pagination;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static EMBEDDED_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""code"\s*:\s*"([^"]+)""#).expect("embedded code pattern is valid")
});

/// Envelope of every remote response: `{code, msg, data}`.
///
/// Members beyond those three are kept in `extra` so that pass-through
/// routes hand the caller the upstream body unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    #[serde(deserialize_with = "de::stringish")]
    pub code: String,

    #[serde(default, deserialize_with = "de::string_or_empty")]
    pub msg: String,

    #[serde(default)]
    pub data: Payload,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteResponse {
    pub fn new(code: impl Into<String>, msg: impl Into<String>, data: Payload) -> Self {
        Self {
            code: code.into(),
            msg: msg.into(),
            data,
            extra: Map::new(),
        }
    }

    /// Whether the top-level code reports success
    pub fn is_success(&self) -> bool {
        let code = self.code.trim();
        code == REMOTE_SUCCESS_CODE
            || StatusCode::parse(code)
                .map(|status| status.is_success())
                .unwrap_or(false)
    }

    /// Detailed status code carried by `data`
    ///
    /// `None` when the payload has no code or the code is malformed. The
    /// top-level `code` is never substituted.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.data
            .status_code()
            .and_then(|raw| StatusCode::parse(&raw).ok())
    }
}

/// `data` member of a remote response.
///
/// Deserialization tries `Raw` first, so a JSON string always lands there
/// and every other JSON value (null included) lands in `Structured`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Raw(String),
    Structured(Value),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Structured(Value::Null)
    }
}

impl Payload {
    /// `null` or an empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Raw(text) => text.is_empty(),
            Payload::Structured(value) => value.is_null(),
        }
    }

    /// Structured view of the payload.
    ///
    /// A raw string is parsed as JSON; text that is not JSON yields `None`.
    pub fn decode(&self) -> Option<Value> {
        match self {
            Payload::Structured(Value::Null) => None,
            Payload::Structured(value) => Some(value.clone()),
            Payload::Raw(text) => serde_json::from_str(text).ok(),
        }
    }

    /// Raw status code carried by the payload, if any.
    ///
    /// Raw strings are scanned for a `"code": "..."` member without a full
    /// parse; structured payloads expose it as a string or number member.
    pub fn status_code(&self) -> Option<String> {
        match self {
            Payload::Raw(text) => EMBEDDED_CODE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
            Payload::Structured(Value::Object(map)) => match map.get("code")? {
                Value::String(code) => Some(code.clone()),
                Value::Number(code) => Some(code.to_string()),
                _ => None,
            },
            Payload::Structured(_) => None,
        }
    }

    /// Member `name` of the decoded payload
    pub fn field(&self, name: &str) -> Option<Value> {
        match self.decode()? {
            Value::Object(mut map) => map.remove(name),
            _ => None,
        }
    }
}

/// SIM card record as reported by `simCardsList`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSimCard {
    #[serde(rename = "id", default, deserialize_with = "de::opt_stringish")]
    pub card_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub iccid: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub imsi: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub mcc: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub mnc: Option<String>,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub is_activate: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub is_broken: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub is_disabled: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub is_in_simpool: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub location_in_sim_pool: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub sim_pool_mac_addr: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub bind_number: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub img_md5: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub operator_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub org_code: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub update_at: Option<String>,
}

impl RemoteSimCard {
    /// Decode the `content` array of a `simCardsList` payload, skipping
    /// entries that are not card objects or carry no IMSI
    pub fn from_page(payload: &Payload) -> Vec<RemoteSimCard> {
        let Some(Value::Array(items)) = payload.field("content") else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RemoteSimCard>(item).ok())
            .filter(|card| card.imsi.as_deref().is_some_and(|imsi| !imsi.is_empty()))
            .collect()
    }
}

/// Client device record as reported by `clients` / `clientsInfo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDevice {
    #[serde(rename = "id", default, deserialize_with = "de::opt_stringish")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub name: Option<String>,
    #[serde(rename = "inUser", default, deserialize_with = "de::opt_flag")]
    pub in_use: Option<bool>,
    #[serde(rename = "type", default, deserialize_with = "de::opt_stringish")]
    pub device_type: Option<String>,
}

impl RemoteDevice {
    /// Devices listed in the `content` array of a `clients` payload
    pub fn from_page(payload: &Payload) -> Vec<RemoteDevice> {
        let Some(Value::Array(items)) = payload.field("content") else {
            return Vec::new();
        };
        items.into_iter().filter_map(Self::from_value).collect()
    }

    /// Device carried in the `clients` member of a `clientsInfo` payload
    pub fn from_info(payload: &Payload) -> Option<RemoteDevice> {
        payload.field("clients").and_then(Self::from_value)
    }

    fn from_value(value: Value) -> Option<RemoteDevice> {
        serde_json::from_value::<RemoteDevice>(value)
            .ok()
            .filter(|device| device.user_id.as_deref().is_some_and(|id| !id.is_empty()))
    }
}

/// Body of `simCardsList`, also used as the filter of the local card list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimCardsQuery {
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub imsi: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub sim_pool_mac_addr: Option<String>,
    #[serde(default = "default_page", deserialize_with = "de::page_number")]
    pub page: u32,
    #[serde(default = "default_page_size", deserialize_with = "de::page_number")]
    pub size: u32,
}

impl SimCardsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.size)
    }
}

impl Default for SimCardsQuery {
    fn default() -> Self {
        Self {
            imsi: None,
            user_id: None,
            sim_pool_mac_addr: None,
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Body of `clients`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientsQuery {
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(default = "default_page", deserialize_with = "de::page_number")]
    pub page: u32,
    #[serde(default = "default_page_size", deserialize_with = "de::page_number")]
    pub size: u32,
}

impl Default for ClientsQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Filter of the local device list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicesQuery {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub name: Option<String>,
    #[serde(default = "default_page", deserialize_with = "de::page_number")]
    pub page: u32,
    #[serde(default = "default_page_size", deserialize_with = "de::page_number")]
    pub size: u32,
}

impl DevicesQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.size)
    }
}

impl Default for DevicesQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            name: None,
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Body of `sendSms`
///
/// Member names are the remote service's own, snake and camel case mixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSmsRequest {
    #[serde(
        rename = "userId",
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub sms_receiver: Option<String>,
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<String>,
    /// Caller-chosen id; the remote service assigns one when absent
    #[serde(
        default,
        deserialize_with = "de::opt_stringish",
        skip_serializing_if = "Option::is_none"
    )]
    pub msg_id: Option<String>,
}

/// Message returned by `getSms`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSms {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub sender: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub receiver: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub content: Option<String>,
    /// Receive time as formatted by the remote service
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub date: Option<String>,
}

impl RemoteSms {
    /// Message carried by a `getSms` payload; `None` unless it is an object
    pub fn from_payload(payload: &Payload) -> Option<RemoteSms> {
        match payload.decode()? {
            value @ Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    /// Whether a `sendResult` payload reports delivery (`success` member)
    pub fn delivered(payload: &Payload) -> bool {
        match payload.field("success") {
            Some(Value::Bool(flag)) => flag,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            Some(Value::String(s)) => matches!(s.trim(), "true" | "1"),
            _ => false,
        }
    }
}

/// Filter of the local SMS record list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsQuery {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_stringish")]
    pub msg_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub is_outgoing: Option<bool>,
    #[serde(default = "default_page", deserialize_with = "de::page_number")]
    pub page: u32,
    #[serde(default = "default_page_size", deserialize_with = "de::page_number")]
    pub size: u32,
}

impl SmsQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.size)
    }
}

impl Default for SmsQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            msg_id: None,
            is_outgoing: None,
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Lenient deserializers for the loosely typed remote fields
pub mod de {
    use serde::{Deserialize, Deserializer, de::Error};
    use serde_json::Value;

    /// String or number, rendered as a string
    pub fn stringish<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!(
                "expected string or number, found {}",
                other
            ))),
        }
    }

    /// Like [`stringish`], with null and empty strings mapped to `None`
    pub fn opt_stringish<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_stringish(deserializer)?.unwrap_or_default())
    }

    /// Boolean given as `true`, `1` or `"true"`/`"1"`
    pub fn opt_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => Some(b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// Page number or size given as a number or numeric string
    pub fn page_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| D::Error::custom(format!("invalid page value {}", n))),
            Value::String(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| D::Error::custom(format!("invalid page value {:?}", s))),
            Value::Null => Ok(0),
            other => Err(D::Error::custom(format!("invalid page value {}", other))),
        }
    }
}
