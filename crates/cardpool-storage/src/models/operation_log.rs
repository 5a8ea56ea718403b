use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Audit record of a switch or forced-return operation
///
/// Written once, after the remote round-trip completed, and never updated
/// (the table rejects updates with a trigger). Request and response are
/// stored as JSON snapshots.
///
/// # Examples
///
/// ```
/// use cardpool_storage::models::{OperationLog, OperationResult, OperationType};
/// use serde_json::json;
///
/// let log = OperationLog::new(
///     OperationType::Switch,
///     Some("u1".to_string()),
///     Some("460001234567890".to_string()),
///     &json!({"userId": "u1", "phoneNumber": "13800000000", "deviceId": "d1"}),
///     &json!({"code": "3810000"}),
///     OperationResult::Success,
///     Some("0x03810000 操作成功".to_string()),
/// );
///
/// assert!(log.succeeded());
/// assert_eq!(log.kind(), Some(OperationType::Switch));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OperationLog {
    pub id: i64,

    /// `switch` or `return`; see [`OperationLog::kind`]
    pub operation_type: String,

    pub user_id: Option<String>,
    pub imsi: Option<String>,

    /// JSON snapshot of the inbound request
    pub request_data: Option<String>,

    /// JSON snapshot of the remote response, or of the error
    pub response_data: Option<String>,

    /// `success` or `failed`
    pub result: String,

    /// Normalized status code and its message, when one was decoded
    pub remarks: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl OperationLog {
    pub fn new(
        operation_type: OperationType,
        user_id: Option<String>,
        imsi: Option<String>,
        request: &Value,
        response: &Value,
        result: OperationResult,
        remarks: Option<String>,
    ) -> Self {
        Self {
            id: 0,
            operation_type: operation_type.as_str().to_string(),
            user_id,
            imsi,
            request_data: Some(request.to_string()),
            response_data: Some(response.to_string()),
            result: result.as_str().to_string(),
            remarks,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> Option<OperationType> {
        OperationType::parse(&self.operation_type)
    }

    pub fn succeeded(&self) -> bool {
        self.result == OperationResult::Success.as_str()
    }

    /// Parsed request snapshot
    pub fn request_json(&self) -> Option<Value> {
        self.request_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// Parsed response snapshot
    pub fn response_json(&self) -> Option<Value> {
        self.response_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Card switch (`clientsSpilt`)
    Switch,
    /// Forced return (`userRevuim`)
    Return,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Switch => "switch",
            OperationType::Return => "return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "switch" => Some(OperationType::Switch),
            "return" => Some(OperationType::Return),
            _ => None,
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success,
    Failed,
}

impl OperationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationResult::Success => "success",
            OperationResult::Failed => "failed",
        }
    }
}

impl From<bool> for OperationResult {
    fn from(success: bool) -> Self {
        if success {
            OperationResult::Success
        } else {
            OperationResult::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_type_round_trip() {
        for kind in [OperationType::Switch, OperationType::Return] {
            assert_eq!(OperationType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(OperationType::parse("swap"), None);
    }

    #[test]
    fn test_snapshots_are_json_text() {
        let log = OperationLog::new(
            OperationType::Return,
            Some("u1".to_string()),
            None,
            &json!({"userId": "u1"}),
            &json!({"code": "3810001", "msg": "用户未登录"}),
            OperationResult::Failed,
            None,
        );

        assert!(!log.succeeded());
        assert_eq!(log.request_json(), Some(json!({"userId": "u1"})));
        assert_eq!(log.response_json().unwrap()["msg"], "用户未登录");
    }
}
