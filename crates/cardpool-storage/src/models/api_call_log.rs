use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One call made to the remote card-pool API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallLog {
    pub id: i64,
    pub api_path: String,
    pub method: String,

    /// JSON text of the request body or form
    pub request_params: Option<String>,

    /// Top-level `code` of the response, or the HTTP status on failure
    pub response_code: Option<String>,

    /// JSON text of the response body
    pub response_data: Option<String>,

    pub request_time: DateTime<Utc>,
    pub response_time: DateTime<Utc>,
    pub execution_time_ms: i64,

    /// `success` or `failed`
    pub status: String,

    pub error_message: Option<String>,
}

impl ApiCallLog {
    pub fn status(&self) -> Option<CallStatus> {
        match self.status.as_str() {
            "success" => Some(CallStatus::Success),
            "failed" => Some(CallStatus::Failed),
            _ => None,
        }
    }
}

/// Transport-level outcome of a remote call: an HTTP 2xx with a decodable
/// body is a success even when the remote `code` reports a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Success,
    Failed,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Failed => "failed",
        }
    }
}
