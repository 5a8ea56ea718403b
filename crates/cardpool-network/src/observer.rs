//! Hook for recording every remote call.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Outcome of one remote call, successful or not
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCallRecord {
    pub path: String,
    pub method: &'static str,

    /// Request body or form fields
    pub request: Value,

    /// Remote `code` on success, HTTP status on failure
    pub response_code: Option<String>,

    pub response: Option<Value>,
    pub requested_at: DateTime<Utc>,
    pub responded_at: DateTime<Utc>,

    /// HTTP 2xx with a decodable body
    pub succeeded: bool,

    pub error: Option<String>,
}

impl ApiCallRecord {
    pub fn elapsed_ms(&self) -> i64 {
        (self.responded_at - self.requested_at).num_milliseconds()
    }
}

/// Receives a record after every remote call.
///
/// Called inline on the request path, so implementations must not block.
pub trait CallObserver: Send + Sync {
    fn on_call(&self, record: ApiCallRecord);
}
