//! HTTP client for the remote card-pool service.
//!
//! The remote service is the authority on which card is switched to which
//! user. Every call carries the configured API key in the `key` header.
//! Most calls are a `POST` with a JSON body; `clientsInfo`/`simpoolsDeatil`
//! post a multipart form and the SMS reads `getSms`/`sendResult` are a `GET`
//! with a query string.
//!
//! # Architecture
//!
//! ```text
//! AllocationCoordinator / PoolMirror
//!     │
//!     └─> CardPoolApi (trait)
//!             │
//!             └─> CardPoolClient ───(HTTPS)───> remote card pool
//!                     │
//!                     └─> CallObserver (api_call_logs)
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use cardpool_network::{CardPoolApi, CardPoolClient, CardPoolClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CardPoolClientConfig::new("https://pool.example.com", "secret")
//!     .timeout(Duration::from_secs(10));
//! let client = CardPoolClient::new(config)?;
//!
//! let response = client.clients_split("u1", "460001234567890").await?;
//! println!("{} {}", response.code, response.msg);
//! # Ok(())
//! # }
//! ```
//!
//! # Design Principles
//!
//! - **No automatic retry**: a switch must not be replayed behind the
//!   caller's back; callers decide.
//! - **Errors keep the upstream answer**: a non-2xx response keeps its
//!   status and JSON body so the gateway can pass them through.
//! - **Bounded**: every request has a timeout (default 10s).

use crate::observer::{ApiCallRecord, CallObserver};
use cardpool_core::constants::{
    API_KEY_HEADER, DEFAULT_REMOTE_TIMEOUT_MS, PATH_CLIENTS, PATH_CLIENTS_INFO, PATH_CLIENTS_SPLIT,
    PATH_GET_SMS, PATH_SEND_RESULT, PATH_SEND_SMS, PATH_SIM_CARDS_LIST, PATH_SIMPOOLS_DETAIL,
    PATH_USER_REVUIM,
};
use cardpool_core::{ClientsQuery, RemoteResponse, SendSmsRequest, SimCardsQuery};
use chrono::Utc;
use reqwest::multipart::Form;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration for the card-pool client
///
/// # Example
///
/// ```
/// use cardpool_network::CardPoolClientConfig;
/// use std::time::Duration;
///
/// let config = CardPoolClientConfig::new("http://127.0.0.1:9000", "secret")
///     .timeout(Duration::from_millis(5000));
/// assert_eq!(config.timeout, Duration::from_millis(5000));
/// ```
#[derive(Debug, Clone)]
pub struct CardPoolClientConfig {
    /// Base URL the API paths are appended to
    pub base_url: String,

    /// Value of the `key` header
    pub api_key: String,

    /// Timeout of a whole request, connect to last body byte
    pub timeout: Duration,
}

impl CardPoolClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for CardPoolClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: String::new(),
            timeout: Duration::from_millis(DEFAULT_REMOTE_TIMEOUT_MS),
        }
    }
}

/// Errors that can occur while calling the remote service
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No complete response within the configured timeout
    #[error("Request to {path} timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },

    /// Upstream answered with a non-2xx status
    #[error("Upstream {path} responded with HTTP {status}")]
    Status {
        path: String,
        status: u16,
        body: Option<Value>,
    },

    /// Connection refused, reset, DNS failure and the like
    #[error("Transport failure calling {path}: {message}")]
    Transport { path: String, message: String },

    /// 2xx response whose body is not a `{code, msg, data}` envelope
    #[error("Undecodable response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl RemoteError {
    /// HTTP status received from upstream, if a response arrived
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// JSON body received with a non-2xx status
    pub fn upstream_body(&self) -> Option<&Value> {
        match self {
            RemoteError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::Timeout { .. })
    }
}

/// Operations offered by the remote card pool
///
/// Every method returns the remote envelope as received; interpreting its
/// `code` is up to the caller.
pub trait CardPoolApi: Send + Sync + 'static {
    /// Switch the card `imsi` to `user_id`
    fn clients_split(
        &self,
        user_id: &str,
        imsi: &str,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Force the return of whatever card `user_id` holds
    fn user_revuim(
        &self,
        user_id: &str,
        need_adjust: Option<bool>,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Page through the card inventory
    fn sim_cards_list(
        &self,
        query: &SimCardsQuery,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Page through client devices
    fn clients(
        &self,
        query: &ClientsQuery,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Device of one user
    fn clients_info(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Detail of one pool, by MAC address
    fn simpools_detail(
        &self,
        mac_address: &str,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Next message waiting in the inbox of `user_id`
    fn get_sms(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Send an SMS from the card bound to the request's user
    fn send_sms(
        &self,
        request: &SendSmsRequest,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;

    /// Delivery report of a sent message
    fn send_result(
        &self,
        msg_id: &str,
    ) -> impl Future<Output = Result<RemoteResponse, RemoteError>> + Send;
}

#[derive(Debug, Clone, Copy)]
enum Encoding {
    Json,
    Multipart,
    /// `GET` with the members as query parameters
    Query,
}

impl Encoding {
    fn method(self) -> &'static str {
        match self {
            Encoding::Json | Encoding::Multipart => "POST",
            Encoding::Query => "GET",
        }
    }
}

/// HTTP implementation of [`CardPoolApi`]
#[derive(Clone)]
pub struct CardPoolClient {
    http: reqwest::Client,
    config: CardPoolClientConfig,
    observer: Option<Arc<dyn CallObserver>>,
}

impl CardPoolClient {
    pub fn new(config: CardPoolClientConfig) -> Result<Self, RemoteError> {
        let base_url = config.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RemoteError::Configuration(format!(
                "base URL must be http(s): {:?}",
                config.base_url
            )));
        }
        if config.timeout.is_zero() {
            return Err(RemoteError::Configuration("timeout must be positive".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            config,
            observer: None,
        })
    }

    /// Report every call to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &CardPoolClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim().trim_end_matches('/'), path)
    }

    async fn call(
        &self,
        path: &'static str,
        request: Value,
        encoding: Encoding,
    ) -> Result<RemoteResponse, RemoteError> {
        let requested_at = Utc::now();
        debug!(path, "Calling card pool");

        let url = self.url(path);
        let builder = match encoding {
            Encoding::Json => self.http.post(url).json(&request),
            Encoding::Multipart => self.http.post(url).multipart(form_from(&request)),
            Encoding::Query => self.http.get(url).query(&text_fields(&request)),
        }
        .header(API_KEY_HEADER, &self.config.api_key);

        let outcome = self.dispatch(path, builder).await;

        match &outcome {
            Ok(response) => info!(path, code = %response.code, "Card pool call completed"),
            Err(e) => warn!(path, error = %e, "Card pool call failed"),
        }

        if let Some(observer) = &self.observer {
            observer.on_call(record_for(
                path,
                encoding.method(),
                request,
                requested_at,
                &outcome,
            ));
        }

        outcome
    }

    async fn dispatch(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<RemoteResponse, RemoteError> {
        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(path, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            return Err(RemoteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(path, e))?;
        serde_json::from_str::<RemoteResponse>(&text).map_err(|e| RemoteError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    fn transport_error(&self, path: &str, error: reqwest::Error) -> RemoteError {
        if error.is_timeout() {
            RemoteError::Timeout {
                path: path.to_string(),
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            RemoteError::Transport {
                path: path.to_string(),
                message: error.to_string(),
            }
        }
    }
}

impl CardPoolApi for CardPoolClient {
    async fn clients_split(&self, user_id: &str, imsi: &str) -> Result<RemoteResponse, RemoteError> {
        self.call(
            PATH_CLIENTS_SPLIT,
            json!({"userId": user_id, "imsi": imsi}),
            Encoding::Json,
        )
        .await
    }

    async fn user_revuim(
        &self,
        user_id: &str,
        need_adjust: Option<bool>,
    ) -> Result<RemoteResponse, RemoteError> {
        self.call(
            PATH_USER_REVUIM,
            json!({"userId": user_id, "needAdjust": need_adjust}),
            Encoding::Json,
        )
        .await
    }

    async fn sim_cards_list(&self, query: &SimCardsQuery) -> Result<RemoteResponse, RemoteError> {
        let body = serde_json::to_value(query).map_err(|e| RemoteError::Configuration(e.to_string()))?;
        self.call(PATH_SIM_CARDS_LIST, body, Encoding::Json).await
    }

    async fn clients(&self, query: &ClientsQuery) -> Result<RemoteResponse, RemoteError> {
        let body = serde_json::to_value(query).map_err(|e| RemoteError::Configuration(e.to_string()))?;
        self.call(PATH_CLIENTS, body, Encoding::Json).await
    }

    async fn clients_info(&self, user_id: &str) -> Result<RemoteResponse, RemoteError> {
        self.call(PATH_CLIENTS_INFO, json!({"userId": user_id}), Encoding::Multipart)
            .await
    }

    async fn simpools_detail(&self, mac_address: &str) -> Result<RemoteResponse, RemoteError> {
        self.call(
            PATH_SIMPOOLS_DETAIL,
            json!({"macAddress": mac_address}),
            Encoding::Multipart,
        )
        .await
    }

    async fn get_sms(&self, user_id: &str) -> Result<RemoteResponse, RemoteError> {
        self.call(PATH_GET_SMS, json!({"userId": user_id}), Encoding::Query)
            .await
    }

    async fn send_sms(&self, request: &SendSmsRequest) -> Result<RemoteResponse, RemoteError> {
        let body = serde_json::to_value(request).map_err(|e| RemoteError::Configuration(e.to_string()))?;
        self.call(PATH_SEND_SMS, body, Encoding::Json).await
    }

    async fn send_result(&self, msg_id: &str) -> Result<RemoteResponse, RemoteError> {
        self.call(PATH_SEND_RESULT, json!({"msgId": msg_id}), Encoding::Query)
            .await
    }
}

/// Members of `fields` as text, nulls dropped
fn text_fields(fields: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = fields else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((name.clone(), text))
        })
        .collect()
}

/// Multipart form with one text part per member of `fields`
fn form_from(fields: &Value) -> Form {
    text_fields(fields)
        .into_iter()
        .fold(Form::new(), |form, (name, text)| form.text(name, text))
}

fn record_for(
    path: &str,
    method: &'static str,
    request: Value,
    requested_at: chrono::DateTime<Utc>,
    outcome: &Result<RemoteResponse, RemoteError>,
) -> ApiCallRecord {
    let (response_code, response, error) = match outcome {
        Ok(response) => (
            Some(response.code.clone()),
            serde_json::to_value(response).ok(),
            None,
        ),
        Err(e) => (
            e.upstream_status().map(|status| status.to_string()),
            e.upstream_body().cloned(),
            Some(e.to_string()),
        ),
    };

    ApiCallRecord {
        path: path.to_string(),
        method,
        request,
        response_code,
        response,
        requested_at,
        responded_at: Utc::now(),
        succeeded: outcome.is_ok(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CardPoolClientConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = CardPoolClient::new(CardPoolClientConfig::new("ftp://pool", "k")).err();
        assert!(matches!(err, Some(RemoteError::Configuration(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = CardPoolClientConfig::new("http://pool", "k").timeout(Duration::ZERO);
        assert!(CardPoolClient::new(config).is_err());
    }

    #[test]
    fn test_url_joining() {
        let client = CardPoolClient::new(CardPoolClientConfig::new("http://pool/api/", "k")).unwrap();
        assert_eq!(client.url(PATH_CLIENTS_SPLIT), "http://pool/api/outbreak/clientsSpilt");
    }

    #[test]
    fn test_upstream_accessors() {
        let err = RemoteError::Status {
            path: PATH_USER_REVUIM.to_string(),
            status: 502,
            body: Some(json!({"code": "5020000"})),
        };
        assert_eq!(err.upstream_status(), Some(502));
        assert_eq!(err.upstream_body(), Some(&json!({"code": "5020000"})));

        let err = RemoteError::Timeout {
            path: PATH_USER_REVUIM.to_string(),
            timeout_ms: 10,
        };
        assert!(err.is_timeout());
        assert_eq!(err.upstream_status(), None);
    }

    #[test]
    fn test_failed_call_record() {
        let outcome: Result<RemoteResponse, RemoteError> = Err(RemoteError::Status {
            path: PATH_CLIENTS.to_string(),
            status: 503,
            body: None,
        });
        let record = record_for(PATH_CLIENTS, "POST", json!({"page": 1}), Utc::now(), &outcome);
        assert!(!record.succeeded);
        assert_eq!(record.response_code.as_deref(), Some("503"));
        assert!(record.error.as_ref().unwrap().contains("503"));
        assert!(record.elapsed_ms() >= 0);
    }

    #[test]
    fn test_text_fields_skip_nulls() {
        let fields = text_fields(&json!({"userId": "u1", "needAdjust": null, "page": 2}));
        assert_eq!(
            fields,
            [
                ("page".to_string(), "2".to_string()),
                ("userId".to_string(), "u1".to_string()),
            ]
        );
        assert!(text_fields(&json!("scalar")).is_empty());
        assert_eq!(Encoding::Query.method(), "GET");
        assert_eq!(Encoding::Multipart.method(), "POST");
    }
}
