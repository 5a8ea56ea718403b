//! `key` header gate for everything under `/api`.

use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use cardpool_core::constants::API_KEY_HEADER;
use std::sync::Arc;
use subtle::{Choice, ConstantTimeEq};
use tracing::warn;

/// Keys accepted from callers
///
/// With no keys configured any non-empty key passes.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGate {
    accepted: Arc<Vec<String>>,
}

impl ApiKeyGate {
    pub fn new(accepted: Vec<String>) -> Self {
        Self {
            accepted: Arc::new(accepted.into_iter().filter(|k| !k.is_empty()).collect()),
        }
    }

    pub fn check(&self, presented: Option<&str>) -> Result<(), ApiError> {
        let presented = presented
            .filter(|key| !key.is_empty())
            .ok_or(ApiError::MissingApiKey)?;

        if self.accepted.is_empty() {
            return Ok(());
        }

        // Constant time across all keys
        let matched = self
            .accepted
            .iter()
            .fold(Choice::from(0), |acc, key| {
                acc | key.as_bytes().ct_eq(presented.as_bytes())
            });

        if bool::from(matched) {
            Ok(())
        } else {
            Err(ApiError::InvalidApiKey)
        }
    }
}

pub async fn require_api_key(
    State(gate): State<ApiKeyGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = gate.check(presented) {
        warn!(path = %request.uri().path(), "Rejected request without a valid API key");
        return Err(e);
    }

    Ok(next.run(request).await)
}
