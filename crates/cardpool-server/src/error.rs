//! HTTP mapping of every failure the gateway can report.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cardpool_allocation::AllocationError;
use cardpool_core::ResponseMessages;
use cardpool_core::constants::{
    CODE_CARD_OCCUPIED, CODE_INVALID_PHONE_NUMBER, CODE_LOOKUP_FAILED, CODE_MISSING_PARAMETER,
    CODE_NOT_FOUND, CODE_OPERATION_FAILED, CODE_UNAUTHORIZED,
};
use cardpool_network::RemoteError;
use cardpool_storage::StorageError;
use serde_json::{Value, json};
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    /// Switch or return failure; `data` echoes the request, `failure` is
    /// the message for unexpected errors
    Allocation {
        error: AllocationError,
        data: Value,
        failure: &'static str,
    },

    /// Proxy call failure
    Remote {
        error: RemoteError,
        failure: &'static str,
    },

    /// Local query failure
    Storage(StorageError),

    NotFound(&'static str),
    MissingApiKey,
    InvalidApiKey,

    /// Body is not JSON of the expected shape
    InvalidBody(String),
}

impl ApiError {
    pub fn allocation(error: AllocationError, data: Value, failure: &'static str) -> Self {
        ApiError::Allocation {
            error,
            data,
            failure,
        }
    }

    pub fn remote(error: RemoteError, failure: &'static str) -> Self {
        ApiError::Remote { error, failure }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        ApiError::Storage(error)
    }
}

fn body(status: StatusCode, value: Value) -> Response {
    (status, Json(value)).into_response()
}

fn failure_body(status: StatusCode, code: &str, msg: &str, error: impl ToString) -> Response {
    body(status, json!({"code": code, "msg": msg, "error": error.to_string()}))
}

/// Upstream status and JSON body when the remote answered, else a 500
fn remote_response(error: RemoteError, failure: &'static str) -> Response {
    let upstream = error
        .upstream_status()
        .and_then(|status| StatusCode::from_u16(status).ok());
    match (upstream, error.upstream_body()) {
        (Some(status), Some(upstream_body)) => body(status, upstream_body.clone()),
        _ => {
            error!(error = %error, "Remote call failed");
            failure_body(StatusCode::INTERNAL_SERVER_ERROR, CODE_OPERATION_FAILED, failure, &error)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Allocation {
                error,
                data,
                failure,
            } => match error {
                AllocationError::Validation { missing } => {
                    let msg = if missing == ["userId"] {
                        ResponseMessages::MISSING_USER_ID
                    } else {
                        ResponseMessages::MISSING_SWITCH_PARAMETERS
                    };
                    body(
                        StatusCode::BAD_REQUEST,
                        json!({"code": CODE_MISSING_PARAMETER, "msg": msg, "data": data}),
                    )
                }
                AllocationError::UnknownPhoneNumber { phone_number } => body(
                    StatusCode::BAD_REQUEST,
                    json!({
                        "code": CODE_INVALID_PHONE_NUMBER,
                        "msg": ResponseMessages::INVALID_PHONE_NUMBER,
                        "data": {"phoneNumber": phone_number},
                    }),
                ),
                AllocationError::Occupied {
                    phone_number,
                    imsi,
                    device_number,
                } => body(
                    StatusCode::BAD_REQUEST,
                    json!({
                        "code": CODE_CARD_OCCUPIED,
                        "msg": ResponseMessages::CARD_OCCUPIED,
                        "data": {
                            "phoneNumber": phone_number,
                            "imsi": imsi,
                            "device_number": device_number,
                        },
                    }),
                ),
                AllocationError::Lookup(e) => {
                    error!(error = %e, "Card lookup failed");
                    failure_body(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        CODE_LOOKUP_FAILED,
                        ResponseMessages::CARD_LOOKUP_FAILED,
                        e,
                    )
                }
                AllocationError::Persistence(e) => {
                    error!(error = %e, "Binding failed");
                    failure_body(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        CODE_OPERATION_FAILED,
                        failure,
                        e,
                    )
                }
                AllocationError::Remote(e) => remote_response(e, failure),
            },
            ApiError::Remote { error, failure } => remote_response(error, failure),
            ApiError::Storage(e) => {
                error!(error = %e, "Local query failed");
                failure_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CODE_OPERATION_FAILED,
                    ResponseMessages::LOCAL_QUERY_FAILED,
                    e,
                )
            }
            ApiError::NotFound(msg) => body(
                StatusCode::NOT_FOUND,
                json!({"code": CODE_NOT_FOUND, "msg": msg}),
            ),
            ApiError::MissingApiKey => body(
                StatusCode::UNAUTHORIZED,
                json!({"code": CODE_UNAUTHORIZED, "msg": ResponseMessages::MISSING_API_KEY}),
            ),
            ApiError::InvalidApiKey => body(
                StatusCode::UNAUTHORIZED,
                json!({"code": CODE_UNAUTHORIZED, "msg": ResponseMessages::INVALID_API_KEY}),
            ),
            ApiError::InvalidBody(reason) => body(
                StatusCode::BAD_REQUEST,
                json!({
                    "code": CODE_MISSING_PARAMETER,
                    "msg": ResponseMessages::INVALID_BODY,
                    "error": reason,
                }),
            ),
        }
    }
}
