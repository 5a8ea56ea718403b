//! Route registration for the gateway.

use crate::api_key::{ApiKeyGate, require_api_key};
use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use cardpool_allocation::{
    AllocationCoordinator, AuditLogWriter, PoolMirror, ReturnRequest, SwitchOutcome, SwitchRequest,
};
use cardpool_core::constants::LOCAL_SUCCESS_CODE;
use cardpool_core::wire::de;
use cardpool_core::{
    ClientsQuery, DevicesQuery, RemoteResponse, ResponseMessages, SendSmsRequest, SimCardsQuery,
    SmsQuery,
};
use cardpool_network::CardPoolApi;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application shared state
pub struct AppState<R> {
    pub coordinator: Arc<AllocationCoordinator<R>>,
    pub mirror: Arc<PoolMirror<R>>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            mirror: Arc::clone(&self.mirror),
        }
    }
}

impl<R: CardPoolApi> AppState<R> {
    pub fn new(pool: SqlitePool, remote: Arc<R>, audit: AuditLogWriter) -> Self {
        let mirror = PoolMirror::new(pool.clone(), Arc::clone(&remote), audit.queue().clone());
        Self {
            coordinator: Arc::new(AllocationCoordinator::new(pool, remote, audit)),
            mirror: Arc::new(mirror),
        }
    }
}

/// Build the complete router
///
/// Everything under `/api` requires a `key` header accepted by `gate`;
/// `GET /` is public.
pub fn build_router<R: CardPoolApi>(state: AppState<R>, gate: ApiKeyGate) -> Router {
    let api = Router::new()
        .route("/outbreak/clientsSpilt", post(clients_split::<R>))
        .route("/outbreak/userRevuim", post(user_revuim::<R>))
        .route("/outbreak/simCardsList", post(sim_cards_list::<R>))
        .route("/outbreak/clients", post(clients::<R>))
        .route("/outbreak/clientsInfo", post(clients_info::<R>))
        .route("/outbreak/simpoolsDeatil", post(simpools_detail::<R>))
        .route("/outbreak/getSms", get(get_sms::<R>))
        .route("/outbreak/sendSms", post(send_sms::<R>))
        .route("/outbreak/sendResult", get(send_result::<R>))
        .route("/local/simCards", post(local_sim_cards::<R>))
        .route("/local/simCards/:imsi", get(sim_card_by_imsi::<R>))
        .route("/local/devices", post(local_devices::<R>))
        .route("/local/devices/:user_id", get(device_by_user_id::<R>))
        .route("/local/sms", post(local_sms::<R>))
        .route("/local/sms/:msg_id", get(sms_by_msg_id::<R>))
        .route_layer(middleware::from_fn_with_state(gate, require_api_key))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .route("/", get(banner))
        .nest("/api", api)
        .fallback(not_found)
        .layer(cors)
}

/// Decode a JSON body; an empty body decodes as the default value
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserIdBody {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MacAddressBody {
    #[serde(default, deserialize_with = "de::opt_stringish")]
    mac_address: Option<String>,
}

/// Query string of the SMS reads
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmsParams {
    user_id: Option<String>,
    msg_id: Option<String>,
}

fn local_success(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({
        "code": LOCAL_SUCCESS_CODE,
        "msg": ResponseMessages::SUCCESS,
        "data": data,
    }))
}

async fn clients_split<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<SwitchOutcome>, ApiError> {
    let request: SwitchRequest = parse_body(&body)?;
    state
        .coordinator
        .switch_card(&request)
        .await
        .map(Json)
        .map_err(|e| {
            let echo = serde_json::to_value(&request).unwrap_or(Value::Null);
            ApiError::allocation(e, echo, ResponseMessages::SWITCH_FAILED)
        })
}

async fn user_revuim<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<RemoteResponse>, ApiError> {
    let request: ReturnRequest = parse_body(&body)?;
    state
        .coordinator
        .force_return(&request)
        .await
        .map(Json)
        .map_err(|e| {
            let echo = serde_json::to_value(&request).unwrap_or(Value::Null);
            ApiError::allocation(e, echo, ResponseMessages::RETURN_FAILED)
        })
}

async fn sim_cards_list<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<RemoteResponse>, ApiError> {
    let query: SimCardsQuery = parse_body(&body)?;
    state
        .mirror
        .sim_cards_list(&query)
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::REMOTE_REQUEST_FAILED))
}

async fn clients<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<RemoteResponse>, ApiError> {
    let query: ClientsQuery = parse_body(&body)?;
    state
        .mirror
        .clients(&query)
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::REMOTE_REQUEST_FAILED))
}

async fn clients_info<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<RemoteResponse>, ApiError> {
    let request: UserIdBody = parse_body(&body)?;
    state
        .mirror
        .clients_info(request.user_id.as_deref().unwrap_or_default())
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::REMOTE_REQUEST_FAILED))
}

async fn simpools_detail<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<RemoteResponse>, ApiError> {
    let request: MacAddressBody = parse_body(&body)?;
    state
        .mirror
        .simpools_detail(request.mac_address.as_deref().unwrap_or_default())
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::REMOTE_REQUEST_FAILED))
}

async fn get_sms<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    Query(params): Query<SmsParams>,
) -> Result<Json<RemoteResponse>, ApiError> {
    state
        .mirror
        .get_sms(params.user_id.as_deref())
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::GET_SMS_FAILED))
}

async fn send_sms<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<RemoteResponse>, ApiError> {
    let request: SendSmsRequest = parse_body(&body)?;
    state
        .mirror
        .send_sms(&request)
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::SEND_SMS_FAILED))
}

async fn send_result<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    Query(params): Query<SmsParams>,
) -> Result<Json<RemoteResponse>, ApiError> {
    state
        .mirror
        .send_result(params.msg_id.as_deref())
        .await
        .map(Json)
        .map_err(|e| ApiError::remote(e, ResponseMessages::SEND_RESULT_FAILED))
}

async fn local_sim_cards<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let query: SimCardsQuery = parse_body(&body)?;
    let page = state.mirror.local_sim_cards(&query).await?;
    Ok(local_success(page))
}

async fn sim_card_by_imsi<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    Path(imsi): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let card = state
        .mirror
        .sim_card_by_imsi(&imsi)
        .await?
        .ok_or(ApiError::NotFound(ResponseMessages::NOT_FOUND))?;
    Ok(local_success(card))
}

async fn local_devices<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let query: DevicesQuery = parse_body(&body)?;
    let page = state.mirror.local_devices(&query).await?;
    Ok(local_success(page))
}

async fn device_by_user_id<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let device = state
        .mirror
        .device_by_user_id(&user_id)
        .await?
        .ok_or(ApiError::NotFound(ResponseMessages::NOT_FOUND))?;
    Ok(local_success(device))
}

async fn local_sms<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let query: SmsQuery = parse_body(&body)?;
    let page = state.mirror.local_sms(&query).await?;
    Ok(local_success(page))
}

async fn sms_by_msg_id<R: CardPoolApi>(
    State(state): State<AppState<R>>,
    Path(msg_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let record = state
        .mirror
        .sms_by_msg_id(&msg_id)
        .await?
        .ok_or(ApiError::NotFound(ResponseMessages::SMS_NOT_FOUND))?;
    Ok(local_success(record))
}

async fn banner() -> impl IntoResponse {
    Json(json!({
        "status": "success",
        "message": ResponseMessages::SERVICE_BANNER,
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound(ResponseMessages::NOT_FOUND)
}
