//! Full-router tests: HTTP in, JSON out, in-memory database behind
//!
//! Run with: cargo test --package cardpool-server --test http_api

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use cardpool_allocation::{AuditLogWriter, BackgroundConfig, BackgroundQueue};
use cardpool_core::{
    ClientsQuery, Payload, RemoteResponse, RemoteSimCard, SendSmsRequest, SimCardsQuery,
};
use cardpool_network::{CardPoolApi, RemoteError};
use cardpool_server::{ApiKeyGate, AppState, build_router};
use cardpool_storage::repositories::{SimCardRepository, SqliteSimCardRepository};
use cardpool_storage::Database;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const KEY: &str = "client-key";

/// Remote pool that accepts every switch and fails `userRevuim` for `u-down`
struct StubPool;

impl CardPoolApi for StubPool {
    async fn clients_split(&self, _user_id: &str, _imsi: &str) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::new(
            "3810000",
            "操作成功",
            Payload::Raw(r#"{"code":"0x03810000"}"#.to_string()),
        ))
    }

    async fn user_revuim(&self, user_id: &str, _need_adjust: Option<bool>) -> Result<RemoteResponse, RemoteError> {
        if user_id == "u-down" {
            return Err(RemoteError::Transport {
                path: "/outbreak/userRevuim".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(RemoteResponse::new("3810000", "ok", Payload::default()))
    }

    async fn sim_cards_list(&self, _query: &SimCardsQuery) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::new(
            "3810000",
            "ok",
            Payload::Structured(json!({"content": [{"imsi": "460005555555555", "phoneNumber": "13655555555"}]})),
        ))
    }

    async fn clients(&self, _query: &ClientsQuery) -> Result<RemoteResponse, RemoteError> {
        Err(RemoteError::Status {
            path: "/outbreak/clients".to_string(),
            status: 403,
            body: Some(json!({"code": "4030000", "msg": "forbidden"})),
        })
    }

    async fn clients_info(&self, user_id: &str) -> Result<RemoteResponse, RemoteError> {
        Ok(RemoteResponse::new(
            "3810000",
            "ok",
            Payload::Structured(json!({"clients": {"id": "dev-1", "userId": user_id}})),
        ))
    }

    async fn simpools_detail(&self, _mac_address: &str) -> Result<RemoteResponse, RemoteError> {
        Err(RemoteError::Timeout {
            path: "/outbreak/simpoolsDeatil".to_string(),
            timeout_ms: 10_000,
        })
    }

    async fn get_sms(&self, user_id: &str) -> Result<RemoteResponse, RemoteError> {
        if user_id.is_empty() {
            return Ok(RemoteResponse::new("3840002", "userId required", Payload::default()));
        }
        Ok(RemoteResponse::new(
            "3810000",
            "ok",
            Payload::Structured(json!({"msg_id": "in-1", "sender": "10086", "content": "hi"})),
        ))
    }

    async fn send_sms(&self, request: &SendSmsRequest) -> Result<RemoteResponse, RemoteError> {
        if request.sms_receiver.is_none() {
            return Err(RemoteError::Status {
                path: "/outbreak/sendSms".to_string(),
                status: 400,
                body: Some(json!({"code": "4000000", "msg": "sms_receiver required"})),
            });
        }
        Ok(RemoteResponse::new("3810000", "ok", Payload::Raw("out-1".to_string())))
    }

    async fn send_result(&self, _msg_id: &str) -> Result<RemoteResponse, RemoteError> {
        Err(RemoteError::Transport {
            path: "/outbreak/sendResult".to_string(),
            message: "connection reset".to_string(),
        })
    }
}

struct TestApp {
    db: Database,
    queue: BackgroundQueue,
    router: Router,
}

async fn setup_app(accepted_keys: Vec<String>) -> TestApp {
    let db = Database::in_memory().await.unwrap();
    SqliteSimCardRepository::new(db.pool().clone())
        .upsert_inventory(&[RemoteSimCard {
            imsi: Some("460001234567890".to_string()),
            phone_number: Some("13800000000".to_string()),
            ..Default::default()
        }])
        .await
        .unwrap();

    let queue = BackgroundQueue::start(
        db.pool().clone(),
        BackgroundConfig::default().retry_backoff(Duration::from_millis(1)),
    );
    let state = AppState::new(
        db.pool().clone(),
        Arc::new(StubPool),
        AuditLogWriter::new(queue.clone()),
    );
    let router = build_router(state, ApiKeyGate::new(accepted_keys));

    TestApp { db, queue, router }
}

async fn send(router: &Router, method: &str, uri: &str, key: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("key", key);
    }
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, "POST", uri, Some(KEY), Some(body)).await
}

#[tokio::test]
async fn test_banner_is_public() {
    let app = setup_app(vec![]).await;
    let (status, body) = send(&app.router, "GET", "/", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_missing_key_is_rejected() {
    let app = setup_app(vec![]).await;
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/outbreak/clientsSpilt",
        None,
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "4010000");
}

#[tokio::test]
async fn test_unknown_key_is_rejected_when_keys_configured() {
    let app = setup_app(vec![KEY.to_string()]).await;

    let (status, _) = send(&app.router, "GET", "/api/local/simCards/460001234567890", Some("other"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, "GET", "/api/local/simCards/460001234567890", Some(KEY), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_switch_then_conflict() {
    let app = setup_app(vec![]).await;

    let (status, body) = post(
        &app.router,
        "/api/outbreak/clientsSpilt",
        json!({"userId": "u1", "phoneNumber": "13800000000", "deviceId": "d1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "3810000");
    assert_eq!(body["detailMsg"], "操作成功");
    assert_eq!(body["data"], r#"{"code":"0x03810000"}"#);

    let (status, body) = post(
        &app.router,
        "/api/outbreak/clientsSpilt",
        json!({"userId": "u2", "phoneNumber": "13800000000", "deviceId": "d2"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "4000003");
    assert_eq!(body["data"]["device_number"], "d1");

    app.queue.flush().await.unwrap();
    let (_, body) = send(&app.router, "GET", "/api/local/simCards/460001234567890", Some(KEY), None).await;
    assert_eq!(body["data"]["deviceNumber"], "d1");
    assert_eq!(body["data"]["isUsed"], true);
}

#[tokio::test]
async fn test_switch_validation_and_unknown_number() {
    let app = setup_app(vec![]).await;

    let (status, body) = post(&app.router, "/api/outbreak/clientsSpilt", json!({"userId": "u1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "4000001");
    assert_eq!(body["data"]["userId"], "u1");

    let (status, body) = post(
        &app.router,
        "/api/outbreak/clientsSpilt",
        json!({"userId": "u1", "phoneNumber": "15500000000", "deviceId": "d1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "4000002");
}

#[tokio::test]
async fn test_malformed_body() {
    let app = setup_app(vec![]).await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/outbreak/clientsSpilt")
                .header("key", KEY)
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_return_requires_user_and_reports_transport_failure() {
    let app = setup_app(vec![]).await;

    let (status, body) = post(&app.router, "/api/outbreak/userRevuim", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "4000001");

    let (status, body) = post(&app.router, "/api/outbreak/userRevuim", json!({"userId": "u-down"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "5000000");
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_proxy_passes_upstream_error_through() {
    let app = setup_app(vec![]).await;

    let (status, body) = post(&app.router, "/api/outbreak/clients", json!({"page": 1})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"code": "4030000", "msg": "forbidden"}));

    let (status, body) = post(&app.router, "/api/outbreak/simpoolsDeatil", json!({"macAddress": "AA"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "5000000");
}

#[tokio::test]
async fn test_inventory_refresh_reaches_local_list() {
    let app = setup_app(vec![]).await;

    let (status, body) = post(&app.router, "/api/outbreak/simCardsList", json!({"page": "1", "size": 10})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "3810000");

    app.queue.flush().await.unwrap();

    let (status, body) = post(&app.router, "/api/local/simCards", json!({"size": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "success");
    assert_eq!(body["data"]["totalElements"], 2);
    assert_eq!(body["data"]["totalPages"], 2);
    assert_eq!(body["data"]["number"], 0);
}

#[tokio::test]
async fn test_device_lookup() {
    let app = setup_app(vec![]).await;

    let (status, _) = send(&app.router, "GET", "/api/local/devices/u7", Some(KEY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post(&app.router, "/api/outbreak/clientsInfo", json!({"userId": "u7"})).await;
    app.queue.flush().await.unwrap();

    let (status, body) = send(&app.router, "GET", "/api/local/devices/u7", Some(KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "dev-1");

    let (_, body) = post(&app.router, "/api/local/devices", json!({})).await;
    assert_eq!(body["data"]["totalElements"], 1);
}

#[tokio::test]
async fn test_sms_relay_and_local_records() {
    let app = setup_app(vec![]).await;

    let (status, body) = send(&app.router, "GET", "/api/outbreak/getSms?userId=u1", Some(KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["msg_id"], "in-1");

    let (status, body) = post(
        &app.router,
        "/api/outbreak/sendSms",
        json!({"userId": "u1", "sms_receiver": "10086", "content": "CXLL"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"code": "3810000", "msg": "ok", "data": "out-1"}));

    app.queue.flush().await.unwrap();

    let (status, body) = post(&app.router, "/api/local/sms", json!({"userId": "u1", "isOutgoing": "true"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "3810000");
    assert_eq!(body["data"]["totalElements"], 1);
    assert_eq!(body["data"]["content"][0]["msg_id"], "out-1");
    assert_eq!(body["data"]["content"][0]["status"], "success");

    let (status, body) = send(&app.router, "GET", "/api/local/sms/in-1", Some(KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "received");
    assert_eq!(body["data"]["is_outgoing"], false);
}

#[tokio::test]
async fn test_sms_failures() {
    let app = setup_app(vec![]).await;

    let (status, body) = send(&app.router, "GET", "/api/local/sms/none", Some(KEY), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"code": "4040000", "msg": "未找到指定的短信记录"}));

    let (status, body) = post(&app.router, "/api/outbreak/sendSms", json!({"content": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "4000000");

    let (status, body) = send(&app.router, "GET", "/api/outbreak/sendResult?msgId=out-1", Some(KEY), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["msg"], "获取短信发送结果失败");

    let (status, body) = send(&app.router, "GET", "/api/outbreak/getSms", Some(KEY), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "3840002");

    let (status, _) = send(&app.router, "GET", "/api/outbreak/getSms?userId=u1", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = setup_app(vec![]).await;
    let (status, body) = send(&app.router, "GET", "/nowhere", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "4040000");
    app.db.close().await;
}
