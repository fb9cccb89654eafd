//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` and exercise
//! all /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port; runs in CI without `#[ignore]`.

use ferment_watch::api::{create_app, ApiState, TelegramBot};
use ferment_watch::config::{AnalysisConfig, ProfileConfig, ServerConfig};
use ferment_watch::{AlertEngine, InMemoryStore, LogNotifier, TelegramNotifier};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

fn create_test_state() -> ApiState {
    let engine = AlertEngine::with_store(
        Arc::new(InMemoryStore::new()),
        Arc::new(LogNotifier),
        AnalysisConfig::default(),
        ProfileConfig::default(),
    );
    ApiState::new(Arc::new(engine))
}

fn app(state: &ApiState) -> Router {
    create_app(state.clone(), &ServerConfig::default())
}

async fn send(state: &ApiState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    dispatch(state, request).await
}

async fn dispatch(state: &ApiState, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app(state).oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn ale_batch() -> Value {
    json!({
        "name": "Pale Ale",
        "yeast_profile": "ale",
        "og": 1.050,
        "fg_target": 1.010,
        "temp_target": 21.0,
        "started_at": "2026-03-01T00:00:00Z"
    })
}

async fn create_batch(state: &ApiState) -> u64 {
    let (status, body) = send(state, "POST", "/api/v1/batches", Some(ale_batch())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_u64().unwrap()
}

fn reading(hour: u32, gravity: f64) -> Value {
    json!({
        "timestamp": format!("2026-03-01T{hour:02}:00:00Z"),
        "gravity": gravity,
        "temperature": 19.0,
        "battery": 88.0
    })
}

/// GET endpoints on an existing batch all return 200.
#[tokio::test]
async fn test_v1_get_endpoints_return_200() {
    let state = create_test_state();
    let id = create_batch(&state).await;

    let endpoints = [
        "/api/v1/health".to_string(),
        "/api/v1/batches".to_string(),
        format!("/api/v1/batches/{id}"),
        format!("/api/v1/batches/{id}/readings"),
        format!("/api/v1/batches/{id}/readings?hours=6"),
        format!("/api/v1/batches/{id}/analysis"),
        format!("/api/v1/batches/{id}/history"),
        format!("/api/v1/batches/{id}/alerts"),
    ];

    for endpoint in &endpoints {
        let (status, body) = send(&state, "GET", endpoint, None).await;
        assert_eq!(status, StatusCode::OK, "GET {endpoint} returned {status}");
        assert_eq!(body["meta"]["version"], "1", "GET {endpoint} missing envelope");
    }
}

/// Unknown batch ids map to 404 with the error envelope.
#[tokio::test]
async fn test_v1_unknown_batch_returns_404() {
    let state = create_test_state();

    for endpoint in [
        "/api/v1/batches/42",
        "/api/v1/batches/42/readings",
        "/api/v1/batches/42/analysis",
        "/api/v1/batches/42/history",
        "/api/v1/batches/42/alerts",
    ] {
        let (status, body) = send(&state, "GET", endpoint, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {endpoint}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = send(&state, "POST", "/api/v1/batches/42/readings", Some(reading(0, 1.040))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_v1_health_reports_notifier() {
    let state = create_test_state();
    let (status, body) = send(&state, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["notifier"], "log");
}

#[tokio::test]
async fn test_v1_create_batch_validates_profile() {
    let state = create_test_state();

    let (status, body) = send(&state, "POST", "/api/v1/batches", Some(ale_batch())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["yeast_profile"], "ale");

    let mut unknown = ale_batch();
    unknown["yeast_profile"] = json!("kveik-unknown");
    let (status, body) = send(&state, "POST", "/api/v1/batches", Some(unknown)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PROFILE");

    let mut inverted = ale_batch();
    inverted["fg_target"] = json!(1.060);
    let (status, _) = send(&state, "POST", "/api/v1/batches", Some(inverted)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_v1_readings_round_trip_and_attenuation_alert() {
    let state = create_test_state();
    let id = create_batch(&state).await;
    let uri = format!("/api/v1/batches/{id}/readings");

    let (status, body) = send(&state, "POST", &uri, Some(reading(0, 1.012))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["alerts"].as_array().unwrap().len(), 0);

    // crosses the ale threshold (80%)
    let (status, body) = send(&state, "POST", &uri, Some(reading(1, 1.0095))).await;
    assert_eq!(status, StatusCode::CREATED);
    let alerts = body["data"]["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["kind"], "attenuation_reached");
    assert_eq!(alerts[0]["channel"], "log");

    let (_, body) = send(&state, "GET", &uri, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&state, "GET", &format!("/api/v1/batches/{id}"), None).await;
    assert_eq!(body["data"]["status"], "resting");

    let (_, body) = send(&state, "GET", &format!("/api/v1/batches/{id}/history"), None).await;
    assert_eq!(body["data"]["readings"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["batch"]["id"], id);
}

#[tokio::test]
async fn test_v1_invalid_reading_is_rejected() {
    let state = create_test_state();
    let id = create_batch(&state).await;
    let uri = format!("/api/v1/batches/{id}/readings");

    let (status, body) = send(&state, "POST", &uri, Some(reading(0, 1.300))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_READING");

    let (_, body) = send(&state, "GET", &format!("/api/v1/batches/{id}/history"), None).await;
    assert!(body["data"]["readings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_v1_readings_hours_must_be_positive() {
    let state = create_test_state();
    let id = create_batch(&state).await;

    for hours in ["0", "-3"] {
        let (status, body) = send(
            &state,
            "GET",
            &format!("/api/v1/batches/{id}/readings?hours={hours}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "hours={hours}");
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_v1_readings_hours_is_capped() {
    let state = create_test_state();
    let id = create_batch(&state).await;
    let uri = format!("/api/v1/batches/{id}/readings");
    send(&state, "POST", &uri, Some(reading(0, 1.040))).await;

    for hours in ["1e12", "inf", "8761"] {
        let (status, body) = send(&state, "GET", &format!("{uri}?hours={hours}"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "hours={hours}");
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    // a full year is still served, and the server is still up afterwards
    let (status, body) = send(&state, "GET", &format!("{uri}?hours=8760"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_v1_alert_acknowledgement() {
    let state = create_test_state();
    let id = create_batch(&state).await;
    let uri = format!("/api/v1/batches/{id}/readings");
    send(&state, "POST", &uri, Some(reading(0, 1.012))).await;
    send(&state, "POST", &uri, Some(reading(1, 1.0095))).await;

    let (_, body) = send(&state, "GET", &format!("/api/v1/batches/{id}/alerts"), None).await;
    let alerts = body["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["acknowledged"], false);
    let alert_id = alerts[0]["id"].as_u64().unwrap();

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/v1/batches/{id}/alerts/{alert_id}/acknowledge"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["acknowledged"], true);

    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/v1/batches/{id}/alerts/999/acknowledge"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_v1_status_update() {
    let state = create_test_state();
    let id = create_batch(&state).await;

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/v1/batches/{id}/status"),
        Some(json!({"status": "done"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "done");

    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/v1/batches/{id}/status"),
        Some(json!({"status": "bottled"})),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_v1_ingest_routes_to_open_batch() {
    let state = create_test_state();
    let payload = json!({
        "timestamp": "2026-03-01T06:00:00Z",
        "gravity": 1.030,
        "temperature": 19.5,
        "battery": 76.0,
        "device_id": "pill-1"
    });

    let (status, body) = send(&state, "POST", "/api/v1/readings/ingest", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let id = create_batch(&state).await;
    let (status, body) = send(&state, "POST", "/api/v1/readings/ingest", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["batch_id"], id);

    let (_, body) = send(&state, "GET", &format!("/api/v1/batches/{id}/analysis"), None).await;
    assert_eq!(body["data"]["readings_in_window"], 1);
    assert!((body["data"]["latest"]["gravity"].as_f64().unwrap() - 1.030).abs() < 1e-9);
}

// ============================================================================
// Telegram bot webhook
// ============================================================================

const BOT_TOKEN: &str = "123-abc";

/// Local stand-in for the Bot API recording every `sendMessage` body.
async fn mock_bot_api() -> (String, Arc<Mutex<Vec<Value>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let recorder = sent.clone();
    let api = Router::new().route(
        &format!("/bot{BOT_TOKEN}/sendMessage"),
        axum::routing::post(move |axum::Json(body): axum::Json<Value>| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(body);
                axum::Json(json!({"ok": true, "result": {}}))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, api).await.unwrap() });
    (format!("http://{addr}"), sent)
}

fn state_with_bot(api_base: &str, secret: Option<&str>) -> ApiState {
    let notifier = TelegramNotifier::new(api_base, BOT_TOKEN, "42", Duration::from_secs(5)).unwrap();
    create_test_state().with_bot(TelegramBot::new(Arc::new(notifier), secret.map(str::to_string)))
}

fn update(chat_id: i64, text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {"message_id": 9, "chat": {"id": chat_id, "type": "private"}, "text": text}
    })
}

async fn post_update(state: &ApiState, body: Value, secret: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/telegram")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-telegram-bot-api-secret-token", secret);
    }
    dispatch(state, builder.body(Body::from(body.to_string())).unwrap()).await
}

#[tokio::test]
async fn test_webhook_status_reports_open_batch() {
    let (api_base, sent) = mock_bot_api().await;
    let state = state_with_bot(&api_base, None);
    let id = create_batch(&state).await;
    send(&state, "POST", &format!("/api/v1/batches/{id}/readings"), Some(reading(0, 1.012))).await;

    let (status, body) = post_update(&state, update(42, "/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["chat_id"], 42);
    let text = sent[0]["text"].as_str().unwrap();
    assert!(text.contains("Pale Ale (active)"), "{text}");
    assert!(text.contains("1.0120"), "{text}");
}

#[tokio::test]
async fn test_webhook_answers_help_and_hides_status_from_other_chats() {
    let (api_base, sent) = mock_bot_api().await;
    let state = state_with_bot(&api_base, None);
    create_batch(&state).await;

    post_update(&state, update(7, "/help"), None).await;
    post_update(&state, update(7, "/status"), None).await;
    // updates without text are acknowledged silently
    let (status, body) = post_update(&state, json!({"update_id": 2}), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m["chat_id"] == 7));
    assert!(sent[0]["text"].as_str().unwrap().contains("/status"));
    let status_reply = sent[1]["text"].as_str().unwrap();
    assert!(!status_reply.contains("Pale Ale"), "{status_reply}");
}

#[tokio::test]
async fn test_webhook_requires_configured_secret() {
    let (api_base, sent) = mock_bot_api().await;
    let state = state_with_bot(&api_base, Some("s3cret"));

    let (status, body) = post_update(&state, update(42, "/start"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = post_update(&state, update(42, "/start"), Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(sent.lock().unwrap().is_empty());

    let (status, body) = post_update(&state, update(42, "/start"), Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert!(sent.lock().unwrap()[0]["text"].as_str().unwrap().contains("Welcome"));
}

#[tokio::test]
async fn test_webhook_without_bot_is_not_found() {
    let state = create_test_state();
    let (status, body) = post_update(&state, update(42, "/status"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
