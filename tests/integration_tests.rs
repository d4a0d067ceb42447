use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha1::Sha1;
use tokio::sync::broadcast;
use tower::ServiceExt;

use spotbook::config::AppConfig;
use spotbook::db;
use spotbook::handlers;
use spotbook::models::{BookingEventKind, BookingStatus};
use spotbook::services::notifications::{ClientNotice, Notifier};
use spotbook::state::AppState;

// ── Mock Notifier ──

struct MockNotifier {
    sent: Arc<Mutex<Vec<ClientNotice>>>,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notice: &ClientNotice) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

// ── Helpers ──

const HOST: (&str, &str) = ("host-1", "host");
const CLIENT: (&str, &str) = ("client-1", "client");
const ADMIN: (&str, &str) = ("admin-1", "admin");

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        api_token: "test-token".to_string(),
        payment_webhook_secret: "".to_string(), // empty = skip signature validation
        notify_webhook_url: "".to_string(),
        cors_origin: None,
    }
}

fn build_state(config: AppConfig) -> (Arc<AppState>, Arc<Mutex<Vec<ClientNotice>>>) {
    let conn = db::init_db(":memory:").unwrap();
    let sent = Arc::new(Mutex::new(vec![]));
    let (events_tx, _) = broadcast::channel(64);
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        notifier: Box::new(MockNotifier {
            sent: Arc::clone(&sent),
        }),
        events_tx,
    });
    (state, sent)
}

fn test_state() -> Arc<AppState> {
    build_state(test_config()).0
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn send(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    actor: (&str, &str),
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .header("X-Actor-Id", actor.0)
        .header("X-Actor-Role", actor.1);
    let req = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_location(state: &Arc<AppState>, base_price: i64, per_guest: i64) -> String {
    let (status, json) = send(
        state,
        "POST",
        "/api/locations",
        HOST,
        Some(json!({
            "name": "Rooftop Studio",
            "base_price_per_hour": base_price,
            "incremental_rate_per_guest": per_guest,
            "addons": [
                {"id": "projector", "name": "Projector", "price": 50},
                {"id": "cleaning", "name": "Cleaning", "price": 10, "price_unit": "per_hour"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn create_booking(state: &Arc<AppState>, location_id: &str, hours: u32, guests: i64) -> Value {
    let (status, json) = send(
        state,
        "POST",
        "/api/bookings",
        CLIENT,
        Some(json!({
            "location_id": location_id,
            "start_date": "2025-06-15T10:00:00Z",
            "end_date": format!("2025-06-15T{:02}:00:00Z", 10 + hours),
            "guest_count": guests,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json
}

async fn set_status(
    state: &Arc<AppState>,
    id: &str,
    actor: (&str, &str),
    status: &str,
) -> (StatusCode, Value) {
    send(
        state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        actor,
        Some(json!({"status": status})),
    )
    .await
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

fn webhook_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/payments")
        .header("Content-Type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("X-Signature", sig);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

// ── Auth Tests ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let res = test_app(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_requires_auth() {
    let state = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_wrong_token() {
    let state = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/bookings")
                .header("Authorization", "Bearer wrong-token")
                .header("X-Actor-Id", "client-1")
                .header("X-Actor-Role", "client")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_system_role_cannot_be_asserted() {
    let state = test_state();
    let (status, json) = send(&state, "GET", "/api/bookings", ("svc", "system"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

// ── Pricing Tests ──

#[tokio::test]
async fn test_booking_price_single_guest() {
    let state = test_state();
    let location_id = create_location(&state, 100, 20).await;

    let booking = create_booking(&state, &location_id, 3, 1).await;
    assert_eq!(booking["total_price"], 300);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["client_id"], "client-1");
    assert_eq!(booking["version"], 1);
}

#[tokio::test]
async fn test_booking_price_with_guests() {
    let state = test_state();
    let location_id = create_location(&state, 100, 20).await;

    let booking = create_booking(&state, &location_id, 3, 4).await;
    assert_eq!(booking["total_price"], 360);
}

#[tokio::test]
async fn test_quote_includes_addons() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;

    let (status, json) = send(
        &state,
        "POST",
        &format!("/api/locations/{location_id}/quote"),
        CLIENT,
        Some(json!({
            "start_date": "2025-06-15T10:00:00Z",
            "end_date": "2025-06-15T12:00:00Z",
            "selected_addons": ["projector", "cleaning"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["duration_hours"], 2);
    // projector flat 50, cleaning 10 per hour
    assert_eq!(json["addon_total"], 70);
    assert_eq!(json["total"], 270);
}

#[tokio::test]
async fn test_unknown_addon_rejected() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;

    let (status, json) = send(
        &state,
        "POST",
        "/api/bookings",
        CLIENT,
        Some(json!({
            "location_id": location_id,
            "start_date": "2025-06-15T10:00:00Z",
            "end_date": "2025-06-15T12:00:00Z",
            "selected_addons": ["hot-tub"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "unknown_addon");
}

#[tokio::test]
async fn test_instant_book_starts_payment_pending() {
    let state = test_state();
    let (status, location) = send(
        &state,
        "POST",
        "/api/locations",
        HOST,
        Some(json!({"name": "Loft", "base_price_per_hour": 100, "instant_book": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let booking = create_booking(&state, location["id"].as_str().unwrap(), 2, 1).await;
    assert_eq!(booking["status"], "payment_pending");
}

// ── Status Transition Tests ──

#[tokio::test]
async fn test_client_cannot_confirm() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = set_status(&state, id, CLIENT, "confirmed").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "unauthorized_actor");
    assert!(json["message"].as_str().unwrap().contains("client"));
}

#[tokio::test]
async fn test_cancelled_booking_is_terminal() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = set_status(&state, id, CLIENT, "cancelled").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = set_status(&state, id, HOST, "confirmed").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "terminal_state");
}

#[tokio::test]
async fn test_illegal_transition() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = set_status(&state, id, ADMIN, "refunded").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "illegal_transition");
}

#[tokio::test]
async fn test_confirm_notifies_and_broadcasts() {
    let (state, sent) = build_state(test_config());
    let mut rx = state.events_tx.subscribe();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let created = rx.recv().await.unwrap();
    assert_eq!(created.kind, BookingEventKind::Created);

    let (status, json) = send(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        HOST,
        Some(json!({"status": "confirmed", "notify_client": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["version"], 2);

    let updated = rx.recv().await.unwrap();
    assert_eq!(updated.kind, BookingEventKind::Updated);
    assert_eq!(updated.status, BookingStatus::Confirmed);
    assert_eq!(updated.version, 2);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].client_id, "client-1");
    assert_eq!(sent[0].status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_same_status_is_noop() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = set_status(&state, id, CLIENT, "pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 1);

    let (_, history) = send(&state, "GET", &format!("/api/bookings/{id}/history"), CLIENT, None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stale_version_conflict() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = set_status(&state, id, HOST, "confirmed").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        HOST,
        Some(json!({"guest_count": 3, "expected_version": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

// ── Edit Tests ──

#[tokio::test]
async fn test_host_edit_reprices_and_records_history() {
    let state = test_state();
    let location_id = create_location(&state, 100, 20).await;
    let booking = create_booking(&state, &location_id, 3, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = send(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        HOST,
        Some(json!({"guest_count": 4, "additional_price": 25})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["total_price"], 385);
    assert_eq!(json["additional_price"], 25);

    let (_, history) = send(&state, "GET", &format!("/api/bookings/{id}/history"), HOST, None).await;
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["seq"], 1);
    assert_eq!(entries[1]["seq"], 2);
    assert_eq!(entries[1]["actor_id"], "host-1");
    assert_eq!(entries[1]["price_delta"], 85);
}

#[tokio::test]
async fn test_client_cannot_edit_fields() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, json) = send(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        CLIENT,
        Some(json!({"guest_count": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "unauthorized_actor");
}

// ── Refund Tests ──

#[tokio::test]
async fn test_partial_then_full_refund() {
    let state = test_state();
    let location_id = create_location(&state, 1000, 0).await;
    let booking = create_booking(&state, &location_id, 1, 1).await;
    let id = booking["id"].as_str().unwrap();
    assert_eq!(booking["total_price"], 1000);

    let (status, _) = set_status(&state, id, HOST, "confirmed").await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/bookings/{id}/refund");
    let (status, json) = send(
        &state,
        "POST",
        &uri,
        HOST,
        Some(json!({"amount": 400, "reason": "late start"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["booking"]["status"], "refund_pending");
    assert_eq!(json["refund"]["amount"], 400);
    assert_eq!(json["refund"]["processed_by"], "host-1");

    let (status, json) = send(
        &state,
        "POST",
        &uri,
        ADMIN,
        Some(json!({"amount": 600, "reason": "venue closed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["booking"]["status"], "refunded");

    let (status, json) = send(
        &state,
        "POST",
        &uri,
        ADMIN,
        Some(json!({"amount": 1, "reason": "one more"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"], "refund_exceeds_balance");

    let (_, refunds) = send(&state, "GET", &format!("/api/bookings/{id}/refunds"), CLIENT, None).await;
    let amounts: Vec<i64> = refunds
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["amount"].as_i64().unwrap())
        .collect();
    assert_eq!(amounts, vec![400, 600]);
}

#[tokio::test]
async fn test_refund_requires_reason_and_staff() {
    let state = test_state();
    let location_id = create_location(&state, 1000, 0).await;
    let booking = create_booking(&state, &location_id, 1, 1).await;
    let id = booking["id"].as_str().unwrap();
    set_status(&state, id, HOST, "confirmed").await;

    let uri = format!("/api/bookings/{id}/refund");
    let (status, json) = send(&state, "POST", &uri, HOST, Some(json!({"amount": 100, "reason": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "empty_reason");

    let (status, json) = send(&state, "POST", &uri, CLIENT, Some(json!({"amount": 100, "reason": "please"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "unauthorized_actor");
}

// ── Access Tests ──

#[tokio::test]
async fn test_other_client_cannot_read_booking() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = send(&state, "GET", &format!("/api/bookings/{id}"), ("client-2", "client"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&state, "GET", &format!("/api/bookings/{id}"), CLIENT, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);
}

#[tokio::test]
async fn test_list_is_scoped_to_actor() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;
    create_booking(&state, &location_id, 2, 1).await;
    create_booking(&state, &location_id, 3, 1).await;

    let (_, mine) = send(&state, "GET", "/api/bookings", CLIENT, None).await;
    assert_eq!(mine.as_array().unwrap().len(), 2);

    let (_, theirs) = send(&state, "GET", "/api/bookings", ("client-2", "client"), None).await;
    assert!(theirs.as_array().unwrap().is_empty());

    let (_, hosted) = send(&state, "GET", "/api/bookings?status=pending", HOST, None).await;
    assert_eq!(hosted.as_array().unwrap().len(), 2);

    let (_, confirmed) = send(&state, "GET", "/api/bookings?status=confirmed", ADMIN, None).await;
    assert!(confirmed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_booking_not_found() {
    let state = test_state();
    let (status, json) = send(&state, "GET", "/api/bookings/missing", ADMIN, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "booking_not_found");
}

// ── Payment Webhook Tests ──

#[tokio::test]
async fn test_payment_captured_confirms_booking() {
    let (state, sent) = build_state(test_config());
    let (_, location) = send(
        &state,
        "POST",
        "/api/locations",
        HOST,
        Some(json!({"name": "Loft", "base_price_per_hour": 100, "instant_book": true})),
    )
    .await;
    let booking = create_booking(&state, location["id"].as_str().unwrap(), 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let body = json!({"event": "payment.captured", "booking_id": id}).to_string();
    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, json) = send(&state, "GET", &format!("/api/bookings/{id}"), CLIENT, None).await;
    assert_eq!(json["status"], "confirmed");
    assert_eq!(sent.lock().unwrap().len(), 1);

    // Redelivery is a no-op
    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["changed"], false);
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_refund_completed_finalises_refund() {
    let (state, sent) = build_state(test_config());
    let location_id = create_location(&state, 1000, 0).await;
    let booking = create_booking(&state, &location_id, 1, 1).await;
    let id = booking["id"].as_str().unwrap();
    set_status(&state, id, HOST, "confirmed").await;

    let (status, json) = send(
        &state,
        "POST",
        &format!("/api/bookings/{id}/refund"),
        HOST,
        Some(json!({"amount": 250, "reason": "projector broken"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["booking"]["status"], "refund_pending");

    // Only the payment provider may close out a refund
    let (status, json) = set_status(&state, id, HOST, "refunded").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "unauthorized_actor");

    let body = json!({"event": "refund.completed", "booking_id": id}).to_string();
    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["status"], "refunded");
    assert_eq!(json["changed"], true);
    assert_eq!(sent.lock().unwrap().len(), 1);

    let (_, history) = send(&state, "GET", &format!("/api/bookings/{id}/history"), CLIENT, None).await;
    let last = history.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["actor_id"], "system");

    // Redelivery is a no-op
    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["changed"], false);
    assert_eq!(json["status"], "refunded");
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_far_future_booking_is_rejected_without_breaking_service() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;

    let (status, json) = send(
        &state,
        "POST",
        "/api/bookings",
        CLIENT,
        Some(json!({
            "location_id": location_id,
            "start_date": "+262142-12-31T23:00:00",
            "end_date": "+262142-12-31T22:00:00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_duration");

    let (status, _) = send(&state, "GET", "/api/bookings", CLIENT, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_subsecond_timestamps_are_stored_as_returned() {
    let state = test_state();
    let location_id = create_location(&state, 100, 0).await;

    let (status, booking) = send(
        &state,
        "POST",
        "/api/bookings",
        CLIENT,
        Some(json!({
            "location_id": location_id,
            "start_date": "2025-06-15T10:00:00.200Z",
            "end_date": "2025-06-15T10:00:00.900Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{booking}");
    assert_eq!(booking["total_price"], 2400);
    let id = booking["id"].as_str().unwrap();

    let (_, stored) = send(&state, "GET", &format!("/api/bookings/{id}"), CLIENT, None).await;
    assert_eq!(stored["start_date"], booking["start_date"]);
    assert_eq!(stored["end_date"], booking["end_date"]);

    let (status, json) = send(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        HOST,
        Some(json!({"end_date": "2025-06-16T10:00:00.500Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["version"], 1);

    let (_, history) = send(&state, "GET", &format!("/api/bookings/{id}/history"), HOST, None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_signature_enforced() {
    let mut config = test_config();
    config.payment_webhook_secret = "whsec".to_string();
    let (state, _) = build_state(config);
    let location_id = create_location(&state, 100, 0).await;
    let booking = create_booking(&state, &location_id, 2, 1).await;
    let id = booking["id"].as_str().unwrap();

    let body = json!({"event": "payment.captured", "booking_id": id}).to_string();

    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, Some(&sign("wrong", body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Correctly signed, but pending bookings have no edge from the payment provider
    let res = test_app(state.clone())
        .oneshot(webhook_request(&body, Some(&sign("whsec", body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "unauthorized_actor");
}

// ── SSE Tests ──

#[tokio::test]
async fn test_events_stream_requires_token() {
    let state = test_state();
    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/events?token=nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = test_app(state)
        .oneshot(
            Request::builder()
                .uri("/api/events?token=test-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}
