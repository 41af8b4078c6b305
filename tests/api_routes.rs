// Integration tests for the HTTP surface: ledger, store, missions and canvas
// routes driven through the router with an in-memory store.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use arena_ledger::api::{self, AppState, CanvasRegistry};
use arena_ledger::ledger::{Ledger, LedgerSettings};
use arena_ledger::metrics;
use arena_ledger::store::MemoryStore;

async fn test_state() -> AppState<MemoryStore> {
    let ledger = Ledger::open(MemoryStore::new(), LedgerSettings::default())
        .await
        .unwrap();
    AppState::new(ledger, CanvasRegistry::new(20, 4))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// ── Ledger ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bet_and_settle_flow() {
    let app = api::router(test_state().await);

    let (status, body) = send(&app, "GET", "/api/ledger", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 2500);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bets",
        Some(json!({ "match_id": "m1", "selection_id": "teamA", "stake": 500, "odds": 1.85 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], 2000);
    assert_eq!(body["wager"]["potential_payout"], 925);
    assert_eq!(body["wager"]["status"], "open");

    let settle = Some(json!({ "winning_selection_id": "teamA" }));
    let (status, body) = send(&app, "POST", "/api/matches/m1/settle", settle.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_payout"], 925);
    assert_eq!(body["balance"], 2925);

    let (_, body) = send(&app, "POST", "/api/matches/m1/settle", settle).await;
    assert_eq!(body["total_payout"], 0);
    assert_eq!(body["balance"], 2925);
}

#[tokio::test]
async fn test_bet_validation_statuses() {
    let app = api::router(test_state().await);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bets",
        Some(json!({ "match_id": "m1", "selection_id": "teamA", "stake": 0, "odds": 2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("stake"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/bets",
        Some(json!({ "match_id": "m1", "selection_id": "teamA", "stake": 9999, "odds": 2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "insufficient balance: have 2500, need 9999");

    let (_, body) = send(&app, "GET", "/api/ledger", None).await;
    assert_eq!(body["balance"], 2500);
    assert_eq!(body["wagers"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_storage_failure_reports_and_keeps_state() {
    let state = test_state().await;
    let app = api::router(state.clone());
    state.ledger.lock().await.store().fail_next_writes(2);

    let (status, body) = send(
        &app,
        "POST",
        "/api/bets",
        Some(json!({ "match_id": "m1", "selection_id": "teamA", "stake": 100, "odds": 2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("nothing was changed"));
    assert_eq!(state.ledger.lock().await.balance(), 2500);
}

#[tokio::test]
async fn test_fee_is_checked() {
    let app = api::router(test_state().await);
    let (status, _) = send(&app, "POST", "/api/fees", Some(json!({ "amount": 5000 }))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    let (status, body) = send(&app, "POST", "/api/fees", Some(json!({ "amount": 500 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 2000);
}

// ── Store ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_purchase_flow() {
    let app = api::router(test_state().await);

    let (status, items) = send(&app, "GET", "/api/store/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!items.as_array().unwrap().is_empty());

    let buy = Some(json!({ "item_id": "squad-wipe-emote" }));
    let (status, body) = send(&app, "POST", "/api/store/purchase", buy.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 2100);
    assert_eq!(body["item"]["category"], "emote");

    let (status, _) = send(&app, "POST", "/api/store/purchase", buy).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/store/purchase",
        Some(json!({ "item_id": "does-not-exist" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/ledger", None).await;
    assert_eq!(body["balance"], 2100);
    assert_eq!(body["inventory"].as_array().unwrap().len(), 1);
}

// ── Missions ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mission_claim_latch() {
    let app = api::router(test_state().await);

    let (_, body) = send(&app, "POST", "/api/missions/daily-first-bet/claim", None).await;
    assert_eq!(body["claimed"], false);

    send(
        &app,
        "POST",
        "/api/bets",
        Some(json!({ "match_id": "m1", "selection_id": "teamA", "stake": 100, "odds": 2.0 })),
    )
    .await;

    let (status, body) = send(&app, "POST", "/api/missions/daily-first-bet/claim", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claimed"], true);
    assert_eq!(body["reward"], 50);
    assert_eq!(body["balance"], 2450);

    let (_, body) = send(&app, "POST", "/api/missions/daily-first-bet/claim", None).await;
    assert_eq!(body["claimed"], false);
    assert_eq!(body["balance"], 2450);
}

#[tokio::test]
async fn test_mission_progress() {
    let app = api::router(test_state().await);

    let (status, body) = send(
        &app,
        "POST",
        "/api/missions/watch-finals/progress",
        Some(json!({ "amount": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress_current"], 5);
    assert_eq!(body["completed"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/api/missions/nope/progress",
        Some(json!({ "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Canvas ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_canvas_undo_redo_flow() {
    let app = api::router(test_state().await);

    let (status, body) = send(
        &app,
        "POST",
        "/api/canvas/erangel",
        Some(json!({ "width": 64, "height": 64 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["length"], 1);

    let stroke = json!({ "kind": "line", "from": [0, 0], "to": [10, 10], "color": [255, 0, 0, 255] });
    send(&app, "POST", "/api/canvas/erangel/strokes", Some(stroke.clone())).await;
    let (_, body) = send(&app, "POST", "/api/canvas/erangel/strokes", Some(stroke.clone())).await;
    assert_eq!(body["length"], 3);
    assert_eq!(body["cursor"], 2);

    let (_, body) = send(&app, "POST", "/api/canvas/erangel/undo", None).await;
    assert_eq!(body["changed"], true);
    assert_eq!(body["canvas"]["cursor"], 1);
    assert_eq!(body["canvas"]["can_redo"], true);

    let (_, body) = send(&app, "POST", "/api/canvas/erangel/strokes", Some(stroke)).await;
    assert_eq!(body["length"], 3);
    assert_eq!(body["can_redo"], false);

    let (_, body) = send(&app, "POST", "/api/canvas/erangel/redo", None).await;
    assert_eq!(body["changed"], false);

    // Switching maps starts a fresh history.
    let (_, body) = send(
        &app,
        "POST",
        "/api/canvas/erangel",
        Some(json!({ "width": 32, "height": 32 })),
    )
    .await;
    assert_eq!(body["length"], 1);
    assert_eq!(body["can_undo"], false);
}

#[tokio::test]
async fn test_canvas_errors() {
    let app = api::router(test_state().await);

    let (status, _) = send(&app, "GET", "/api/canvas/miramar", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/api/canvas/miramar/undo", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/canvas/miramar",
        Some(json!({ "width": 0, "height": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_canvas_rejects_out_of_range_strokes() {
    let app = api::router(test_state().await);
    send(
        &app,
        "POST",
        "/api/canvas/sanhok",
        Some(json!({ "width": 16, "height": 16 })),
    )
    .await;

    let far_line = json!({
        "kind": "line",
        "from": [i64::MIN, 0],
        "to": [i64::MAX, 0],
        "color": [255, 0, 0, 255],
    });
    let (status, _) = send(&app, "POST", "/api/canvas/sanhok/strokes", Some(far_line)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let fat_line = json!({
        "kind": "line",
        "from": [0, 0],
        "to": [4, 4],
        "thickness": 100_000,
        "color": [255, 0, 0, 255],
    });
    let (status, _) = send(&app, "POST", "/api/canvas/sanhok/strokes", Some(fat_line)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let huge_rect = json!({
        "kind": "rect",
        "x": 0,
        "y": 0,
        "width": u32::MAX,
        "height": u32::MAX,
        "color": [0, 0, 0, 255],
    });
    let (status, _) = send(&app, "POST", "/api/canvas/sanhok/strokes", Some(huge_rect)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rejected strokes leave the history alone.
    let (_, body) = send(&app, "GET", "/api/canvas/sanhok", None).await;
    assert_eq!(body["length"], 1);

    // Partly off-canvas geometry inside the accepted range is drawn, clipped.
    let clipped = json!({
        "kind": "rect",
        "x": -100,
        "y": -100,
        "width": 4000,
        "height": 4000,
        "color": [0, 0, 0, 255],
    });
    let (status, body) = send(&app, "POST", "/api/canvas/sanhok/strokes", Some(clipped)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["length"], 2);
}

#[tokio::test]
async fn test_canvas_delete() {
    let app = api::router(test_state().await);
    send(
        &app,
        "POST",
        "/api/canvas/karakin",
        Some(json!({ "width": 8, "height": 8 })),
    )
    .await;

    let (status, _) = send(&app, "DELETE", "/api/canvas/karakin", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", "/api/canvas/karakin", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", "/api/canvas/karakin", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Service ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_metrics() {
    metrics::register_metrics();
    let app = api::router(test_state().await);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    send(&app, "GET", "/api/ledger", None).await;
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("arena_api_requests_total"));
}
