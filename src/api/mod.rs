// HTTP API routes (ledger operations, store, missions, canvas history).

mod canvas;

use axum::{
    extract::{Json, Path, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::catalog;
use crate::error::LedgerError;
use crate::ledger::{InventoryItem, Ledger, Mission, Wager};
use crate::metrics;
use crate::store::KvStore;

pub use canvas::{CanvasRegistry, DEFAULT_MAX_CANVAS_SESSIONS, MAX_CANVAS_SIDE};

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PlaceBetRequest {
    pub match_id: String,
    pub selection_id: String,
    pub stake: i64,
    pub odds: f64,
}

#[derive(Deserialize)]
pub struct SettleRequest {
    pub winning_selection_id: String,
}

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub item_id: String,
}

#[derive(Deserialize)]
pub struct ProgressRequest {
    pub amount: u32,
}

#[derive(Deserialize)]
pub struct FeeRequest {
    pub amount: i64,
}

// ── Response types ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MissionView<'a> {
    #[serde(flatten)]
    pub mission: &'a Mission,
    pub completed: bool,
}

#[derive(Serialize)]
pub struct LedgerView<'a> {
    pub balance: i64,
    pub wagers: &'a [Wager],
    pub inventory: &'a [InventoryItem],
    pub missions: Vec<MissionView<'a>>,
}

impl<'a> LedgerView<'a> {
    fn of<S: KvStore>(ledger: &'a Ledger<S>) -> Self {
        LedgerView {
            balance: ledger.balance(),
            wagers: ledger.wagers(),
            inventory: ledger.inventory(),
            missions: ledger
                .missions()
                .iter()
                .map(|mission| MissionView {
                    mission,
                    completed: mission.completed(),
                })
                .collect(),
        }
    }
}

// ── Shared application state ─────────────────────────────────────────

pub struct AppState<S> {
    pub ledger: Arc<Mutex<Ledger<S>>>,
    pub canvases: CanvasRegistry,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            canvases: self.canvases.clone(),
        }
    }
}

impl<S> AppState<S> {
    pub fn new(ledger: Ledger<S>, canvases: CanvasRegistry) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            canvases,
        }
    }
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn ledger_error(e: LedgerError) -> Response {
    let status = match &e {
        LedgerError::InvalidStake(_)
        | LedgerError::InvalidOdds(_)
        | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::AlreadyOwned(_) => StatusCode::CONFLICT,
        LedgerError::StorageFailure(inner) => {
            tracing::error!("Ledger storage error: {inner}");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Your points could not be saved; nothing was changed. Please try again.",
            )
            .into_response();
        }
    };
    json_error(status, &e.to_string()).into_response()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router<S: KvStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Ledger
        .route("/api/ledger", get(get_ledger::<S>))
        .route("/api/bets", post(place_bet::<S>))
        .route("/api/matches/{match_id}/settle", post(settle_match::<S>))
        .route("/api/fees", post(charge_fee::<S>))
        // Store
        .route("/api/store/items", get(list_store_items))
        .route("/api/store/purchase", post(purchase_item::<S>))
        // Missions
        .route("/api/missions/{id}/claim", post(claim_mission::<S>))
        .route("/api/missions/{id}/progress", post(advance_mission::<S>))
        // Canvas history
        .route(
            "/api/canvas/{name}",
            get(canvas::get_canvas::<S>)
                .post(canvas::open_canvas::<S>)
                .delete(canvas::close_canvas::<S>),
        )
        .route("/api/canvas/{name}/strokes", post(canvas::add_stroke::<S>))
        .route("/api/canvas/{name}/undo", post(canvas::undo::<S>))
        .route("/api/canvas/{name}/redo", post(canvas::redo::<S>))
        .with_state(state)
        .layer(axum::middleware::from_fn(track_requests))
}

/// Record request counts and latency per normalized endpoint.
async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());
    let started = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(started.elapsed().as_secs_f64());
    response
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "arena-ledger" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Ledger handlers ───────────────────────────────────────────────────

async fn get_ledger<S: KvStore + 'static>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let ledger = state.ledger.lock().await;
    let view = json!(LedgerView::of(&*ledger));
    (StatusCode::OK, Json(view))
}

async fn place_bet<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<PlaceBetRequest>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.lock().await;
    let result = ledger
        .place_bet(&req.match_id, &req.selection_id, req.stake, req.odds)
        .await;
    match result {
        Ok(wager) => (
            StatusCode::CREATED,
            Json(json!({ "wager": wager, "balance": ledger.balance() })),
        )
            .into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn settle_match<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(match_id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.lock().await;
    let result = ledger
        .settle_bets(&match_id, &req.winning_selection_id)
        .await;
    match result {
        Ok(total_payout) => (
            StatusCode::OK,
            Json(json!({ "total_payout": total_payout, "balance": ledger.balance() })),
        )
            .into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn charge_fee<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<FeeRequest>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.lock().await;
    let result = ledger.charge_fee(req.amount).await;
    match result {
        Ok(balance) => (StatusCode::OK, Json(json!({ "balance": balance }))).into_response(),
        Err(e) => ledger_error(e),
    }
}

// ── Store handlers ────────────────────────────────────────────────────

async fn list_store_items() -> impl IntoResponse {
    (StatusCode::OK, Json(json!(catalog::store_items())))
}

async fn purchase_item<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Json(req): Json<PurchaseRequest>,
) -> impl IntoResponse {
    let Some(item) = catalog::find_store_item(&req.item_id) else {
        return json_error(StatusCode::NOT_FOUND, "Item not found").into_response();
    };
    let mut ledger = state.ledger.lock().await;
    let result = ledger.purchase_item(&item).await;
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "item": item, "balance": ledger.balance() })),
        )
            .into_response(),
        Err(e) => ledger_error(e),
    }
}

// ── Mission handlers ──────────────────────────────────────────────────

async fn claim_mission<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.lock().await;
    let result = ledger.claim_mission(&id).await;
    match result {
        Ok(reward) => (
            StatusCode::OK,
            Json(json!({
                "claimed": reward.is_some(),
                "reward": reward.unwrap_or(0),
                "balance": ledger.balance(),
            })),
        )
            .into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn advance_mission<S: KvStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> impl IntoResponse {
    let mut ledger = state.ledger.lock().await;
    if ledger.mission(&id).is_none() {
        return json_error(StatusCode::NOT_FOUND, "Mission not found").into_response();
    }
    if let Err(e) = ledger.advance_mission(&id, req.amount).await {
        return ledger_error(e);
    }
    let view = ledger.mission(&id).map(|mission| {
        json!(MissionView {
            mission,
            completed: mission.completed(),
        })
    });
    match view {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Mission not found").into_response(),
    }
}
