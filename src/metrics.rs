// Prometheus metrics definitions for the ledger service.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Spendable points after the last committed ledger operation.
    pub static ref LEDGER_BALANCE: IntGauge =
        IntGauge::new("arena_ledger_balance", "Current point balance").unwrap();

    /// Wagers waiting for settlement.
    pub static ref OPEN_WAGERS: IntGauge =
        IntGauge::new("arena_open_wagers", "Wagers waiting for settlement").unwrap();

    /// Live canvas drawing sessions.
    pub static ref CANVAS_SESSIONS: IntGauge =
        IntGauge::new("arena_canvas_sessions", "Live canvas drawing sessions").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    pub static ref BETS_PLACED_TOTAL: IntCounter =
        IntCounter::new("arena_bets_placed_total", "Wagers placed").unwrap();

    /// Settled wagers, by outcome (won, lost).
    pub static ref BETS_SETTLED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_bets_settled_total", "Wagers settled"),
        &["outcome"],
    )
    .unwrap();

    /// Points credited by settlement.
    pub static ref PAYOUT_POINTS_TOTAL: IntCounter =
        IntCounter::new("arena_payout_points_total", "Points paid out to winning wagers").unwrap();

    pub static ref PURCHASES_TOTAL: IntCounter =
        IntCounter::new("arena_purchases_total", "Store items purchased").unwrap();

    pub static ref MISSIONS_CLAIMED_TOTAL: IntCounter =
        IntCounter::new("arena_missions_claimed_total", "Mission rewards claimed").unwrap();

    /// Rejected ledger operations, by error kind.
    pub static ref LEDGER_REJECTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_ledger_rejections_total", "Rejected ledger operations"),
        &["kind"],
    )
    .unwrap();

    /// Failed durable writes (each attempt counts, including the retry).
    pub static ref STORAGE_WRITE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "arena_storage_write_failures_total",
        "Failed durable ledger writes",
    )
    .unwrap();

    pub static ref HISTORY_COMMITS_TOTAL: IntCounter =
        IntCounter::new("arena_history_commits_total", "Canvas snapshots committed").unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "arena_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call repeatedly.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(LEDGER_BALANCE.clone()),
            Box::new(OPEN_WAGERS.clone()),
            Box::new(CANVAS_SESSIONS.clone()),
            Box::new(BETS_PLACED_TOTAL.clone()),
            Box::new(BETS_SETTLED_TOTAL.clone()),
            Box::new(PAYOUT_POINTS_TOTAL.clone()),
            Box::new(PURCHASES_TOTAL.clone()),
            Box::new(MISSIONS_CLAIMED_TOTAL.clone()),
            Box::new(LEDGER_REJECTIONS_TOTAL.clone()),
            Box::new(STORAGE_WRITE_FAILURES_TOTAL.clone()),
            Box::new(HISTORY_COMMITS_TOTAL.clone()),
            Box::new(API_REQUESTS_TOTAL.clone()),
            Box::new(API_REQUEST_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::error!("Failed to register metric: {e}");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collections whose next path segment is a caller-chosen identifier.
const ID_COLLECTIONS: &[&str] = &["matches", "missions", "canvas"];

/// Normalize a URL path for metric labels: replace identifier segments with
/// `:id` to prevent cardinality explosion.
pub fn normalize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let label = if ID_COLLECTIONS.contains(&previous) || segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            };
            previous = segment;
            label
        })
        .collect::<Vec<_>>()
        .join("/")
}
