use tower_http::cors::CorsLayer;

use arena_ledger::api::{self, AppState, CanvasRegistry};
use arena_ledger::config::Config;
use arena_ledger::ledger::{Ledger, LedgerSettings};
use arena_ledger::metrics;
use arena_ledger::store::SqliteStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    metrics::register_metrics();

    let config = Config::load();

    let store = SqliteStore::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let settings = LedgerSettings {
        welcome_balance: config.welcome_balance,
        ..LedgerSettings::default()
    };
    let ledger = Ledger::open(store, settings)
        .await
        .expect("Failed to load ledger");

    let canvases = CanvasRegistry::new(config.history_cap, config.max_canvas_sessions);
    let app = api::router(AppState::new(ledger, canvases)).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("Arena ledger listening on {addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
