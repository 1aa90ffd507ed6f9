use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use pawtrack::auth::TokenVerifier;
use pawtrack::tracking::{self, DEMO_TICK_PERIOD, DemoTicker, Hub};
use pawtrack::{AppState, db};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pawtrack=info")),
        )
        .init();

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(dotenv::var("DATABASE_URL")?.as_str())
        .await?;
    db::init_schema(&db_pool).await?;

    let verifier = TokenVerifier::new(dotenv::var("JWT_SECRET")?.as_str());
    let hub = Arc::new(Hub::new());
    let ticker = DemoTicker::spawn(hub.clone(), DEMO_TICK_PERIOD);

    let app_state = AppState {
        db_pool,
        hub,
        verifier,
    };
    let app = Router::new()
        .route("/health", get(health))
        .nest("/track", tracking::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "pawtrack listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The ticker must not outlive the hub it broadcasts into.
    ticker.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn health(State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "connections": hub.connection_count().await }))
}
