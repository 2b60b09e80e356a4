use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_map::{
    config::Config,
    controllers,
    services::{expiry::HoldExpiryService, status_feed::{spawn_feed_loop, StatusFeedPoller}},
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Как часто проверять истечение удержаний.
const EXPIRY_SWEEP_INTERVAL: tokio::time::Duration = tokio::time::Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::new(&config.app.rust_log);
    if config.app.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting seat map preview server ({})", config.app.environment);

    let app_state = AppState::new(config.clone())?;

    // --- Фоновые задачи ---

    // Истечение удержаний без ожидания сервера
    HoldExpiryService::new(app_state.sessions.clone()).spawn(EXPIRY_SWEEP_INTERVAL);

    // Лента статусов: по одному запросу на событие
    spawn_feed_loop(
        StatusFeedPoller::new(app_state.snapshots.clone()),
        app_state.sessions.clone(),
        tokio::time::Duration::from_millis(config.seat_map_api.poll_interval_ms.max(100)),
    );

    // --- Веб-сервер ---

    let app = Router::new()
        .route("/", get(|| async { "Seat map preview v0.1" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let ip: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((ip, config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
