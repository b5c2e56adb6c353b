use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use groundwatch_api::config::AppConfig;
use groundwatch_api::notifications::NotificationRelay;
use groundwatch_api::router::build_app_router;
use groundwatch_api::state::AppState;
use groundwatch_api::ws;
use groundwatch_db::{DetectionStore, PgStore};
use groundwatch_events::EventBus;
use groundwatch_pipeline::Pipeline;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "groundwatch_api=debug,groundwatch_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let AppConfig {
        server: config,
        pipeline: pipeline_config,
        database_url,
    } = AppConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        addr = %config.bind_addr,
        origins = config.cors_origins.len(),
        "Loaded server configuration"
    );
    tracing::info!(
        camera_lat = pipeline_config.calibration.latitude,
        camera_lon = pipeline_config.calibration.longitude,
        retention_secs = pipeline_config.tracking_retention.num_seconds(),
        "Loaded pipeline configuration"
    );

    // --- Database ---
    let pool = groundwatch_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    groundwatch_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    groundwatch_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store: Arc<dyn DetectionStore> = Arc::new(PgStore::new(pool));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), heartbeat_cancel.clone());

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let relay = NotificationRelay::new(Arc::clone(&ws_manager));
    let relay_handle = tokio::spawn(relay.run(event_bus.subscribe()));

    // --- Detection pipeline ---
    let pipeline = Pipeline::start(pipeline_config, Arc::clone(&store), Arc::clone(&event_bus))
        .await
        .expect("Failed to start detection pipeline");

    // --- App state ---
    let state = AppState {
        store,
        ws_manager: Arc::clone(&ws_manager),
        ingestor: pipeline.ingestor.clone(),
        tracker: pipeline.tracker.clone(),
        zones: Arc::clone(&pipeline.zones),
        stats: pipeline.stats.clone(),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = config.bind_addr;
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // The writer holds the last event bus handles; the relay drains once it stops.
    pipeline.shutdown().await;
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), relay_handle).await;
    tracing::info!("Notification relay stopped");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), heartbeat_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
