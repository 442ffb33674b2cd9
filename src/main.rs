use anyhow::Result;
use array_rebalancer::config::AppConfig;
use array_rebalancer::db::Database;
use array_rebalancer::events::EventHub;
use array_rebalancer::{api, executor, tracker, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "array_rebalancer=info,tower_http=info".into()),
        )
        .init();

    info!("array-rebalancer daemon v{} starting up", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!("Configuration loaded: port={}, db_path={}", config.port, config.db_path);

    let db = Database::open(&config.db_path)?;
    db.run_migrations()?;
    info!("Database initialized at {}", config.db_path);

    // --- Startup recovery: fix stale states left by a previous crash ---
    // 1. Any move left `in_flight` in the catalog is reset to `planned`.
    let recovered_move_ids = db.reset_in_flight_moves()?;
    if !recovered_move_ids.is_empty() {
        warn!("{} move(s) were in flight at last shutdown; recovering", recovered_move_ids.len());
        let stats = executor::recovery::cleanup_partial_files(&db, &recovered_move_ids).await?;
        if stats.data_loss > 0 {
            error!("{} move(s) suffered data loss across the last crash", stats.data_loss);
        }
    }

    // 2. Reconcile the filesystem journal against the same recovered moves,
    //    purging anything the journal still remembers as completed.
    for record in tracker::load_unterminated(&config.core.state_dir)? {
        match tracker::classify_orphan(&record) {
            tracker::OrphanVerdict::CompletedUnrecorded | tracker::OrphanVerdict::Stale => {
                let _ = tracker::remove_record(&config.core.state_dir, record.move_id);
            }
            tracker::OrphanVerdict::PartialRerun | tracker::OrphanVerdict::NotStarted => {
                // Left in place: the move is already `planned` and will be
                // picked up and retried the next time a plan is executed.
            }
        }
    }
    let _ = tracker::purge_completed(&config.core.state_dir, chrono::Duration::days(7));

    let event_hub = EventHub::new(256);

    let state = Arc::new(AppState::new(db, config.clone(), event_hub));

    let app = api::router(state.clone());

    let bind_addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // --- Graceful shutdown: cancel operations, await the background task ---
    info!("Shutting down...");

    state.request_cancel().await;

    let bg_task = state.background_task.lock().await.take();
    if let Some(handle) = bg_task {
        match tokio::time::timeout(Duration::from_secs(10), handle).await {
            Ok(Ok(())) => info!("Background task completed cleanly"),
            Ok(Err(e)) => error!("Background task error: {:?}", e),
            Err(_) => warn!("Background task did not finish within 10s, abandoning"),
        }
    }

    info!("array-rebalancer daemon shut down cleanly");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { warn!("Received Ctrl+C, shutting down..."); },
        () = terminate => { warn!("Received SIGTERM, shutting down..."); },
    }
}
