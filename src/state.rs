//! Shared daemon state, passed to every API handler via axum's `State`
//! extractor and to the background scan/plan/execute tasks it spawns.

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::db::Database;
use crate::events::EventHub;

/// Shared application state passed to all API handlers via axum's State extractor.
pub struct AppState {
    pub db: Database,
    pub config: tokio::sync::RwLock<AppConfig>,
    pub event_hub: EventHub,
    pub status: tokio::sync::RwLock<DaemonStatus>,
    /// Cancellation token for the currently running operation (scan, plan,
    /// or execute). Swapped for a fresh token at the start of each operation
    /// so a late cancel request aimed at a previous run can't affect a new one.
    cancel: AsyncMutex<CancellationToken>,
    /// Join handle of the currently running background task, if any. Awaited
    /// with a timeout during graceful shutdown.
    pub background_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig, event_hub: EventHub) -> Self {
        Self {
            db,
            config: tokio::sync::RwLock::new(config),
            event_hub,
            status: tokio::sync::RwLock::new(DaemonStatus::idle()),
            cancel: AsyncMutex::new(CancellationToken::new()),
            background_task: AsyncMutex::new(None),
        }
    }

    /// Start a new cancellable operation: replace the cancellation token with
    /// a fresh one and return it for the background task to hold onto.
    pub async fn new_operation_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();
        token
    }

    /// Request cancellation of whichever operation currently holds the token.
    pub async fn request_cancel(&self) {
        self.cancel.lock().await.cancel();
    }
}

/// The daemon's operating state, serialized to the API as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    Idle,
    Scanning,
    Planning,
    Executing,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub detail: Option<String>,
}

impl DaemonStatus {
    pub const fn idle() -> Self {
        Self { state: DaemonState::Idle, detail: None }
    }

    pub fn scanning(detail: impl Into<String>) -> Self {
        Self { state: DaemonState::Scanning, detail: Some(detail.into()) }
    }

    pub const fn planning() -> Self {
        Self { state: DaemonState::Planning, detail: None }
    }

    pub fn executing(detail: impl Into<String>) -> Self {
        Self { state: DaemonState::Executing, detail: Some(detail.into()) }
    }
}
