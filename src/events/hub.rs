use serde::Serialize;
use tokio::sync::broadcast;

/// Events that flow from background tasks (scanner, transfer engine) to SSE subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    /// A single disk has finished scanning.
    ScanDiskComplete { disk: String, total_units: u64, total_bytes: u64 },

    /// All disk scanning is complete.
    ScanComplete { total_disks: u32, total_units: u64, total_bytes: u64, duration_seconds: f64 },

    /// A rebalance plan has been generated and is ready for review.
    PlanReady { plan_id: i64, total_moves: u32, total_bytes: u64, diagnostic: String },

    /// Progress update for a single unit move via the external copy tool.
    MoveProgress {
        move_id: i64,
        relative_path: String,
        bytes_done: u64,
        bytes_total: Option<u64>,
        rate_bytes_per_sec: Option<u64>,
        eta_seconds: Option<u64>,
    },

    /// A single unit move has completed.
    MoveComplete { move_id: i64, status: String, error: Option<String> },

    /// The entire plan execution has finished.
    ExecutionComplete {
        plan_id: i64,
        moves_completed: u32,
        moves_failed: u32,
        moves_aborted: u32,
        duration_seconds: f64,
    },

    /// A generic error event.
    DaemonError { message: String },
}

impl Event {
    /// Returns the SSE event type name for this event variant.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ScanDiskComplete { .. } => "scan_disk_complete",
            Self::ScanComplete { .. } => "scan_complete",
            Self::PlanReady { .. } => "plan_ready",
            Self::MoveProgress { .. } => "move_progress",
            Self::MoveComplete { .. } => "move_complete",
            Self::ExecutionComplete { .. } => "execution_complete",
            Self::DaemonError { .. } => "daemon_error",
        }
    }
}

/// The central event broadcast hub.
///
/// Background tasks (scanner, executor) send events here via `publish()`.
/// SSE endpoint handlers subscribe via `subscribe()` and forward events to the browser.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    /// Create a new EventHub with the given channel capacity.
    ///
    /// If subscribers fall behind by more than `capacity` events, they will
    /// receive a `Lagged` error and miss intermediate events. 256 is a safe
    /// default for the expected event rate.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns Ok(subscriber_count) or Err if there are no active subscribers
    /// (which is fine — events are fire-and-forget).
    pub fn publish(&self, event: Event) -> Result<usize, broadcast::error::SendError<Event>> {
        self.sender.send(event)
    }

    /// Subscribe to the event stream. Returns a broadcast Receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
