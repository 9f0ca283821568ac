use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted by the pipeline while a run progresses.
/// Summary texts are omitted (can be large); sinks receive those.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStarted {
        root: String,
        discovered: usize,
        pending: usize,
    },
    BatchStarted {
        batch: usize,
        files: usize,
        estimated_tokens: u64,
    },
    FileCompleted {
        path: String,
        failed: bool,
        processed_total: usize,
    },
    SupersummaryGenerated {
        index: usize,
    },
    BatchCompleted {
        batch: usize,
        summarised: usize,
        failed: usize,
        remaining: usize,
    },
    FinalSummaryGenerated,
    ModernisationSummaryGenerated,
    RunCompleted {
        processed_total: usize,
        halted: bool,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for headless runs and tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// A [`ProgressEvent`] stamped with its run and emission time.
#[derive(Debug, Clone, Serialize)]
pub struct RunEvent {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

/// Forwards events to a broadcast channel so any number of front ends can
/// follow a run. Sending with no subscribers is not an error.
pub struct BroadcastProgress {
    run_id: String,
    sender: broadcast::Sender<RunEvent>,
}

impl BroadcastProgress {
    pub fn new(sender: broadcast::Sender<RunEvent>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            sender,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self::new(sender)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(RunEvent {
            run_id: self.run_id.clone(),
            timestamp: Utc::now(),
            event,
        });
    }
}
