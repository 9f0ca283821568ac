pub mod aggregator;
pub mod config;
pub mod context;
pub mod gate;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod summaries;

pub use aggregator::SummaryAggregator;
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use gate::{AlwaysContinue, BatchReport, ContinuationGate, StopAfterBatch, StopFlag};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter, RunEvent};
pub use runner::{Pipeline, RunReport};
pub use scheduler::{BatchScheduler, RunHooks, ScheduleOutcome};
pub use summaries::SummariesMap;
