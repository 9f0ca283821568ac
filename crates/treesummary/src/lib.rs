pub mod bucket;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod estimate;
pub mod output;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod worker;

pub use bucket::{analyze_buckets, Bucket, BucketAnalysis, BucketResult};
pub use checkpoint::{CheckpointStore, ProcessingState};
pub use client::{GenerationParams, HttpSummarizer, ModelRequest, SummarizerClient};
pub use config::{load_config, Config};
pub use discovery::FileDiscovery;
pub use error::{
    CheckpointError, ConfigError, OutputError, Result, SummarizerError, TreeSummaryError,
    WorkerError,
};
pub use estimate::TokenEstimator;
pub use output::{MarkdownSink, MemorySink, NullSink, SummarySink};
pub use pipeline::{
    AlwaysContinue, BatchReport, ContinuationGate, Pipeline, PipelineConfig, PipelineContext,
    ProgressEvent, ProgressReporter, RunReport, StopAfterBatch, StopFlag, SummariesMap,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use worker::{FileTask, Summary};
