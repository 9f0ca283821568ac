use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use tracing::{info_span, Instrument};

use crate::checkpoint::CheckpointStore;
use crate::client::HttpSummarizer;
use crate::config::{validate_config, Config};
use crate::discovery::FileDiscovery;
use crate::error::{CheckpointError, ConfigError, Result, TreeSummaryError};
use crate::output::SummarySink;
use crate::sanitize;

use super::aggregator::SummaryAggregator;
use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::gate::ContinuationGate;
use super::progress::{ProgressEvent, ProgressReporter};
use super::scheduler::{BatchScheduler, RunHooks};
use super::summaries::SummariesMap;

/// Everything one run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub summaries: SummariesMap,
    pub supersummaries: Vec<String>,
    pub final_summary: Option<String>,
    pub modernisation_summary: Option<String>,
    /// Files checkpointed for this root, including earlier runs.
    pub processed_total: usize,
    /// True when the continuation gate stopped the run early.
    pub halted: bool,
}

pub struct Pipeline {
    ctx: PipelineContext,
    checkpoint: CheckpointStore,
}

impl Pipeline {
    /// Production constructor: validates the config and builds the HTTP client.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        validate_config(config)?;
        let client = HttpSummarizer::from_config(config)?;
        Ok(Self::new(PipelineContext::new(
            PipelineConfig::from_config(config),
            Arc::new(client),
        )))
    }

    /// Uses the given context as is; the checkpoint lives in its output directory.
    pub fn new(ctx: PipelineContext) -> Self {
        let checkpoint = CheckpointStore::in_directory(&ctx.config.output_directory);
        Self { ctx, checkpoint }
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointStore) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Forgets every processed file so the next run starts from scratch.
    pub fn clear_state(&self) -> std::result::Result<(), CheckpointError> {
        self.checkpoint.clear()
    }

    /// Summarises every pending file under `root`, then produces the
    /// end-of-run summaries that are enabled.
    ///
    /// Only setup problems and an unwritable checkpoint return `Err`; failed
    /// files and failed aggregations are reported inside the [`RunReport`].
    pub async fn run(
        &self,
        root: &Path,
        gate: &dyn ContinuationGate,
        progress: &dyn ProgressReporter,
        sink: &mut dyn SummarySink,
    ) -> Result<RunReport> {
        let config = &self.ctx.config;
        if config.standard_params.model_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting("model_id").into());
        }
        if !root.is_dir() {
            return Err(ConfigError::Validation {
                message: format!("'{}' is not a directory", root.display()),
            }
            .into());
        }

        let discovery = FileDiscovery::new(
            root,
            config.file_extensions.clone(),
            config.ignore_paths.clone(),
        );
        let span = info_span!(
            "run",
            root = %sanitize::redact_path(discovery.root()),
            root_hash = %sanitize::hash_path(discovery.root()),
        );

        async {
            let mut state = self.checkpoint.load_for_root(discovery.root())?;

            let scheduler = BatchScheduler::new(self.ctx.clone(), &self.checkpoint);
            let outcome = scheduler
                .run(
                    &discovery,
                    &mut state,
                    RunHooks {
                        gate,
                        progress,
                        sink: &mut *sink,
                    },
                )
                .await?;

            let mut report = RunReport {
                processed_total: state.processed_count(),
                halted: outcome.halted,
                summaries: outcome.summaries,
                supersummaries: outcome.supersummaries,
                ..Default::default()
            };

            self.finish(&mut report, progress, &mut *sink).await;

            progress.report(ProgressEvent::RunCompleted {
                processed_total: report.processed_total,
                halted: report.halted,
            });
            info!(
                "Run finished: {} files summarised ({} failed), {} supersummaries",
                report.summaries.len(),
                report.summaries.error_count(),
                report.supersummaries.len()
            );

            Ok::<_, TreeSummaryError>(report)
        }
        .instrument(span)
        .await
    }

    async fn finish(
        &self,
        report: &mut RunReport,
        progress: &dyn ProgressReporter,
        sink: &mut dyn SummarySink,
    ) {
        let config = &self.ctx.config;
        let aggregator = SummaryAggregator::new(self.ctx.clone());

        if config.generate_final_summary {
            if report.supersummaries.is_empty() {
                info!("No supersummaries were generated, skipping final summary");
            } else {
                let text = aggregator.aggregate_final(&report.supersummaries).await;
                if let Err(e) = sink.final_summary(&text) {
                    error!("Failed to write final summary: {}", e);
                }
                progress.report(ProgressEvent::FinalSummaryGenerated);
                report.final_summary = Some(text);
            }
        }

        if config.generate_modernisation_summary {
            if report.summaries.is_empty() {
                info!("No files were summarised, skipping modernisation summary");
            } else {
                let text = aggregator.aggregate_modernisation(&report.summaries).await;
                if let Err(e) = sink.modernisation_summary(&text) {
                    error!("Failed to write modernisation summary: {}", e);
                }
                progress.report(ProgressEvent::ModernisationSummaryGenerated);
                report.modernisation_summary = Some(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ModelRequest, SummarizerClient};
    use crate::error::SummarizerError;
    use crate::output::MemorySink;
    use crate::pipeline::gate::AlwaysContinue;
    use crate::pipeline::progress::NoopProgress;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FixedClient;

    #[async_trait]
    impl SummarizerClient for FixedClient {
        async fn summarise(&self, _request: &ModelRequest) -> std::result::Result<String, SummarizerError> {
            Ok("ok".to_string())
        }
    }

    fn pipeline(output: &Path, configure: impl FnOnce(&mut Config)) -> Pipeline {
        let mut config = Config::new("model", vec![".py".to_string()]);
        config.output_directory = output.to_string_lossy().into_owned();
        config.token_estimator.enabled = false;
        configure(&mut config);
        Pipeline::new(PipelineContext::new(
            PipelineConfig::from_config(&config),
            Arc::new(FixedClient),
        ))
    }

    #[test]
    fn test_from_config_rejects_missing_model() {
        let config = Config::new("", vec![".py".to_string()]);
        assert!(matches!(
            Pipeline::from_config(&config),
            Err(ConfigError::MissingSetting("model_id"))
        ));
    }

    #[tokio::test]
    async fn test_run_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir.path().join("out"), |_| {});

        let result = pipeline
            .run(
                &temp_dir.path().join("missing"),
                &AlwaysContinue,
                &NoopProgress,
                &mut MemorySink::default(),
            )
            .await;

        assert!(matches!(result, Err(TreeSummaryError::Config(_))));
        assert!(!pipeline.checkpoint().path().exists());
    }

    #[tokio::test]
    async fn test_empty_tree_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        std::fs::create_dir_all(&root).unwrap();
        let pipeline = pipeline(&temp_dir.path().join("out"), |c| {
            c.generate_final_summary = true;
            c.generate_modernisation_summary = true;
        });

        let mut sink = MemorySink::default();
        let report = pipeline
            .run(&root, &AlwaysContinue, &NoopProgress, &mut sink)
            .await
            .unwrap();

        assert!(report.summaries.is_empty());
        assert!(report.final_summary.is_none());
        assert!(report.modernisation_summary.is_none());
        assert_eq!(sink.batches_written, 0);
    }

    #[tokio::test]
    async fn test_end_of_run_summaries() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.py"), "a").unwrap();
        std::fs::write(root.join("b.py"), "b").unwrap();

        let pipeline = pipeline(&temp_dir.path().join("out"), |c| {
            c.supersummary_interval = Some(1);
            c.generate_final_summary = true;
            c.generate_modernisation_summary = true;
        });

        let mut sink = MemorySink::default();
        let report = pipeline
            .run(&root, &AlwaysContinue, &NoopProgress, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.processed_total, 2);
        assert_eq!(report.supersummaries.len(), 2);
        assert_eq!(report.final_summary.as_deref(), Some("ok"));
        assert_eq!(report.modernisation_summary.as_deref(), Some("ok"));
        assert_eq!(sink.final_summary.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_clear_state_removes_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("src");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.py"), "a").unwrap();
        let pipeline = pipeline(&temp_dir.path().join("out"), |_| {});

        pipeline
            .run(&root, &AlwaysContinue, &NoopProgress, &mut MemorySink::default())
            .await
            .unwrap();
        assert!(pipeline.checkpoint().path().exists());

        pipeline.clear_state().unwrap();
        assert!(!pipeline.checkpoint().path().exists());

        let report = pipeline
            .run(&root, &AlwaysContinue, &NoopProgress, &mut MemorySink::default())
            .await
            .unwrap();
        assert_eq!(report.summaries.len(), 1);
    }
}
