use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use tracing::{info_span, Instrument};

use crate::checkpoint::{CheckpointStore, ProcessingState};
use crate::discovery::FileDiscovery;
use crate::error::{Result, WorkerError};
use crate::estimate::TokenEstimator;
use crate::output::SummarySink;
use crate::sanitize;
use crate::worker::job::FileTask;
use crate::worker::WorkerPool;

use super::aggregator::SummaryAggregator;
use super::context::PipelineContext;
use super::gate::{BatchReport, ContinuationGate};
use super::progress::{ProgressEvent, ProgressReporter};
use super::summaries::SummariesMap;

/// What a scheduled run produced.
#[derive(Debug, Default)]
pub struct ScheduleOutcome {
    pub summaries: SummariesMap,
    pub supersummaries: Vec<String>,
    pub batches: usize,
    /// True when the gate stopped the run with files still pending.
    pub halted: bool,
}

/// Everything the scheduler reports to while it runs.
pub struct RunHooks<'a> {
    pub gate: &'a dyn ContinuationGate,
    pub progress: &'a dyn ProgressReporter,
    pub sink: &'a mut dyn SummarySink,
}

/// Drives pending files through the worker pool batch by batch.
///
/// This is the only writer of the summaries map and the processing state:
/// workers hand their results back over the pool's result channel and every
/// merge, checkpoint save and cadence check happens here, one at a time.
pub struct BatchScheduler<'s> {
    ctx: PipelineContext,
    store: &'s CheckpointStore,
    aggregator: SummaryAggregator,
    estimator: Option<TokenEstimator>,
}

impl<'s> BatchScheduler<'s> {
    pub fn new(ctx: PipelineContext, store: &'s CheckpointStore) -> Self {
        let estimator = ctx.config.token_estimator.as_deref().map(TokenEstimator::new);
        Self {
            aggregator: SummaryAggregator::new(ctx.clone()),
            ctx,
            store,
            estimator,
        }
    }

    pub async fn run(
        &self,
        discovery: &FileDiscovery,
        state: &mut ProcessingState,
        hooks: RunHooks<'_>,
    ) -> Result<ScheduleOutcome> {
        let RunHooks {
            gate,
            progress,
            sink,
        } = hooks;
        let config = &self.ctx.config;

        let discovered = discovery.discover();
        let pending: Vec<PathBuf> = discovered
            .iter()
            .filter(|path| !state.is_processed(path))
            .cloned()
            .collect();

        progress.report(ProgressEvent::RunStarted {
            root: discovery.root().display().to_string(),
            discovered: discovered.len(),
            pending: pending.len(),
        });

        let mut outcome = ScheduleOutcome::default();
        if pending.is_empty() {
            info!("No new files to process");
            return Ok(outcome);
        }

        info!(
            "{} of {} files pending ({} already processed)",
            pending.len(),
            discovered.len(),
            discovered.len() - pending.len()
        );

        let tree: Arc<str> = Arc::from(discovery.project_tree(config.tree_depth));
        let batch_size = config.effective_batch_limit().unwrap_or(pending.len());
        let mut pool = WorkerPool::new(self.ctx.clone(), config.parallel);

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            let batch_no = index + 1;
            let remaining = pending.len() - (index * batch_size + batch.len());
            let span = info_span!("batch", batch = batch_no, files = batch.len());

            let report = self
                .run_batch(
                    &mut pool,
                    batch,
                    batch_no,
                    discovery.root(),
                    &tree,
                    state,
                    &mut outcome,
                    progress,
                    sink,
                )
                .instrument(span)
                .await?;
            outcome.batches = batch_no;

            progress.report(ProgressEvent::BatchCompleted {
                batch: batch_no,
                summarised: report.summarised,
                failed: report.failed,
                remaining,
            });

            if remaining > 0 {
                let report = BatchReport { remaining, ..report };
                if !gate.should_continue(&report) {
                    info!("Stopping after batch {} with {} files pending", batch_no, remaining);
                    outcome.halted = true;
                    break;
                }
            }
        }

        pool.shutdown();
        pool.wait().await?;

        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_batch(
        &self,
        pool: &mut WorkerPool,
        batch: &[PathBuf],
        batch_no: usize,
        root: &Path,
        tree: &Arc<str>,
        state: &mut ProcessingState,
        outcome: &mut ScheduleOutcome,
        progress: &dyn ProgressReporter,
        sink: &mut dyn SummarySink,
    ) -> Result<BatchReport> {
        let estimated_tokens = match &self.estimator {
            Some(estimator) => estimator.estimate(batch).await,
            None => 0,
        };
        progress.report(ProgressEvent::BatchStarted {
            batch: batch_no,
            files: batch.len(),
            estimated_tokens,
        });
        info!("Processing batch {} ({} files)", batch_no, batch.len());

        for path in batch {
            pool.submit(FileTask::for_path(path.clone(), Arc::clone(tree)))?;
        }

        let cadence = self.ctx.config.effective_cadence();
        let mut merged_since_supersummary = 0;
        let mut failed = 0;

        for _ in 0..batch.len() {
            let summary = pool
                .recv_result()
                .await
                .ok_or(WorkerError::ChannelClosed)?;

            let is_error = summary.is_error();
            if is_error {
                failed += 1;
                warn!(
                    "Summary for {} marked as error",
                    sanitize::relative_to_root(&summary.path, root)
                );
            }
            state.mark_processed(&summary.path);
            let path = summary.path.display().to_string();
            outcome.summaries.insert(summary);
            if let Err(e) = self.store.save(state) {
                error!("Failed to save checkpoint, stopping the run: {}", e);
                if let Err(e) = sink.batch_completed(&outcome.summaries) {
                    error!("Failed to write summaries: {}", e);
                }
                pool.shutdown();
                return Err(e.into());
            }
            merged_since_supersummary += 1;

            progress.report(ProgressEvent::FileCompleted {
                path,
                failed: is_error,
                processed_total: state.processed_count(),
            });

            if let Some(cadence) = cadence {
                if state.processed_count() % cadence == 0 {
                    self.emit_supersummary(outcome, progress, sink).await;
                    merged_since_supersummary = 0;
                }
            }
        }

        if cadence.is_some() && merged_since_supersummary > 0 {
            self.emit_supersummary(outcome, progress, sink).await;
        }

        if let Err(e) = sink.batch_completed(&outcome.summaries) {
            error!("Failed to write summaries: {}", e);
        }

        Ok(BatchReport {
            batch: batch_no,
            summarised: batch.len(),
            failed,
            processed_total: state.processed_count(),
            remaining: 0,
        })
    }

    async fn emit_supersummary(
        &self,
        outcome: &mut ScheduleOutcome,
        progress: &dyn ProgressReporter,
        sink: &mut dyn SummarySink,
    ) {
        let text = self
            .aggregator
            .aggregate_supersummary(&outcome.summaries)
            .await;
        outcome.supersummaries.push(text);
        let index = outcome.supersummaries.len();

        if let Some(text) = outcome.supersummaries.last() {
            if let Err(e) = sink.supersummary(index, text) {
                error!("Failed to write supersummary {}: {}", index, e);
            }
        }
        progress.report(ProgressEvent::SupersummaryGenerated { index });
        info!("Supersummary {} generated over {} files", index, outcome.summaries.len());
    }
}
