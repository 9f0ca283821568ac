//! Summaries for caller-defined groups of files and directories.
//!
//! Unlike a tree run, bucket analysis keeps no checkpoint: every call
//! summarises everything it is given.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use crate::discovery::FileDiscovery;
use crate::error::{Result, WorkerError};
use crate::output::SummarySink;
use crate::pipeline::{
    PipelineContext, ProgressEvent, ProgressReporter, SummariesMap, SummaryAggregator,
};
use crate::worker::{FileTask, WorkerPool};

/// Named group of files and directories summarised together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    #[serde(alias = "files")]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct BucketResult {
    pub name: String,
    pub summaries: SummariesMap,
    /// Present when a supersummary cadence is configured.
    pub supersummary: Option<String>,
}

#[derive(Debug, Default)]
pub struct BucketAnalysis {
    pub buckets: Vec<BucketResult>,
    pub final_summary: Option<String>,
    pub modernisation_summary: Option<String>,
}

impl BucketAnalysis {
    /// Every file summary across all buckets, bucket by bucket.
    pub fn all_summaries(&self) -> SummariesMap {
        let mut all = SummariesMap::new();
        for bucket in &self.buckets {
            all.extend(bucket.summaries.clone());
        }
        all
    }
}

/// Files a bucket refers to. Directories are expanded with the configured
/// extension and ignore rules; files are taken as they are.
pub fn resolve_bucket_files(ctx: &PipelineContext, bucket: &Bucket) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in &bucket.paths {
        let path = absolute(path);
        if path.is_dir() {
            let discovery = FileDiscovery::new(
                &path,
                ctx.config.file_extensions.clone(),
                ctx.config.ignore_paths.clone(),
            );
            files.extend(discovery.discover());
        } else if path.is_file() {
            files.push(path);
        } else {
            warn!(
                "{} is neither a file nor a directory, skipping",
                path.display()
            );
        }
    }
    files
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Summarises each bucket, then the optional end-of-run summaries.
pub async fn analyze_buckets(
    ctx: &PipelineContext,
    buckets: &[Bucket],
    progress: &dyn ProgressReporter,
    sink: &mut dyn SummarySink,
) -> Result<BucketAnalysis> {
    let config = &ctx.config;
    let aggregator = SummaryAggregator::new(ctx.clone());
    let mut pool = WorkerPool::new(ctx.clone(), config.parallel);
    let no_tree: Arc<str> = Arc::from("");
    let mut analysis = BucketAnalysis::default();

    for (index, bucket) in buckets.iter().enumerate() {
        let span = info_span!("bucket", name = %bucket.name);
        let files = resolve_bucket_files(ctx, bucket);

        let result = async {
            progress.report(ProgressEvent::BatchStarted {
                batch: index + 1,
                files: files.len(),
                estimated_tokens: 0,
            });
            info!("Summarising bucket '{}' ({} files)", bucket.name, files.len());

            for path in &files {
                pool.submit(FileTask::for_path(path.clone(), Arc::clone(&no_tree)))?;
            }

            let mut summaries = SummariesMap::new();
            let mut failed = 0;
            for _ in 0..files.len() {
                let summary = pool.recv_result().await.ok_or(WorkerError::ChannelClosed)?;
                if summary.is_error() {
                    failed += 1;
                }
                progress.report(ProgressEvent::FileCompleted {
                    path: summary.path.display().to_string(),
                    failed: summary.is_error(),
                    processed_total: summaries.len() + 1,
                });
                summaries.insert(summary);
            }

            let supersummary = if config.effective_cadence().is_some() {
                let text = aggregator.aggregate_supersummary(&summaries).await;
                if let Err(e) = sink.supersummary(index + 1, &text) {
                    error!("Failed to write supersummary for '{}': {}", bucket.name, e);
                }
                progress.report(ProgressEvent::SupersummaryGenerated { index: index + 1 });
                Some(text)
            } else {
                None
            };

            progress.report(ProgressEvent::BatchCompleted {
                batch: index + 1,
                summarised: summaries.len(),
                failed,
                remaining: buckets.len() - index - 1,
            });

            Ok::<_, WorkerError>(BucketResult {
                name: bucket.name.clone(),
                summaries,
                supersummary,
            })
        }
        .instrument(span)
        .await?;

        analysis.buckets.push(result);
    }

    pool.wait().await?;

    let all = analysis.all_summaries();
    if let Err(e) = sink.batch_completed(&all) {
        error!("Failed to write bucket summaries: {}", e);
    }

    if config.generate_final_summary {
        let supersummaries: Vec<String> = analysis
            .buckets
            .iter()
            .filter_map(|b| b.supersummary.clone())
            .collect();
        if !supersummaries.is_empty() {
            let text = aggregator.aggregate_final(&supersummaries).await;
            if let Err(e) = sink.final_summary(&text) {
                error!("Failed to write final summary: {}", e);
            }
            progress.report(ProgressEvent::FinalSummaryGenerated);
            analysis.final_summary = Some(text);
        }
    }

    if config.generate_modernisation_summary && !all.is_empty() {
        let text = aggregator.aggregate_modernisation(&all).await;
        if let Err(e) = sink.modernisation_summary(&text) {
            error!("Failed to write modernisation summary: {}", e);
        }
        progress.report(ProgressEvent::ModernisationSummaryGenerated);
        analysis.modernisation_summary = Some(text);
    }

    Ok(analysis)
}
