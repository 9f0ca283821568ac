use std::path::PathBuf;
use std::time::Duration;

use crate::client::GenerationParams;
use crate::config::{Config, PromptsConfig};

/// Immutable runtime settings shared by every pipeline component.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub file_extensions: Vec<String>,
    pub ignore_paths: Vec<String>,
    pub tree_depth: usize,
    pub prompts: PromptsConfig,
    /// Parameters for per-file and supersummary calls.
    pub standard_params: GenerationParams,
    /// Parameters for the final and modernisation summaries.
    pub final_params: GenerationParams,
    pub batch_limit: Option<usize>,
    pub parallel: usize,
    pub cadence: Option<usize>,
    pub task_timeout: Option<Duration>,
    pub generate_final_summary: bool,
    pub generate_modernisation_summary: bool,
    pub output_directory: PathBuf,
    /// Token estimator command, `None` when disabled.
    pub token_estimator: Option<String>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let standard_params = GenerationParams {
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        };
        let final_params = GenerationParams {
            max_tokens: config.final_summary_max_tokens,
            ..standard_params.clone()
        };

        Self {
            file_extensions: config.file_extensions.clone(),
            ignore_paths: config.ignore_paths.clone(),
            tree_depth: config.tree_depth,
            prompts: config.prompts.clone(),
            standard_params,
            final_params,
            batch_limit: config.batch_limit(),
            parallel: config.parallel.max(1),
            cadence: config.cadence(),
            task_timeout: (config.task_timeout_secs > 0)
                .then(|| Duration::from_secs(config.task_timeout_secs)),
            generate_final_summary: config.generate_final_summary,
            generate_modernisation_summary: config.generate_modernisation_summary,
            output_directory: PathBuf::from(&config.output_directory),
            token_estimator: (config.token_estimator.enabled
                && !config.token_estimator.command.is_empty())
            .then(|| config.token_estimator.command.clone()),
        }
    }

    /// Files per batch. `Some(0)` is treated like no limit.
    pub fn effective_batch_limit(&self) -> Option<usize> {
        self.batch_limit.filter(|&n| n > 0)
    }

    /// Merges between supersummaries. `Some(0)` is treated as disabled.
    pub fn effective_cadence(&self) -> Option<usize> {
        self.cadence.filter(|&n| n > 0)
    }
}
