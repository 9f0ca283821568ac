use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,

    /// Model identifier sent with every request. Required.
    #[serde(default)]
    pub model_id: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,

    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Prompt keys sit at the top level of the file.
    #[serde(flatten)]
    pub prompts: PromptsConfig,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_final_summary_max_tokens")]
    pub final_summary_max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,

    /// Files per batch. `None` or 0 processes everything in one batch.
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    /// Merges between supersummaries. `None` or 0 disables them.
    #[serde(default)]
    pub supersummary_interval: Option<usize>,
    #[serde(default)]
    pub generate_final_summary: bool,
    #[serde(default)]
    pub generate_modernisation_summary: bool,

    #[serde(default = "default_tree_depth")]
    pub tree_depth: usize,
    /// Per-file deadline covering all model calls for that file. 0 disables it.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub token_estimator: TokenEstimatorConfig,

    #[serde(default = "default_output_directory")]
    pub output_directory: String,
    /// Headless continuation policy for batched runs.
    #[serde(default)]
    pub always_continue: bool,
    #[serde(default)]
    pub verbose: bool,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_anthropic_version() -> String {
    "2023-06-01".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("ANTHROPIC_API_KEY".to_string())
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_final_summary_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.5
}

fn default_top_p() -> f64 {
    0.9
}

fn default_parallel() -> usize {
    1
}

fn default_tree_depth() -> usize {
    3
}

fn default_task_timeout_secs() -> u64 {
    600
}

fn default_output_directory() -> String {
    "output".to_string()
}

/// Prompt templates, one per model call kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_file_prompt")]
    pub file_prompt: String,
    #[serde(default = "default_summary_prompt")]
    pub summary_prompt: String,
    #[serde(default = "default_final_summary_prompt")]
    pub final_summary_prompt: String,
    #[serde(default = "default_modernisation_summary_prompt")]
    pub modernisation_summary_prompt: String,
    /// When set, every file gets a second call asking for modernisation advice.
    #[serde(default)]
    pub file_modernisation_prompt: Option<String>,
}

fn default_system_prompt() -> String {
    "You are an experienced software engineer documenting an unfamiliar codebase.".to_string()
}

fn default_file_prompt() -> String {
    "Summarise the purpose, main components and notable behaviour of the following file."
        .to_string()
}

fn default_summary_prompt() -> String {
    "Combine the following file summaries into a concise overview of this part of the project."
        .to_string()
}

fn default_final_summary_prompt() -> String {
    "Combine the following supersummaries into a single overview of the whole project.".to_string()
}

fn default_modernisation_summary_prompt() -> String {
    "Based on the following file summaries, recommend how this project could be modernised."
        .to_string()
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            file_prompt: default_file_prompt(),
            summary_prompt: default_summary_prompt(),
            final_summary_prompt: default_final_summary_prompt(),
            modernisation_summary_prompt: default_modernisation_summary_prompt(),
            file_modernisation_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Fixed delay between attempts.
    #[default]
    Standard,
    /// Delay doubles after every failed attempt, up to `max_delay_ms`.
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub mode: RetryMode,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    20_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            mode: RetryMode::default(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEstimatorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_estimator_command")]
    pub command: String,
}

fn default_true() -> bool {
    true
}

fn default_estimator_command() -> String {
    "ingest".to_string()
}

impl Default for TokenEstimatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_estimator_command(),
        }
    }
}

impl Config {
    /// Minimal config for the given model and extensions, everything else defaulted.
    pub fn new(model_id: impl Into<String>, file_extensions: Vec<String>) -> Self {
        Self {
            version: default_version(),
            model_id: model_id.into(),
            endpoint: default_endpoint(),
            anthropic_version: default_anthropic_version(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_api_key_env(),
            file_extensions,
            ignore_paths: Vec::new(),
            prompts: PromptsConfig::default(),
            max_tokens: default_max_tokens(),
            final_summary_max_tokens: default_final_summary_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            limit: None,
            parallel: default_parallel(),
            supersummary_interval: None,
            generate_final_summary: false,
            generate_modernisation_summary: false,
            tree_depth: default_tree_depth(),
            task_timeout_secs: default_task_timeout_secs(),
            retry: RetryConfig::default(),
            token_estimator: TokenEstimatorConfig::default(),
            output_directory: default_output_directory(),
            always_continue: false,
            verbose: false,
        }
    }

    /// Batch size, with 0 meaning "no limit".
    pub fn batch_limit(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }

    /// Supersummary cadence, with 0 meaning "disabled".
    pub fn cadence(&self) -> Option<usize> {
        self.supersummary_interval.filter(|&n| n > 0)
    }
}
