//! Builder for test configurations.

#![allow(dead_code)]

use treesummary::config::Config;

/// Builder for creating `Config` instances with test-friendly defaults.
///
/// The token estimator is disabled and the per-file timeout is short so a
/// misbehaving test fails fast instead of hanging.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::new("test-model", vec![".py".to_string()]);
        config.token_estimator.enabled = false;
        config.task_timeout_secs = 30;
        Self { config }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.config.file_extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn ignore(mut self, paths: &[&str]) -> Self {
        self.config.ignore_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn parallel(mut self, parallel: usize) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = Some(limit);
        self
    }

    pub fn cadence(mut self, interval: usize) -> Self {
        self.config.supersummary_interval = Some(interval);
        self
    }

    pub fn final_summary(mut self) -> Self {
        self.config.generate_final_summary = true;
        self
    }

    pub fn modernisation_summary(mut self) -> Self {
        self.config.generate_modernisation_summary = true;
        self
    }

    pub fn file_modernisation_prompt(mut self, prompt: &str) -> Self {
        self.config.prompts.file_modernisation_prompt = Some(prompt.to_string());
        self
    }

    pub fn output_directory(mut self, dir: &str) -> Self {
        self.config.output_directory = dir.to_string();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
