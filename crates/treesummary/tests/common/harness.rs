//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` owns a temporary directory holding a project tree and
//! an output directory, and runs the pipeline against a `ScriptedClient` so
//! results are deterministic and no network is involved.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use treesummary::client::{ModelRequest, SummarizerClient};
use treesummary::config::Config;
use treesummary::error::SummarizerError;
use treesummary::output::MemorySink;
use treesummary::pipeline::{
    AlwaysContinue, ContinuationGate, NoopProgress, Pipeline, PipelineConfig, PipelineContext,
    RunReport,
};

/// Any request whose text contains this marker fails.
pub const FAIL_MARKER: &str = "@@FAIL@@";

/// In-memory model client. Records every request and answers with a
/// numbered reply, or fails when the request carries [`FAIL_MARKER`].
#[derive(Default)]
pub struct ScriptedClient {
    requests: Mutex<Vec<ModelRequest>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose user turn starts with `prompt`.
    pub fn requests_with_prompt(&self, prompt: &str) -> Vec<ModelRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.user_text().is_some_and(|t| t.starts_with(prompt)))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummarizerClient for ScriptedClient {
    async fn summarise(&self, request: &ModelRequest) -> Result<String, SummarizerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        if request.user_text().is_some_and(|t| t.contains(FAIL_MARKER)) {
            return Err(SummarizerError::Status {
                status: 400,
                body: "rejected by test".to_string(),
            });
        }
        Ok(format!("reply {}", n))
    }
}

/// Isolated environment for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Root of the project tree being summarised.
    pub project_dir: PathBuf,
    /// Where the checkpoint and documents go.
    pub output_dir: PathBuf,
    pub client: Arc<ScriptedClient>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project_dir = temp_dir.path().join("project");
        let output_dir = temp_dir.path().join("output");
        std::fs::create_dir_all(&project_dir).expect("Failed to create project dir");

        Self {
            temp_dir,
            project_dir,
            output_dir,
            client: ScriptedClient::new(),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a file under the project root, creating parent directories.
    pub fn write_source(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.project_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create source dir");
        }
        std::fs::write(&path, content).expect("Failed to write source file");
        path
    }

    /// Canonical path of a project file, as discovery reports it.
    pub fn source_path(&self, relative: &str) -> PathBuf {
        self.project_dir
            .join(relative)
            .canonicalize()
            .expect("Source file should exist")
    }

    pub fn canonical_root(&self) -> PathBuf {
        self.project_dir.canonicalize().expect("Project dir should exist")
    }

    /// Builds a pipeline writing into this harness's output directory.
    pub fn pipeline(&self, config: Config) -> Pipeline {
        self.pipeline_with_settings(PipelineConfig::from_config(&config))
    }

    /// Builds a pipeline from runtime settings a library caller assembled
    /// by hand, bypassing config-file normalisation.
    pub fn pipeline_with_settings(&self, mut settings: PipelineConfig) -> Pipeline {
        settings.output_directory = self.output_dir.clone();
        Pipeline::new(PipelineContext::new(settings, self.client.clone()))
    }

    pub async fn run(&self, config: Config) -> (RunReport, MemorySink) {
        self.run_with_gate(config, &AlwaysContinue).await
    }

    pub async fn run_with_gate(
        &self,
        config: Config,
        gate: &dyn ContinuationGate,
    ) -> (RunReport, MemorySink) {
        let pipeline = self.pipeline(config);
        let mut sink = MemorySink::default();
        let report = pipeline
            .run(&self.project_dir, gate, &NoopProgress, &mut sink)
            .await
            .expect("Pipeline run failed");
        (report, sink)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
