use std::sync::Arc;

use crate::client::SummarizerClient;

use super::config::PipelineConfig;

/// Explicit context handed to every component: settings plus the model client.
///
/// Cheap to clone; workers each hold their own copy.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<PipelineConfig>,
    pub client: Arc<dyn SummarizerClient>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig, client: Arc<dyn SummarizerClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }
}
