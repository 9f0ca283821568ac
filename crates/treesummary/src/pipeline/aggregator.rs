use std::fmt::Write;

use log::{info, warn};
use tracing::{info_span, Instrument};

use crate::client::{GenerationParams, ModelRequest};

use super::context::PipelineContext;
use super::summaries::SummariesMap;

/// Reduces per-file summaries into higher-level summaries, one model call each.
///
/// A failed call never propagates: the returned text carries the error instead.
pub struct SummaryAggregator {
    ctx: PipelineContext,
}

impl SummaryAggregator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Summary of a snapshot of file summaries, using the batch summary prompt.
    pub async fn aggregate_supersummary(&self, snapshot: &SummariesMap) -> String {
        let context = file_summaries_context(snapshot, false);
        self.reduce(
            "supersummary",
            &self.ctx.config.prompts.summary_prompt,
            context,
            &self.ctx.config.standard_params,
        )
        .await
    }

    /// Final summary over the supersummaries of a run, oldest first.
    pub async fn aggregate_final(&self, supersummaries: &[String]) -> String {
        let context = supersummaries_context(supersummaries);
        self.reduce(
            "final_summary",
            &self.ctx.config.prompts.final_summary_prompt,
            context,
            &self.ctx.config.final_params,
        )
        .await
    }

    /// Modernisation summary over every file summary, including any per-file
    /// recommendation.
    pub async fn aggregate_modernisation(&self, summaries: &SummariesMap) -> String {
        let context = file_summaries_context(summaries, true);
        self.reduce(
            "modernisation_summary",
            &self.ctx.config.prompts.modernisation_summary_prompt,
            context,
            &self.ctx.config.final_params,
        )
        .await
    }

    async fn reduce(
        &self,
        kind: &'static str,
        prompt: &str,
        context: String,
        params: &GenerationParams,
    ) -> String {
        let request = ModelRequest::single_turn(
            &self.ctx.config.prompts.system_prompt,
            prompt,
            &context,
            params,
        );

        let span = info_span!("aggregate", kind, context_len = context.len());
        match self.ctx.client.summarise(&request).instrument(span).await {
            Ok(text) => {
                info!("Generated {}", kind.replace('_', " "));
                text
            }
            Err(e) => {
                warn!("Error generating {}: {}", kind.replace('_', " "), e);
                format!("Error summarising summaries: {}", e)
            }
        }
    }
}

/// `File: <path>\nSummary: <text>` blocks separated by blank lines.
pub fn file_summaries_context(summaries: &SummariesMap, with_modernisation: bool) -> String {
    let mut blocks = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let mut block = format!("File: {}\nSummary: {}", summary.path.display(), summary.text);
        if with_modernisation {
            if let Some(advice) = &summary.modernisation {
                let _ = write!(block, "\nModernisation: {}", advice);
            }
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}

pub fn supersummaries_context(supersummaries: &[String]) -> String {
    let mut output = String::new();
    for (i, text) in supersummaries.iter().enumerate() {
        let _ = write!(output, "Supersummary {}:\n{}\n\n", i + 1, text);
    }
    output
}
