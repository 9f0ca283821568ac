pub mod markdown;

use crate::error::OutputError;
use crate::pipeline::SummariesMap;

pub use markdown::{escape_heading, format_markdown_body, MarkdownSink};

/// Destination for the documents a run produces.
///
/// The pipeline logs sink errors and carries on; a failed write never loses
/// checkpointed progress.
pub trait SummarySink: Send {
    /// Called after every batch with every summary of the run so far.
    fn batch_completed(&mut self, summaries: &SummariesMap) -> Result<(), OutputError>;

    /// `index` is 1-based.
    fn supersummary(&mut self, index: usize, text: &str) -> Result<(), OutputError>;

    fn final_summary(&mut self, text: &str) -> Result<(), OutputError>;

    fn modernisation_summary(&mut self, text: &str) -> Result<(), OutputError>;
}

/// Discards everything.
pub struct NullSink;

impl SummarySink for NullSink {
    fn batch_completed(&mut self, _summaries: &SummariesMap) -> Result<(), OutputError> {
        Ok(())
    }

    fn supersummary(&mut self, _index: usize, _text: &str) -> Result<(), OutputError> {
        Ok(())
    }

    fn final_summary(&mut self, _text: &str) -> Result<(), OutputError> {
        Ok(())
    }

    fn modernisation_summary(&mut self, _text: &str) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Keeps the documents in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches_written: usize,
    pub last_summary_count: usize,
    pub supersummaries: Vec<(usize, String)>,
    pub final_summary: Option<String>,
    pub modernisation_summary: Option<String>,
}

impl SummarySink for MemorySink {
    fn batch_completed(&mut self, summaries: &SummariesMap) -> Result<(), OutputError> {
        self.batches_written += 1;
        self.last_summary_count = summaries.len();
        Ok(())
    }

    fn supersummary(&mut self, index: usize, text: &str) -> Result<(), OutputError> {
        self.supersummaries.push((index, text.to_string()));
        Ok(())
    }

    fn final_summary(&mut self, text: &str) -> Result<(), OutputError> {
        self.final_summary = Some(text.to_string());
        Ok(())
    }

    fn modernisation_summary(&mut self, text: &str) -> Result<(), OutputError> {
        self.modernisation_summary = Some(text.to_string());
        Ok(())
    }
}
