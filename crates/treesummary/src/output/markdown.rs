use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::OutputError;
use crate::pipeline::SummariesMap;

use super::SummarySink;

const LIST_MARKERS: [&str; 3] = ["- ", "* ", "1. "];

/// Escapes `#` so a path can sit inside a markdown heading.
pub fn escape_heading(text: &str) -> String {
    text.replace('#', "\\#")
}

/// Normalises model output for markdown rendering.
///
/// List items start a new paragraph. Fenced code blocks are copied verbatim,
/// and inside them the list rule does not apply.
pub fn format_markdown_body(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_code_block = false;

    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
        } else if !in_code_block
            && LIST_MARKERS.iter().any(|m| trimmed.starts_with(m))
            && lines.last().is_some_and(|prev| !prev.trim().is_empty())
        {
            lines.push("");
        }
        lines.push(line);
    }

    lines.join("\n")
}

/// Writes the run's documents as markdown files, all sharing one timestamp.
#[derive(Debug)]
pub struct MarkdownSink {
    summary_path: PathBuf,
    supersummary_path: PathBuf,
    final_summary_path: PathBuf,
    modernisation_summary_path: PathBuf,
}

impl MarkdownSink {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Result<Self, OutputError> {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M").to_string();
        Self::with_timestamp(output_directory, &timestamp)
    }

    pub fn with_timestamp<P: AsRef<Path>>(
        output_directory: P,
        timestamp: &str,
    ) -> Result<Self, OutputError> {
        let dir = output_directory.as_ref();
        fs::create_dir_all(dir).map_err(|e| OutputError::CreateDirectory {
            path: dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            summary_path: dir.join(format!("summary_output_{}.md", timestamp)),
            supersummary_path: dir.join(format!("supersummary_{}.md", timestamp)),
            final_summary_path: dir.join(format!("final_summary_{}.md", timestamp)),
            modernisation_summary_path: dir
                .join(format!("modernisation_summary_{}.md", timestamp)),
        })
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    pub fn supersummary_path(&self) -> &Path {
        &self.supersummary_path
    }

    pub fn final_summary_path(&self) -> &Path {
        &self.final_summary_path
    }

    pub fn modernisation_summary_path(&self) -> &Path {
        &self.modernisation_summary_path
    }
}

/// The combined file-summary document.
pub fn render_summaries(summaries: &SummariesMap) -> String {
    let mut doc = String::new();
    for summary in summaries {
        doc.push_str(&format!(
            "# File: {}\n\n## Summary:\n\n{}\n\n",
            escape_heading(&summary.path.display().to_string()),
            format_markdown_body(&summary.text)
        ));
        if let Some(advice) = &summary.modernisation {
            doc.push_str(&format!(
                "## Modernisation:\n\n{}\n\n",
                format_markdown_body(advice)
            ));
        }
        doc.push_str("---\n\n");
    }
    doc
}

fn write_file(path: &Path, content: &str) -> Result<(), OutputError> {
    fs::write(path, content).map_err(|e| OutputError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn append_file(path: &Path, content: &str) -> Result<(), OutputError> {
    let to_error = |e| OutputError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_error)?;
    file.write_all(content.as_bytes()).map_err(to_error)
}

impl SummarySink for MarkdownSink {
    fn batch_completed(&mut self, summaries: &SummariesMap) -> Result<(), OutputError> {
        write_file(&self.summary_path, &render_summaries(summaries))?;
        debug!(
            "Wrote {} summaries to {}",
            summaries.len(),
            self.summary_path.display()
        );
        Ok(())
    }

    fn supersummary(&mut self, index: usize, text: &str) -> Result<(), OutputError> {
        append_file(
            &self.supersummary_path,
            &format!(
                "# Supersummary {}\n\n{}\n\n---\n\n",
                index,
                format_markdown_body(text)
            ),
        )
    }

    fn final_summary(&mut self, text: &str) -> Result<(), OutputError> {
        write_file(
            &self.final_summary_path,
            &format!("# Final Summary\n\n{}\n", format_markdown_body(text)),
        )?;
        info!("Final summary saved to {}", self.final_summary_path.display());
        Ok(())
    }

    fn modernisation_summary(&mut self, text: &str) -> Result<(), OutputError> {
        write_file(
            &self.modernisation_summary_path,
            &format!("# Modernisation Summary\n\n{}\n", format_markdown_body(text)),
        )?;
        info!(
            "Modernisation summary saved to {}",
            self.modernisation_summary_path.display()
        );
        Ok(())
    }
}
