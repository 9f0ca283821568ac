use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;

use crate::discovery::list_siblings;

/// One file to summarise, with the context sent alongside its content.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub id: String,
    pub path: PathBuf,
    pub parent_dir: PathBuf,
    /// Names of the regular files in `parent_dir`.
    pub siblings: Vec<String>,
    /// Shared rendering of the project tree; empty when no tree context applies.
    pub project_tree: Arc<str>,
}

impl FileTask {
    pub fn new(path: PathBuf, siblings: Vec<String>, project_tree: Arc<str>) -> Self {
        let parent_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            parent_dir,
            siblings,
            project_tree,
        }
    }

    /// Builds a task, listing the file's siblings from disk.
    ///
    /// A directory that can no longer be listed leaves the sibling list empty;
    /// the read error surfaces later when the worker opens the file.
    pub fn for_path(path: PathBuf, project_tree: Arc<str>) -> Self {
        let siblings = match list_siblings(&path) {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list siblings of {}: {}", path.display(), e);
                Vec::new()
            }
        };
        Self::new(path, siblings, project_tree)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Context block sent after the file prompt.
    pub fn render_context(&self, content: &str) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Project Structure:\n{}\n", self.project_tree);
        let _ = writeln!(
            output,
            "Files in the same directory as {}:\n{}\n",
            self.file_name(),
            self.siblings.join(", ")
        );
        let _ = write!(output, "File Content:\n{}", content);
        output
    }
}

/// Result of summarising one [`FileTask`]. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub path: PathBuf,
    /// Summary text, or an error description when `error` is set.
    pub text: String,
    pub modernisation: Option<String>,
    pub error: Option<String>,
}

impl Summary {
    pub fn success(path: PathBuf, text: String, modernisation: Option<String>) -> Self {
        Self {
            path,
            text,
            modernisation,
            error: None,
        }
    }

    pub fn failure(path: PathBuf, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            path,
            text: format!("Error summarising file: {}", reason),
            modernisation: None,
            error: Some(reason),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
