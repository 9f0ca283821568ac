use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::worker::job::Summary;

/// Per-file summaries of one run, in the order they were merged.
///
/// Re-inserting a path replaces its summary in place.
#[derive(Debug, Clone, Default)]
pub struct SummariesMap {
    entries: Vec<Summary>,
    index: HashMap<PathBuf, usize>,
}

impl SummariesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a summary. Returns `true` when the path was not present yet.
    pub fn insert(&mut self, summary: Summary) -> bool {
        match self.index.get(&summary.path) {
            Some(&i) => {
                self.entries[i] = summary;
                false
            }
            None => {
                self.index.insert(summary.path.clone(), self.entries.len());
                self.entries.push(summary);
                true
            }
        }
    }

    pub fn get(&self, path: &Path) -> Option<&Summary> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Summary> {
        self.entries.iter()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|s| s.is_error()).count()
    }

    pub fn extend(&mut self, other: SummariesMap) {
        for summary in other.entries {
            self.insert(summary);
        }
    }
}

impl<'a> IntoIterator for &'a SummariesMap {
    type Item = &'a Summary;
    type IntoIter = std::slice::Iter<'a, Summary>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
