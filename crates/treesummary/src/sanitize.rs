//! Path handling for log lines and span attributes.
//!
//! Source trees are often private. Spans carry a file name plus a stable hash
//! of the full path; log lines use the path relative to the project root.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// File name of `path`, or `<unknown>` for roots and non-UTF-8 names.
pub fn redact_path(path: &Path) -> String {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_owned(),
        None => "<unknown>".to_owned(),
    }
}

/// `path` relative to `root`. Paths outside the root fall back to the file
/// name so absolute locations never reach the logs.
pub fn relative_to_root(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
        _ => redact_path(path),
    }
}

/// 16 hex digits identifying a path across log lines and spans.
pub fn hash_path(path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
