use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Walks a source tree and selects the files to summarise.
///
/// Traversal is sorted by file name at every level, so an unchanged tree
/// always yields the same sequence. Batching slices that sequence
/// positionally, which is what keeps resumed runs consistent.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    root: PathBuf,
    extensions: Vec<String>,
    ignore_paths: Vec<String>,
}

impl FileDiscovery {
    pub fn new<P: AsRef<Path>>(root: P, extensions: Vec<String>, ignore_paths: Vec<String>) -> Self {
        Self {
            root: absolute_root(root.as_ref()),
            extensions,
            ignore_paths,
        }
    }

    /// Absolute form of the root this discovery walks.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when the path contains any ignore substring.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.ignore_paths
            .iter()
            .any(|needle| text.contains(needle.as_str()))
    }

    pub fn has_accepted_extension(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy())
            .is_some_and(|name| self.extensions.iter().any(|ext| name.ends_with(ext.as_str())))
    }

    /// Returns the ordered list of matching files under the root.
    ///
    /// Unreadable directories are skipped with a warning.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut files = self.collect_under(&self.root);
        files.sort();
        info!(
            "Discovered {} matching files under {}",
            files.len(),
            self.root.display()
        );
        files
    }

    /// Same filters as [`discover`](Self::discover), applied to an arbitrary directory.
    pub fn collect_under(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in self.walker(dir, None) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path during discovery: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            if self.has_accepted_extension(entry.path()) {
                debug!("Found source file: {}", entry.path().display());
                files.push(entry.into_path());
            }
        }

        files
    }

    /// Renders the tree as indented text, two spaces per level, directories
    /// suffixed with `/`. Entries deeper than `max_depth` and ignored subtrees
    /// are left out.
    pub fn project_tree(&self, max_depth: usize) -> String {
        let mut lines = Vec::new();

        for entry in self.walker(&self.root, Some(max_depth)) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path in project tree: {}", e);
                    continue;
                }
            };

            let indent = "  ".repeat(entry.depth());
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                lines.push(format!("{}{}/", indent, name));
            } else {
                lines.push(format!("{}{}", indent, name));
            }
        }

        lines.join("\n")
    }

    fn walker(
        &self,
        dir: &Path,
        max_depth: Option<usize>,
    ) -> impl Iterator<Item = walkdir::Result<DirEntry>> + '_ {
        let mut walk = WalkDir::new(dir).sort_by_file_name();
        if let Some(depth) = max_depth {
            walk = walk.max_depth(depth);
        }
        walk.into_iter()
            .filter_entry(move |entry| !self.is_ignored(entry.path()))
    }
}

/// Names of the regular files next to `path`, sorted.
pub fn list_siblings(path: &Path) -> std::io::Result<Vec<String>> {
    let Some(dir) = path.parent() else {
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn absolute_root(root: &Path) -> PathBuf {
    root.canonicalize()
        .or_else(|_| std::path::absolute(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn discovery(root: &Path, exts: &[&str], ignore: &[&str]) -> FileDiscovery {
        FileDiscovery::new(
            root,
            exts.iter().map(|s| s.to_string()).collect(),
            ignore.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_discover_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(discovery(temp_dir.path(), &[".py"], &[]).discover().is_empty());
    }

    #[test]
    fn test_discover_filters_by_extension_in_order() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.py"), "b").unwrap();
        std::fs::write(temp_dir.path().join("a.py"), "a").unwrap();
        std::fs::write(temp_dir.path().join("c.txt"), "c").unwrap();

        let d = discovery(temp_dir.path(), &[".py"], &[]);
        let files = d.discover();

        assert_eq!(files, vec![d.root().join("a.py"), d.root().join("b.py")]);
        assert!(files.iter().all(|f| f.is_absolute()));
    }

    #[test]
    fn test_discover_skips_ignored_subtrees() {
        let temp_dir = TempDir::new().unwrap();
        let vendored = temp_dir.path().join("node_modules").join("dep");
        std::fs::create_dir_all(&vendored).unwrap();
        std::fs::write(vendored.join("index.js"), "x").unwrap();
        std::fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        std::fs::write(temp_dir.path().join("src").join("app.js"), "y").unwrap();

        let d = discovery(temp_dir.path(), &[".js"], &["node_modules"]);
        let files = d.discover();

        assert_eq!(files, vec![d.root().join("src").join("app.js")]);
    }

    #[test]
    fn test_discover_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        for dir in ["zeta", "alpha", "mid"] {
            let sub = temp_dir.path().join(dir);
            std::fs::create_dir_all(&sub).unwrap();
            for file in ["z.rs", "a.rs", "m.rs"] {
                std::fs::write(sub.join(file), dir).unwrap();
            }
        }

        let d = discovery(temp_dir.path(), &[".rs"], &[]);
        let first = d.discover();
        let second = d.discover();

        assert_eq!(first.len(), 9);
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }

    #[test]
    fn test_multiple_extensions() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("main.go"), "").unwrap();
        std::fs::write(temp_dir.path().join("tool.py"), "").unwrap();
        std::fs::write(temp_dir.path().join("README.md"), "").unwrap();

        let files = discovery(temp_dir.path(), &[".go", ".py"], &[]).discover();
        assert_eq!(files.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("secret.py"), "").unwrap();
        std::fs::write(temp_dir.path().join("open.py"), "").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        let d = discovery(temp_dir.path(), &[".py"], &[]);
        let files = d.discover();

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(files.contains(&d.root().join("open.py")));
    }

    #[test]
    fn test_project_tree_rendering() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        std::fs::create_dir_all(src.join("deep").join("deeper").join("deepest")).unwrap();
        std::fs::write(temp_dir.path().join("main.py"), "").unwrap();
        std::fs::write(src.join("lib.py"), "").unwrap();
        std::fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
        std::fs::write(temp_dir.path().join(".git").join("HEAD"), "").unwrap();

        let d = discovery(temp_dir.path(), &[".py"], &[".git"]);
        let tree = d.project_tree(3);
        let root_name = d.root().file_name().unwrap().to_string_lossy().into_owned();

        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines[0], format!("{}/", root_name));
        assert!(lines.contains(&"  main.py"));
        assert!(lines.contains(&"  src/"));
        assert!(lines.contains(&"    lib.py"));
        assert!(lines.contains(&"    deep/"));
        assert!(lines.contains(&"      deeper/"));
        assert!(!tree.contains("deepest"));
        assert!(!tree.contains(".git"));
        assert!(!tree.contains("HEAD"));
    }

    #[test]
    fn test_list_siblings_only_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.rs"), "").unwrap();
        std::fs::write(temp_dir.path().join("a.rs"), "").unwrap();
        std::fs::create_dir_all(temp_dir.path().join("nested")).unwrap();

        let siblings = list_siblings(&temp_dir.path().join("a.rs")).unwrap();
        assert_eq!(siblings, vec!["a.rs", "b.rs"]);
    }
}
