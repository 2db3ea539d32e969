//! Source file discovery.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// Directory names skipped by default: test sources and build output.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &["test", "build", "target", "bin"];

/// Extensions collected by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["java"];

/// Recursively enumerates source files under a root directory.
#[derive(Debug, Clone)]
pub struct SourceWalker {
    extensions: Vec<String>,
    ignored_dirs: Vec<String>,
}

impl Default for SourceWalker {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SourceWalker {
    pub fn new(extensions: Vec<String>, ignored_dirs: Vec<String>) -> Self {
        Self {
            extensions,
            ignored_dirs,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn ignored_dirs(&self) -> &[String] {
        &self.ignored_dirs
    }

    /// Find all matching files under `root`.
    ///
    /// A missing or unreadable root yields an empty list and an error log.
    /// The result is sorted, but callers should not rely on order for
    /// anything other than display.
    pub fn find_source_files(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            error!("Source root {:?} does not exist or is not a directory", root);
            return Vec::new();
        }

        let mut files = Vec::new();

        for entry in WalkDir::new(root).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read entry under {:?}: {}", root, e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.has_source_extension(path) {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.is_ignored(relative) {
                debug!("Ignoring {:?}", path);
                continue;
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        debug!("Found {} source files under {:?}", files.len(), root);
        files
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }

    /// Exact segment match: `testing/` is not `test/`.
    fn is_ignored(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(segment) => segment
                .to_str()
                .map(|s| self.ignored_dirs.iter().any(|ignored| ignored == s))
                .unwrap_or(false),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "class X {}").unwrap();
    }

    fn file_names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_segment_exact_exclusion() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("proj");
        touch(&root, "src/Foo.java");
        touch(&root, "test/Bar.java");
        touch(&root, "build/Baz.java");
        touch(&root, "testing/Qux.java");

        let files = SourceWalker::default().find_source_files(&root);
        let mut names = file_names(&files);
        names.sort();
        assert_eq!(names, vec!["Foo.java".to_string(), "Qux.java".to_string()]);
    }

    #[test]
    fn test_nested_ignored_segments() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "module/target/classes/Gen.java");
        touch(root, "module/bin/Tool.java");
        touch(root, "module/src/main/java/App.java");
        touch(root, "module/src/main/java/README.md");

        let files = SourceWalker::default().find_source_files(root);
        assert_eq!(file_names(&files), vec!["App.java".to_string()]);
    }

    #[test]
    fn test_root_below_ignored_directory_is_walked() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("build").join("checkout");
        touch(&root, "src/Main.java");

        let files = SourceWalker::default().find_source_files(&root);
        assert_eq!(file_names(&files), vec!["Main.java".to_string()]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let files = SourceWalker::default().find_source_files(Path::new("/no/such/root/anywhere"));
        assert!(files.is_empty());
    }

    #[test]
    fn test_custom_extensions_and_ignores() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/A.java");
        touch(root, "src/B.kt");
        touch(root, "gen/C.kt");

        let walker = SourceWalker::new(vec!["kt".to_string()], vec!["gen".to_string()]);
        let files = walker.find_source_files(root);
        assert_eq!(file_names(&files), vec!["B.kt".to_string()]);
        assert_eq!(walker.extensions(), &["kt".to_string()]);
        assert_eq!(walker.ignored_dirs(), &["gen".to_string()]);
    }
}
