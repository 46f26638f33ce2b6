//! Directory traversal for discovering indexable source files.

use crate::indexing::ignore_rules::IgnoreMatcher;
use crate::parsing::ParserRegistry;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Walks a project tree, pruning ignored subtrees as it descends.
pub struct FileWalker {
    root: PathBuf,
    matcher: Arc<IgnoreMatcher>,
}

impl FileWalker {
    pub fn new(root: PathBuf, matcher: Arc<IgnoreMatcher>) -> Self {
        Self { root, matcher }
    }

    /// All files under the root that pass the ignore rules and are claimed
    /// by a registered parser.
    pub fn walk<'a>(&'a self, registry: &'a ParserRegistry) -> impl Iterator<Item = PathBuf> + 'a {
        let root = self.root.clone();
        let matcher = Arc::clone(&self.matcher);

        let mut builder = WalkBuilder::new(&self.root);
        builder
            // The IgnoreMatcher is the single source of truth; the walker's
            // own gitignore handling stays off so results match index_file.
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(move |entry| {
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    return true;
                };
                if relative.as_os_str().is_empty() {
                    return true;
                }
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !matcher.should_ignore(relative, is_dir)
            });

        builder
            .build()
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("walk error: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(move |path| registry.supports(path))
    }

    /// Count files that would be indexed.
    pub fn count_files(&self, registry: &ParserRegistry) -> usize {
        self.walk(registry).count()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::parsing::register_builtin_parsers;
    use std::fs;
    use tempfile::TempDir;

    fn setup(temp: &TempDir) -> (FileWalker, ParserRegistry) {
        let settings = Settings::default();
        let matcher = Arc::new(IgnoreMatcher::new(temp.path(), &settings));
        let mut registry = ParserRegistry::new();
        register_builtin_parsers(&mut registry, &settings).unwrap();
        (
            FileWalker::new(temp.path().to_path_buf(), matcher),
            registry,
        )
    }

    #[test]
    fn test_walk_finds_supported_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("main.go"), "package main\n").unwrap();
        fs::write(temp.path().join("app.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("README.md"), "# hi\n").unwrap();
        fs::write(temp.path().join("notes.xyz"), "??\n").unwrap();

        let (walker, registry) = setup(&temp);
        let mut files: Vec<_> = walker
            .walk(&registry)
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        files.sort();
        assert_eq!(files, vec!["app.py", "main.go"]);
    }

    #[test]
    fn test_walk_prunes_ignored_subtrees() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/index.js"), "x\n").unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/index.js"), "function a() {}\n").unwrap();

        let (walker, registry) = setup(&temp);
        let files: Vec<_> = walker.walk(&registry).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/index.js"));
    }

    #[test]
    fn test_walk_respects_gitignore() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "skipped.rs\n").unwrap();
        fs::write(temp.path().join("skipped.rs"), "fn a() {}\n").unwrap();
        fs::write(temp.path().join("kept.rs"), "fn b() {}\n").unwrap();

        let (walker, registry) = setup(&temp);
        let files: Vec<_> = walker.walk(&registry).collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("kept.rs"));
    }

    #[test]
    fn test_count_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.go"), "package a\n").unwrap();
        fs::write(temp.path().join("b.go"), "package b\n").unwrap();

        let (walker, registry) = setup(&temp);
        assert_eq!(walker.count_files(&registry), 2);
    }
}
