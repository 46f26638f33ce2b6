//! Project ignore rules.
//!
//! Combines built-in ignores (version control metadata, the index directory
//! itself, common build output) with the project's `.gitignore` and any
//! patterns from the settings file. Directory matches short-circuit subtree
//! traversal during a scan.

use crate::config::Settings;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;
use tracing::warn;

/// Directories that are never worth indexing, regardless of project type.
const BUILTIN_DIR_IGNORES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "build",
    "dist",
    "out",
    "__pycache__",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
];

/// Answers `should_ignore` for paths relative to the project root.
pub struct IgnoreMatcher {
    rules: Gitignore,
}

impl IgnoreMatcher {
    /// Build the matcher for a project root.
    ///
    /// Invalid user patterns are logged and skipped rather than failing
    /// initialization.
    pub fn new(project_root: &Path, settings: &Settings) -> Self {
        let mut builder = GitignoreBuilder::new(project_root);

        for dir in BUILTIN_DIR_IGNORES {
            // A trailing slash restricts the pattern to directories.
            let _ = builder.add_line(None, &format!("{dir}/"));
        }
        // Never index our own on-disk state.
        let _ = builder.add_line(None, &format!("{}/", settings.index_dir));

        if settings.indexing.respect_gitignore {
            let gitignore = project_root.join(".gitignore");
            if gitignore.exists() {
                if let Some(err) = builder.add(&gitignore) {
                    warn!("failed to load {}: {err}", gitignore.display());
                }
            }
        }

        for pattern in &settings.indexing.ignore_patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                warn!("invalid ignore pattern '{pattern}': {err}");
            }
        }

        let rules = builder.build().unwrap_or_else(|err| {
            warn!("failed to compile ignore rules, using empty set: {err}");
            Gitignore::empty()
        });
        Self { rules }
    }

    /// Whether a path relative to the project root should be skipped.
    pub fn should_ignore(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.rules
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }
}
