//! Built-in language enumeration and extension detection.
//!
//! The registry dispatches on whatever extensions registered parsers claim;
//! this enum only covers the parsers that ship with the crate and backs the
//! per-language configuration keys.

use serde::{Deserialize, Serialize};

/// Languages with a bundled parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Rust,
    JavaScript,
    TypeScript,
}

impl Language {
    /// Short stable tag, as stored on file and symbol rows.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
        }
    }

    /// Configuration key under `[languages]`.
    pub fn config_key(&self) -> &'static str {
        self.tag()
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Go => "Go",
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
        }
    }

    /// File extensions this language claims, leading dot included.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Go => &[".go"],
            Language::Python => &[".py", ".pyi"],
            Language::Rust => &[".rs"],
            Language::JavaScript => &[".js", ".jsx", ".mjs", ".cjs"],
            Language::TypeScript => &[".ts", ".tsx", ".mts", ".cts"],
        }
    }

    pub fn all() -> &'static [Language] {
        &[
            Language::Go,
            Language::Python,
            Language::Rust,
            Language::JavaScript,
            Language::TypeScript,
        ]
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "go" => Some(Language::Go),
            "python" => Some(Language::Python),
            "rust" => Some(Language::Rust),
            "javascript" => Some(Language::JavaScript),
            "typescript" => Some(Language::TypeScript),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
