//! Layered configuration.
//!
//! Defaults, then `<index_dir>/settings.toml`, then environment variables.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `CODEATLAS_` and use double underscores to
//! separate nested levels:
//! - `CODEATLAS_INDEXING__WORKER_COUNT=8` sets `indexing.worker_count`
//! - `CODEATLAS_WATCH__DEBOUNCE_MS=500` sets `watch.debounce_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::parsing::Language;

/// Name of the index directory created under the project root.
pub const DEFAULT_INDEX_DIR: &str = ".projectIndex";

/// Name of the store file inside the index directory.
pub const STORE_FILE: &str = "index.db";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Schema version of this settings file.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory name for the on-disk index, relative to the project root.
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Per-language settings keyed by language tag.
    #[serde(default = "default_languages")]
    pub languages: HashMap<String, LanguageConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Parallel workers for a full index. Defaults to the host CPU count.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Extra gitignore-style patterns applied on top of the built-in ignores.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Honor `.gitignore` files found in the project tree.
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Per-path coalescing window for change events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LanguageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `watcher = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_index_dir() -> String {
    DEFAULT_INDEX_DIR.to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_languages() -> HashMap<String, LanguageConfig> {
    Language::all()
        .iter()
        .map(|lang| (lang.tag().to_string(), LanguageConfig { enabled: true }))
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_dir: default_index_dir(),
            indexing: IndexingConfig::default(),
            watch: WatchConfig::default(),
            languages: default_languages(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            ignore_patterns: Vec::new(),
            respect_gitignore: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings for a project root, layering the settings file under the
    /// index directory and `CODEATLAS_*` environment variables over defaults.
    pub fn load(project_root: &Path) -> Result<Self, figment::Error> {
        let defaults = Settings::default();
        let settings_path = project_root.join(&defaults.index_dir).join("settings.toml");
        Self::load_from(settings_path)
    }

    /// Load settings from an explicit settings file path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CODEATLAS_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
    }

    /// Whether a bundled language is enabled.
    pub fn language_enabled(&self, language: Language) -> bool {
        self.languages
            .get(language.config_key())
            .map(|cfg| cfg.enabled)
            .unwrap_or(true)
    }

    /// Absolute path of the index directory for a project root.
    pub fn index_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.index_dir)
    }

    /// Absolute path of the store file for a project root.
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        self.index_path(project_root).join(STORE_FILE)
    }

    /// Write this configuration as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, rendered)
    }

    /// Create a default settings file under the project's index directory.
    pub fn init_config_file(project_root: &Path, force: bool) -> std::io::Result<PathBuf> {
        let defaults = Settings::default();
        let path = defaults.index_path(project_root).join("settings.toml");
        if path.exists() && !force {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "settings.toml already exists; use --force to overwrite",
            ));
        }
        defaults.save(&path)?;
        Ok(path)
    }
}
