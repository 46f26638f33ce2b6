//! Error types for the indexing pipeline and symbol store.
//!
//! Structured errors via thiserror. The split follows the surfaced-kind
//! taxonomy: initialization failures are fatal, per-file failures are
//! recoverable and logged by the indexer.

use crate::types::FileId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to create index directory '{path}': {source}")]
    IndexDirCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Path '{path}' is outside the project root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Parser registration conflict: language '{language}' is already registered")]
    DuplicateLanguage { language: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

/// Errors from the persistent symbol store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to open store at '{path}': {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("File {id:?} not found in the store")]
    FileNotFound { id: FileId },

    #[error("Corrupt row: {reason}")]
    CorruptRow { reason: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from a language parser that could not produce any result.
///
/// Partial failures are not errors: parsers report them as diagnostics inside
/// a successful [`ParseResult`](crate::parsing::ParseResult).
#[derive(Error, Debug)]
pub enum ParseFailure {
    #[error("Failed to initialize {language} grammar: {reason}")]
    GrammarInit { language: String, reason: String },

    #[error("Invalid UTF-8 in source file")]
    InvalidUtf8,

    #[error("Parser produced no syntax tree")]
    NoTree,
}

/// Errors from the file-system watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to start file watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher event channel closed unexpectedly")]
    ChannelClosed,
}

pub type IndexResult<T> = Result<T, IndexError>;
pub type StoreResult<T> = Result<T, StoreError>;
