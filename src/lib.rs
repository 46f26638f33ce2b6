//! codeatlas: a persistent, queryable index of source code across languages.
//!
//! The pipeline walks a project tree, hashes each candidate file, parses
//! changed files through a plugin registry of tree-sitter parsers and
//! persists the language-neutral symbol model in a transactional SQLite
//! store. A file-system watcher keeps the index in sync; a read-only query
//! facade backs the MCP front-end.

pub mod config;
pub mod error;
pub mod indexing;
pub mod logging;
pub mod mcp;
pub mod model;
pub mod parsing;
pub mod query;
pub mod storage;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use error::{IndexError, IndexResult, StoreError, StoreResult};
pub use indexing::{FileOutcome, IndexStats, Indexer};
pub use model::{FileRecord, Import, Project, Reference, Relationship, Symbol};
pub use parsing::{LanguageParser, ParseResult, ParserRegistry};
pub use query::QueryFacade;
pub use storage::{SearchOptions, SymbolStore};
pub use types::{
    FileId, ImportKind, ProjectId, Range, ReferenceKind, RelationKind, SymbolId, SymbolKind,
    Visibility,
};
pub use watcher::FileWatcher;
