//! Persistent symbol store over SQLite.
//!
//! The store exclusively owns all persistent records. Every write goes
//! through [`SymbolStore::transaction`]; the connection mutex serializes
//! writers so readers always see a committed snapshot. Parsing and hashing
//! happen outside the lock.
//!
//! Symbols are keyed by their deterministic id; imports, relationships and
//! references hang off their owning file and are replaced wholesale on every
//! re-parse of that file.

use crate::error::{StoreError, StoreResult};
use crate::model::{FileRecord, Import, Project, Reference, Relationship, Symbol};
use crate::types::{
    FileId, ImportKind, ProjectId, Range, ReferenceKind, RelationKind, SymbolId, SymbolKind,
    Visibility,
};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY,
    root_path TEXT UNIQUE NOT NULL,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    last_indexed INTEGER NOT NULL DEFAULT 0,
    language_stats TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES project(id),
    path TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    language TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    line_count INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    modified_at INTEGER NOT NULL,
    last_indexed INTEGER NOT NULL,
    UNIQUE(project_id, relative_path)
);

CREATE TABLE IF NOT EXISTS symbol (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    signature TEXT NOT NULL,
    visibility TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    start_column INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    end_column INTEGER NOT NULL,
    parent_id TEXT,
    doc TEXT,
    language TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS import (
    id INTEGER PRIMARY KEY,
    file_path TEXT NOT NULL,
    source TEXT NOT NULL,
    members TEXT,
    kind TEXT,
    line INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS relationship (
    id INTEGER PRIMARY KEY,
    file_path TEXT NOT NULL,
    kind TEXT NOT NULL,
    source_name TEXT NOT NULL,
    target_name TEXT NOT NULL,
    source_id TEXT,
    target_id TEXT
);

CREATE TABLE IF NOT EXISTS symbol_reference (
    id INTEGER PRIMARY KEY,
    symbol_id TEXT NOT NULL,
    file_id INTEGER NOT NULL,
    line INTEGER NOT NULL,
    col INTEGER NOT NULL,
    kind TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_file_project ON file(project_id, relative_path);
CREATE INDEX IF NOT EXISTS idx_symbol_name ON symbol(name);
CREATE INDEX IF NOT EXISTS idx_symbol_file ON symbol(file_path);
CREATE INDEX IF NOT EXISTS idx_symbol_kind ON symbol(kind);
CREATE INDEX IF NOT EXISTS idx_import_file ON import(file_path);
CREATE INDEX IF NOT EXISTS idx_rel_file ON relationship(file_path);
CREATE INDEX IF NOT EXISTS idx_rel_source ON relationship(source_name);
CREATE INDEX IF NOT EXISTS idx_rel_target ON relationship(target_name);
CREATE INDEX IF NOT EXISTS idx_ref_symbol ON symbol_reference(symbol_id);
CREATE INDEX IF NOT EXISTS idx_ref_file ON symbol_reference(file_id);

INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1');
INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('hash_algorithm', 'sha256');
"#;

/// Options recognized by [`SymbolStore::search_symbols`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Substring match on the symbol name, case-insensitive.
    pub query: Option<String>,
    pub kind: Option<SymbolKind>,
    pub language: Option<String>,
    /// Glob over the owning file path.
    pub file_pattern: Option<String>,
    /// Defaults to 50.
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub const DEFAULT_LIMIT: usize = 50;

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }
}

/// File metadata for one replace-on-reparse transaction.
#[derive(Debug, Clone)]
pub struct FileIndexData {
    pub project_id: ProjectId,
    pub path: String,
    pub relative_path: String,
    pub language: String,
    pub size_bytes: u64,
    pub line_count: u32,
    pub content_hash: String,
    pub modified_at: u64,
    pub last_indexed: u64,
}

/// A reference waiting for its owning file id, assigned inside the
/// replace transaction.
#[derive(Debug, Clone)]
pub struct PendingReference {
    pub symbol_id: SymbolId,
    pub line: u32,
    pub column: u32,
    pub kind: ReferenceKind,
}

/// Shared handle to the on-disk store.
#[derive(Clone)]
pub struct SymbolStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SymbolStore {
    /// Open or create the store file and apply the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        debug!("store opened at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` atomically. Commits on `Ok`, rolls back on `Err`.
    ///
    /// All cascading deletes and inserts for a re-parse live inside a single
    /// call; the lock is held only for the duration of the closure.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ---- projects ----

    pub fn get_project(&self, root_path: &Path) -> StoreResult<Option<Project>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, root_path, name, created_at, last_indexed, language_stats
             FROM project WHERE root_path = ?1",
            params![root_path.to_string_lossy()],
            project_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn get_project_by_id(&self, id: ProjectId) -> StoreResult<Option<Project>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, root_path, name, created_at, last_indexed, language_stats
             FROM project WHERE id = ?1",
            params![id.get()],
            project_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn create_project(&self, root_path: &Path, name: &str, now: u64) -> StoreResult<Project> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO project (root_path, name, created_at, last_indexed, language_stats)
             VALUES (?1, ?2, ?3, 0, '{}')",
            params![root_path.to_string_lossy(), name, now as i64],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Project {
            id: ProjectId::new(id).ok_or_else(|| StoreError::CorruptRow {
                reason: "project rowid was zero".to_string(),
            })?,
            root_path: root_path.to_path_buf(),
            name: name.to_string(),
            created_at: now,
            last_indexed: 0,
            language_stats: HashMap::new(),
        })
    }

    pub fn update_project(&self, project: &Project) -> StoreResult<()> {
        let stats = serde_json::to_string(&project.language_stats)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE project SET name = ?1, last_indexed = ?2, language_stats = ?3 WHERE id = ?4",
            params![
                project.name,
                project.last_indexed as i64,
                stats,
                project.id.get()
            ],
        )?;
        Ok(())
    }

    // ---- files ----

    pub fn get_file(
        &self,
        project_id: ProjectId,
        relative_path: &str,
    ) -> StoreResult<Option<FileRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{FILE_SELECT} WHERE project_id = ?1 AND relative_path = ?2"),
            params![project_id.get(), relative_path],
            file_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn list_files(&self, project_id: ProjectId) -> StoreResult<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{FILE_SELECT} WHERE project_id = ?1 ORDER BY relative_path"
        ))?;
        let rows = stmt.query_map(params![project_id.get()], file_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// Delete a file row and everything tied to it.
    pub fn delete_file(&self, id: FileId) -> StoreResult<()> {
        self.transaction(|tx| {
            let relative: Option<String> = tx
                .query_row(
                    "SELECT relative_path FROM file WHERE id = ?1",
                    params![id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(relative) = relative else {
                return Err(StoreError::FileNotFound { id });
            };
            cascade_delete(tx, id, &relative)?;
            tx.execute("DELETE FROM file WHERE id = ?1", params![id.get()])?;
            Ok(())
        })
    }

    /// Delete by `(project, relative_path)`. Returns false when no row existed.
    pub fn delete_file_by_path(
        &self,
        project_id: ProjectId,
        relative_path: &str,
    ) -> StoreResult<bool> {
        self.transaction(|tx| {
            let id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM file WHERE project_id = ?1 AND relative_path = ?2",
                    params![project_id.get(), relative_path],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(id) = id else {
                return Ok(false);
            };
            let file_id = FileId::new(id).ok_or_else(|| StoreError::CorruptRow {
                reason: "file rowid was zero".to_string(),
            })?;
            cascade_delete(tx, file_id, relative_path)?;
            tx.execute("DELETE FROM file WHERE id = ?1", params![id])?;
            Ok(true)
        })
    }

    /// The replace-on-reparse transaction: upsert the file row, delete all
    /// records tied to the file, insert the new parse output.
    pub fn replace_file_index(
        &self,
        data: &FileIndexData,
        symbols: &[Symbol],
        imports: &[Import],
        relationships: &[Relationship],
        references: &[PendingReference],
    ) -> StoreResult<FileId> {
        self.transaction(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM file WHERE project_id = ?1 AND relative_path = ?2",
                    params![data.project_id.get(), data.relative_path],
                    |row| row.get(0),
                )
                .optional()?;

            let raw_id = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE file SET path = ?1, language = ?2, size_bytes = ?3,
                                line_count = ?4, content_hash = ?5, modified_at = ?6,
                                last_indexed = ?7
                         WHERE id = ?8",
                        params![
                            data.path,
                            data.language,
                            data.size_bytes as i64,
                            data.line_count,
                            data.content_hash,
                            data.modified_at as i64,
                            data.last_indexed as i64,
                            id
                        ],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO file (project_id, path, relative_path, language,
                                size_bytes, line_count, content_hash, modified_at, last_indexed)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            data.project_id.get(),
                            data.path,
                            data.relative_path,
                            data.language,
                            data.size_bytes as i64,
                            data.line_count,
                            data.content_hash,
                            data.modified_at as i64,
                            data.last_indexed as i64
                        ],
                    )?;
                    tx.last_insert_rowid()
                }
            };
            let file_id = FileId::new(raw_id).ok_or_else(|| StoreError::CorruptRow {
                reason: "file rowid was zero".to_string(),
            })?;

            cascade_delete(tx, file_id, &data.relative_path)?;

            for symbol in symbols {
                let metadata = serde_json::to_string(&symbol.metadata)?;
                tx.execute(
                    "INSERT OR REPLACE INTO symbol
                        (id, file_path, name, kind, signature, visibility,
                         start_line, start_column, end_line, end_column,
                         parent_id, doc, language, content_hash, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        symbol.id.as_str(),
                        symbol.file_path,
                        symbol.name,
                        symbol.kind.as_str(),
                        symbol.signature,
                        symbol.visibility.as_str(),
                        symbol.range.start_line,
                        symbol.range.start_column,
                        symbol.range.end_line,
                        symbol.range.end_column,
                        symbol.parent_id.as_ref().map(|p| p.as_str()),
                        symbol.doc,
                        symbol.language,
                        symbol.content_hash,
                        metadata
                    ],
                )?;
            }

            for import in imports {
                let members = if import.members.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&import.members)?)
                };
                tx.execute(
                    "INSERT INTO import (file_path, source, members, kind, line)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        import.file_path,
                        import.source,
                        members,
                        import.kind.map(|k| k.as_str()),
                        import.line
                    ],
                )?;
            }

            for rel in relationships {
                tx.execute(
                    "INSERT INTO relationship
                        (file_path, kind, source_name, target_name, source_id, target_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        rel.file_path,
                        rel.kind.as_str(),
                        rel.source_name,
                        rel.target_name,
                        rel.source_id.as_ref().map(|s| s.as_str()),
                        rel.target_id.as_ref().map(|s| s.as_str())
                    ],
                )?;
            }

            for reference in references {
                tx.execute(
                    "INSERT INTO symbol_reference (symbol_id, file_id, line, col, kind)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        reference.symbol_id.as_str(),
                        file_id.get(),
                        reference.line,
                        reference.column,
                        reference.kind.as_str()
                    ],
                )?;
            }

            Ok(file_id)
        })
    }

    // ---- symbols ----

    pub fn get_symbols_by_file(&self, file_path: &str) -> StoreResult<Vec<Symbol>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{SYMBOL_SELECT} WHERE file_path = ?1 ORDER BY start_line, start_column"
        ))?;
        let rows = stmt.query_map(params![file_path], symbol_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    /// First exact-name match, in stable file/position order.
    pub fn get_symbol_by_name(&self, name: &str) -> StoreResult<Option<Symbol>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{SYMBOL_SELECT} WHERE name = ?1 ORDER BY file_path, start_line LIMIT 1"),
            params![name],
            symbol_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Every exact-name match.
    pub fn get_symbols_by_name(&self, name: &str) -> StoreResult<Vec<Symbol>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{SYMBOL_SELECT} WHERE name = ?1 ORDER BY file_path, start_line"
        ))?;
        let rows = stmt.query_map(params![name], symbol_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn get_symbol(&self, id: &SymbolId) -> StoreResult<Option<Symbol>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{SYMBOL_SELECT} WHERE id = ?1"),
            params![id.as_str()],
            symbol_from_row,
        )
        .optional()
        .map_err(StoreError::from)
    }

    pub fn search_symbols(&self, options: &SearchOptions) -> StoreResult<Vec<Symbol>> {
        let mut sql = format!("{SYMBOL_SELECT} WHERE 1=1");
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(query) = &options.query {
            // SQLite LIKE is case-insensitive for ASCII.
            sql.push_str(&format!(
                " AND name LIKE ?{} ESCAPE '\\'",
                params_vec.len() + 1
            ));
            params_vec.push(Box::new(format!("%{}%", escape_like(query))));
        }
        if let Some(kind) = options.kind {
            sql.push_str(&format!(" AND kind = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(language) = &options.language {
            sql.push_str(&format!(" AND language = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(language.clone()));
        }
        sql.push_str(" ORDER BY name, file_path, start_line");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(params_vec.iter().map(|p| p.as_ref())),
            symbol_from_row,
        )?;
        let mut symbols = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;

        // Glob filtering happens outside SQL.
        if let Some(pattern) = &options.file_pattern {
            if let Ok(glob) = glob::Pattern::new(pattern) {
                symbols.retain(|s| glob.matches(&s.file_path));
            }
        }

        symbols.truncate(options.limit.unwrap_or(SearchOptions::DEFAULT_LIMIT));
        Ok(symbols)
    }

    pub fn count_symbols(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM symbol", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ---- imports / relationships / references ----

    pub fn get_imports_by_file(&self, file_path: &str) -> StoreResult<Vec<Import>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT file_path, source, members, kind, line FROM import
             WHERE file_path = ?1 ORDER BY line",
        )?;
        let rows = stmt.query_map(params![file_path], import_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn get_relationships_by_file(&self, file_path: &str) -> StoreResult<Vec<Relationship>> {
        self.relationship_query(
            "SELECT file_path, kind, source_name, target_name, source_id, target_id
             FROM relationship WHERE file_path = ?1",
            file_path,
        )
    }

    /// Outgoing edges of a symbol name.
    pub fn relationships_from(&self, name: &str) -> StoreResult<Vec<Relationship>> {
        self.relationship_query(
            "SELECT file_path, kind, source_name, target_name, source_id, target_id
             FROM relationship WHERE source_name = ?1",
            name,
        )
    }

    /// Incoming edges of a symbol name.
    pub fn relationships_to(&self, name: &str) -> StoreResult<Vec<Relationship>> {
        self.relationship_query(
            "SELECT file_path, kind, source_name, target_name, source_id, target_id
             FROM relationship WHERE target_name = ?1",
            name,
        )
    }

    fn relationship_query(&self, sql: &str, param: &str) -> StoreResult<Vec<Relationship>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![param], relationship_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    pub fn get_references_by_symbol(&self, symbol_id: &SymbolId) -> StoreResult<Vec<Reference>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT symbol_id, file_id, line, col, kind FROM symbol_reference
             WHERE symbol_id = ?1 ORDER BY file_id, line, col",
        )?;
        let rows = stmt.query_map(params![symbol_id.as_str()], reference_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    // ---- aggregates ----

    pub fn count_files(&self, project_id: ProjectId) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM file WHERE project_id = ?1",
            params![project_id.get()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Language tag -> file count, for the project's stats.
    pub fn language_counts(&self, project_id: ProjectId) -> StoreResult<HashMap<String, u64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT language, COUNT(*) FROM file WHERE project_id = ?1 GROUP BY language",
        )?;
        let rows = stmt.query_map(params![project_id.get()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;
        rows.collect::<Result<HashMap<_, _>, _>>()
            .map_err(StoreError::from)
    }

    /// Hash algorithm recorded at schema creation.
    pub fn hash_algorithm(&self) -> StoreResult<String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM schema_meta WHERE key = 'hash_algorithm'",
            [],
            |row| row.get(0),
        )
        .map_err(StoreError::from)
    }
}

fn cascade_delete(
    tx: &rusqlite::Transaction<'_>,
    file_id: FileId,
    relative_path: &str,
) -> StoreResult<()> {
    tx.execute("DELETE FROM symbol WHERE file_path = ?1", params![relative_path])?;
    tx.execute("DELETE FROM import WHERE file_path = ?1", params![relative_path])?;
    tx.execute(
        "DELETE FROM relationship WHERE file_path = ?1",
        params![relative_path],
    )?;
    tx.execute(
        "DELETE FROM symbol_reference WHERE file_id = ?1",
        params![file_id.get()],
    )?;
    Ok(())
}

const FILE_SELECT: &str = "SELECT id, project_id, path, relative_path, language, size_bytes,
    line_count, content_hash, modified_at, last_indexed FROM file";

const SYMBOL_SELECT: &str = "SELECT id, file_path, name, kind, signature, visibility,
    start_line, start_column, end_line, end_column, parent_id, doc, language,
    content_hash, metadata FROM symbol";

fn bad_column(index: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, reason)),
    )
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let id: i64 = row.get(0)?;
    let root: String = row.get(1)?;
    let stats_json: String = row.get(5)?;
    let language_stats: HashMap<String, u64> = serde_json::from_str(&stats_json)
        .map_err(|e| bad_column(5, format!("bad language_stats: {e}")))?;
    Ok(Project {
        id: ProjectId::new(id).ok_or_else(|| bad_column(0, "zero project id".to_string()))?,
        root_path: PathBuf::from(root),
        name: row.get(2)?,
        created_at: row.get::<_, i64>(3)? as u64,
        last_indexed: row.get::<_, i64>(4)? as u64,
        language_stats,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let id: i64 = row.get(0)?;
    let project_id: i64 = row.get(1)?;
    let path: String = row.get(2)?;
    Ok(FileRecord {
        id: FileId::new(id).ok_or_else(|| bad_column(0, "zero file id".to_string()))?,
        project_id: ProjectId::new(project_id)
            .ok_or_else(|| bad_column(1, "zero project id".to_string()))?,
        path: PathBuf::from(path),
        relative_path: row.get(3)?,
        language: row.get(4)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        line_count: row.get::<_, i64>(6)? as u32,
        content_hash: row.get(7)?,
        modified_at: row.get::<_, i64>(8)? as u64,
        last_indexed: row.get::<_, i64>(9)? as u64,
    })
}

fn symbol_from_row(row: &Row<'_>) -> rusqlite::Result<Symbol> {
    let id: String = row.get(0)?;
    let kind_str: String = row.get(3)?;
    let kind = SymbolKind::parse(&kind_str)
        .ok_or_else(|| bad_column(3, format!("unknown symbol kind '{kind_str}'")))?;
    let visibility_str: String = row.get(5)?;
    let visibility = Visibility::parse(&visibility_str)
        .ok_or_else(|| bad_column(5, format!("unknown visibility '{visibility_str}'")))?;
    let metadata_json: String = row.get(14)?;
    let metadata: HashMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|e| bad_column(14, format!("bad metadata: {e}")))?;
    Ok(Symbol {
        id: SymbolId::from(id),
        file_path: row.get(1)?,
        name: row.get(2)?,
        kind,
        signature: row.get(4)?,
        visibility,
        range: Range::new(
            row.get::<_, i64>(6)? as u32,
            row.get::<_, i64>(7)? as u32,
            row.get::<_, i64>(8)? as u32,
            row.get::<_, i64>(9)? as u32,
        ),
        parent_id: row.get::<_, Option<String>>(10)?.map(SymbolId::from),
        doc: row.get(11)?,
        language: row.get(12)?,
        content_hash: row.get(13)?,
        metadata,
    })
}

fn import_from_row(row: &Row<'_>) -> rusqlite::Result<Import> {
    let members_json: Option<String> = row.get(2)?;
    let members = match members_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| bad_column(2, format!("bad import members: {e}")))?,
        None => Vec::new(),
    };
    let kind_str: Option<String> = row.get(3)?;
    let kind = match kind_str {
        Some(s) => Some(
            ImportKind::parse(&s)
                .ok_or_else(|| bad_column(3, format!("unknown import kind '{s}'")))?,
        ),
        None => None,
    };
    Ok(Import {
        file_path: row.get(0)?,
        source: row.get(1)?,
        members,
        kind,
        line: row.get::<_, i64>(4)? as u32,
    })
}

fn relationship_from_row(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    let kind_str: String = row.get(1)?;
    let kind = RelationKind::parse(&kind_str)
        .ok_or_else(|| bad_column(1, format!("unknown relation kind '{kind_str}'")))?;
    Ok(Relationship {
        file_path: row.get(0)?,
        kind,
        source_name: row.get(2)?,
        target_name: row.get(3)?,
        source_id: row.get::<_, Option<String>>(4)?.map(SymbolId::from),
        target_id: row.get::<_, Option<String>>(5)?.map(SymbolId::from),
    })
}

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<Reference> {
    let symbol_id: String = row.get(0)?;
    let file_id: i64 = row.get(1)?;
    let kind_str: String = row.get(4)?;
    let kind = ReferenceKind::parse(&kind_str)
        .ok_or_else(|| bad_column(4, format!("unknown reference kind '{kind_str}'")))?;
    Ok(Reference {
        symbol_id: SymbolId::from(symbol_id),
        file_id: FileId::new(file_id).ok_or_else(|| bad_column(1, "zero file id".to_string()))?,
        line: row.get::<_, i64>(2)? as u32,
        column: row.get::<_, i64>(3)? as u32,
        kind,
    })
}

fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Symbol as ModelSymbol;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SymbolStore) {
        let temp = TempDir::new().unwrap();
        let store = SymbolStore::open(&temp.path().join("index.db")).unwrap();
        (temp, store)
    }

    fn sample_symbol(file_path: &str, name: &str, kind: SymbolKind, line: u32) -> ModelSymbol {
        ModelSymbol {
            id: ModelSymbol::deterministic_id(file_path, name, kind, line),
            file_path: file_path.to_string(),
            name: name.to_string(),
            kind,
            signature: format!("func {name}()"),
            visibility: Visibility::Public,
            range: Range::new(line, 1, line, 20),
            parent_id: None,
            doc: None,
            language: "go".to_string(),
            content_hash: "abc".to_string(),
            metadata: HashMap::new(),
        }
    }

    fn index_data(project: &Project, relative: &str, hash: &str) -> FileIndexData {
        FileIndexData {
            project_id: project.id,
            path: format!("/proj/{relative}"),
            relative_path: relative.to_string(),
            language: "go".to_string(),
            size_bytes: 100,
            line_count: 10,
            content_hash: hash.to_string(),
            modified_at: 1,
            last_indexed: 2,
        }
    }

    #[test]
    fn test_project_round_trip() {
        let (_temp, store) = open_store();
        assert!(store.get_project(Path::new("/proj")).unwrap().is_none());

        let mut project = store
            .create_project(Path::new("/proj"), "proj", 42)
            .unwrap();
        let loaded = store.get_project(Path::new("/proj")).unwrap().unwrap();
        assert_eq!(loaded.name, "proj");
        assert_eq!(loaded.created_at, 42);
        assert_eq!(loaded.last_indexed, 0);

        project.last_indexed = 99;
        project.language_stats.insert("go".to_string(), 3);
        store.update_project(&project).unwrap();

        let loaded = store.get_project(Path::new("/proj")).unwrap().unwrap();
        assert_eq!(loaded.last_indexed, 99);
        assert_eq!(loaded.language_stats.get("go"), Some(&3));
    }

    #[test]
    fn test_replace_file_index_upserts() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();

        let symbols = vec![sample_symbol("main.go", "Greet", SymbolKind::Function, 3)];
        let id1 = store
            .replace_file_index(&index_data(&project, "main.go", "h1"), &symbols, &[], &[], &[])
            .unwrap();

        // Same relative path again: row updated, not duplicated.
        let id2 = store
            .replace_file_index(&index_data(&project, "main.go", "h2"), &symbols, &[], &[], &[])
            .unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.count_files(project.id).unwrap(), 1);

        let file = store.get_file(project.id, "main.go").unwrap().unwrap();
        assert_eq!(file.content_hash, "h2");
    }

    #[test]
    fn test_replace_removes_stale_symbols() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();

        let old = vec![sample_symbol("main.go", "Greet", SymbolKind::Function, 3)];
        store
            .replace_file_index(&index_data(&project, "main.go", "h1"), &old, &[], &[], &[])
            .unwrap();

        let new = vec![sample_symbol("main.go", "Goodbye", SymbolKind::Function, 3)];
        store
            .replace_file_index(&index_data(&project, "main.go", "h2"), &new, &[], &[], &[])
            .unwrap();

        assert!(store.get_symbol_by_name("Greet").unwrap().is_none());
        assert!(store.get_symbol_by_name("Goodbye").unwrap().is_some());
        let by_file = store.get_symbols_by_file("main.go").unwrap();
        assert_eq!(by_file.len(), 1);
    }

    #[test]
    fn test_cascade_on_delete() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();

        let symbols = vec![sample_symbol("a.go", "Run", SymbolKind::Function, 1)];
        let imports = vec![Import {
            file_path: "a.go".to_string(),
            source: "fmt".to_string(),
            members: vec![],
            kind: Some(ImportKind::Stdlib),
            line: 3,
        }];
        let relationships = vec![Relationship {
            file_path: "a.go".to_string(),
            kind: RelationKind::Calls,
            source_name: "Run".to_string(),
            target_name: "Println".to_string(),
            source_id: None,
            target_id: None,
        }];
        let references = vec![PendingReference {
            symbol_id: symbols[0].id.clone(),
            line: 5,
            column: 2,
            kind: ReferenceKind::Call,
        }];

        let file_id = store
            .replace_file_index(
                &index_data(&project, "a.go", "h1"),
                &symbols,
                &imports,
                &relationships,
                &references,
            )
            .unwrap();

        store.delete_file(file_id).unwrap();

        assert!(store.get_file(project.id, "a.go").unwrap().is_none());
        assert!(store.get_symbols_by_file("a.go").unwrap().is_empty());
        assert!(store.get_imports_by_file("a.go").unwrap().is_empty());
        assert!(store.get_relationships_by_file("a.go").unwrap().is_empty());
        assert!(store
            .get_references_by_symbol(&symbols[0].id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_missing_file_errors() {
        let (_temp, store) = open_store();
        let err = store.delete_file(FileId::new(12345).unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::FileNotFound { .. }));
    }

    #[test]
    fn test_delete_by_path_returns_flag() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        assert!(!store.delete_file_by_path(project.id, "nope.go").unwrap());

        store
            .replace_file_index(&index_data(&project, "x.go", "h"), &[], &[], &[], &[])
            .unwrap();
        assert!(store.delete_file_by_path(project.id, "x.go").unwrap());
        assert!(!store.delete_file_by_path(project.id, "x.go").unwrap());
    }

    #[test]
    fn test_search_case_insensitive_substring() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        let symbols = vec![
            sample_symbol("a.go", "GreetUser", SymbolKind::Function, 1),
            sample_symbol("a.go", "greeting", SymbolKind::Variable, 2),
            sample_symbol("a.go", "Farewell", SymbolKind::Function, 3),
        ];
        store
            .replace_file_index(&index_data(&project, "a.go", "h"), &symbols, &[], &[], &[])
            .unwrap();

        let hits = store.search_symbols(&SearchOptions::query("greet")).unwrap();
        assert_eq!(hits.len(), 2);

        let hits = store.search_symbols(&SearchOptions::query("GREETU")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "GreetUser");
    }

    #[test]
    fn test_search_filters() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        let mut py_symbol = sample_symbol("b.py", "greet", SymbolKind::Function, 1);
        py_symbol.language = "python".to_string();
        store
            .replace_file_index(
                &{
                    let mut d = index_data(&project, "b.py", "h");
                    d.language = "python".to_string();
                    d
                },
                &[py_symbol],
                &[],
                &[],
                &[],
            )
            .unwrap();
        let go_symbols = vec![
            sample_symbol("a.go", "Greet", SymbolKind::Function, 1),
            sample_symbol("a.go", "Greeter", SymbolKind::Struct, 5),
        ];
        store
            .replace_file_index(&index_data(&project, "a.go", "h"), &go_symbols, &[], &[], &[])
            .unwrap();

        let opts = SearchOptions {
            query: Some("greet".to_string()),
            kind: Some(SymbolKind::Struct),
            ..Default::default()
        };
        let hits = store.search_symbols(&opts).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Greeter");

        let opts = SearchOptions {
            query: Some("greet".to_string()),
            language: Some("python".to_string()),
            ..Default::default()
        };
        let hits = store.search_symbols(&opts).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_path, "b.py");

        let opts = SearchOptions {
            query: Some("greet".to_string()),
            file_pattern: Some("*.go".to_string()),
            ..Default::default()
        };
        let hits = store.search_symbols(&opts).unwrap();
        assert!(hits.iter().all(|s| s.file_path.ends_with(".go")));
    }

    #[test]
    fn test_search_limit() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        let symbols: Vec<_> = (1..=10)
            .map(|i| sample_symbol("a.go", &format!("item{i}"), SymbolKind::Function, i))
            .collect();
        store
            .replace_file_index(&index_data(&project, "a.go", "h"), &symbols, &[], &[], &[])
            .unwrap();

        let opts = SearchOptions {
            query: Some("item".to_string()),
            limit: Some(3),
            ..Default::default()
        };
        assert_eq!(store.search_symbols(&opts).unwrap().len(), 3);
    }

    #[test]
    fn test_like_escaping() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        let symbols = vec![
            sample_symbol("a.go", "do_work", SymbolKind::Function, 1),
            sample_symbol("a.go", "dowork", SymbolKind::Function, 2),
        ];
        store
            .replace_file_index(&index_data(&project, "a.go", "h"), &symbols, &[], &[], &[])
            .unwrap();

        // Underscore must match literally, not as a wildcard.
        let hits = store.search_symbols(&SearchOptions::query("do_")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "do_work");
    }

    #[test]
    fn test_language_counts() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        store
            .replace_file_index(&index_data(&project, "a.go", "h"), &[], &[], &[], &[])
            .unwrap();
        store
            .replace_file_index(&index_data(&project, "b.go", "h"), &[], &[], &[], &[])
            .unwrap();
        store
            .replace_file_index(
                &{
                    let mut d = index_data(&project, "c.py", "h");
                    d.language = "python".to_string();
                    d
                },
                &[],
                &[],
                &[],
                &[],
            )
            .unwrap();

        let counts = store.language_counts(project.id).unwrap();
        assert_eq!(counts.get("go"), Some(&2));
        assert_eq!(counts.get("python"), Some(&1));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        store
            .replace_file_index(
                &index_data(&project, "a.go", "h"),
                &[sample_symbol("a.go", "Keep", SymbolKind::Function, 1)],
                &[],
                &[],
                &[],
            )
            .unwrap();

        let result: StoreResult<()> = store.transaction(|tx| {
            tx.execute("DELETE FROM symbol WHERE file_path = 'a.go'", [])?;
            Err(StoreError::CorruptRow {
                reason: "forced".to_string(),
            })
        });
        assert!(result.is_err());

        // The delete inside the failed transaction must not be visible.
        assert!(store.get_symbol_by_name("Keep").unwrap().is_some());
    }

    #[test]
    fn test_relationship_endpoint_queries() {
        let (_temp, store) = open_store();
        let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
        let relationships = vec![
            Relationship {
                file_path: "a.go".to_string(),
                kind: RelationKind::Calls,
                source_name: "A".to_string(),
                target_name: "B".to_string(),
                source_id: None,
                target_id: None,
            },
            Relationship {
                file_path: "a.go".to_string(),
                kind: RelationKind::Calls,
                source_name: "B".to_string(),
                target_name: "C".to_string(),
                source_id: None,
                target_id: None,
            },
        ];
        store
            .replace_file_index(
                &index_data(&project, "a.go", "h"),
                &[],
                &[],
                &relationships,
                &[],
            )
            .unwrap();

        let from_a = store.relationships_from("A").unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].target_name, "B");

        let to_c = store.relationships_to("C").unwrap();
        assert_eq!(to_c.len(), 1);
        assert_eq!(to_c[0].source_name, "B");
    }

    #[test]
    fn test_hash_algorithm_recorded() {
        let (_temp, store) = open_store();
        assert_eq!(store.hash_algorithm().unwrap(), "sha256");
    }

    #[test]
    fn test_store_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("index.db");
        {
            let store = SymbolStore::open(&db_path).unwrap();
            let project = store.create_project(Path::new("/proj"), "proj", 1).unwrap();
            store
                .replace_file_index(
                    &index_data(&project, "a.go", "h"),
                    &[sample_symbol("a.go", "Persist", SymbolKind::Function, 1)],
                    &[],
                    &[],
                    &[],
                )
                .unwrap();
        }

        let store = SymbolStore::open(&db_path).unwrap();
        assert!(store.get_symbol_by_name("Persist").unwrap().is_some());
        let project = store.get_project(Path::new("/proj")).unwrap().unwrap();
        assert_eq!(store.count_files(project.id).unwrap(), 1);
    }
}
