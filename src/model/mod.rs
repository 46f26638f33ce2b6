//! Persistent entities: what the store holds and the pipeline produces.
//!
//! Every record type here maps one-to-one onto a store table. Symbols carry a
//! deterministic identifier so repeated parses of identical content yield
//! identical ids, which keeps references valid across re-indexes.

use crate::types::{
    FileId, ImportKind, ProjectId, Range, ReferenceKind, RelationKind, SymbolId, SymbolKind,
    Visibility,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;

/// The indexed root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Absolute root path; unique key.
    pub root_path: PathBuf,
    pub name: String,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    /// Zero until the first full index completes.
    pub last_indexed: u64,
    /// Language tag -> indexed file count.
    pub language_stats: HashMap<String, u64>,
}

/// One indexed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub project_id: ProjectId,
    pub path: PathBuf,
    /// Path relative to the project root; unique within a project.
    pub relative_path: String,
    pub language: String,
    pub size_bytes: u64,
    pub line_count: u32,
    /// Hex SHA-256 of the exact bytes last parsed.
    pub content_hash: String,
    pub modified_at: u64,
    pub last_indexed: u64,
}

/// A named declaration extracted from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub file_path: String,
    pub name: String,
    pub kind: SymbolKind,
    pub signature: String,
    pub visibility: Visibility,
    pub range: Range,
    pub parent_id: Option<SymbolId>,
    pub doc: Option<String>,
    pub language: String,
    /// Digest of the file the symbol was extracted from.
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Symbol {
    /// Derive the stable identifier for a symbol.
    ///
    /// First 16 hex chars of SHA-256 over `file_path:name:kind:start_line`.
    /// Content-independent, so an edit elsewhere in the file does not move
    /// the ids of untouched symbols.
    pub fn deterministic_id(
        file_path: &str,
        name: &str,
        kind: SymbolKind,
        start_line: u32,
    ) -> SymbolId {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        hasher.update(b":");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(start_line.to_string().as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(16);
        for byte in &digest[..8] {
            hex.push_str(&format!("{byte:02x}"));
        }
        SymbolId::from(hex)
    }
}

/// A declared dependency on an external or intra-project module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub file_path: String,
    /// Import path or module specifier as written in the source.
    pub source: String,
    /// Imported member names, when the language syntax lists them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    pub kind: Option<ImportKind>,
    pub line: u32,
}

/// A directed structural edge between symbols.
///
/// Endpoints are stored by name; names survive re-parses where ids may not.
/// Resolution to ids happens lazily at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub file_path: String,
    pub kind: RelationKind,
    pub source_name: String,
    pub target_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SymbolId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<SymbolId>,
}

/// A usage site of a defined symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub symbol_id: SymbolId,
    pub file_id: FileId,
    pub line: u32,
    pub column: u32,
    pub kind: ReferenceKind,
}
