//! The contract every language parser satisfies.
//!
//! Parsers are independent values behind [`LanguageParser`]; the registry
//! holds them polymorphically and dispatches by file extension. A parser
//! never mutates its input and never touches the store.

use crate::error::ParseFailure;
use crate::types::{ImportKind, Range, ReferenceKind, RelationKind, SymbolKind, Visibility};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Node;

/// Common interface for all language parsers.
pub trait LanguageParser: Send {
    /// Short stable language tag, e.g. `"go"`, `"python"`.
    fn language(&self) -> &'static str;

    /// Claimed file extensions, leading dot included, in preference order.
    fn extensions(&self) -> &'static [&'static str];

    /// Tie-break weight when several parsers claim the same extension.
    /// Higher wins; equal priorities fall back to registration order.
    fn priority(&self) -> i32 {
        0
    }

    /// Parse source bytes into a language-neutral result.
    ///
    /// Single bad constructs become [`ParseDiagnostic`] entries on an
    /// otherwise successful result. An `Err` means the parser could not
    /// produce anything; the indexer then leaves the file's stored state
    /// untouched.
    fn parse(&mut self, bytes: &[u8], path: &Path) -> Result<ParseResult, ParseFailure>;
}

/// Everything one parse extracts from one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub symbols: Vec<ParsedSymbol>,
    pub imports: Vec<ParsedImport>,
    pub relationships: Vec<ParsedRelationship>,
    pub references: Vec<ParsedReference>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ParseDiagnostic>,
}

/// A declaration as seen by a parser, before the indexer assigns identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Human-readable one-line rendering of the declaration.
    pub signature: String,
    pub visibility: Visibility,
    pub range: Range,
    /// Name of the enclosing declaration, if nested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl ParsedSymbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        signature: impl Into<String>,
        visibility: Visibility,
        range: Range,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            signature: signature.into(),
            visibility,
            range,
            parent: None,
            doc: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedImport {
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ImportKind>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRelationship {
    pub kind: RelationKind,
    pub source_name: String,
    pub target_name: String,
}

/// A usage site, by referenced name; the indexer resolves names to ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedReference {
    pub name: String,
    pub line: u32,
    pub column: u32,
    pub kind: ReferenceKind,
}

/// A non-fatal problem encountered during parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Maximum recursion depth for AST traversal.
///
/// Protects against pathological nesting (huge array literals, deeply nested
/// calls). When hit, the subtree is skipped and a diagnostic recorded.
pub const MAX_AST_DEPTH: usize = 500;

/// Depth guard for recursive tree walks. Returns false past the limit.
#[inline]
pub fn within_depth(depth: usize) -> bool {
    depth <= MAX_AST_DEPTH
}

/// Text of a node, or empty when byte offsets fall outside the source.
pub fn node_text<'a>(node: Node, code: &'a str) -> &'a str {
    code.get(node.byte_range()).unwrap_or("")
}

/// 1-based range of a node.
pub fn node_range(node: Node) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range::from_ts((start.row, start.column), (end.row, end.column))
}

/// Squeeze whitespace runs (including newlines) to single spaces.
pub fn squeeze_ws(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last_space = false;
    for ch in source.chars() {
        if ch.is_whitespace() {
            if !last_space && !out.is_empty() {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Collapse a declaration's source text to a one-line signature.
///
/// Takes everything before the body opener, squeezes whitespace runs to
/// single spaces and trims trailing separators.
pub fn one_line_signature(source: &str) -> String {
    let head = match source.find('{') {
        Some(pos) => &source[..pos],
        None => source,
    };
    squeeze_ws(head)
        .trim_end_matches([' ', ':', '='])
        .trim_end()
        .to_string()
}
