//! Core value types shared across the indexing pipeline and the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroI64;

/// Row identifier for a persisted project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(NonZeroI64);

/// Row identifier for a persisted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(NonZeroI64);

impl ProjectId {
    pub fn new(value: i64) -> Option<Self> {
        NonZeroI64::new(value).map(Self)
    }

    pub fn get(&self) -> i64 {
        self.0.get()
    }
}

impl FileId {
    pub fn new(value: i64) -> Option<Self> {
        NonZeroI64::new(value).map(Self)
    }

    pub fn get(&self) -> i64 {
        self.0.get()
    }
}

/// Deterministic symbol identifier.
///
/// Derived from `(file_path, name, kind, start_line)` so repeated parses of
/// identical content produce identical ids. See
/// [`Symbol::deterministic_id`](crate::model::Symbol::deterministic_id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(Box<str>);

impl SymbolId {
    pub fn new(id: impl Into<Box<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SymbolId {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

/// A source span. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Range {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Build a 1-based range from a tree-sitter node's 0-based positions.
    pub fn from_ts(start: (usize, usize), end: (usize, usize)) -> Self {
        Self {
            start_line: start.0 as u32 + 1,
            start_column: start.1 as u32 + 1,
            end_line: end.0 as u32 + 1,
            end_column: end.1 as u32 + 1,
        }
    }

    pub fn contains(&self, line: u32, column: u32) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && column < self.start_column {
            return false;
        }
        if line == self.end_line && column > self.end_column {
            return false;
        }
        true
    }
}

/// The kind of a named declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Struct,
    Enum,
    Constructor,
    Field,
    Property,
    Variable,
    Constant,
    Module,
    Namespace,
    Package,
    TypeAlias,
    Decorator,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Constructor => "constructor",
            Self::Field => "field",
            Self::Property => "property",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Module => "module",
            Self::Namespace => "namespace",
            Self::Package => "package",
            Self::TypeAlias => "type-alias",
            Self::Decorator => "decorator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "struct" => Some(Self::Struct),
            "enum" => Some(Self::Enum),
            "constructor" => Some(Self::Constructor),
            "field" => Some(Self::Field),
            "property" => Some(Self::Property),
            "variable" => Some(Self::Variable),
            "constant" => Some(Self::Constant),
            "module" => Some(Self::Module),
            "namespace" => Some(Self::Namespace),
            "package" => Some(Self::Package),
            "type-alias" => Some(Self::TypeAlias),
            "decorator" => Some(Self::Decorator),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared visibility, following each language's convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
    Package,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Internal => "internal",
            Self::Package => "package",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "protected" => Some(Self::Protected),
            "internal" => Some(Self::Internal),
            "package" => Some(Self::Package),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed structural edge between symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Extends,
    Implements,
    Calls,
    Uses,
    Imports,
    Contains,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::Calls => "calls",
            Self::Uses => "uses",
            Self::Imports => "imports",
            Self::Contains => "contains",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "extends" => Some(Self::Extends),
            "implements" => Some(Self::Implements),
            "calls" => Some(Self::Calls),
            "uses" => Some(Self::Uses),
            "imports" => Some(Self::Imports),
            "contains" => Some(Self::Contains),
            _ => None,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough classification of an import target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Stdlib,
    Local,
    External,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdlib => "stdlib",
            Self::Local => "local",
            Self::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stdlib" => Some(Self::Stdlib),
            "local" => Some(Self::Local),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

/// How a symbol is used at a reference site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Call,
    Assignment,
    TypeReference,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Assignment => "assignment",
            Self::TypeReference => "type-reference",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "call" => Some(Self::Call),
            "assignment" => Some(Self::Assignment),
            "type-reference" => Some(Self::TypeReference),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_rejects_zero() {
        assert!(FileId::new(0).is_none());
        let id = FileId::new(42).unwrap();
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn test_range_from_ts_is_one_based() {
        let range = Range::from_ts((0, 0), (2, 10));
        assert_eq!(range.start_line, 1);
        assert_eq!(range.start_column, 1);
        assert_eq!(range.end_line, 3);
        assert_eq!(range.end_column, 11);
    }

    #[test]
    fn test_range_contains() {
        let range = Range::new(10, 5, 15, 20);
        assert!(range.contains(12, 10));
        assert!(range.contains(10, 5));
        assert!(range.contains(15, 20));
        assert!(!range.contains(9, 10));
        assert!(!range.contains(16, 10));
        assert!(!range.contains(10, 4));
        assert!(!range.contains(15, 21));
    }

    #[test]
    fn test_symbol_kind_round_trip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Struct,
            SymbolKind::Enum,
            SymbolKind::Constructor,
            SymbolKind::Field,
            SymbolKind::Property,
            SymbolKind::Variable,
            SymbolKind::Constant,
            SymbolKind::Module,
            SymbolKind::Namespace,
            SymbolKind::Package,
            SymbolKind::TypeAlias,
            SymbolKind::Decorator,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("trait"), None);
    }

    #[test]
    fn test_kebab_case_names() {
        assert_eq!(SymbolKind::TypeAlias.as_str(), "type-alias");
        assert_eq!(ReferenceKind::TypeReference.as_str(), "type-reference");
    }

    #[test]
    fn test_relation_kind_round_trip() {
        for kind in [
            RelationKind::Extends,
            RelationKind::Implements,
            RelationKind::Calls,
            RelationKind::Uses,
            RelationKind::Imports,
            RelationKind::Contains,
        ] {
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_symbol_id_display() {
        let id = SymbolId::new("a1b2c3d4e5f60718");
        assert_eq!(id.to_string(), "a1b2c3d4e5f60718");
        assert_eq!(id.as_str(), "a1b2c3d4e5f60718");
    }
}
