//! Python parser built on tree-sitter-python.

use crate::error::ParseFailure;
use crate::parsing::parser::{
    LanguageParser, ParseDiagnostic, ParseResult, ParsedImport, ParsedReference,
    ParsedRelationship, ParsedSymbol, node_range, node_text, squeeze_ws, within_depth,
};
use crate::types::{ImportKind, ReferenceKind, RelationKind, SymbolKind, Visibility};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Standard-library modules recognized for import classification.
const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "asyncio", "base64", "collections", "contextlib", "copy", "csv",
    "dataclasses", "datetime", "decimal", "enum", "functools", "glob", "hashlib", "http",
    "importlib", "inspect", "io", "itertools", "json", "logging", "math", "os", "pathlib",
    "pickle", "platform", "queue", "random", "re", "secrets", "shutil", "signal", "socket",
    "sqlite3", "string", "struct", "subprocess", "sys", "tempfile", "threading", "time",
    "traceback", "types", "typing", "unittest", "urllib", "uuid", "warnings", "weakref",
    "xml", "zipfile", "zlib",
];

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParseFailure::GrammarInit {
                language: "python".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    pub fn factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(Self::new()?))
    }
}

impl LanguageParser for PythonParser {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".py", ".pyi"]
    }

    fn parse(&mut self, bytes: &[u8], _path: &Path) -> Result<ParseResult, ParseFailure> {
        let code = std::str::from_utf8(bytes).map_err(|_| ParseFailure::InvalidUtf8)?;
        let tree = self.parser.parse(code, None).ok_or(ParseFailure::NoTree)?;

        let mut extractor = Extractor {
            code,
            result: ParseResult::default(),
        };
        extractor.collect_syntax_errors(tree.root_node());
        extractor.walk(tree.root_node(), &Scope::Module, 0);
        Ok(extractor.result)
    }
}

/// Lexical position of the walk, for kind and parent attribution.
enum Scope {
    Module,
    Class(String),
    Function(String),
}

impl Scope {
    fn name(&self) -> Option<&str> {
        match self {
            Scope::Module => None,
            Scope::Class(n) | Scope::Function(n) => Some(n),
        }
    }
}

struct Extractor<'a> {
    code: &'a str,
    result: ParseResult,
}

impl<'a> Extractor<'a> {
    fn collect_syntax_errors(&mut self, root: Node) {
        if !root.has_error() {
            return;
        }
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let range = node_range(node);
                self.result.errors.push(ParseDiagnostic {
                    line: range.start_line,
                    column: range.start_column,
                    message: "syntax error".to_string(),
                });
                continue;
            }
            if node.has_error() {
                for child in node.children(&mut node.walk()) {
                    stack.push(child);
                }
            }
        }
    }

    fn walk(&mut self, node: Node, scope: &Scope, depth: usize) {
        if !within_depth(depth) {
            let range = node_range(node);
            self.result.errors.push(ParseDiagnostic {
                line: range.start_line,
                column: range.start_column,
                message: "maximum nesting depth exceeded; subtree skipped".to_string(),
            });
            return;
        }

        match node.kind() {
            "function_definition" => {
                self.function(node, scope, &[], depth);
                return;
            }
            "class_definition" => {
                self.class(node, scope, &[], depth);
                return;
            }
            "decorated_definition" => {
                self.decorated(node, scope, depth);
                return;
            }
            "import_statement" => self.import_statement(node),
            "import_from_statement" => self.import_from(node),
            "assignment" => self.assignment(node, scope),
            "call" => self.call(node, scope),
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.walk(child, scope, depth + 1);
        }
    }

    fn decorated(&mut self, node: Node, scope: &Scope, depth: usize) {
        let decorators: Vec<String> = node
            .children(&mut node.walk())
            .filter(|n| n.kind() == "decorator")
            .map(|n| {
                node_text(n, self.code)
                    .trim_start_matches('@')
                    .split('(')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string()
            })
            .collect();
        if let Some(definition) = node.child_by_field_name("definition") {
            match definition.kind() {
                "function_definition" => self.function(definition, scope, &decorators, depth),
                "class_definition" => self.class(definition, scope, &decorators, depth),
                _ => {}
            }
        }
    }

    fn function(&mut self, node: Node, scope: &Scope, decorators: &[String], depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();

        let kind = match scope {
            Scope::Class(_) if name == "__init__" => SymbolKind::Constructor,
            Scope::Class(_) => SymbolKind::Method,
            _ => SymbolKind::Function,
        };

        let is_async = node
            .children(&mut node.walk())
            .any(|n| n.kind() == "async");
        let mut signature = String::new();
        if is_async {
            signature.push_str("async ");
        }
        signature.push_str("def ");
        signature.push_str(&name);
        if let Some(params) = node.child_by_field_name("parameters") {
            signature.push_str(&squeeze_ws(node_text(params, self.code)));
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            signature.push_str(" -> ");
            signature.push_str(&squeeze_ws(node_text(ret, self.code)));
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            kind,
            signature,
            python_visibility(&name),
            node_range(node),
        );
        if let Some(parent) = scope.name() {
            symbol = symbol.with_parent(parent.to_string());
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: parent.to_string(),
                target_name: name.clone(),
            });
        }
        if let Some(doc) = self.docstring(node) {
            symbol = symbol.with_doc(doc);
        }
        if !decorators.is_empty() {
            symbol
                .metadata
                .insert("decorators".to_string(), decorators.join(","));
            for decorator in decorators {
                self.result.relationships.push(ParsedRelationship {
                    kind: RelationKind::Uses,
                    source_name: name.clone(),
                    target_name: decorator.clone(),
                });
            }
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Scope::Function(name);
            self.walk(body, &inner, depth + 1);
        }
    }

    fn class(&mut self, node: Node, scope: &Scope, decorators: &[String], depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();

        let mut signature = format!("class {name}");
        if let Some(bases) = node.child_by_field_name("superclasses") {
            signature.push_str(&squeeze_ws(node_text(bases, self.code)));
            for base in bases.children(&mut bases.walk()) {
                let base_name = match base.kind() {
                    "identifier" => Some(node_text(base, self.code).to_string()),
                    "attribute" => base
                        .child_by_field_name("attribute")
                        .map(|a| node_text(a, self.code).to_string()),
                    _ => None,
                };
                if let Some(base_name) = base_name {
                    self.result.relationships.push(ParsedRelationship {
                        kind: RelationKind::Extends,
                        source_name: name.clone(),
                        target_name: base_name.clone(),
                    });
                    let range = node_range(base);
                    self.result.references.push(ParsedReference {
                        name: base_name,
                        line: range.start_line,
                        column: range.start_column,
                        kind: ReferenceKind::TypeReference,
                    });
                }
            }
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Class,
            signature,
            python_visibility(&name),
            node_range(node),
        );
        if let Some(parent) = scope.name() {
            symbol = symbol.with_parent(parent.to_string());
        }
        if let Some(doc) = self.docstring(node) {
            symbol = symbol.with_doc(doc);
        }
        if !decorators.is_empty() {
            symbol
                .metadata
                .insert("decorators".to_string(), decorators.join(","));
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            let inner = Scope::Class(name);
            self.walk(body, &inner, depth + 1);
        }
    }

    fn assignment(&mut self, node: Node, scope: &Scope) {
        // Record module-level bindings and class attributes; locals are noise.
        let (kind, parent) = match scope {
            Scope::Module => (None, None),
            Scope::Class(name) => (Some(SymbolKind::Field), Some(name.clone())),
            Scope::Function(_) => return,
        };
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = node_text(left, self.code).to_string();
        let kind = kind.unwrap_or(if is_screaming_case(&name) {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        });

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            kind,
            squeeze_ws(node_text(node, self.code)),
            python_visibility(&name),
            node_range(node),
        );
        if let Some(parent) = parent {
            symbol = symbol.with_parent(parent.clone());
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: parent,
                target_name: name,
            });
        }
        self.result.symbols.push(symbol);
    }

    fn import_statement(&mut self, node: Node) {
        for child in node.children(&mut node.walk()) {
            match child.kind() {
                "dotted_name" => {
                    let source = node_text(child, self.code).to_string();
                    self.push_import(source, Vec::new(), node);
                }
                "aliased_import" => {
                    if let Some(name) = child.child_by_field_name("name") {
                        let source = node_text(name, self.code).to_string();
                        let members = child
                            .child_by_field_name("alias")
                            .map(|a| vec![node_text(a, self.code).to_string()])
                            .unwrap_or_default();
                        self.push_import(source, members, node);
                    }
                }
                _ => {}
            }
        }
    }

    fn import_from(&mut self, node: Node) {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let source = node_text(module, self.code).to_string();
        let mut members = Vec::new();
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            match name.kind() {
                "dotted_name" => members.push(node_text(name, self.code).to_string()),
                "aliased_import" => {
                    if let Some(n) = name.child_by_field_name("name") {
                        members.push(node_text(n, self.code).to_string());
                    }
                }
                _ => {}
            }
        }
        if node
            .children(&mut node.walk())
            .any(|n| n.kind() == "wildcard_import")
        {
            members.push("*".to_string());
        }
        self.push_import(source, members, node);
    }

    fn push_import(&mut self, source: String, members: Vec<String>, node: Node) {
        let kind = classify_import(&source);
        self.result.imports.push(ParsedImport {
            source,
            members,
            kind: Some(kind),
            line: node_range(node).start_line,
        });
    }

    fn call(&mut self, node: Node, scope: &Scope) {
        let Some(function_node) = node.child_by_field_name("function") else {
            return;
        };
        let callee = match function_node.kind() {
            "identifier" => Some(node_text(function_node, self.code).to_string()),
            "attribute" => function_node
                .child_by_field_name("attribute")
                .map(|a| node_text(a, self.code).to_string()),
            _ => None,
        };
        let Some(callee) = callee else { return };

        let range = node_range(function_node);
        self.result.references.push(ParsedReference {
            name: callee.clone(),
            line: range.start_line,
            column: range.start_column,
            kind: ReferenceKind::Call,
        });
        if let Some(caller) = scope.name() {
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Calls,
                source_name: caller.to_string(),
                target_name: callee,
            });
        }
    }

    /// First string expression of a definition body.
    fn docstring(&self, def_node: Node) -> Option<String> {
        let body = def_node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let raw = node_text(string, self.code);
        let cleaned = raw
            .trim_start_matches(['r', 'b', 'f', 'u', 'R', 'B', 'F', 'U'])
            .trim_start_matches("\"\"\"")
            .trim_end_matches("\"\"\"")
            .trim_start_matches("'''")
            .trim_end_matches("'''")
            .trim_matches('"')
            .trim_matches('\'')
            .trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

fn python_visibility(name: &str) -> Visibility {
    // Dunder names are conventionally part of the public surface.
    if name.starts_with("__") && name.ends_with("__") {
        return Visibility::Public;
    }
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn is_screaming_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}

fn classify_import(source: &str) -> ImportKind {
    if source.starts_with('.') {
        return ImportKind::Local;
    }
    let root = source.split('.').next().unwrap_or(source);
    if STDLIB_MODULES.binary_search(&root).is_ok() {
        ImportKind::Stdlib
    } else {
        ImportKind::External
    }
}
