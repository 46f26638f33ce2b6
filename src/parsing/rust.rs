//! Rust parser built on tree-sitter-rust.

use crate::error::ParseFailure;
use crate::parsing::parser::{
    LanguageParser, ParseDiagnostic, ParseResult, ParsedImport, ParsedReference,
    ParsedRelationship, ParsedSymbol, node_range, node_text, squeeze_ws, within_depth,
};
use crate::types::{ImportKind, ReferenceKind, RelationKind, SymbolKind, Visibility};
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> Result<Self, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| ParseFailure::GrammarInit {
                language: "rust".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    pub fn factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(Self::new()?))
    }
}

impl LanguageParser for RustParser {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".rs"]
    }

    fn parse(&mut self, bytes: &[u8], _path: &Path) -> Result<ParseResult, ParseFailure> {
        let code = std::str::from_utf8(bytes).map_err(|_| ParseFailure::InvalidUtf8)?;
        let tree = self.parser.parse(code, None).ok_or(ParseFailure::NoTree)?;

        let mut extractor = Extractor {
            code,
            result: ParseResult::default(),
        };
        extractor.collect_syntax_errors(tree.root_node());
        extractor.walk(tree.root_node(), &Scope::TopLevel, None, 0);
        Ok(extractor.result)
    }
}

/// Lexical position of the walk, for kind and parent attribution.
#[derive(Clone)]
enum Scope {
    TopLevel,
    /// Inside `mod name { .. }`; children are free items, not members.
    Module(String),
    /// Inside an impl or trait body; functions are methods.
    Owner(String),
}

impl Scope {
    fn name(&self) -> Option<&str> {
        match self {
            Scope::TopLevel => None,
            Scope::Module(n) | Scope::Owner(n) => Some(n),
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

    fn walk(&mut self, node: Node, scope: &Scope, current_fn: Option<&str>, depth: usize) {
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
            "function_item" | "function_signature_item" => {
                self.function(node, scope, depth);
                return;
            }
            "struct_item" => {
                self.structure(node);
                return;
            }
            "enum_item" => {
                self.simple_item(node, SymbolKind::Enum, "enum");
                return;
            }
            "trait_item" => {
                self.trait_item(node, depth);
                return;
            }
            "impl_item" => {
                self.impl_item(node, depth);
                return;
            }
            "mod_item" => {
                self.mod_item(node, scope, depth);
                return;
            }
            "const_item" => {
                self.simple_item(node, SymbolKind::Constant, "const");
            }
            "static_item" => {
                self.simple_item(node, SymbolKind::Variable, "static");
            }
            "type_item" => {
                self.simple_item(node, SymbolKind::TypeAlias, "type");
            }
            "use_declaration" => self.use_declaration(node),
            "call_expression" => self.call(node, current_fn),
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.walk(child, scope, current_fn, depth + 1);
        }
    }

    fn function(&mut self, node: Node, scope: &Scope, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let kind = if matches!(scope, Scope::Owner(_)) {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };

        let body_start = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or(node.end_byte());
        let head = self
            .code
            .get(node.start_byte()..body_start)
            .unwrap_or("")
            .trim_end_matches([';', ' ', '\n']);
        let signature = squeeze_ws(head);

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            kind,
            signature,
            visibility_of(node, self.code),
            node_range(node),
        );
        if let Some(parent_name) = scope.name() {
            symbol = symbol.with_parent(parent_name.to_string());
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: parent_name.to_string(),
                target_name: name.clone(),
            });
        }
        if let Some(doc) = self.doc_comment(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, scope, Some(&name), depth + 1);
        }
    }

    fn structure(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Struct,
            format!("struct {name}"),
            visibility_of(node, self.code),
            node_range(node),
        );
        if let Some(doc) = self.doc_comment(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        if body.kind() != "field_declaration_list" {
            return;
        }
        for field in body.children(&mut body.walk()) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let Some(field_name_node) = field.child_by_field_name("name") else {
                continue;
            };
            let field_name = node_text(field_name_node, self.code).to_string();
            self.result.symbols.push(
                ParsedSymbol::new(
                    field_name.clone(),
                    SymbolKind::Field,
                    squeeze_ws(node_text(field, self.code)),
                    visibility_of(field, self.code),
                    node_range(field),
                )
                .with_parent(name.clone()),
            );
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: name.clone(),
                target_name: field_name,
            });
            if let Some(type_node) = field.child_by_field_name("type") {
                if let Some(type_name) = base_type_name(type_node, self.code) {
                    self.result.relationships.push(ParsedRelationship {
                        kind: RelationKind::Uses,
                        source_name: name.clone(),
                        target_name: type_name.clone(),
                    });
                    let range = node_range(type_node);
                    self.result.references.push(ParsedReference {
                        name: type_name,
                        line: range.start_line,
                        column: range.start_column,
                        kind: ReferenceKind::TypeReference,
                    });
                }
            }
        }
    }

    fn trait_item(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Interface,
            format!("trait {name}"),
            visibility_of(node, self.code),
            node_range(node),
        );
        if let Some(doc) = self.doc_comment(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, &Scope::Owner(name), None, depth + 1);
        }
    }

    fn impl_item(&mut self, node: Node, depth: usize) {
        let type_name = node
            .child_by_field_name("type")
            .and_then(|t| base_type_name(t, self.code));

        if let (Some(type_name), Some(trait_node)) =
            (type_name.as_ref(), node.child_by_field_name("trait"))
        {
            if let Some(trait_name) = base_type_name(trait_node, self.code) {
                self.result.relationships.push(ParsedRelationship {
                    kind: RelationKind::Implements,
                    source_name: type_name.clone(),
                    target_name: trait_name,
                });
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let scope = match type_name {
                Some(name) => Scope::Owner(name),
                None => Scope::TopLevel,
            };
            self.walk(body, &scope, None, depth + 1);
        }
    }

    fn mod_item(&mut self, node: Node, scope: &Scope, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Module,
            format!("mod {name}"),
            visibility_of(node, self.code),
            node_range(node),
        );
        if let Some(parent_name) = scope.name() {
            symbol = symbol.with_parent(parent_name.to_string());
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, &Scope::Module(name), None, depth + 1);
        }
    }

    fn simple_item(&mut self, node: Node, kind: SymbolKind, keyword: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let signature = match kind {
            SymbolKind::Enum => format!("{keyword} {name}"),
            _ => squeeze_ws(node_text(node, self.code).trim_end_matches(';')),
        };

        let mut symbol = ParsedSymbol::new(
            name,
            kind,
            signature,
            visibility_of(node, self.code),
            node_range(node),
        );
        if let Some(doc) = self.doc_comment(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);
    }

    fn use_declaration(&mut self, node: Node) {
        let Some(argument) = node.child_by_field_name("argument") else {
            return;
        };
        self.use_tree(argument, String::new(), node_range(node).start_line);
    }

    fn use_tree(&mut self, node: Node, prefix: String, line: u32) {
        match node.kind() {
            "identifier" | "scoped_identifier" | "crate" | "self" | "super" => {
                let path = join_path(&prefix, node_text(node, self.code));
                self.push_import(path, Vec::new(), line);
            }
            "use_wildcard" => {
                let inner = node
                    .named_child(0)
                    .map(|n| node_text(n, self.code))
                    .unwrap_or("");
                let path = join_path(&prefix, inner);
                self.push_import(path, vec!["*".to_string()], line);
            }
            "use_as_clause" => {
                if let Some(path_node) = node.child_by_field_name("path") {
                    let path = join_path(&prefix, node_text(path_node, self.code));
                    let members = node
                        .child_by_field_name("alias")
                        .map(|a| vec![node_text(a, self.code).to_string()])
                        .unwrap_or_default();
                    self.push_import(path, members, line);
                }
            }
            "scoped_use_list" => {
                let path = node
                    .child_by_field_name("path")
                    .map(|p| join_path(&prefix, node_text(p, self.code)))
                    .unwrap_or(prefix);
                if let Some(list) = node.child_by_field_name("list") {
                    let members: Vec<String> = list
                        .children(&mut list.walk())
                        .filter(|n| n.is_named())
                        .map(|n| squeeze_ws(node_text(n, self.code)))
                        .collect();
                    self.push_import(path, members, line);
                }
            }
            "use_list" => {
                for child in node.children(&mut node.walk()) {
                    if child.is_named() {
                        self.use_tree(child, prefix.clone(), line);
                    }
                }
            }
            _ => {}
        }
    }

    fn push_import(&mut self, source: String, members: Vec<String>, line: u32) {
        if source.is_empty() {
            return;
        }
        let kind = classify_import(&source);
        self.result.imports.push(ParsedImport {
            source,
            members,
            kind: Some(kind),
            line,
        });
    }

    fn call(&mut self, node: Node, current_fn: Option<&str>) {
        let Some(function_node) = node.child_by_field_name("function") else {
            return;
        };
        let callee = match function_node.kind() {
            "identifier" => Some(node_text(function_node, self.code).to_string()),
            "scoped_identifier" => function_node
                .child_by_field_name("name")
                .map(|n| node_text(n, self.code).to_string()),
            "field_expression" => function_node
                .child_by_field_name("field")
                .map(|n| node_text(n, self.code).to_string()),
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
        if let Some(caller) = current_fn {
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Calls,
                source_name: caller.to_string(),
                target_name: callee,
            });
        }
    }

    /// Contiguous `///` block immediately above an item.
    fn doc_comment(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut expected_row = node.start_position().row;
        let mut prev = node.prev_sibling();
        while let Some(p) = prev {
            if p.kind() != "line_comment" || p.end_position().row + 1 != expected_row {
                break;
            }
            let text = node_text(p, self.code);
            if !text.starts_with("///") {
                break;
            }
            lines.push(text.trim_start_matches('/').trim().to_string());
            expected_row = p.start_position().row;
            prev = p.prev_sibling();
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }
}

fn visibility_of(node: Node, code: &str) -> Visibility {
    let Some(modifier) = node
        .children(&mut node.walk())
        .find(|n| n.kind() == "visibility_modifier")
    else {
        return Visibility::Private;
    };
    let text = node_text(modifier, code);
    if text == "pub" {
        Visibility::Public
    } else {
        // pub(crate), pub(super), pub(in path)
        Visibility::Internal
    }
}

fn base_type_name(type_node: Node, code: &str) -> Option<String> {
    match type_node.kind() {
        "type_identifier" => Some(node_text(type_node, code).to_string()),
        "generic_type" => type_node
            .child_by_field_name("type")
            .and_then(|t| base_type_name(t, code)),
        "scoped_type_identifier" => type_node
            .child_by_field_name("name")
            .map(|n| node_text(n, code).to_string()),
        "reference_type" => type_node
            .child_by_field_name("type")
            .and_then(|t| base_type_name(t, code)),
        _ => None,
    }
}

fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}::{segment}")
    }
}

fn classify_import(source: &str) -> ImportKind {
    let root = source.split("::").next().unwrap_or(source);
    match root {
        "std" | "core" | "alloc" => ImportKind::Stdlib,
        "crate" | "self" | "super" => ImportKind::Local,
        _ => ImportKind::External,
    }
}
