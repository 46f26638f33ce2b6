//! JavaScript parser built on tree-sitter-javascript.
//!
//! The grammar handles JSX natively, so `.jsx` shares the same parser.

use crate::error::ParseFailure;
use crate::parsing::parser::{
    LanguageParser, ParseDiagnostic, ParseResult, ParsedImport, ParsedReference,
    ParsedRelationship, ParsedSymbol, node_range, node_text, squeeze_ws, within_depth,
};
use crate::types::{ImportKind, ReferenceKind, RelationKind, SymbolKind, Visibility};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Node builtins recognized for import classification.
const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "cluster", "crypto", "dns", "events", "fs", "http",
    "https", "net", "os", "path", "perf_hooks", "process", "querystring", "readline", "stream",
    "string_decoder", "timers", "tls", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

pub struct JavaScriptParser {
    parser: Parser,
}

impl JavaScriptParser {
    pub fn new() -> Result<Self, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| ParseFailure::GrammarInit {
                language: "javascript".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    pub fn factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(Self::new()?))
    }
}

impl LanguageParser for JavaScriptParser {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".js", ".jsx", ".mjs", ".cjs"]
    }

    fn parse(&mut self, bytes: &[u8], _path: &Path) -> Result<ParseResult, ParseFailure> {
        let code = std::str::from_utf8(bytes).map_err(|_| ParseFailure::InvalidUtf8)?;
        let tree = self.parser.parse(code, None).ok_or(ParseFailure::NoTree)?;

        let mut extractor = JsExtractor {
            code,
            result: ParseResult::default(),
        };
        extractor.collect_syntax_errors(tree.root_node());
        extractor.walk(tree.root_node(), None, None, 0);
        Ok(extractor.result)
    }
}

struct JsExtractor<'a> {
    code: &'a str,
    result: ParseResult,
}

impl<'a> JsExtractor<'a> {
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

    fn walk(
        &mut self,
        node: Node,
        parent: Option<&str>,
        current_fn: Option<&str>,
        depth: usize,
    ) {
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
            "function_declaration" | "generator_function_declaration" => {
                self.function(node, parent, depth);
                return;
            }
            "class_declaration" => {
                self.class(node, parent, depth);
                return;
            }
            "method_definition" => {
                self.method(node, parent, depth);
                return;
            }
            "field_definition" => {
                self.field(node, parent);
                return;
            }
            "lexical_declaration" | "variable_declaration" => {
                self.variable(node, parent, current_fn, depth);
                return;
            }
            "import_statement" => self.import(node),
            "call_expression" => self.call(node, current_fn),
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.walk(child, parent, current_fn, depth + 1);
        }
    }

    fn function(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let params = node
            .child_by_field_name("parameters")
            .map(|p| squeeze_ws(node_text(p, self.code)))
            .unwrap_or_default();
        let is_async = node.children(&mut node.walk()).any(|n| n.kind() == "async");
        let mut signature = String::new();
        if is_async {
            signature.push_str("async ");
        }
        signature.push_str("function ");
        signature.push_str(&name);
        signature.push_str(&params);

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Function,
            signature,
            js_visibility(&name),
            node_range(node),
        );
        if let Some(parent_name) = parent {
            symbol = symbol.with_parent(parent_name.to_string());
        }
        if let Some(doc) = self.jsdoc(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, parent, Some(&name), depth + 1);
        }
    }

    fn class(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let mut signature = format!("class {name}");

        for heritage in node
            .children(&mut node.walk())
            .filter(|n| n.kind() == "class_heritage")
        {
            signature.push(' ');
            signature.push_str(&squeeze_ws(node_text(heritage, self.code)));
            self.heritage(heritage, &name);
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Class,
            signature,
            js_visibility(&name),
            node_range(node),
        );
        if let Some(parent_name) = parent {
            symbol = symbol.with_parent(parent_name.to_string());
        }
        if let Some(doc) = self.jsdoc(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, Some(&name), None, depth + 1);
        }
    }

    fn heritage(&mut self, heritage: Node, class_name: &str) {
        // `extends Base` in JS; TS adds implements clauses handled by kind.
        let mut relation = RelationKind::Extends;
        for child in heritage.children(&mut heritage.walk()) {
            match child.kind() {
                "extends_clause" => {
                    self.heritage_targets(child, class_name, RelationKind::Extends);
                }
                "implements_clause" => {
                    self.heritage_targets(child, class_name, RelationKind::Implements);
                }
                "extends" => relation = RelationKind::Extends,
                "identifier" | "member_expression" => {
                    self.heritage_target(child, class_name, relation);
                }
                _ => {}
            }
        }
    }

    fn heritage_targets(&mut self, clause: Node, class_name: &str, relation: RelationKind) {
        for child in clause.children(&mut clause.walk()) {
            if matches!(
                child.kind(),
                "identifier" | "member_expression" | "type_identifier" | "generic_type"
            ) {
                self.heritage_target(child, class_name, relation);
            }
        }
    }

    fn heritage_target(&mut self, node: Node, class_name: &str, relation: RelationKind) {
        let target = match node.kind() {
            "identifier" | "type_identifier" => Some(node_text(node, self.code).to_string()),
            "member_expression" => node
                .child_by_field_name("property")
                .map(|p| node_text(p, self.code).to_string()),
            "generic_type" => node
                .child_by_field_name("name")
                .map(|n| node_text(n, self.code).to_string()),
            _ => None,
        };
        if let Some(target) = target {
            self.result.relationships.push(ParsedRelationship {
                kind: relation,
                source_name: class_name.to_string(),
                target_name: target.clone(),
            });
            let range = node_range(node);
            self.result.references.push(ParsedReference {
                name: target,
                line: range.start_line,
                column: range.start_column,
                kind: ReferenceKind::TypeReference,
            });
        }
    }

    fn method(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let kind = if name == "constructor" {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };
        let visibility = if name_node.kind() == "private_property_identifier" {
            Visibility::Private
        } else {
            member_visibility(node, &name, self.code)
        };
        let params = node
            .child_by_field_name("parameters")
            .map(|p| squeeze_ws(node_text(p, self.code)))
            .unwrap_or_default();

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            kind,
            format!("{name}{params}"),
            visibility,
            node_range(node),
        );
        if let Some(parent_name) = parent {
            symbol = symbol.with_parent(parent_name.to_string());
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: parent_name.to_string(),
                target_name: name.clone(),
            });
        }
        if let Some(doc) = self.jsdoc(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, parent, Some(&name), depth + 1);
        }
    }

    fn field(&mut self, node: Node, parent: Option<&str>) {
        let Some(name_node) = node.child_by_field_name("property") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let visibility = if name_node.kind() == "private_property_identifier" {
            Visibility::Private
        } else {
            member_visibility(node, &name, self.code)
        };

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Property,
            squeeze_ws(node_text(node, self.code).trim_end_matches(';')),
            visibility,
            node_range(node),
        );
        if let Some(parent_name) = parent {
            symbol = symbol.with_parent(parent_name.to_string());
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: parent_name.to_string(),
                target_name: name,
            });
        }
        self.result.symbols.push(symbol);
    }

    fn variable(&mut self, node: Node, parent: Option<&str>, current_fn: Option<&str>, depth: usize) {
        // Locals inside functions are noise; keep top-level and class scope.
        if current_fn.is_some() {
            for child in node.children(&mut node.walk()) {
                self.walk(child, parent, current_fn, depth + 1);
            }
            return;
        }
        let is_const = node
            .children(&mut node.walk())
            .any(|n| n.kind() == "const");

        for declarator in node.children(&mut node.walk()) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = node_text(name_node, self.code).to_string();
            let value = declarator.child_by_field_name("value");
            let is_function_value = value.is_some_and(|v| {
                matches!(
                    v.kind(),
                    "arrow_function" | "function_expression" | "generator_function"
                )
            });

            let kind = if is_function_value {
                SymbolKind::Function
            } else if is_const {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            let signature = if is_function_value {
                let params = value
                    .and_then(|v| v.child_by_field_name("parameters"))
                    .map(|p| squeeze_ws(node_text(p, self.code)))
                    .unwrap_or_else(|| "()".to_string());
                format!(
                    "{} {name} = {params} =>",
                    if is_const { "const" } else { "let" }
                )
            } else {
                squeeze_ws(node_text(declarator, self.code).trim_end_matches(';'))
            };

            let mut symbol = ParsedSymbol::new(
                name.clone(),
                kind,
                signature,
                js_visibility(&name),
                node_range(declarator),
            );
            if let Some(doc) = self.jsdoc(node) {
                symbol = symbol.with_doc(doc);
            }
            self.result.symbols.push(symbol);

            // Walk arrow bodies so nested calls attribute to this binding.
            if let Some(v) = value {
                if is_function_value {
                    self.walk(v, parent, Some(&name), depth + 1);
                }
            }
        }
    }

    fn import(&mut self, node: Node) {
        let Some(source_node) = node.child_by_field_name("source") else {
            return;
        };
        let source = node_text(source_node, self.code)
            .trim_matches(['"', '\''])
            .to_string();
        let mut members = Vec::new();

        for clause in node
            .children(&mut node.walk())
            .filter(|n| n.kind() == "import_clause")
        {
            for child in clause.children(&mut clause.walk()) {
                match child.kind() {
                    "identifier" => members.push(node_text(child, self.code).to_string()),
                    "namespace_import" => {
                        if let Some(alias) = child
                            .children(&mut child.walk())
                            .find(|n| n.kind() == "identifier")
                        {
                            members.push(format!("* as {}", node_text(alias, self.code)));
                        }
                    }
                    "named_imports" => {
                        for spec in child.children(&mut child.walk()) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            if let Some(name) = spec.child_by_field_name("name") {
                                members.push(node_text(name, self.code).to_string());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let kind = classify_import(&source);
        self.result.imports.push(ParsedImport {
            source,
            members,
            kind: Some(kind),
            line: node_range(node).start_line,
        });
    }

    fn call(&mut self, node: Node, current_fn: Option<&str>) {
        let Some(function_node) = node.child_by_field_name("function") else {
            return;
        };
        let callee = match function_node.kind() {
            "identifier" => Some(node_text(function_node, self.code).to_string()),
            "member_expression" => function_node
                .child_by_field_name("property")
                .map(|p| node_text(p, self.code).to_string()),
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

    /// JSDoc block immediately above a declaration.
    fn jsdoc(&self, node: Node) -> Option<String> {
        let prev = node.prev_sibling()?;
        if prev.kind() != "comment" || prev.end_position().row + 1 < node.start_position().row {
            return None;
        }
        let text = node_text(prev, self.code);
        if !text.starts_with("/**") {
            return None;
        }
        let body = text.trim_start_matches("/**").trim_end_matches("*/");
        let cleaned: Vec<String> = body
            .lines()
            .map(|line| line.trim().trim_start_matches('*').trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.join("\n"))
        }
    }
}

pub(crate) fn js_visibility(name: &str) -> Visibility {
    if name.starts_with('#') || name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

pub(crate) fn member_visibility(node: Node, name: &str, code: &str) -> Visibility {
    // TS accessibility modifiers win over naming conventions.
    if let Some(modifier) = node
        .children(&mut node.walk())
        .find(|n| n.kind() == "accessibility_modifier")
    {
        return match node_text(modifier, code) {
            "private" => Visibility::Private,
            "protected" => Visibility::Protected,
            _ => Visibility::Public,
        };
    }
    js_visibility(name)
}

pub(crate) fn classify_import(source: &str) -> ImportKind {
    if source.starts_with('.') || source.starts_with('/') {
        return ImportKind::Local;
    }
    let bare = source.strip_prefix("node:").unwrap_or(source);
    let root = bare.split('/').next().unwrap_or(bare);
    if source.starts_with("node:") || NODE_BUILTINS.binary_search(&root).is_ok() {
        ImportKind::Stdlib
    } else {
        ImportKind::External
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ParseResult {
        let mut parser = JavaScriptParser::new().unwrap();
        parser.parse(code.as_bytes(), Path::new("test.js")).unwrap()
    }

    fn find<'r>(result: &'r ParseResult, name: &str) -> &'r ParsedSymbol {
        result
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {name} not found"))
    }

    #[test]
    fn test_function_declaration() {
        let result = parse("function render(tree) {}\n");
        let render = find(&result, "render");
        assert_eq!(render.kind, SymbolKind::Function);
        assert_eq!(render.signature, "function render(tree)");
        assert_eq!(render.visibility, Visibility::Public);
    }

    #[test]
    fn test_class_with_members() {
        let code = "class Store {\n  #cache = new Map();\n  constructor(size) {}\n  get(key) {}\n}\n";
        let result = parse(code);

        assert_eq!(find(&result, "Store").kind, SymbolKind::Class);
        assert_eq!(find(&result, "constructor").kind, SymbolKind::Constructor);

        let get = find(&result, "get");
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.parent.as_deref(), Some("Store"));

        let cache = find(&result, "#cache");
        assert_eq!(cache.kind, SymbolKind::Property);
        assert_eq!(cache.visibility, Visibility::Private);
    }

    #[test]
    fn test_extends_relationship() {
        let result = parse("class Child extends Parent {}\n");
        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Extends
                && r.source_name == "Child"
                && r.target_name == "Parent"
        }));
    }

    #[test]
    fn test_arrow_function_const() {
        let result = parse("const handler = (req, res) => { res.end(); };\n");
        let handler = find(&result, "handler");
        assert_eq!(handler.kind, SymbolKind::Function);
        assert_eq!(handler.signature, "const handler = (req, res) =>");
    }

    #[test]
    fn test_const_and_let_bindings() {
        let result = parse("const LIMIT = 10;\nlet counter = 0;\n");
        assert_eq!(find(&result, "LIMIT").kind, SymbolKind::Constant);
        assert_eq!(find(&result, "counter").kind, SymbolKind::Variable);
    }

    #[test]
    fn test_locals_not_indexed() {
        let result = parse("function outer() {\n  const temp = 1;\n  return temp;\n}\n");
        assert!(result.symbols.iter().all(|s| s.name != "temp"));
    }

    #[test]
    fn test_imports() {
        let code = "import fs from 'fs';\nimport { join } from 'node:path';\nimport React from 'react';\nimport local from './util.js';\n";
        let result = parse(code);

        assert_eq!(
            result.imports.iter().find(|i| i.source == "fs").unwrap().kind,
            Some(ImportKind::Stdlib)
        );
        let path_import = result
            .imports
            .iter()
            .find(|i| i.source == "node:path")
            .unwrap();
        assert_eq!(path_import.kind, Some(ImportKind::Stdlib));
        assert_eq!(path_import.members, vec!["join"]);
        assert_eq!(
            result.imports.iter().find(|i| i.source == "react").unwrap().kind,
            Some(ImportKind::External)
        );
        assert_eq!(
            result
                .imports
                .iter()
                .find(|i| i.source == "./util.js")
                .unwrap()
                .kind,
            Some(ImportKind::Local)
        );
    }

    #[test]
    fn test_jsdoc_extracted() {
        let code = "/**\n * Renders the tree.\n */\nfunction render() {}\n";
        let result = parse(code);
        assert_eq!(find(&result, "render").doc.as_deref(), Some("Renders the tree."));
    }

    #[test]
    fn test_calls_recorded() {
        let code = "function a() { b(); }\nfunction b() {}\n";
        let result = parse(code);
        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Calls && r.source_name == "a" && r.target_name == "b"
        }));
    }

    #[test]
    fn test_builtin_table_is_sorted() {
        let mut sorted = NODE_BUILTINS.to_vec();
        sorted.sort_unstable();
        assert_eq!(NODE_BUILTINS, sorted.as_slice());
    }
}
