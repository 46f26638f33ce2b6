//! TypeScript parser built on tree-sitter-typescript.
//!
//! `.tsx` files switch to the TSX grammar; everything else uses the plain
//! TypeScript grammar. Shares import classification and visibility
//! conventions with the JavaScript parser.

use crate::error::ParseFailure;
use crate::parsing::javascript::{classify_import, js_visibility, member_visibility};
use crate::parsing::parser::{
    LanguageParser, ParseDiagnostic, ParseResult, ParsedImport, ParsedReference,
    ParsedRelationship, ParsedSymbol, node_range, node_text, squeeze_ws, within_depth,
};
use crate::types::{ReferenceKind, RelationKind, SymbolKind, Visibility};
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct TypeScriptParser {
    parser: Parser,
    /// Grammar currently loaded into `parser`.
    tsx: bool,
}

impl TypeScriptParser {
    pub fn new() -> Result<Self, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|e| ParseFailure::GrammarInit {
                language: "typescript".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser, tsx: false })
    }

    pub fn factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(Self::new()?))
    }

    fn select_grammar(&mut self, path: &Path) -> Result<(), ParseFailure> {
        let wants_tsx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("tsx"));
        if wants_tsx == self.tsx {
            return Ok(());
        }
        let language = if wants_tsx {
            tree_sitter_typescript::LANGUAGE_TSX
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT
        };
        self.parser
            .set_language(&language.into())
            .map_err(|e| ParseFailure::GrammarInit {
                language: "typescript".to_string(),
                reason: e.to_string(),
            })?;
        self.tsx = wants_tsx;
        Ok(())
    }
}

impl LanguageParser for TypeScriptParser {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".ts", ".tsx", ".mts", ".cts"]
    }

    fn parse(&mut self, bytes: &[u8], path: &Path) -> Result<ParseResult, ParseFailure> {
        self.select_grammar(path)?;
        let code = std::str::from_utf8(bytes).map_err(|_| ParseFailure::InvalidUtf8)?;
        let tree = self.parser.parse(code, None).ok_or(ParseFailure::NoTree)?;

        let mut extractor = Extractor {
            code,
            result: ParseResult::default(),
        };
        extractor.collect_syntax_errors(tree.root_node());
        extractor.walk(tree.root_node(), None, None, 0);
        Ok(extractor.result)
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

    fn walk(&mut self, node: Node, parent: Option<&str>, current_fn: Option<&str>, depth: usize) {
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
            "class_declaration" | "abstract_class_declaration" => {
                self.class(node, parent, depth);
                return;
            }
            "interface_declaration" => {
                self.interface(node, parent);
                return;
            }
            "type_alias_declaration" => {
                self.type_alias(node, parent);
                return;
            }
            "enum_declaration" => {
                self.enumeration(node, parent);
                return;
            }
            "internal_module" | "module" => {
                self.namespace(node, parent, depth);
                return;
            }
            "method_definition" | "abstract_method_signature" => {
                self.method(node, parent, depth);
                return;
            }
            "public_field_definition" => {
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

        let mut signature = String::new();
        if node.children(&mut node.walk()).any(|n| n.kind() == "async") {
            signature.push_str("async ");
        }
        signature.push_str("function ");
        signature.push_str(&name);
        if let Some(params) = node.child_by_field_name("parameters") {
            signature.push_str(&squeeze_ws(node_text(params, self.code)));
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            signature.push_str(&squeeze_ws(node_text(ret, self.code)));
        }

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
            for clause in heritage.children(&mut heritage.walk()) {
                match clause.kind() {
                    "extends_clause" => {
                        self.heritage_targets(clause, &name, RelationKind::Extends);
                    }
                    "implements_clause" => {
                        self.heritage_targets(clause, &name, RelationKind::Implements);
                    }
                    _ => {}
                }
            }
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

    fn heritage_targets(&mut self, clause: Node, source: &str, relation: RelationKind) {
        for child in clause.children(&mut clause.walk()) {
            let target = match child.kind() {
                "identifier" | "type_identifier" => Some(node_text(child, self.code).to_string()),
                "generic_type" => child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.code).to_string()),
                "member_expression" | "nested_type_identifier" => child
                    .child_by_field_name("property")
                    .or_else(|| child.child_by_field_name("name"))
                    .map(|p| node_text(p, self.code).to_string()),
                _ => None,
            };
            if let Some(target) = target {
                self.result.relationships.push(ParsedRelationship {
                    kind: relation,
                    source_name: source.to_string(),
                    target_name: target.clone(),
                });
                let range = node_range(child);
                self.result.references.push(ParsedReference {
                    name: target,
                    line: range.start_line,
                    column: range.start_column,
                    kind: ReferenceKind::TypeReference,
                });
            }
        }
    }

    fn interface(&mut self, node: Node, parent: Option<&str>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();

        // Grammar versions differ on the clause node name.
        for clause in node.children(&mut node.walk()).filter(|n| {
            n.kind() == "extends_clause" || n.kind() == "extends_type_clause"
        }) {
            self.heritage_targets(clause, &name, RelationKind::Extends);
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Interface,
            format!("interface {name}"),
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

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        for member in body.children(&mut body.walk()) {
            let (kind, name_field) = match member.kind() {
                "property_signature" => (SymbolKind::Property, "name"),
                "method_signature" => (SymbolKind::Method, "name"),
                _ => continue,
            };
            let Some(member_name_node) = member.child_by_field_name(name_field) else {
                continue;
            };
            let member_name = node_text(member_name_node, self.code).to_string();
            self.result.symbols.push(
                ParsedSymbol::new(
                    member_name.clone(),
                    kind,
                    squeeze_ws(node_text(member, self.code).trim_end_matches([';', ','])),
                    Visibility::Public,
                    node_range(member),
                )
                .with_parent(name.clone()),
            );
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: name.clone(),
                target_name: member_name,
            });
        }
    }

    fn type_alias(&mut self, node: Node, parent: Option<&str>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let mut symbol = ParsedSymbol::new(
            name,
            SymbolKind::TypeAlias,
            squeeze_ws(node_text(node, self.code).trim_end_matches(';')),
            Visibility::Public,
            node_range(node),
        );
        if let Some(parent_name) = parent {
            symbol = symbol.with_parent(parent_name.to_string());
        }
        self.result.symbols.push(symbol);
    }

    fn enumeration(&mut self, node: Node, parent: Option<&str>) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Enum,
            format!("enum {name}"),
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
    }

    fn namespace(&mut self, node: Node, parent: Option<&str>, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Namespace,
            format!("namespace {name}"),
            js_visibility(&name),
            node_range(node),
        );
        if let Some(parent_name) = parent {
            symbol = symbol.with_parent(parent_name.to_string());
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, Some(&name), None, depth + 1);
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

        let mut signature = name.clone();
        if let Some(params) = node.child_by_field_name("parameters") {
            signature.push_str(&squeeze_ws(node_text(params, self.code)));
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            signature.push_str(&squeeze_ws(node_text(ret, self.code)));
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            kind,
            signature,
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
        let Some(name_node) = node.child_by_field_name("name") else {
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

        // Annotated field types are usage references.
        if let (Some(parent_name), Some(type_node)) =
            (parent, node.child_by_field_name("type"))
        {
            if let Some(type_name) = annotated_type_name(type_node, self.code) {
                self.result.relationships.push(ParsedRelationship {
                    kind: RelationKind::Uses,
                    source_name: parent_name.to_string(),
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

    fn variable(
        &mut self,
        node: Node,
        parent: Option<&str>,
        current_fn: Option<&str>,
        depth: usize,
    ) {
        if current_fn.is_some() {
            for child in node.children(&mut node.walk()) {
                self.walk(child, parent, current_fn, depth + 1);
            }
            return;
        }
        let is_const = node.children(&mut node.walk()).any(|n| n.kind() == "const");

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
                matches!(v.kind(), "arrow_function" | "function_expression")
            });

            let kind = if is_function_value {
                SymbolKind::Function
            } else if is_const {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };

            let symbol = ParsedSymbol::new(
                name.clone(),
                kind,
                squeeze_ws(node_text(declarator, self.code).trim_end_matches(';')),
                js_visibility(&name),
                node_range(declarator),
            );
            self.result.symbols.push(symbol);

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

        self.result.imports.push(ParsedImport {
            source: source.clone(),
            members,
            kind: Some(classify_import(&source)),
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

fn annotated_type_name(type_annotation: Node, code: &str) -> Option<String> {
    // type_annotation wraps the actual type node after the ':'.
    let inner = type_annotation
        .children(&mut type_annotation.walk())
        .find(|n| n.is_named())?;
    match inner.kind() {
        "type_identifier" => Some(node_text(inner, code).to_string()),
        "generic_type" => inner
            .child_by_field_name("name")
            .map(|n| node_text(n, code).to_string()),
        _ => None,
    }
}
