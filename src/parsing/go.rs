//! Go parser built on tree-sitter-go.

use crate::error::ParseFailure;
use crate::parsing::parser::{
    LanguageParser, ParseDiagnostic, ParseResult, ParsedImport, ParsedReference,
    ParsedRelationship, ParsedSymbol, node_range, node_text, squeeze_ws, within_depth,
};
use crate::types::{ImportKind, ReferenceKind, RelationKind, SymbolKind, Visibility};
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> Result<Self, ParseFailure> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| ParseFailure::GrammarInit {
                language: "go".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    pub fn factory() -> Result<Box<dyn LanguageParser>, ParseFailure> {
        Ok(Box::new(Self::new()?))
    }
}

impl LanguageParser for GoParser {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".go"]
    }

    fn parse(&mut self, bytes: &[u8], _path: &Path) -> Result<ParseResult, ParseFailure> {
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
                    message: format!("syntax error near '{}'", truncate(node_text(node, self.code))),
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

    /// Recursive walk. `parent` is the enclosing declaration name,
    /// `current_fn` the enclosing function or method for call attribution.
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
            "package_clause" => self.package_clause(node),
            "import_declaration" => self.imports(node),
            "function_declaration" => {
                self.function(node, depth);
                return;
            }
            "method_declaration" => {
                self.method(node, depth);
                return;
            }
            "type_declaration" => {
                self.type_declaration(node, depth);
                return;
            }
            "const_declaration" => {
                self.value_declaration(node, SymbolKind::Constant, parent);
            }
            "var_declaration" => {
                self.value_declaration(node, SymbolKind::Variable, parent);
            }
            "call_expression" => self.call(node, current_fn),
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.walk(child, parent, current_fn, depth + 1);
        }
    }

    fn package_clause(&mut self, node: Node) {
        if let Some(name_node) = node
            .children(&mut node.walk())
            .find(|n| n.kind() == "package_identifier")
        {
            let name = node_text(name_node, self.code).to_string();
            self.result
                .metadata
                .insert("package".to_string(), name.clone());
            self.result.symbols.push(ParsedSymbol::new(
                name,
                SymbolKind::Package,
                squeeze_ws(node_text(node, self.code)),
                Visibility::Public,
                node_range(node),
            ));
        }
    }

    fn imports(&mut self, node: Node) {
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if n.kind() == "import_spec" {
                self.import_spec(n);
            } else {
                for child in n.children(&mut n.walk()) {
                    stack.push(child);
                }
            }
        }
    }

    fn import_spec(&mut self, node: Node) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = node_text(path_node, self.code);
        let source = raw.trim_matches('"').to_string();
        let kind = classify_import(&source);
        let members = node
            .child_by_field_name("name")
            .map(|alias| vec![node_text(alias, self.code).to_string()])
            .unwrap_or_default();
        self.result.imports.push(ParsedImport {
            source,
            members,
            kind: Some(kind),
            line: node_range(node).start_line,
        });
    }

    fn function(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let mut signature = format!("func {name}");
        if let Some(params) = node.child_by_field_name("parameters") {
            signature.push_str(&squeeze_ws(node_text(params, self.code)));
        }
        if let Some(result) = node.child_by_field_name("result") {
            signature.push(' ');
            signature.push_str(&squeeze_ws(node_text(result, self.code)));
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Function,
            signature,
            go_visibility(&name),
            node_range(node),
        );
        if let Some(doc) = self.doc_comment(node) {
            symbol = symbol.with_doc(doc);
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, Some(&name), Some(&name), depth + 1);
        }
    }

    fn method(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let receiver_type = node
            .child_by_field_name("receiver")
            .and_then(|recv| receiver_type_name(recv, self.code));

        let mut signature = String::from("func ");
        if let Some(recv) = node.child_by_field_name("receiver") {
            signature.push_str(&squeeze_ws(node_text(recv, self.code)));
            signature.push(' ');
        }
        signature.push_str(&name);
        if let Some(params) = node.child_by_field_name("parameters") {
            signature.push_str(&squeeze_ws(node_text(params, self.code)));
        }
        if let Some(result) = node.child_by_field_name("result") {
            signature.push(' ');
            signature.push_str(&squeeze_ws(node_text(result, self.code)));
        }

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            SymbolKind::Method,
            signature,
            go_visibility(&name),
            node_range(node),
        );
        if let Some(doc) = self.doc_comment(node) {
            symbol = symbol.with_doc(doc);
        }
        if let Some(ref recv) = receiver_type {
            symbol = symbol.with_parent(recv.clone());
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: recv.clone(),
                target_name: name.clone(),
            });
        }
        self.result.symbols.push(symbol);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, receiver_type.as_deref(), Some(&name), depth + 1);
        }
    }

    fn type_declaration(&mut self, node: Node, depth: usize) {
        for child in node.children(&mut node.walk()) {
            match child.kind() {
                "type_spec" => self.type_spec(child, depth),
                "type_alias" => self.type_alias(child),
                _ => {}
            }
        }
    }

    fn type_spec(&mut self, node: Node, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let kind = match type_node.kind() {
            "struct_type" => SymbolKind::Struct,
            "interface_type" => SymbolKind::Interface,
            _ => SymbolKind::TypeAlias,
        };
        let signature = match kind {
            SymbolKind::Struct => format!("type {name} struct"),
            SymbolKind::Interface => format!("type {name} interface"),
            _ => format!("type {name} {}", squeeze_ws(node_text(type_node, self.code))),
        };

        let mut symbol = ParsedSymbol::new(
            name.clone(),
            kind,
            signature,
            go_visibility(&name),
            node_range(node),
        );
        // Doc comments attach to the enclosing type_declaration.
        if let Some(parent) = node.parent() {
            if let Some(doc) = self.doc_comment(parent) {
                symbol = symbol.with_doc(doc);
            }
        }
        self.result.symbols.push(symbol);

        match type_node.kind() {
            "struct_type" => self.struct_fields(type_node, &name),
            "interface_type" => self.interface_members(type_node, &name, depth),
            _ => {}
        }
    }

    fn type_alias(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.code).to_string();
        let signature = squeeze_ws(node_text(node, self.code));
        self.result.symbols.push(ParsedSymbol::new(
            name.clone(),
            SymbolKind::TypeAlias,
            format!("type {signature}"),
            go_visibility(&name),
            node_range(node),
        ));
    }

    fn struct_fields(&mut self, struct_node: Node, owner: &str) {
        let Some(list) = struct_node
            .children(&mut struct_node.walk())
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return;
        };
        for field in list.children(&mut list.walk()) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let type_text = field
                .child_by_field_name("type")
                .map(|t| squeeze_ws(node_text(t, self.code)))
                .unwrap_or_default();
            let mut cursor = field.walk();
            for name_node in field.children_by_field_name("name", &mut cursor) {
                let name = node_text(name_node, self.code).to_string();
                self.result.symbols.push(
                    ParsedSymbol::new(
                        name.clone(),
                        SymbolKind::Field,
                        format!("{name} {type_text}"),
                        go_visibility(&name),
                        node_range(field),
                    )
                    .with_parent(owner.to_string()),
                );
                self.result.relationships.push(ParsedRelationship {
                    kind: RelationKind::Contains,
                    source_name: owner.to_string(),
                    target_name: name,
                });
            }
            // Named field types are usage edges from the owning struct.
            if let Some(type_node) = field.child_by_field_name("type") {
                if let Some(type_name) = named_type(type_node, self.code) {
                    self.result.relationships.push(ParsedRelationship {
                        kind: RelationKind::Uses,
                        source_name: owner.to_string(),
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

    fn interface_members(&mut self, iface_node: Node, owner: &str, _depth: usize) {
        for member in iface_node.children(&mut iface_node.walk()) {
            // Grammar versions name the node differently.
            if member.kind() != "method_elem" && member.kind() != "method_spec" {
                continue;
            }
            let Some(name_node) = member.child_by_field_name("name") else {
                continue;
            };
            let name = node_text(name_node, self.code).to_string();
            self.result.symbols.push(
                ParsedSymbol::new(
                    name.clone(),
                    SymbolKind::Method,
                    squeeze_ws(node_text(member, self.code)),
                    go_visibility(&name),
                    node_range(member),
                )
                .with_parent(owner.to_string()),
            );
            self.result.relationships.push(ParsedRelationship {
                kind: RelationKind::Contains,
                source_name: owner.to_string(),
                target_name: name,
            });
        }
    }

    fn value_declaration(&mut self, node: Node, kind: SymbolKind, _parent: Option<&str>) {
        // Only record top-level consts and vars; locals are noise.
        let top_level = node
            .parent()
            .map(|p| p.kind() == "source_file")
            .unwrap_or(false);
        if !top_level {
            return;
        }
        for spec in node.children(&mut node.walk()) {
            if spec.kind() != "const_spec" && spec.kind() != "var_spec" {
                continue;
            }
            let mut cursor = spec.walk();
            for name_node in spec.children_by_field_name("name", &mut cursor) {
                let name = node_text(name_node, self.code).to_string();
                self.result.symbols.push(ParsedSymbol::new(
                    name.clone(),
                    kind,
                    squeeze_ws(node_text(spec, self.code)),
                    go_visibility(&name),
                    node_range(spec),
                ));
            }
        }
    }

    fn call(&mut self, node: Node, current_fn: Option<&str>) {
        let Some(function_node) = node.child_by_field_name("function") else {
            return;
        };
        let callee = match function_node.kind() {
            "identifier" => Some(node_text(function_node, self.code).to_string()),
            "selector_expression" => function_node
                .child_by_field_name("field")
                .map(|f| node_text(f, self.code).to_string()),
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

    /// Contiguous `//` comment block immediately above a declaration.
    fn doc_comment(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut expected_row = node.start_position().row;
        let mut prev = node.prev_sibling();
        while let Some(p) = prev {
            if p.kind() != "comment" || p.end_position().row + 1 != expected_row {
                break;
            }
            let text = node_text(p, self.code);
            let cleaned = text
                .trim_start_matches("//")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim();
            lines.push(cleaned.to_string());
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

fn go_visibility(name: &str) -> Visibility {
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

fn classify_import(source: &str) -> ImportKind {
    if source.starts_with("./") || source.starts_with("../") {
        return ImportKind::Local;
    }
    let first_segment = source.split('/').next().unwrap_or(source);
    if first_segment.contains('.') {
        ImportKind::External
    } else {
        ImportKind::Stdlib
    }
}

fn receiver_type_name(receiver: Node, code: &str) -> Option<String> {
    let mut stack = vec![receiver];
    while let Some(node) = stack.pop() {
        if node.kind() == "type_identifier" {
            return Some(node_text(node, code).to_string());
        }
        for child in node.children(&mut node.walk()) {
            stack.push(child);
        }
    }
    None
}

fn named_type(type_node: Node, code: &str) -> Option<String> {
    match type_node.kind() {
        "type_identifier" => Some(node_text(type_node, code).to_string()),
        "pointer_type" | "slice_type" | "array_type" => type_node
            .children(&mut type_node.walk())
            .find(|n| n.kind() == "type_identifier")
            .map(|n| node_text(n, code).to_string()),
        "qualified_type" => type_node
            .child_by_field_name("name")
            .map(|n| node_text(n, code).to_string()),
        _ => None,
    }
}

fn truncate(s: &str) -> &str {
    let mut end = s.len().min(40);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ParseResult {
        let mut parser = GoParser::new().unwrap();
        parser.parse(code.as_bytes(), Path::new("test.go")).unwrap()
    }

    fn find<'r>(result: &'r ParseResult, name: &str) -> &'r ParsedSymbol {
        result
            .symbols
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("symbol {name} not found"))
    }

    #[test]
    fn test_exported_function() {
        let result = parse("package main\n\nfunc Greet(name string) {}\n");
        let greet = find(&result, "Greet");
        assert_eq!(greet.kind, SymbolKind::Function);
        assert_eq!(greet.signature, "func Greet(name string)");
        assert_eq!(greet.visibility, Visibility::Public);
        assert_eq!(greet.range.start_line, 3);
    }

    #[test]
    fn test_unexported_function_is_private() {
        let result = parse("package main\n\nfunc helper() int { return 1 }\n");
        let helper = find(&result, "helper");
        assert_eq!(helper.visibility, Visibility::Private);
        assert_eq!(helper.signature, "func helper() int");
    }

    #[test]
    fn test_package_symbol_and_metadata() {
        let result = parse("package storage\n");
        assert_eq!(result.metadata.get("package").map(String::as_str), Some("storage"));
        let pkg = find(&result, "storage");
        assert_eq!(pkg.kind, SymbolKind::Package);
    }

    #[test]
    fn test_struct_with_fields() {
        let code = "package main\n\ntype Server struct {\n\tAddr string\n\tport int\n}\n";
        let result = parse(code);

        let server = find(&result, "Server");
        assert_eq!(server.kind, SymbolKind::Struct);
        assert_eq!(server.signature, "type Server struct");

        let addr = find(&result, "Addr");
        assert_eq!(addr.kind, SymbolKind::Field);
        assert_eq!(addr.parent.as_deref(), Some("Server"));
        assert_eq!(addr.visibility, Visibility::Public);

        let port = find(&result, "port");
        assert_eq!(port.visibility, Visibility::Private);

        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Contains
                && r.source_name == "Server"
                && r.target_name == "Addr"
        }));
    }

    #[test]
    fn test_interface_methods() {
        let code = "package main\n\ntype Store interface {\n\tGet(key string) string\n\tPut(key, value string)\n}\n";
        let result = parse(code);

        let store = find(&result, "Store");
        assert_eq!(store.kind, SymbolKind::Interface);

        let get = find(&result, "Get");
        assert_eq!(get.kind, SymbolKind::Method);
        assert_eq!(get.parent.as_deref(), Some("Store"));
    }

    #[test]
    fn test_method_receiver_becomes_parent() {
        let code =
            "package main\n\ntype Counter struct{}\n\nfunc (c *Counter) Inc() { c.n++ }\n";
        let result = parse(code);

        let inc = find(&result, "Inc");
        assert_eq!(inc.kind, SymbolKind::Method);
        assert_eq!(inc.parent.as_deref(), Some("Counter"));
        assert!(inc.signature.starts_with("func (c *Counter) Inc"));
    }

    #[test]
    fn test_imports_classified() {
        let code = "package main\n\nimport (\n\t\"fmt\"\n\t\"github.com/pkg/errors\"\n)\n";
        let result = parse(code);
        assert_eq!(result.imports.len(), 2);

        let fmt_import = result.imports.iter().find(|i| i.source == "fmt").unwrap();
        assert_eq!(fmt_import.kind, Some(ImportKind::Stdlib));

        let ext = result
            .imports
            .iter()
            .find(|i| i.source == "github.com/pkg/errors")
            .unwrap();
        assert_eq!(ext.kind, Some(ImportKind::External));
    }

    #[test]
    fn test_calls_recorded() {
        let code = "package main\n\nfunc a() { b() }\n\nfunc b() {}\n";
        let result = parse(code);
        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Calls && r.source_name == "a" && r.target_name == "b"
        }));
        assert!(result
            .references
            .iter()
            .any(|r| r.name == "b" && r.kind == ReferenceKind::Call));
    }

    #[test]
    fn test_doc_comment_attached() {
        let code = "package main\n\n// Greet says hello.\n// It is polite.\nfunc Greet() {}\n";
        let result = parse(code);
        let greet = find(&result, "Greet");
        assert_eq!(
            greet.doc.as_deref(),
            Some("Greet says hello.\nIt is polite.")
        );
    }

    #[test]
    fn test_const_and_var() {
        let code = "package main\n\nconst MaxSize = 10\n\nvar debug = false\n";
        let result = parse(code);
        assert_eq!(find(&result, "MaxSize").kind, SymbolKind::Constant);
        assert_eq!(find(&result, "debug").kind, SymbolKind::Variable);
    }

    #[test]
    fn test_broken_construct_still_yields_symbols() {
        let code = "package main\n\nfunc Good() {}\n\nfunc ( {\n";
        let result = parse(code);
        assert!(result.symbols.iter().any(|s| s.name == "Good"));
        assert!(!result.errors.is_empty());
    }
}
