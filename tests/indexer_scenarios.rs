//! End-to-end pipeline scenarios on real temp projects.

use codeatlas::query::QueryFacade;
use codeatlas::storage::SearchOptions;
use codeatlas::types::{SymbolKind, Visibility};
use codeatlas::{Indexer, Settings};
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

fn init(temp: &TempDir) -> Indexer {
    Indexer::initialize(temp.path(), Settings::default()).unwrap()
}

fn facade(indexer: &Indexer) -> QueryFacade {
    QueryFacade::new(indexer.store().clone(), indexer.project().id)
}

#[test]
fn go_symbol_discovery() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("test.go"),
        "package main\n\nfunc Greet(name string) {}\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let hits = facade(&indexer)
        .search_symbols(&SearchOptions::query("Greet"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    let greet = &hits[0];
    assert_eq!(greet.name, "Greet");
    assert_eq!(greet.kind, SymbolKind::Function);
    assert_eq!(greet.signature, "func Greet(name string)");
    assert_eq!(greet.visibility, Visibility::Public);
}

#[test]
fn unchanged_files_do_no_parse_work() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("test.go"),
        "package main\n\nfunc Greet(name string) {}\n",
    )
    .unwrap();
    fs::write(temp.path().join("util.py"), "def helper(): pass\n").unwrap();

    let mut indexer = init(&temp);
    let first = indexer.index_all().unwrap();
    assert_eq!(first.files_indexed, 2);

    let second = indexer.index_all().unwrap();
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.files_up_to_date, 2);
}

#[test]
fn reindex_is_idempotent_on_store_contents() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("lib.rs"),
        "pub struct Engine { pub speed: u32 }\n\npub fn start(engine: &Engine) {}\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();
    let before: Vec<_> = indexer
        .store()
        .get_symbols_by_file("lib.rs")
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s.name, s.content_hash))
        .collect();

    indexer.index_all().unwrap();
    let after: Vec<_> = indexer
        .store()
        .get_symbols_by_file("lib.rs")
        .unwrap()
        .into_iter()
        .map(|s| (s.id, s.name, s.content_hash))
        .collect();

    assert_eq!(before, after);
    assert!(!before.is_empty());
}

#[test]
fn edit_replaces_symbols_atomically() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("test.go");
    fs::write(&file, "package main\n\nfunc Greet(name string) {}\n").unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    fs::write(&file, "package main\n\nfunc Goodbye(name string) {}\n").unwrap();
    indexer.index_file(&file).unwrap();

    let facade = facade(&indexer);
    assert!(facade
        .search_symbols(&SearchOptions::query("Greet"))
        .unwrap()
        .is_empty());
    assert_eq!(
        facade
            .search_symbols(&SearchOptions::query("Goodbye"))
            .unwrap()
            .len(),
        1
    );
    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 1);
}

#[test]
fn unsupported_extension_creates_no_rows() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("notes.xyz"), "nobody parses this\n").unwrap();

    let mut indexer = init(&temp);
    let stats = indexer.index_all().unwrap();

    assert_eq!(stats.files_seen, 0);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 0);
}

#[test]
fn dependency_graph_depth_bound() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("chain.go"),
        "package main\n\nfunc A() { B() }\n\nfunc B() { C() }\n\nfunc C() { D() }\n\nfunc D() {}\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let graph = facade(&indexer).build_dependency_graph("A", 2).unwrap();
    let names: HashSet<_> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, HashSet::from(["A", "B", "C"]));

    let edges: HashSet<_> = graph
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    assert_eq!(edges, HashSet::from([("A", "B"), ("B", "C")]));
}

#[test]
fn dependency_graph_survives_cycles() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("cycle.py"),
        "def a():\n    b()\n\ndef b():\n    a()\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let graph = facade(&indexer).build_dependency_graph("a", 50).unwrap();
    let names: Vec<_> = graph.nodes.iter().map(|n| n.name.as_str()).collect();
    let unique: HashSet<_> = names.iter().collect();
    assert_eq!(names.len(), unique.len(), "each node visited at most once");
}

#[test]
fn language_stats_match_file_counts() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.go"), "package a\n").unwrap();
    fs::write(temp.path().join("b.go"), "package b\n").unwrap();
    fs::write(temp.path().join("c.py"), "x = 1\n").unwrap();
    fs::write(temp.path().join("d.ts"), "export const n = 1;\n").unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let counts = indexer.store().language_counts(indexer.project().id).unwrap();
    assert_eq!(indexer.project().language_stats, counts);
    assert_eq!(counts.get("go"), Some(&2));
    assert_eq!(counts.get("python"), Some(&1));
    assert_eq!(counts.get("typescript"), Some(&1));
}

#[test]
fn newly_ignored_files_are_pruned_on_full_index() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("generated.go");
    fs::write(&file, "package gen\n\nfunc Generated() {}\n").unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();
    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 1);
    drop(indexer);

    // The file becomes ignored between runs.
    fs::write(temp.path().join(".gitignore"), "generated.go\n").unwrap();
    let mut indexer = init(&temp);

    // Single-file indexing of an ignored path is success with no work.
    assert_eq!(
        indexer.index_file(&file).unwrap(),
        codeatlas::FileOutcome::Skipped
    );

    let stats = indexer.index_all().unwrap();
    assert_eq!(stats.files_removed, 1);
    assert_eq!(indexer.store().count_files(indexer.project().id).unwrap(), 0);
}

#[test]
fn references_link_call_sites_to_definitions() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("calls.go"),
        "package main\n\nfunc Callee() {}\n\nfunc Caller() { Callee() }\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let facade = facade(&indexer);
    let references = facade.find_references("Callee").unwrap();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].line, 5);

    let details = facade.get_symbol_details("Callee").unwrap();
    assert!(details.symbol.is_some());
    assert_eq!(details.references.len(), 1);
}

#[test]
fn file_structure_lists_symbols_and_imports() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("svc.py"),
        "import os\n\nclass Service:\n    def run(self):\n        pass\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let structure = facade(&indexer).get_file_structure("svc.py").unwrap().unwrap();
    assert_eq!(structure.file.language, "python");
    assert_eq!(structure.imports.len(), 1);
    assert_eq!(structure.imports[0].source, "os");
    let names: HashSet<_> = structure.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, HashSet::from(["Service", "run"]));
}

#[test]
fn overview_reflects_index_state() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("one.go"), "package one\n\nfunc One() {}\n").unwrap();

    let mut indexer = init(&temp);
    indexer.index_all().unwrap();

    let overview = facade(&indexer).get_project_overview().unwrap().unwrap();
    assert_eq!(overview.total_files, 1);
    assert!(overview.total_symbols >= 1);
    assert!(overview.project.last_indexed > 0);
    assert_eq!(overview.project.language_stats.get("go"), Some(&1));
}

#[test]
fn mixed_language_project_end_to_end() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src")).unwrap();
    fs::write(
        temp.path().join("src/server.go"),
        "package server\n\ntype Handler struct{}\n\nfunc (h *Handler) Serve() {}\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("src/client.ts"),
        "export interface Client {\n  connect(): void;\n}\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("src/tool.py"),
        "def main():\n    pass\n",
    )
    .unwrap();

    let mut indexer = init(&temp);
    let stats = indexer.index_all().unwrap();
    assert_eq!(stats.files_indexed, 3);

    let facade = facade(&indexer);
    let handler = facade
        .search_symbols(&SearchOptions::query("Handler"))
        .unwrap();
    assert_eq!(handler[0].kind, SymbolKind::Struct);

    let client = facade
        .search_symbols(&SearchOptions::query("Client"))
        .unwrap();
    assert!(client.iter().any(|s| s.kind == SymbolKind::Interface));

    let opts = SearchOptions {
        query: Some("main".to_string()),
        language: Some("python".to_string()),
        ..Default::default()
    };
    assert_eq!(facade.search_symbols(&opts).unwrap().len(), 1);
}
