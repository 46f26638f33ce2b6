//! Read-only query surface consumed by the request/response front-ends.
//!
//! Every method reads committed store state; none mutates. Unknown names
//! return structured empty results rather than errors.

use crate::error::StoreResult;
use crate::model::{FileRecord, Import, Project, Reference, Symbol};
use crate::storage::{SearchOptions, SymbolStore};
use crate::types::{ProjectId, RelationKind, SymbolId};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Symbols and imports of one file, shaped like a parse result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStructure {
    pub file: FileRecord,
    pub symbols: Vec<Symbol>,
    pub imports: Vec<Import>,
}

/// A symbol plus every recorded usage site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDetails {
    /// Absent when the name is unknown.
    pub symbol: Option<Symbol>,
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectOverview {
    pub project: Project,
    pub total_files: u64,
    pub total_symbols: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    /// Resolved lazily; absent when no symbol row matches the name.
    pub symbol_id: Option<SymbolId>,
    /// Hops from the start symbol.
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Edge kinds that participate in graph traversal.
const GRAPH_KINDS: &[RelationKind] = &[
    RelationKind::Contains,
    RelationKind::Calls,
    RelationKind::Uses,
    RelationKind::Extends,
    RelationKind::Implements,
];

#[derive(Clone, Copy)]
enum Direction {
    Outgoing,
    Incoming,
}

/// Read-only facade over the store.
#[derive(Clone)]
pub struct QueryFacade {
    store: SymbolStore,
    project_id: ProjectId,
}

impl QueryFacade {
    pub fn new(store: SymbolStore, project_id: ProjectId) -> Self {
        Self { store, project_id }
    }

    pub fn search_symbols(&self, options: &SearchOptions) -> StoreResult<Vec<Symbol>> {
        self.store.search_symbols(options)
    }

    /// Symbols and imports of a file, by project-relative path.
    pub fn get_file_structure(&self, relative_path: &str) -> StoreResult<Option<FileStructure>> {
        let Some(file) = self.store.get_file(self.project_id, relative_path)? else {
            return Ok(None);
        };
        let symbols = self.store.get_symbols_by_file(relative_path)?;
        let imports = self.store.get_imports_by_file(relative_path)?;
        Ok(Some(FileStructure {
            file,
            symbols,
            imports,
        }))
    }

    /// First exact-name match plus all of its references.
    pub fn get_symbol_details(&self, name: &str) -> StoreResult<SymbolDetails> {
        let Some(symbol) = self.store.get_symbol_by_name(name)? else {
            return Ok(SymbolDetails {
                symbol: None,
                references: Vec::new(),
            });
        };
        let references = self.store.get_references_by_symbol(&symbol.id)?;
        Ok(SymbolDetails {
            symbol: Some(symbol),
            references,
        })
    }

    /// Usage sites of every symbol bearing the name.
    pub fn find_references(&self, name: &str) -> StoreResult<Vec<Reference>> {
        let mut references = Vec::new();
        for symbol in self.store.get_symbols_by_name(name)? {
            references.extend(self.store.get_references_by_symbol(&symbol.id)?);
        }
        Ok(references)
    }

    pub fn get_project_overview(&self) -> StoreResult<Option<ProjectOverview>> {
        // Re-read the row so the overview reflects the latest full index.
        let Some(project) = self.store.get_project_by_id(self.project_id)? else {
            return Ok(None);
        };
        let total_files = self.store.count_files(self.project_id)?;
        let total_symbols = self.store.count_symbols()?;
        Ok(Some(ProjectOverview {
            project,
            total_files,
            total_symbols,
        }))
    }

    /// Breadth-first traversal of the relationship graph from a named symbol.
    ///
    /// Cycle-safe via a visited set; expands nodes strictly shallower than
    /// `max_depth`, so the result holds at most `max_depth` hops.
    pub fn build_dependency_graph(
        &self,
        name: &str,
        max_depth: u32,
    ) -> StoreResult<DependencyGraph> {
        self.traverse(name, max_depth, Direction::Outgoing)
    }

    /// Reverse traversal: everything that would feel a change to `name`.
    pub fn analyze_impact(&self, name: &str, max_depth: u32) -> StoreResult<DependencyGraph> {
        self.traverse(name, max_depth, Direction::Incoming)
    }

    /// Direct outgoing neighbors of a symbol in the relationship graph.
    pub fn get_dependencies(&self, name: &str) -> StoreResult<Vec<GraphEdge>> {
        let edges = self.store.relationships_from(name)?;
        Ok(edges
            .into_iter()
            .filter(|r| GRAPH_KINDS.contains(&r.kind))
            .map(|r| GraphEdge {
                source: r.source_name,
                target: r.target_name,
                kind: r.kind,
            })
            .collect())
    }

    /// Direct incoming neighbors of a symbol in the relationship graph.
    pub fn get_dependents(&self, name: &str) -> StoreResult<Vec<GraphEdge>> {
        let edges = self.store.relationships_to(name)?;
        Ok(edges
            .into_iter()
            .filter(|r| GRAPH_KINDS.contains(&r.kind))
            .map(|r| GraphEdge {
                source: r.source_name,
                target: r.target_name,
                kind: r.kind,
            })
            .collect())
    }

    fn traverse(
        &self,
        start: &str,
        max_depth: u32,
        direction: Direction,
    ) -> StoreResult<DependencyGraph> {
        let mut graph = DependencyGraph::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut seen_edges: HashSet<GraphEdge> = HashSet::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();

        visited.insert(start.to_string());
        queue.push_back((start.to_string(), 0));

        while let Some((name, depth)) = queue.pop_front() {
            graph.nodes.push(GraphNode {
                symbol_id: self.store.get_symbol_by_name(&name)?.map(|s| s.id),
                name: name.clone(),
                depth,
            });
            if depth >= max_depth {
                continue;
            }

            let relationships = match direction {
                Direction::Outgoing => self.store.relationships_from(&name)?,
                Direction::Incoming => self.store.relationships_to(&name)?,
            };
            for rel in relationships {
                if !GRAPH_KINDS.contains(&rel.kind) {
                    continue;
                }
                let neighbor = match direction {
                    Direction::Outgoing => rel.target_name.clone(),
                    Direction::Incoming => rel.source_name.clone(),
                };
                seen_edges.insert(GraphEdge {
                    source: rel.source_name,
                    target: rel.target_name,
                    kind: rel.kind,
                });
                if visited.insert(neighbor.clone()) {
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        graph.edges = seen_edges.into_iter().collect();
        graph.edges.sort_by(|a, b| {
            (&a.source, &a.target, a.kind.as_str()).cmp(&(&b.source, &b.target, b.kind.as_str()))
        });
        Ok(graph)
    }
}
