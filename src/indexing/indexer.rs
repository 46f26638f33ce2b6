//! The incremental indexer: scan, hash, diff, parse, persist.
//!
//! The indexer owns the project row, the parser registry, the ignore matcher
//! and a store handle. Reading, hashing and parsing run outside the store
//! lock; only the per-file replace transaction serializes on it.

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::indexing::file_info::{count_lines, digest_bytes, mtime_of, unix_timestamp};
use crate::indexing::ignore_rules::IgnoreMatcher;
use crate::indexing::walker::FileWalker;
use crate::model::{Import, Project, Relationship, Symbol};
use crate::parsing::{ParserRegistry, register_builtin_parsers};
use crate::storage::{FileIndexData, PendingReference, SymbolStore};
use crate::types::SymbolId;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What happened to one file in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Parsed and persisted.
    Indexed,
    /// Digest matched the stored row; no parse, no write.
    UpToDate,
    /// Ignored path or unsupported extension; success with no work.
    Skipped,
    /// The parser returned a fatal error; stored state left untouched.
    ParseFailed,
}

/// Aggregate counts for one `index_all` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_up_to_date: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub files_removed: usize,
    pub duration_ms: u64,
}

pub struct Indexer {
    settings: Arc<Settings>,
    root: PathBuf,
    store: SymbolStore,
    registry: Arc<ParserRegistry>,
    matcher: Arc<IgnoreMatcher>,
    project: Project,
}

impl Indexer {
    /// Set up the index directory, the store, the project row, the ignore
    /// matcher and the built-in parsers. Any failure here is fatal.
    pub fn initialize(project_root: &Path, settings: Settings) -> IndexResult<Self> {
        let root = project_root
            .canonicalize()
            .map_err(|source| IndexError::FileRead {
                path: project_root.to_path_buf(),
                source,
            })?;

        let index_dir = settings.index_path(&root);
        std::fs::create_dir_all(&index_dir).map_err(|source| IndexError::IndexDirCreate {
            path: index_dir.clone(),
            source,
        })?;

        let store = SymbolStore::open(&settings.store_path(&root))?;

        let project = match store.get_project(&root)? {
            Some(project) => project,
            None => {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| root.to_string_lossy().into_owned());
                info!("creating project '{name}' at {}", root.display());
                store.create_project(&root, &name, unix_timestamp())?
            }
        };

        let matcher = Arc::new(IgnoreMatcher::new(&root, &settings));
        let mut registry = ParserRegistry::new();
        register_builtin_parsers(&mut registry, &settings)?;

        Ok(Self {
            settings: Arc::new(settings),
            root,
            store,
            registry: Arc::new(registry),
            matcher,
            project,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn matcher(&self) -> Arc<IgnoreMatcher> {
        Arc::clone(&self.matcher)
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    /// Full index: walk, fan out per-file work, reconcile deletions and
    /// refresh project stats. Per-file failures are logged, never fatal.
    pub fn index_all(&mut self) -> IndexResult<IndexStats> {
        let started = Instant::now();
        let walker = FileWalker::new(self.root.clone(), Arc::clone(&self.matcher));
        let files: Vec<PathBuf> = walker.walk(&self.registry).collect();

        let worker_count = self.settings.indexing.worker_count.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| IndexError::Config {
                reason: format!("failed to build worker pool: {e}"),
            })?;

        let mut stats = IndexStats {
            files_seen: files.len(),
            ..Default::default()
        };

        let outcomes: Vec<(PathBuf, IndexResult<FileOutcome>)> = pool.install(|| {
            files
                .par_iter()
                .map(|path| (path.clone(), self.index_file(path)))
                .collect()
        });

        for (path, outcome) in outcomes {
            match outcome {
                Ok(FileOutcome::Indexed) => stats.files_indexed += 1,
                Ok(FileOutcome::UpToDate) => stats.files_up_to_date += 1,
                Ok(FileOutcome::Skipped) => stats.files_skipped += 1,
                Ok(FileOutcome::ParseFailed) => stats.files_failed += 1,
                Err(err) => {
                    warn!("indexing {} failed: {err}", path.display());
                    stats.files_failed += 1;
                }
            }
        }

        // Reconcile deletions: rows with no counterpart in the walk are
        // stale, whether the file vanished or is newly ignored.
        let walked: HashSet<String> = files
            .iter()
            .filter_map(|p| self.relative_str(p))
            .collect();
        for record in self.store.list_files(self.project.id)? {
            if walked.contains(&record.relative_path) {
                continue;
            }
            match self.store.delete_file(record.id) {
                Ok(()) => {
                    debug!("pruned stale row for {}", record.relative_path);
                    stats.files_removed += 1;
                }
                Err(err) => warn!("failed to prune {}: {err}", record.relative_path),
            }
        }

        self.project.language_stats = self.store.language_counts(self.project.id)?;
        self.project.last_indexed = unix_timestamp();
        self.store.update_project(&self.project)?;

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "indexed {} files ({} up-to-date, {} failed, {} removed) in {}ms",
            stats.files_indexed,
            stats.files_up_to_date,
            stats.files_failed,
            stats.files_removed,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Index a single file.
    ///
    /// Ignored paths and unsupported extensions are success with no work. A
    /// digest match short-circuits before parsing. Parse failures leave the
    /// stored state untouched and are success at this level; read and store
    /// failures propagate.
    pub fn index_file(&self, path: &Path) -> IndexResult<FileOutcome> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let Some(relative) = self.relative_str(&absolute) else {
            return Err(IndexError::OutsideRoot {
                path: absolute,
                root: self.root.clone(),
            });
        };

        if self
            .matcher
            .should_ignore(Path::new(&relative), false)
        {
            return Ok(FileOutcome::Skipped);
        }
        if !self.registry.supports(&absolute) {
            return Ok(FileOutcome::Skipped);
        }

        let bytes = std::fs::read(&absolute).map_err(|source| IndexError::FileRead {
            path: absolute.clone(),
            source,
        })?;
        let content_hash = digest_bytes(&bytes);

        if let Some(existing) = self.store.get_file(self.project.id, &relative)? {
            if existing.content_hash == content_hash {
                debug!("{relative}: digest unchanged, skipping");
                return Ok(FileOutcome::UpToDate);
            }
        }

        let mut parser = match self.registry.create_for_path(&absolute) {
            None => return Ok(FileOutcome::Skipped),
            Some(Ok(parser)) => parser,
            Some(Err(err)) => {
                warn!("{relative}: parser construction failed: {err}");
                return Ok(FileOutcome::ParseFailed);
            }
        };
        let language = parser.language().to_string();

        let parsed = match parser.parse(&bytes, &absolute) {
            Ok(result) => result,
            Err(err) => {
                warn!("{relative}: parse failed: {err}");
                return Ok(FileOutcome::ParseFailed);
            }
        };
        for diag in &parsed.errors {
            debug!(
                "{relative}:{}:{}: {}",
                diag.line, diag.column, diag.message
            );
        }

        let modified_at = std::fs::metadata(&absolute)
            .map(|m| mtime_of(&m))
            .unwrap_or(0);
        let data = FileIndexData {
            project_id: self.project.id,
            path: absolute.to_string_lossy().into_owned(),
            relative_path: relative.clone(),
            language: language.clone(),
            size_bytes: bytes.len() as u64,
            line_count: count_lines(&bytes),
            content_hash: content_hash.clone(),
            modified_at,
            last_indexed: unix_timestamp(),
        };

        let (symbols, imports, relationships, references) =
            self.assemble(&relative, &language, &content_hash, &parsed)?;

        self.store
            .replace_file_index(&data, &symbols, &imports, &relationships, &references)?;
        debug!(
            "{relative}: {} symbols, {} imports, {} relationships",
            symbols.len(),
            imports.len(),
            relationships.len()
        );
        Ok(FileOutcome::Indexed)
    }

    /// Drop a file's rows, cascading to everything tied to it.
    pub fn remove_file(&self, path: &Path) -> IndexResult<bool> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let Some(relative) = self.relative_str(&absolute) else {
            return Err(IndexError::OutsideRoot {
                path: absolute,
                root: self.root.clone(),
            });
        };
        Ok(self.store.delete_file_by_path(self.project.id, &relative)?)
    }

    fn relative_str(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().into_owned())
    }

    /// Turn a parse result into persistent records with deterministic ids.
    #[allow(clippy::type_complexity)]
    fn assemble(
        &self,
        relative: &str,
        language: &str,
        content_hash: &str,
        parsed: &crate::parsing::ParseResult,
    ) -> IndexResult<(
        Vec<Symbol>,
        Vec<Import>,
        Vec<Relationship>,
        Vec<PendingReference>,
    )> {
        // First occurrence of a name wins for intra-file resolution.
        let mut by_name: HashMap<&str, SymbolId> = HashMap::new();
        let mut symbols = Vec::with_capacity(parsed.symbols.len());
        for parsed_symbol in &parsed.symbols {
            let id = Symbol::deterministic_id(
                relative,
                &parsed_symbol.name,
                parsed_symbol.kind,
                parsed_symbol.range.start_line,
            );
            by_name
                .entry(parsed_symbol.name.as_str())
                .or_insert_with(|| id.clone());
            symbols.push(Symbol {
                id,
                file_path: relative.to_string(),
                name: parsed_symbol.name.clone(),
                kind: parsed_symbol.kind,
                signature: parsed_symbol.signature.clone(),
                visibility: parsed_symbol.visibility,
                range: parsed_symbol.range,
                parent_id: None,
                doc: parsed_symbol.doc.clone(),
                language: language.to_string(),
                content_hash: content_hash.to_string(),
                metadata: parsed_symbol.metadata.clone(),
            });
        }
        for (symbol, parsed_symbol) in symbols.iter_mut().zip(&parsed.symbols) {
            if let Some(parent) = &parsed_symbol.parent {
                symbol.parent_id = by_name.get(parent.as_str()).cloned();
            }
        }

        let imports = parsed
            .imports
            .iter()
            .map(|import| Import {
                file_path: relative.to_string(),
                source: import.source.clone(),
                members: import.members.clone(),
                kind: import.kind,
                line: import.line,
            })
            .collect();

        let relationships = parsed
            .relationships
            .iter()
            .map(|rel| Relationship {
                file_path: relative.to_string(),
                kind: rel.kind,
                source_name: rel.source_name.clone(),
                target_name: rel.target_name.clone(),
                source_id: by_name.get(rel.source_name.as_str()).cloned(),
                target_id: by_name.get(rel.target_name.as_str()).cloned(),
            })
            .collect();

        // Resolve reference targets: same file first, then the store. The
        // lookups run before the replace transaction, outside the write lock.
        let mut cross_file: HashMap<&str, Option<SymbolId>> = HashMap::new();
        let mut references = Vec::new();
        for reference in &parsed.references {
            let resolved = match by_name.get(reference.name.as_str()) {
                Some(id) => Some(id.clone()),
                None => match cross_file.entry(reference.name.as_str()) {
                    std::collections::hash_map::Entry::Occupied(entry) => entry.get().clone(),
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        let found = self
                            .store
                            .get_symbol_by_name(&reference.name)?
                            .map(|s| s.id);
                        entry.insert(found.clone());
                        found
                    }
                },
            };
            if let Some(symbol_id) = resolved {
                references.push(PendingReference {
                    symbol_id,
                    line: reference.line,
                    column: reference.column,
                    kind: reference.kind,
                });
            }
        }

        Ok((symbols, imports, relationships, references))
    }
}
