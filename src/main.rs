use anyhow::Context;
use clap::{Parser, Subcommand};
use codeatlas::query::QueryFacade;
use codeatlas::storage::SearchOptions;
use codeatlas::types::SymbolKind;
use codeatlas::{FileWatcher, Indexer, Settings};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Persistent multi-language code index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a default settings file under the index directory
    Init {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Run a full index of a project tree
    Index {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Worker threads (overrides configuration)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Emit stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch a project tree and keep the index in sync
    Watch {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Query the index
    Retrieve {
        /// Project root
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Emit results as JSON
        #[arg(long)]
        json: bool,

        #[command(subcommand)]
        query: RetrieveQuery,
    },

    /// Serve MCP tools over stdio
    Serve {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Print the effective configuration
    Config {
        /// Project root
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum RetrieveQuery {
    /// Search symbols by name substring
    Search {
        query: String,

        /// Filter by symbol kind (e.g. function, class, type-alias)
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter by language tag
        #[arg(short, long)]
        language: Option<String>,

        /// Glob over owning file paths
        #[arg(short, long)]
        file_pattern: Option<String>,

        /// Maximum number of results
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show a symbol and its references
    Symbol { name: String },

    /// Show symbols and imports of one file
    Structure {
        /// Path relative to the project root
        file: String,
    },

    /// List usage sites of a symbol name
    References { name: String },

    /// Direct outgoing relationship edges of a symbol
    Dependencies { name: String },

    /// Direct incoming relationship edges of a symbol
    Dependents { name: String },

    /// Walk the dependency graph outward from a symbol
    Graph {
        name: String,

        /// Maximum traversal depth
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
    },

    /// Estimate what a change to this symbol would affect
    Impact {
        name: String,

        /// Maximum traversal depth
        #[arg(short, long, default_value_t = 3)]
        depth: u32,
    },

    /// Project totals and language stats
    Overview,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path, force } => {
            let settings_path = Settings::init_config_file(&path, force)
                .context("failed to create settings file")?;
            println!("Created {}", settings_path.display());
            Ok(())
        }

        Commands::Index {
            path,
            threads,
            json,
        } => {
            let mut settings = load_settings(&path)?;
            if let Some(threads) = threads {
                settings.indexing.worker_count = threads;
            }
            codeatlas::logging::init_with_config(&settings.logging);

            let mut indexer = Indexer::initialize(&path, settings)?;
            let stats = indexer.index_all()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!(
                    "Indexed {} files ({} unchanged, {} skipped, {} failed, {} removed) in {}ms",
                    stats.files_indexed,
                    stats.files_up_to_date,
                    stats.files_skipped,
                    stats.files_failed,
                    stats.files_removed,
                    stats.duration_ms
                );
            }
            Ok(())
        }

        Commands::Watch { path } => {
            let settings = load_settings(&path)?;
            codeatlas::logging::init_with_config(&settings.logging);

            let mut indexer = Indexer::initialize(&path, settings)?;
            // Bring the index current before watching for deltas.
            let stats = indexer.index_all()?;
            println!(
                "Indexed {} files, watching for changes (Ctrl-C to stop)",
                stats.files_indexed + stats.files_up_to_date
            );

            let watcher = FileWatcher::new(Arc::new(indexer));
            let token = watcher.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            });
            watcher.watch().await?;
            Ok(())
        }

        Commands::Retrieve { path, json, query } => {
            let settings = load_settings(&path)?;
            codeatlas::logging::init_with_config(&settings.logging);

            let indexer = Indexer::initialize(&path, settings)?;
            let facade = QueryFacade::new(indexer.store().clone(), indexer.project().id);
            retrieve(&facade, query, json)
        }

        Commands::Serve { path } => {
            let settings = load_settings(&path)?;
            codeatlas::logging::init_with_config(&settings.logging);

            let indexer = Indexer::initialize(&path, settings)?;
            let facade = QueryFacade::new(indexer.store().clone(), indexer.project().id);
            eprintln!("Serving MCP tools on stdio");
            codeatlas::mcp::serve_stdio(facade).await
        }

        Commands::Config { path } => {
            let settings = load_settings(&path)?;
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

fn load_settings(project_root: &std::path::Path) -> anyhow::Result<Settings> {
    Settings::load(project_root).context("failed to load configuration")
}

fn retrieve(facade: &QueryFacade, query: RetrieveQuery, json: bool) -> anyhow::Result<()> {
    match query {
        RetrieveQuery::Search {
            query,
            kind,
            language,
            file_pattern,
            limit,
        } => {
            let kind = match kind.as_deref() {
                Some(raw) => Some(
                    SymbolKind::parse(raw)
                        .with_context(|| format!("unknown symbol kind '{raw}'"))?,
                ),
                None => None,
            };
            let options = SearchOptions {
                query: Some(query),
                kind,
                language,
                file_pattern,
                limit: Some(limit),
            };
            let symbols = facade.search_symbols(&options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&symbols)?);
            } else if symbols.is_empty() {
                println!("No matches");
            } else {
                for symbol in symbols {
                    println!(
                        "{}  {}  {}:{}  {}",
                        symbol.name,
                        symbol.kind,
                        symbol.file_path,
                        symbol.range.start_line,
                        symbol.signature
                    );
                }
            }
        }

        RetrieveQuery::Symbol { name } => {
            let details = facade.get_symbol_details(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                match details.symbol {
                    Some(symbol) => {
                        println!(
                            "{}  {}  {}:{}",
                            symbol.name, symbol.kind, symbol.file_path, symbol.range.start_line
                        );
                        println!("  {}", symbol.signature);
                        if let Some(doc) = &symbol.doc {
                            println!("  {}", doc.lines().next().unwrap_or_default());
                        }
                        println!("  {} reference(s)", details.references.len());
                    }
                    None => println!("No symbol named '{name}'"),
                }
            }
        }

        RetrieveQuery::Structure { file } => {
            match facade.get_file_structure(&file)? {
                Some(structure) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&structure)?);
                    } else {
                        println!(
                            "{}  {}  {} lines",
                            structure.file.relative_path,
                            structure.file.language,
                            structure.file.line_count
                        );
                        for import in &structure.imports {
                            println!("  import {}", import.source);
                        }
                        for symbol in &structure.symbols {
                            println!(
                                "  {}:{}  {}  {}",
                                symbol.range.start_line, symbol.range.start_column, symbol.kind,
                                symbol.name
                            );
                        }
                    }
                }
                None => println!("'{file}' is not in the index"),
            }
        }

        RetrieveQuery::References { name } => {
            let references = facade.find_references(&name)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&references)?);
            } else if references.is_empty() {
                println!("No references to '{name}'");
            } else {
                for reference in references {
                    println!(
                        "{:?}  file #{} at {}:{}",
                        reference.kind,
                        reference.file_id.get(),
                        reference.line,
                        reference.column
                    );
                }
            }
        }

        RetrieveQuery::Dependencies { name } => {
            print_edges(&facade.get_dependencies(&name)?, json)?;
        }

        RetrieveQuery::Dependents { name } => {
            print_edges(&facade.get_dependents(&name)?, json)?;
        }

        RetrieveQuery::Graph { name, depth } => {
            let graph = facade.build_dependency_graph(&name, depth)?;
            print_graph(&graph, json)?;
        }

        RetrieveQuery::Impact { name, depth } => {
            let graph = facade.analyze_impact(&name, depth)?;
            print_graph(&graph, json)?;
        }

        RetrieveQuery::Overview => {
            match facade.get_project_overview()? {
                Some(overview) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&overview)?);
                    } else {
                        println!("{}  ({})", overview.project.name, overview.project.root_path.display());
                        println!("  files: {}", overview.total_files);
                        println!("  symbols: {}", overview.total_symbols);
                        println!("  last indexed: {}", relative_age(overview.project.last_indexed));
                        let mut stats: Vec<_> =
                            overview.project.language_stats.iter().collect();
                        stats.sort();
                        for (language, count) in stats {
                            println!("  {language}: {count}");
                        }
                    }
                }
                None => println!("No project row; run 'codeatlas index' first"),
            }
        }
    }
    Ok(())
}

/// Compact "3m ago" rendering of a Unix timestamp; old dates fall back to
/// the calendar date.
fn relative_age(timestamp: u64) -> String {
    if timestamp == 0 {
        return "never".to_string();
    }
    let Some(then) = chrono::DateTime::from_timestamp(timestamp as i64, 0) else {
        return "unknown".to_string();
    };
    let elapsed = chrono::Utc::now().signed_duration_since(then);
    if elapsed.num_seconds() < 60 {
        "just now".to_string()
    } else if elapsed.num_minutes() < 60 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 14 {
        format!("{}d ago", elapsed.num_days())
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

fn print_edges(edges: &[codeatlas::query::GraphEdge], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(edges)?);
    } else if edges.is_empty() {
        println!("No edges");
    } else {
        for edge in edges {
            println!("{} --{}--> {}", edge.source, edge.kind, edge.target);
        }
    }
    Ok(())
}

fn print_graph(graph: &codeatlas::query::DependencyGraph, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(graph)?);
    } else {
        for node in &graph.nodes {
            println!("{}{}", "  ".repeat(node.depth as usize), node.name);
        }
        for edge in &graph.edges {
            println!("{} --{}--> {}", edge.source, edge.kind, edge.target);
        }
    }
    Ok(())
}
