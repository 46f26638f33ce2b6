//! MCP (Model Context Protocol) server over the query facade.
//!
//! Exposes the read-only query surface as MCP tools plus stdio transport.
//! Tool responses are JSON text content so agents can parse them directly;
//! unknown names come back as structured empty results, not errors.

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorCode, ErrorData as McpError, Implementation,
        ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    schemars, tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::query::QueryFacade;
use crate::storage::SearchOptions;
use crate::types::SymbolKind;

fn internal(err: StoreError) -> McpError {
    McpError::new(ErrorCode::INTERNAL_ERROR, err.to_string(), None)
}

fn json_content<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(rendered)]))
}

fn default_depth() -> u32 {
    3
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SearchSymbolsRequest {
    /// Substring to match against symbol names, case-insensitive
    pub query: String,
    /// Filter by symbol kind (e.g. "function", "class", "type-alias")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Filter by language tag (e.g. "go", "python", "rust")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Glob over owning file paths (e.g. "src/**/*.rs")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    /// Maximum number of results (default 50)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct FindSymbolRequest {
    /// Exact name of the symbol
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct FindReferencesRequest {
    /// Exact name of the referenced symbol
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct GetFileStructureRequest {
    /// Path of the file, relative to the project root
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct GetProjectOverviewRequest {}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct DependencyGraphRequest {
    /// Symbol name to start the traversal from
    pub name: String,
    /// Maximum traversal depth (default 3)
    #[serde(default = "default_depth")]
    pub max_depth: u32,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct AnalyzeImpactRequest {
    /// Symbol name whose change impact to estimate
    pub name: String,
    /// Maximum traversal depth (default 3)
    #[serde(default = "default_depth")]
    pub max_depth: u32,
}

/// MCP server wrapping the read-only query facade.
#[derive(Clone)]
pub struct CodeIndexServer {
    facade: QueryFacade,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CodeIndexServer {
    pub fn new(facade: QueryFacade) -> Self {
        Self {
            facade,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Search indexed symbols by name substring, with kind/language/path filters")]
    pub async fn search_symbols(
        &self,
        Parameters(request): Parameters<SearchSymbolsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let kind = match request.kind.as_deref() {
            Some(raw) => match SymbolKind::parse(raw) {
                Some(kind) => Some(kind),
                None => {
                    return Ok(CallToolResult::error(vec![Content::text(format!(
                        "unknown symbol kind '{raw}'"
                    ))]));
                }
            },
            None => None,
        };
        let options = SearchOptions {
            query: Some(request.query),
            kind,
            language: request.language,
            file_pattern: request.file_pattern,
            limit: request.limit,
        };
        let symbols = self.facade.search_symbols(&options).map_err(internal)?;
        json_content(&symbols)
    }

    #[tool(description = "Look up a symbol by exact name, with all of its recorded references")]
    pub async fn find_symbol(
        &self,
        Parameters(FindSymbolRequest { name }): Parameters<FindSymbolRequest>,
    ) -> Result<CallToolResult, McpError> {
        let details = self.facade.get_symbol_details(&name).map_err(internal)?;
        if details.symbol.is_none() {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "no symbol named '{name}'"
            ))]));
        }
        json_content(&details)
    }

    #[tool(description = "List every recorded usage site of a symbol name")]
    pub async fn find_references(
        &self,
        Parameters(FindReferencesRequest { name }): Parameters<FindReferencesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let references = self.facade.find_references(&name).map_err(internal)?;
        json_content(&references)
    }

    #[tool(description = "Symbols and imports of one file, by project-relative path")]
    pub async fn get_file_structure(
        &self,
        Parameters(GetFileStructureRequest { path }): Parameters<GetFileStructureRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.facade.get_file_structure(&path).map_err(internal)? {
            Some(structure) => json_content(&structure),
            None => Ok(CallToolResult::success(vec![Content::text(format!(
                "'{path}' is not in the index"
            ))])),
        }
    }

    #[tool(description = "Project totals: file count, symbol count, per-language stats")]
    pub async fn get_project_overview(
        &self,
        Parameters(_request): Parameters<GetProjectOverviewRequest>,
    ) -> Result<CallToolResult, McpError> {
        match self.facade.get_project_overview().map_err(internal)? {
            Some(overview) => json_content(&overview),
            None => Ok(CallToolResult::success(vec![Content::text(
                "project row missing; run a full index first",
            )])),
        }
    }

    #[tool(description = "Breadth-first dependency graph from a symbol, depth-bounded and cycle-safe")]
    pub async fn get_dependency_graph(
        &self,
        Parameters(DependencyGraphRequest { name, max_depth }): Parameters<DependencyGraphRequest>,
    ) -> Result<CallToolResult, McpError> {
        let graph = self
            .facade
            .build_dependency_graph(&name, max_depth)
            .map_err(internal)?;
        json_content(&graph)
    }

    #[tool(description = "Reverse dependency traversal: what is affected if this symbol changes")]
    pub async fn analyze_impact(
        &self,
        Parameters(AnalyzeImpactRequest { name, max_depth }): Parameters<AnalyzeImpactRequest>,
    ) -> Result<CallToolResult, McpError> {
        let graph = self
            .facade
            .analyze_impact(&name, max_depth)
            .map_err(internal)?;
        json_content(&graph)
    }
}

#[tool_handler]
impl ServerHandler for CodeIndexServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::new("codeatlas", env!("CARGO_PKG_VERSION"));
        server_info.title = Some("codeatlas project index".to_string());
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_protocol_version(ProtocolVersion::V_2024_11_05)
            .with_server_info(server_info)
            .with_instructions(
                "Query a persistent symbol index of this project. Start with \
                 'search_symbols' to locate candidates, then 'find_symbol' for \
                 details and references. 'get_file_structure' lists one file's \
                 declarations and imports. 'get_dependency_graph' and \
                 'analyze_impact' walk the relationship graph forward and \
                 backward. 'get_project_overview' reports index totals.",
            )
    }
}

/// Serve the MCP tools over stdio until the client disconnects.
pub async fn serve_stdio(facade: QueryFacade) -> anyhow::Result<()> {
    use rmcp::{ServiceExt, transport::stdio};

    let server = CodeIndexServer::new(facade);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
