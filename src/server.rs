//! MCP Server implementation using rmcp

use crate::config::ServerConfig;
use crate::locator::{
    resolve_page_range, search_with_pattern, CompiledPattern, PageSet, SearchOutcome,
};
use crate::pdf::{OutlineItem, PdfReader};
use crate::source::{CacheManager, DocumentSource, SourceResolver};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SOURCE_FORMAT_HELP: &str = "Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}";

/// PDF Locator MCP Server
#[derive(Clone)]
pub struct PdfLocatorServer {
    cache: Arc<CacheManager>,
    resolver: SourceResolver,
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
}

/// A decoded document plus how the caller should refer to it
struct LoadedDocument {
    reader: Arc<PdfReader>,
    source_name: String,
    cache_key: Option<String>,
}

// ============================================================================
// Request/Response types for search
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// PDF sources to search in
    pub sources: Vec<DocumentSource>,
    /// Text to find (case-insensitive), or a regular expression written as /pattern/flags
    pub pattern: String,
    /// Pages to search, e.g. "1:5,8,10:" (default: all pages)
    #[serde(default)]
    pub pages: Option<String>,
    /// Characters of context on each side of a match (default: 150, max: 1000)
    #[serde(default)]
    pub context_chars: Option<usize>,
    /// Time budget per page in milliseconds (default: 10000)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Stop after the page on which this many matches have been collected
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Stop after visiting this many pages
    #[serde(default)]
    pub max_pages_scanned: Option<usize>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Keep the decoded document for later calls and return its cache key
    #[serde(default)]
    pub cache: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SearchResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(flatten)]
    pub outcome: SearchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for extract_text
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractTextParams {
    /// PDF sources to process
    pub sources: Vec<DocumentSource>,
    /// Pages to extract, e.g. "1:5,8,10:" (default: all pages)
    #[serde(default)]
    pub pages: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Keep the decoded document for later calls and return its cache key
    #[serde(default)]
    pub cache: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PageContent {
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractTextResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub page_count: u32,
    pub pages: Vec<PageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for extract_metadata and extract_outline
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DocumentParams {
    /// PDF sources to process
    pub sources: Vec<DocumentSource>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Keep the decoded document for later calls and return its cache key
    #[serde(default)]
    pub cache: bool,
}

#[derive(Debug, Default, Serialize, JsonSchema)]
pub struct ExtractMetadataResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct OutlineEntry {
    /// Title of the bookmark
    pub title: String,
    /// Destination page number (1-indexed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Child entries
    pub children: Vec<OutlineEntry>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ExtractOutlineResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub outline: Vec<OutlineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for resolve_pages
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResolvePagesParams {
    /// Range expression, e.g. "1:5,8,10:"
    pub pages: String,
    /// Number of pages in the document
    pub page_count: u32,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ResolvePagesResult {
    /// Resolved page numbers, ascending and unique
    pub pages: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfLocatorServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new server with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            cache: Arc::new(CacheManager::new(
                config.cache_max_entries,
                config.cache_max_bytes,
            )),
            resolver: SourceResolver::new(&config),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Search PDF text for a literal string or a regular expression
    #[tool(
        description = "Search PDF text and return matching pages with context snippets. The pattern is literal, case-insensitive text unless written as /regex/flags (flags: i, m, s; g and u are implied). Optional page range (\"1:5,8,10:\"), context width, per-page timeout, and limits on total matches or pages scanned. The result reports pages_scanned, completed, stopped_reason (max_results or max_pages) and per-page errors.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn search(&self, Parameters(params): Parameters<SearchParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_search(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "search failed");
                    SearchResult {
                        source: source.display_name(),
                        cache_key: None,
                        outcome: SearchOutcome::default(),
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Extract text content from PDF files
    #[tool(
        description = "Extract plain text from PDF pages. Optional page range such as \"1:5,8,10:\" (a bare number is one page, missing bounds mean first/last page).

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn extract_text(&self, Parameters(params): Parameters<ExtractTextParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_text(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_text failed");
                    ExtractTextResult {
                        source: source.display_name(),
                        cache_key: None,
                        page_count: 0,
                        pages: vec![],
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Extract PDF metadata
    #[tool(
        description = "Extract PDF metadata (title, author, dates, page count, etc.).

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn extract_metadata(&self, Parameters(params): Parameters<DocumentParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_metadata(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_metadata failed");
                    ExtractMetadataResult {
                        source: source.display_name(),
                        error: Some(e.client_message()),
                        ..ExtractMetadataResult::default()
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Extract PDF bookmarks/table of contents
    #[tool(
        description = "Extract PDF bookmarks/table of contents with page numbers and hierarchy.

Source format: each element must be one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn extract_outline(&self, Parameters(params): Parameters<DocumentParams>) -> String {
        let mut results = Vec::new();

        for source in &params.sources {
            let result = self
                .process_extract_outline(source, &params)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "extract_outline failed");
                    ExtractOutlineResult {
                        source: source.display_name(),
                        cache_key: None,
                        outline: vec![],
                        error: Some(e.client_message()),
                    }
                });
            results.push(result);
        }

        let response = serde_json::json!({ "results": results });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Resolve a page range expression without opening a document
    #[tool(
        description = "Resolve a page range expression against a page count. Segments are comma-separated: \"N\" for one page, \"A:B\" for an interval, with A defaulting to 1 and B to the last page. Returns the ascending, de-duplicated page list or the reason the expression is invalid."
    )]
    async fn resolve_pages(&self, Parameters(params): Parameters<ResolvePagesParams>) -> String {
        let result = match resolve_page_range(&params.pages, params.page_count) {
            Ok(pages) => ResolvePagesResult {
                pages: pages.into_vec(),
                error: None,
            },
            Err(e) => ResolvePagesResult {
                pages: vec![],
                error: Some(crate::error::Error::from(e).client_message()),
            },
        };

        serde_json::to_string_pretty(&result).unwrap_or_default()
    }
}

impl PdfLocatorServer {
    /// Decode a source, or fetch it from the cache for `cache_key` sources
    async fn load_document(
        &self,
        source: &DocumentSource,
        password: Option<&str>,
        cache: bool,
    ) -> crate::error::Result<LoadedDocument> {
        if let DocumentSource::CacheRef { cache_key } = source {
            let reader =
                self.cache
                    .get(cache_key)
                    .ok_or_else(|| crate::error::Error::CacheKeyNotFound {
                        key: cache_key.clone(),
                    })?;
            return Ok(LoadedDocument {
                reader,
                source_name: source.display_name(),
                cache_key: Some(cache_key.clone()),
            });
        }

        let resolved = self.resolver.resolve(source).await?;
        let data = resolved.data;
        let password = password.map(str::to_string);

        // Move CPU-heavy PDF work to blocking thread pool
        let reader = tokio::task::spawn_blocking(move || {
            PdfReader::open_bytes(&data, password.as_deref())
        })
        .await
        .map_err(|e| crate::error::Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;
        let reader = Arc::new(reader);

        let cache_key = if cache {
            let key = self.cache.insert(Arc::clone(&reader));
            if key.is_none() {
                tracing::warn!(source = %resolved.source_name, "document too large to cache");
            }
            key
        } else {
            None
        };

        Ok(LoadedDocument {
            reader,
            source_name: resolved.source_name,
            cache_key,
        })
    }

    async fn process_search(
        &self,
        source: &DocumentSource,
        params: &SearchParams,
    ) -> crate::error::Result<SearchResult> {
        // Bad patterns are rejected before any document work
        let pattern = CompiledPattern::compile(&params.pattern)?;
        let options = self.config.search.options(
            params.context_chars,
            params.timeout_ms,
            params.max_results,
            params.max_pages_scanned,
        );

        let document = match self
            .load_document(source, params.password.as_deref(), params.cache)
            .await
        {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "search source unavailable");
                return Ok(SearchResult {
                    source: source.display_name(),
                    cache_key: None,
                    outcome: SearchOutcome::failed(e.client_message()),
                    error: None,
                });
            }
        };

        let reader = Arc::clone(&document.reader);
        let pages = params.pages.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            search_with_pattern(&*reader, pages.as_deref(), &pattern, &options)
        })
        .await
        .map_err(|e| crate::error::Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        Ok(SearchResult {
            source: document.source_name,
            cache_key: document.cache_key,
            outcome,
            error: None,
        })
    }

    async fn process_extract_text(
        &self,
        source: &DocumentSource,
        params: &ExtractTextParams,
    ) -> crate::error::Result<ExtractTextResult> {
        let document = self
            .load_document(source, params.password.as_deref(), params.cache)
            .await?;
        let page_count = document.reader.page_count();

        let pages = match params.pages.as_deref() {
            Some(expression) => resolve_page_range(expression, page_count)?,
            None => PageSet::all(page_count),
        };
        let pages = document
            .reader
            .pages_text(&pages)?
            .into_iter()
            .map(|(page, text)| PageContent { page, text })
            .collect();

        Ok(ExtractTextResult {
            source: document.source_name,
            cache_key: document.cache_key,
            page_count,
            pages,
            error: None,
        })
    }

    async fn process_extract_metadata(
        &self,
        source: &DocumentSource,
        params: &DocumentParams,
    ) -> crate::error::Result<ExtractMetadataResult> {
        let document = self
            .load_document(source, params.password.as_deref(), params.cache)
            .await?;
        let meta = document.reader.metadata().clone();

        Ok(ExtractMetadataResult {
            source: document.source_name,
            cache_key: document.cache_key,
            title: meta.title,
            author: meta.author,
            subject: meta.subject,
            creator: meta.creator,
            producer: meta.producer,
            creation_date: meta.creation_date,
            modification_date: meta.modification_date,
            page_count: document.reader.page_count(),
            error: None,
        })
    }

    async fn process_extract_outline(
        &self,
        source: &DocumentSource,
        params: &DocumentParams,
    ) -> crate::error::Result<ExtractOutlineResult> {
        let document = self
            .load_document(source, params.password.as_deref(), params.cache)
            .await?;

        Ok(ExtractOutlineResult {
            source: document.source_name,
            cache_key: document.cache_key,
            outline: Self::convert_outline(document.reader.outline()),
            error: None,
        })
    }

    fn convert_outline(items: &[OutlineItem]) -> Vec<OutlineEntry> {
        items
            .iter()
            .map(|item| OutlineEntry {
                title: item.title.clone(),
                page: item.page,
                children: Self::convert_outline(&item.children),
            })
            .collect()
    }
}

impl Default for PdfLocatorServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfLocatorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "PDF Locator MCP Server finds text in PDFs. Use `search` with a literal or /regex/flags pattern and an optional page range, `extract_text` to read pages, `resolve_pages` to check a range expression, and `extract_metadata`/`extract_outline` for document structure. {}",
                SOURCE_FORMAT_HELP
            )),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = PdfLocatorServer::with_config(config);

    tracing::info!("PDF Locator MCP Server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
