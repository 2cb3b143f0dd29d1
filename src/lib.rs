//! PDF Locator MCP Server Library
//!
//! Finds text in PDF documents. The [`locator`] module holds the engine:
//! page range resolution and a bounded literal/regex search over per-page
//! text. The server exposes it as MCP tools:
//! - `search`: Search PDF text with context snippets and stop conditions
//! - `extract_text`: Extract text content from selected pages
//! - `extract_metadata`: Extract document metadata
//! - `extract_outline`: Extract PDF bookmarks/table of contents
//! - `resolve_pages`: Resolve a page range expression

pub mod config;
pub mod error;
pub mod locator;
pub mod pdf;
pub mod server;
pub mod source;

pub use config::{SearchDefaults, ServerConfig};
pub use error::{Error, InvalidRangeError, RangeErrorKind, Result};
pub use locator::{
    resolve_page_range, search_across_pages, search_document, search_with_pattern,
    CompiledPattern, PageSearchResult, PageSet, PageTextSource, PatternSpec, SearchOptions,
    SearchOutcome, Snippet, StopReason,
};
pub use server::{run_server, run_server_with_config, PdfLocatorServer};
pub use source::DocumentSource;
