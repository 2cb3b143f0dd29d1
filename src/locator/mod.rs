//! Text locator engine
//!
//! Resolves page range expressions and runs bounded pattern searches over
//! per-page text supplied by a [`PageTextSource`].

mod pattern;
mod range;
mod search;

pub use pattern::{CompiledPattern, PatternSpec};
pub use range::{resolve_page_range, PageSet};
pub use search::{
    extract_context, scan_page, search_across_pages, search_document, search_with_pattern, Match,
    PageSearchResult, PageTextSource, SearchOptions, SearchOutcome, Snippet, StopReason,
    DEFAULT_CONTEXT_CHARS, DEFAULT_TIMEOUT_MS, MAX_CONTEXT_CHARS, MAX_MATCHES_PER_PAGE,
};
