//! Bounded pattern search across document pages
//!
//! Pages are scanned one at a time in ascending order. Each page scan has its
//! own wall-clock budget and a hard match cap; a page that fails or times out
//! is recorded in the outcome's `errors` and the scan moves on. Global limits
//! (`max_results`, `max_pages_scanned`) are checked between pages, never in
//! the middle of one.

use crate::error::{Error, Result};
use crate::locator::pattern::CompiledPattern;
use crate::locator::range::{resolve_page_range, PageSet};
use schemars::JsonSchema;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Hard cap on matches collected from a single page
pub const MAX_MATCHES_PER_PAGE: usize = 10_000;

/// Default characters of context on each side of a match
pub const DEFAULT_CONTEXT_CHARS: usize = 150;

/// Upper bound applied to requested context widths
pub const MAX_CONTEXT_CHARS: usize = 1_000;

/// Default per-page scan budget in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Per-page text provider consumed by the search engine (1-indexed pages)
pub trait PageTextSource {
    /// Total number of pages. Failing here aborts the whole search.
    fn page_count(&self) -> Result<u32>;

    /// Text of one page. Failing here only skips that page.
    fn page_text(&self, page: u32) -> Result<&str>;
}

/// One match inside a page's text, in byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Window of page text around a match.
///
/// `match_start`/`match_end` are character offsets into `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Snippet {
    /// Page text surrounding the match
    pub text: String,
    /// Character offset of the match start within `text`
    pub match_start: usize,
    /// Character offset of the match end within `text`
    pub match_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PageSearchResult {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of matches found on the page
    pub match_count: usize,
    /// One snippet per match, in page order
    pub snippets: Vec<Snippet>,
}

/// Why a search ended before visiting every requested page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxResults,
    #[serde(rename = "max_pages")]
    MaxPagesScanned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct SearchOutcome {
    /// Pages with at least one match, ascending
    pub matches: Vec<PageSearchResult>,
    /// Per-page failures, or a single aggregate failure
    pub errors: Vec<String>,
    /// Pages visited, including ones that failed
    pub pages_scanned: usize,
    /// True only when every requested page was visited
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_reason: Option<StopReason>,
}

impl SearchOutcome {
    /// Outcome of a search that could not start
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn total_matches(&self) -> usize {
        self.matches.iter().map(|m| m.match_count).sum()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub context_chars: usize,
    /// Budget for scanning a single page
    pub timeout: Duration,
    pub max_results: Option<usize>,
    pub max_pages_scanned: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            context_chars: DEFAULT_CONTEXT_CHARS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_results: None,
            max_pages_scanned: None,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set context width, clamped to [`MAX_CONTEXT_CHARS`].
    pub fn with_context_chars(mut self, chars: usize) -> Self {
        self.context_chars = chars.min(MAX_CONTEXT_CHARS);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max: Option<usize>) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_max_pages_scanned(mut self, max: Option<usize>) -> Self {
        self.max_pages_scanned = max;
        self
    }
}

/// Bytes examined between deadline checks for bounded-length patterns
const SCAN_WINDOW_BYTES: usize = 64 * 1024;

/// Patterns that can match more than this are scanned without windows
const MAX_WINDOWED_MATCH_LEN: usize = 4 * SCAN_WINDOW_BYTES;

/// One bounded step of a page scan
enum Step<'t> {
    Found(regex::Match<'t>),
    /// No match starts before this offset
    Skip(usize),
    Done,
}

/// Next match starting at or after `pos`.
///
/// When the pattern's match length is bounded by `max_len`, only a window
/// `text[..end]` is searched. A match starting before `end - max_len` ends
/// strictly inside the window, so such matches are exactly the matches of
/// the full text; anything later is left for the next window.
fn next_match<'t>(pattern: &CompiledPattern, text: &'t str, pos: usize) -> Step<'t> {
    let window = pattern
        .max_match_len()
        .filter(|&max_len| max_len <= MAX_WINDOWED_MATCH_LEN)
        .map(|max_len| (max_len, pos.saturating_add(SCAN_WINDOW_BYTES + max_len)))
        .filter(|&(_, end)| end < text.len());

    let Some((max_len, end)) = window else {
        return pattern
            .regex()
            .find_at(text, pos)
            .map_or(Step::Done, Step::Found);
    };

    let end = floor_char_boundary(text, end);
    let settled = end - max_len;
    match pattern.regex().find_at(&text[..end], pos) {
        Some(found) if found.start() < settled => Step::Found(found),
        _ => Step::Skip(ceil_char_boundary(text, settled)),
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Enumerate non-overlapping matches on one page under a deadline.
///
/// The deadline is checked between matches, between scan windows and once
/// the page is exhausted. Stops quietly at [`MAX_MATCHES_PER_PAGE`]. If the
/// deadline passes first, everything found so far is dropped and
/// `SearchTimeout` is returned.
pub fn scan_page(
    pattern: &CompiledPattern,
    page: u32,
    text: &str,
    timeout: Duration,
) -> Result<Vec<Match>> {
    // An unrepresentable deadline means no deadline
    let deadline = Instant::now().checked_add(timeout);
    let check_deadline = || match deadline {
        Some(d) if Instant::now() >= d => Err(Error::SearchTimeout {
            page,
            timeout_ms: timeout.as_millis() as u64,
        }),
        _ => Ok(()),
    };

    let mut matches = Vec::new();
    let mut pos = 0;
    let mut last_end = None;

    while pos <= text.len() {
        check_deadline()?;

        let found = match next_match(pattern, text, pos) {
            Step::Found(found) => found,
            Step::Skip(next) => {
                pos = next;
                continue;
            }
            Step::Done => break,
        };

        // An empty match right where the previous one ended is not reported
        if found.start() == found.end() && Some(found.end()) == last_end {
            match text[pos..].chars().next() {
                Some(c) => pos += c.len_utf8(),
                None => break,
            }
            continue;
        }

        matches.push(Match {
            start: found.start(),
            end: found.end(),
            text: found.as_str().to_string(),
        });
        if matches.len() >= MAX_MATCHES_PER_PAGE {
            tracing::debug!(page, "per-page match cap reached");
            break;
        }
        pos = found.end();
        last_end = Some(found.end());
    }

    check_deadline()?;
    Ok(matches)
}

/// Cut a snippet of up to `context_chars` characters either side of a match.
///
/// The window is clamped to the text and snapped to character boundaries.
pub fn extract_context(text: &str, found: &Match, context_chars: usize) -> Snippet {
    let window_start = text[..found.start]
        .char_indices()
        .rev()
        .take(context_chars)
        .last()
        .map_or(found.start, |(idx, _)| idx);
    let window_end = text[found.end..]
        .char_indices()
        .nth(context_chars)
        .map_or(text.len(), |(idx, _)| found.end + idx);

    let match_start = text[window_start..found.start].chars().count();
    let match_end = match_start + text[found.start..found.end].chars().count();

    Snippet {
        text: text[window_start..window_end].to_string(),
        match_start,
        match_end,
    }
}

/// Scan `pages` of `source` in ascending order until exhausted or a limit hits.
pub fn search_across_pages<S: PageTextSource + ?Sized>(
    source: &S,
    pages: &PageSet,
    pattern: &CompiledPattern,
    options: &SearchOptions,
) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();
    let mut total_matches = 0usize;

    for page in pages {
        outcome.pages_scanned += 1;

        let scanned = source
            .page_text(page)
            .and_then(|text| Ok((text, scan_page(pattern, page, text, options.timeout)?)));

        match scanned {
            Ok((text, found)) => {
                tracing::debug!(page, matches = found.len(), "page scanned");
                if !found.is_empty() {
                    let snippets = found
                        .iter()
                        .map(|m| extract_context(text, m, options.context_chars))
                        .collect();
                    total_matches += found.len();
                    outcome.matches.push(PageSearchResult {
                        page,
                        match_count: found.len(),
                        snippets,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "page skipped");
                outcome
                    .errors
                    .push(format!("Page {}: {}", page, e.client_message()));
            }
        }

        if options.max_results.is_some_and(|max| total_matches >= max) {
            tracing::info!(total_matches, "search stopped at max_results");
            outcome.stopped_reason = Some(StopReason::MaxResults);
            return outcome;
        }
        if options
            .max_pages_scanned
            .is_some_and(|max| outcome.pages_scanned >= max)
        {
            tracing::info!(
                pages_scanned = outcome.pages_scanned,
                "search stopped at max_pages_scanned"
            );
            outcome.stopped_reason = Some(StopReason::MaxPagesScanned);
            return outcome;
        }
    }

    outcome.completed = true;
    outcome
}

/// Compile the pattern and search a whole document.
///
/// A bad pattern is returned as an error before any page is touched; the
/// rest follows [`search_with_pattern`].
pub fn search_document<S: PageTextSource + ?Sized>(
    source: &S,
    pages: Option<&str>,
    pattern: &str,
    options: &SearchOptions,
) -> Result<SearchOutcome> {
    let pattern = CompiledPattern::compile(pattern)?;
    search_with_pattern(source, pages, &pattern, options)
}

/// Resolve pages and search them with an already compiled pattern.
///
/// A bad range expression is returned as an error before any page is
/// touched. A source that cannot report its page count yields a failed
/// outcome rather than an error.
pub fn search_with_pattern<S: PageTextSource + ?Sized>(
    source: &S,
    pages: Option<&str>,
    pattern: &CompiledPattern,
    options: &SearchOptions,
) -> Result<SearchOutcome> {
    let total_pages = match source.page_count() {
        Ok(total) => total,
        Err(e) => {
            tracing::warn!(error = %e, "document text unavailable");
            return Ok(SearchOutcome::failed(e.client_message()));
        }
    };

    let pages = match pages {
        Some(expression) => resolve_page_range(expression, total_pages)?,
        None => PageSet::all(total_pages),
    };

    Ok(search_across_pages(source, &pages, pattern, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// In-memory pages; `None` entries fail extraction
    struct Pages(Vec<Option<String>>);

    impl Pages {
        fn of(texts: &[&str]) -> Self {
            Self(texts.iter().map(|t| Some(t.to_string())).collect())
        }
    }

    impl PageTextSource for Pages {
        fn page_count(&self) -> Result<u32> {
            Ok(self.0.len() as u32)
        }

        fn page_text(&self, page: u32) -> Result<&str> {
            self.0
                .get(page as usize - 1)
                .and_then(|text| text.as_deref())
                .ok_or_else(|| Error::PageText {
                    page,
                    reason: "unreadable".to_string(),
                })
        }
    }

    struct Broken;

    impl PageTextSource for Broken {
        fn page_count(&self) -> Result<u32> {
            Err(Error::Pdfium {
                reason: "document closed".to_string(),
            })
        }

        fn page_text(&self, page: u32) -> Result<&str> {
            Err(Error::PageText {
                page,
                reason: "document closed".to_string(),
            })
        }
    }

    fn scan(pattern: &str, text: &str) -> Vec<Match> {
        let pattern = CompiledPattern::compile(pattern).unwrap();
        scan_page(&pattern, 1, text, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_regex_offsets() {
        let found = scan("/\\d+/g", "p1 has 42 and 7");
        let spans: Vec<(usize, usize, &str)> = found
            .iter()
            .map(|m| (m.start, m.end, m.text.as_str()))
            .collect();
        assert_eq!(spans, vec![(1, 2, "1"), (7, 9, "42"), (14, 15, "7")]);
    }

    #[test]
    fn test_regex_without_global_flag_finds_all() {
        let found = scan("/\\d{2}/", "10 20 30");
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_literal_scan() {
        let found = scan("a.b", "a.b and axb and A.B");
        let starts: Vec<usize> = found.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 16]);
    }

    #[test]
    fn test_zero_width_pattern_is_capped() {
        let text = "x".repeat(MAX_MATCHES_PER_PAGE * 2);
        let found = scan("/a*/", &text);
        assert_eq!(found.len(), MAX_MATCHES_PER_PAGE);
    }

    #[test]
    fn test_scan_times_out() {
        let pattern = CompiledPattern::compile("needle").unwrap();
        let err = scan_page(&pattern, 7, "needle needle", Duration::ZERO).unwrap_err();
        assert!(matches!(
            err,
            Error::SearchTimeout {
                page: 7,
                timeout_ms: 0
            }
        ));
    }

    #[test]
    fn test_extract_context_window() {
        let text = "0123456789ABCDE";
        let found = Match {
            start: 7,
            end: 9,
            text: "78".to_string(),
        };
        let snippet = extract_context(text, &found, 5);
        assert_eq!(snippet.text, "23456789ABCD");
        assert_eq!((snippet.match_start, snippet.match_end), (5, 7));
        let chars: Vec<char> = snippet.text.chars().collect();
        let highlighted: String = chars[snippet.match_start..snippet.match_end]
            .iter()
            .collect();
        assert_eq!(highlighted, "78");
    }

    #[test]
    fn test_extract_context_clamps_at_edges() {
        let text = "abcdef";
        let found = Match {
            start: 1,
            end: 2,
            text: "b".to_string(),
        };
        let snippet = extract_context(text, &found, 10);
        assert_eq!(snippet.text, "abcdef");
        assert_eq!((snippet.match_start, snippet.match_end), (1, 2));

        let snippet = extract_context(text, &found, 0);
        assert_eq!(snippet.text, "b");
        assert_eq!((snippet.match_start, snippet.match_end), (0, 1));
    }

    #[test]
    fn test_extract_context_multibyte() {
        let text = "héllo wörld ünïcode";
        let found = scan("wörld", text).remove(0);
        let snippet = extract_context(text, &found, 3);
        assert_eq!(snippet.text, "lo wörld ün");
        assert_eq!((snippet.match_start, snippet.match_end), (3, 8));
    }

    #[test]
    fn test_search_completes() {
        let doc = Pages::of(&["alpha beta", "nothing", "beta beta"]);
        let pattern = CompiledPattern::compile("beta").unwrap();
        let outcome =
            search_across_pages(&doc, &PageSet::all(3), &pattern, &SearchOptions::new());

        assert!(outcome.completed);
        assert_eq!(outcome.stopped_reason, None);
        assert_eq!(outcome.pages_scanned, 3);
        assert!(outcome.errors.is_empty());
        let pages: Vec<(u32, usize)> = outcome
            .matches
            .iter()
            .map(|m| (m.page, m.match_count))
            .collect();
        assert_eq!(pages, vec![(1, 1), (3, 2)]);
        assert_eq!(outcome.total_matches(), 3);
    }

    #[test]
    fn test_max_results_stops_after_page() {
        let doc = Pages::of(&["hit", "hit"]);
        let pattern = CompiledPattern::compile("hit").unwrap();
        let options = SearchOptions::new().with_max_results(Some(1));
        let outcome = search_across_pages(&doc, &PageSet::all(2), &pattern, &options);

        assert_eq!(outcome.total_matches(), 1);
        assert_eq!(outcome.pages_scanned, 1);
        assert!(!outcome.completed);
        assert_eq!(outcome.stopped_reason, Some(StopReason::MaxResults));
    }

    #[test]
    fn test_max_results_keeps_whole_page() {
        let doc = Pages::of(&["hit hit hit", "hit"]);
        let pattern = CompiledPattern::compile("hit").unwrap();
        let options = SearchOptions::new().with_max_results(Some(2));
        let outcome = search_across_pages(&doc, &PageSet::all(2), &pattern, &options);

        assert_eq!(outcome.total_matches(), 3);
        assert_eq!(outcome.stopped_reason, Some(StopReason::MaxResults));
    }

    #[test]
    fn test_max_pages_scanned() {
        let doc = Pages::of(&["none", "hit", "hit"]);
        let pattern = CompiledPattern::compile("hit").unwrap();
        let options = SearchOptions::new().with_max_pages_scanned(Some(1));
        let outcome = search_across_pages(&doc, &PageSet::all(3), &pattern, &options);

        assert_eq!(outcome.pages_scanned, 1);
        assert!(outcome.matches.is_empty());
        assert!(!outcome.completed);
        assert_eq!(outcome.stopped_reason, Some(StopReason::MaxPagesScanned));
    }

    /// Page whose scan takes far longer than a millisecond
    fn slow_page(prefix: &str) -> String {
        let mut text = prefix.to_string();
        text.push_str(&"é".repeat(8_000_000));
        text
    }

    #[test]
    fn test_overrunning_page_times_out() {
        let pattern = CompiledPattern::compile("/\\w{3}\\d|Zq1/").unwrap();
        let budget = Duration::from_millis(1);

        // Match found early, budget exhausted on the rest of the page
        let err = scan_page(&pattern, 1, &slow_page("Zq1 "), budget).unwrap_err();
        assert!(matches!(
            err,
            Error::SearchTimeout {
                page: 1,
                timeout_ms: 1
            }
        ));

        // No match anywhere on the page
        let err = scan_page(&pattern, 2, &slow_page(""), budget).unwrap_err();
        assert!(matches!(err, Error::SearchTimeout { page: 2, .. }));
    }

    #[test]
    fn test_timeout_is_scoped_to_page() {
        let doc = Pages(vec![
            Some(slow_page("Zq1 ")),
            Some(slow_page("")),
            Some("Zq1 fits the budget".to_string()),
        ]);
        let pattern = CompiledPattern::compile("/\\w{3}\\d|Zq1/").unwrap();
        let options = SearchOptions::new().with_timeout(Duration::from_millis(1));
        let outcome = search_across_pages(&doc, &PageSet::all(3), &pattern, &options);

        assert_eq!(
            outcome.errors,
            vec![
                "Page 1: Search timed out after 1ms",
                "Page 2: Search timed out after 1ms"
            ]
        );
        let pages: Vec<u32> = outcome.matches.iter().map(|m| m.page).collect();
        assert_eq!(pages, vec![3]);
        assert_eq!(outcome.pages_scanned, 3);
        assert!(outcome.completed);
    }

    #[rstest]
    #[case("needle")]
    #[case("/ab|abc/")]
    #[case("/\\bé\\w{0,3}/i")]
    #[case("/x?/")]
    #[case("/^abc/m")]
    #[case("/yz ab$/m")]
    #[case("/\\d+/")]
    fn test_windowed_scan_agrees_with_full_scan(#[case] raw: &str) {
        // Several scan windows long, with matches straddling window edges
        let text = "abc needle é xyz ab\n".repeat(9_000);
        let pattern = CompiledPattern::compile(raw).unwrap();

        let scanned: Vec<(usize, usize)> = scan_page(&pattern, 1, &text, Duration::from_secs(60))
            .unwrap()
            .iter()
            .map(|m| (m.start, m.end))
            .collect();
        let expected: Vec<(usize, usize)> = pattern
            .regex()
            .find_iter(&text)
            .take(MAX_MATCHES_PER_PAGE)
            .map(|m| (m.start(), m.end()))
            .collect();
        assert_eq!(scanned, expected);
    }

    #[test]
    fn test_page_extraction_error_is_recovered() {
        let doc = Pages(vec![Some("word".into()), None, Some("word".into())]);
        let pattern = CompiledPattern::compile("word").unwrap();
        let outcome =
            search_across_pages(&doc, &PageSet::all(3), &pattern, &SearchOptions::new());

        assert_eq!(outcome.errors, vec!["Page 2: Failed to extract page text"]);
        assert_eq!(outcome.matches.len(), 2);
        assert!(outcome.completed);
    }

    #[test]
    fn test_only_requested_pages_scanned() {
        let doc = Pages::of(&["x", "x", "x", "x"]);
        let outcome = search_document(&doc, Some("2,4"), "x", &SearchOptions::new()).unwrap();
        let pages: Vec<u32> = outcome.matches.iter().map(|m| m.page).collect();
        assert_eq!(pages, vec![2, 4]);
        assert_eq!(outcome.pages_scanned, 2);
    }

    #[test]
    fn test_search_document_input_errors() {
        let doc = Pages::of(&["x"]);
        assert!(matches!(
            search_document(&doc, Some("5"), "x", &SearchOptions::new()),
            Err(Error::InvalidPageRange(_))
        ));
        assert!(matches!(
            search_document(&doc, None, "/(/", &SearchOptions::new()),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_unavailable_document_fails_outcome() {
        let outcome = search_document(&Broken, None, "x", &SearchOptions::new()).unwrap();
        assert_eq!(outcome, SearchOutcome::failed("PDF processing error"));
        assert!(!outcome.completed);
        assert_eq!(outcome.pages_scanned, 0);
    }

    #[test]
    fn test_context_chars_clamped() {
        let options = SearchOptions::new().with_context_chars(50_000);
        assert_eq!(options.context_chars, MAX_CONTEXT_CHARS);
    }

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = SearchOutcome {
            matches: vec![PageSearchResult {
                page: 2,
                match_count: 1,
                snippets: vec![Snippet {
                    text: "a hit".to_string(),
                    match_start: 2,
                    match_end: 5,
                }],
            }],
            errors: vec![],
            pages_scanned: 2,
            completed: false,
            stopped_reason: Some(StopReason::MaxPagesScanned),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["stopped_reason"], "max_pages");
        assert_eq!(json["matches"][0]["snippets"][0]["match_end"], 5);

        let json = serde_json::to_value(SearchOutcome::default()).unwrap();
        assert!(json.get("stopped_reason").is_none());
    }
}
