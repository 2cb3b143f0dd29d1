//! Integration tests for the PDF Locator MCP Server

use base64::Engine;
use pdf_locator_mcp::locator::extract_context;
use pdf_locator_mcp::pdf::PdfReader;
use pdf_locator_mcp::source::{DocumentSource, SourceResolver};
use pdf_locator_mcp::{
    resolve_page_range, search_across_pages, search_document, CompiledPattern, Error, PageSet,
    RangeErrorKind, SearchOptions, ServerConfig, StopReason,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::time::Duration;

fn paper() -> PdfReader {
    PdfReader::from_page_texts([
        "Trace-based JIT compilation for JavaScript.",
        "Loops are recorded as traces.",
        "Type-specialized traces run fast.",
        "Related work: Dynamo, HotpathVM.",
        "Conclusions about traces and JavaScript.",
    ])
}

// ============================================================================
// Page ranges
// ============================================================================

#[rstest]
#[case(1)]
#[case(7)]
#[case(250)]
fn test_open_ended_range_covers_document(#[case] total: u32) {
    let pages = resolve_page_range("1:", total).unwrap();
    assert_eq!(pages.into_vec(), (1..=total).collect::<Vec<_>>());
}

#[rstest]
#[case("2,4,6", vec![2, 4, 6])]
#[case("3:3", vec![3])]
#[case("1:100", (1..=10).collect())]
#[case("1:3,2:4", vec![1, 2, 3, 4])]
#[case(" 9 , :2 ", vec![1, 2, 9])]
fn test_range_resolution(#[case] expression: &str, #[case] expected: Vec<u32>) {
    assert_eq!(
        resolve_page_range(expression, 10).unwrap().into_vec(),
        expected
    );
}

#[test]
fn test_range_errors() {
    let err = resolve_page_range("5:2", 10).unwrap_err();
    assert_eq!(
        err.kind,
        RangeErrorKind::RangeInverted { start: 5, end: 2 }
    );

    let err = resolve_page_range("100", 10).unwrap_err();
    assert!(matches!(err.kind, RangeErrorKind::InvalidPageNumber { .. }));
    assert_eq!(err.segment.as_deref(), Some("100"));

    let err = resolve_page_range("", 10).unwrap_err();
    assert_eq!(err.kind, RangeErrorKind::EmptyRange);
}

// ============================================================================
// Pattern search
// ============================================================================

#[test]
fn test_literal_pattern_is_not_a_regex() {
    let doc = PdfReader::from_page_texts(["a.b and axb, also A.B"]);
    let outcome = search_document(&doc, None, "a.b", &SearchOptions::default()).unwrap();

    assert_eq!(outcome.total_matches(), 2);
    let snippets = &outcome.matches[0].snippets;
    let found: Vec<&str> = snippets
        .iter()
        .map(|s| &s.text[s.match_start..s.match_end])
        .collect();
    assert_eq!(found, vec!["a.b", "A.B"]);
}

#[test]
fn test_regex_pattern_offsets() {
    let pattern = CompiledPattern::compile("/\\d+/g").unwrap();
    assert!(pattern.is_regex());

    let found: Vec<(usize, usize)> = pattern
        .regex()
        .find_iter("p1 has 42 and 7")
        .map(|m| (m.start(), m.end()))
        .collect();
    assert_eq!(found, vec![(1, 2), (7, 9), (14, 15)]);
}

#[test]
fn test_context_window_clamps() {
    let text = "0123456789ABCDE";
    let found = pdf_locator_mcp::locator::Match {
        start: 7,
        end: 9,
        text: "78".to_string(),
    };
    let snippet = extract_context(text, &found, 5);
    assert_eq!(snippet.text, "23456789ABCD");
    assert_eq!(&snippet.text[snippet.match_start..snippet.match_end], "78");

    let snippet = extract_context(text, &found, 100);
    assert_eq!(snippet.text, text);
    assert_eq!((snippet.match_start, snippet.match_end), (7, 9));
}

#[test]
fn test_full_search_completes() {
    let doc = paper();
    let outcome = search_document(&doc, None, "traces", &SearchOptions::default()).unwrap();

    assert!(outcome.completed);
    assert_eq!(outcome.stopped_reason, None);
    assert_eq!(outcome.pages_scanned, 5);
    let pages: Vec<u32> = outcome.matches.iter().map(|m| m.page).collect();
    assert_eq!(pages, vec![2, 3, 5]);
    assert!(outcome.errors.is_empty());
}

#[test]
fn test_max_results_stops_after_page() {
    let doc = paper();
    let options = SearchOptions::new().with_max_results(Some(1));
    let outcome = search_document(&doc, None, "javascript", &options).unwrap();

    assert_eq!(outcome.total_matches(), 1);
    assert_eq!(outcome.matches[0].page, 1);
    assert!(!outcome.completed);
    assert_eq!(outcome.stopped_reason, Some(StopReason::MaxResults));
    assert_eq!(outcome.pages_scanned, 1);
}

#[test]
fn test_max_pages_scanned_stops_regardless_of_matches() {
    let doc = paper();
    let options = SearchOptions::new().with_max_pages_scanned(Some(1));
    let outcome = search_document(&doc, Some("4:"), "/\\w+/", &options).unwrap();

    assert_eq!(outcome.pages_scanned, 1);
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].page, 4);
    assert_eq!(outcome.stopped_reason, Some(StopReason::MaxPagesScanned));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["stopped_reason"], "max_pages");
}

#[test]
fn test_timed_out_page_is_reported_and_scan_continues() {
    // Roughly 16 MB per page: far more than a millisecond of scanning
    let filler = "é".repeat(8_000_000);
    let doc = PdfReader::from_page_texts([
        format!("Zq1 {}", filler),
        "Zq1 on a short page".to_string(),
        filler,
        "and Zq1 again".to_string(),
    ]);
    let pattern = CompiledPattern::compile("/\\w{3}\\d|Zq1/").unwrap();
    let options = SearchOptions::new().with_timeout(Duration::from_millis(1));

    let outcome = search_across_pages(&doc, &PageSet::all(4), &pattern, &options);

    assert!(outcome.completed);
    assert_eq!(outcome.pages_scanned, 4);
    assert_eq!(
        outcome.errors,
        vec![
            "Page 1: Search timed out after 1ms".to_string(),
            "Page 3: Search timed out after 1ms".to_string(),
        ]
    );
    let pages: Vec<u32> = outcome.matches.iter().map(|m| m.page).collect();
    assert_eq!(pages, vec![2, 4]);
}

#[test]
fn test_zero_budget_times_out_every_page() {
    let doc = paper();
    let pattern = CompiledPattern::compile("traces").unwrap();
    let options = SearchOptions::new().with_timeout(Duration::ZERO);

    let outcome = search_across_pages(&doc, &PageSet::all(5), &pattern, &options);

    assert!(outcome.matches.is_empty());
    assert_eq!(outcome.errors.len(), 5);
    assert_eq!(outcome.errors[3], "Page 4: Search timed out after 0ms");
}

#[test]
fn test_input_errors_surface_before_scanning() {
    let doc = paper();

    let err = search_document(&doc, Some("9"), "trace", &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidPageRange(_)));

    let err = search_document(&doc, None, "/(/", &SearchOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidPattern { .. }));
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn test_base64_source_resolution() {
    let resolver = SourceResolver::new(&ServerConfig::default());
    let data = b"%PDF-1.4\n%%EOF\n".to_vec();
    let source = DocumentSource::Base64 {
        base64: base64::engine::general_purpose::STANDARD.encode(&data),
    };

    let resolved = tokio_test::block_on(resolver.resolve(&source)).unwrap();
    assert_eq!(resolved.data, data);

    let not_pdf = DocumentSource::Base64 {
        base64: base64::engine::general_purpose::STANDARD.encode(b"hello"),
    };
    let err = tokio_test::block_on(resolver.resolve(&not_pdf)).unwrap_err();
    assert!(matches!(err, Error::InvalidPdf { .. }));
}
