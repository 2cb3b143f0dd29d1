//! Performance benchmarks for the text locator
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_locator_mcp::pdf::PdfReader;
use pdf_locator_mcp::{resolve_page_range, search_document, SearchOptions};

/// Synthetic document: each page repeats a paragraph with a page marker
fn synthetic_document(pages: usize) -> PdfReader {
    let paragraph = "Trace trees record hot loops and compile them to native code. \
                     Side exits fall back to the interpreter when a guard fails. ";
    PdfReader::from_page_texts(
        (1..=pages).map(|n| format!("Page {} section {}. {}", n, n * 7, paragraph.repeat(40))),
    )
}

fn bench_range_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_resolution");

    for expression in ["1:", "1:10,20,30:40", "1:500,250:1000,999"] {
        group.bench_with_input(
            BenchmarkId::from_parameter(expression),
            expression,
            |b, expression| {
                b.iter(|| resolve_page_range(black_box(expression), 1000).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let doc = synthetic_document(200);
    let options = SearchOptions::default();

    let mut group = c.benchmark_group("search");
    group.throughput(Throughput::Bytes(doc.text_bytes() as u64));

    for pattern in ["interpreter", "/guard\\s+fails/i", "/\\d+/g"] {
        group.bench_with_input(BenchmarkId::from_parameter(pattern), pattern, |b, pattern| {
            b.iter(|| search_document(&doc, None, black_box(pattern), &options).unwrap());
        });
    }

    group.finish();
}

fn bench_search_limits(c: &mut Criterion) {
    let doc = synthetic_document(200);
    let limited = SearchOptions::new().with_max_results(Some(50));

    c.bench_function("search_max_results_50", |b| {
        b.iter(|| search_document(&doc, None, black_box("loops"), &limited).unwrap());
    });
}

criterion_group!(benches, bench_range_resolution, bench_search, bench_search_limits);
criterion_main!(benches);
