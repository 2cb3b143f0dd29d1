//! Page range resolution
//!
//! A range expression is a comma-separated list of segments. Each segment is
//! either a single page (`"7"`) or an interval (`"2:5"`, `"3:"`, `":4"`, `":"`).
//! Missing interval bounds default to the first and last page. An interval end
//! past the last page is clamped; an interval start past it is an error.

use crate::error::{InvalidRangeError, RangeErrorKind};

/// Resolved set of 1-indexed page numbers, ascending and without duplicates
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSet {
    pages: Vec<u32>,
}

impl PageSet {
    /// Every page of a document with `total_pages` pages
    pub fn all(total_pages: u32) -> Self {
        Self {
            pages: (1..=total_pages).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.binary_search(&page).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.pages
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.pages
    }
}

impl<'a> IntoIterator for &'a PageSet {
    type Item = u32;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter().copied()
    }
}

/// Resolve a range expression against a document with `total_pages` pages.
///
/// Fails on the first bad segment; no partial result is produced.
pub fn resolve_page_range(
    expression: &str,
    total_pages: u32,
) -> std::result::Result<PageSet, InvalidRangeError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(InvalidRangeError::empty());
    }

    let segments: Vec<&str> = expression
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(InvalidRangeError::empty());
    }

    let mut spans = Vec::with_capacity(segments.len());
    for segment in segments {
        let span = resolve_segment(segment, total_pages)
            .map_err(|kind| InvalidRangeError::in_segment(segment, kind))?;
        spans.push(span);
    }
    spans.sort_unstable();

    // Merge sorted spans; work is bounded by the pages emitted
    let mut pages = Vec::new();
    let mut last_emitted: Option<u32> = None;
    for (start, end) in spans {
        let from = match last_emitted {
            Some(last) if last >= end => continue,
            Some(last) => start.max(last + 1),
            None => start,
        };
        pages.extend(from..=end);
        last_emitted = Some(end);
    }

    Ok(PageSet { pages })
}

/// Resolve one segment to an inclusive, in-bounds `(start, end)` pair
fn resolve_segment(
    segment: &str,
    total_pages: u32,
) -> std::result::Result<(u32, u32), RangeErrorKind> {
    let Some((start_token, end_token)) = segment.split_once(':') else {
        let page = parse_positive(segment)
            .filter(|&n| n <= total_pages)
            .ok_or_else(|| RangeErrorKind::InvalidPageNumber {
                token: segment.to_string(),
                total: total_pages,
            })?;
        return Ok((page, page));
    };

    // Only the first two colon-separated parts are significant
    let end_token = end_token.split(':').next().unwrap_or_default();
    let (start_token, end_token) = (start_token.trim(), end_token.trim());

    let start = if start_token.is_empty() {
        1
    } else {
        parse_positive(start_token).ok_or_else(|| RangeErrorKind::InvalidStart {
            token: start_token.to_string(),
        })?
    };
    let end = if end_token.is_empty() {
        total_pages
    } else {
        parse_positive(end_token).ok_or_else(|| RangeErrorKind::InvalidEnd {
            token: end_token.to_string(),
        })?
    };

    if start > end {
        return Err(RangeErrorKind::RangeInverted { start, end });
    }
    if start > total_pages {
        return Err(RangeErrorKind::RangeOutOfBounds {
            start,
            total: total_pages,
        });
    }

    Ok((start, end.min(total_pages)))
}

fn parse_positive(token: &str) -> Option<u32> {
    token.parse::<u32>().ok().filter(|&n| n >= 1)
}
