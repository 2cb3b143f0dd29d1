//! Error types for PDF Locator MCP Server

use std::fmt;
use thiserror::Error;

/// Result type alias for PDF Locator MCP Server
pub type Result<T> = std::result::Result<T, Error>;

/// Why a page range expression was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeErrorKind {
    /// Expression (or every segment of it) is blank
    EmptyRange,
    /// Single page token is not a number in `1..=total`
    InvalidPageNumber { token: String, total: u32 },
    /// Interval start token is not a positive integer
    InvalidStart { token: String },
    /// Interval end token is not a positive integer
    InvalidEnd { token: String },
    /// Interval start is after its end
    RangeInverted { start: u32, end: u32 },
    /// Interval starts past the last page
    RangeOutOfBounds { start: u32, total: u32 },
}

impl fmt::Display for RangeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeErrorKind::EmptyRange => write!(f, "page range is empty"),
            RangeErrorKind::InvalidPageNumber { token, total } => write!(
                f,
                "invalid page number \"{}\" (expected 1 to {})",
                token, total
            ),
            RangeErrorKind::InvalidStart { token } => {
                write!(f, "invalid range start \"{}\"", token)
            }
            RangeErrorKind::InvalidEnd { token } => write!(f, "invalid range end \"{}\"", token),
            RangeErrorKind::RangeInverted { start, end } => {
                write!(f, "range start {} is greater than end {}", start, end)
            }
            RangeErrorKind::RangeOutOfBounds { start, total } => write!(
                f,
                "range start {} is beyond the last page (total: {})",
                start, total
            ),
        }
    }
}

/// A rejected page range expression.
///
/// `segment` holds the offending comma-separated piece when the failure is
/// local to one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRangeError {
    pub segment: Option<String>,
    pub kind: RangeErrorKind,
}

impl InvalidRangeError {
    pub(crate) fn empty() -> Self {
        Self {
            segment: None,
            kind: RangeErrorKind::EmptyRange,
        }
    }

    pub(crate) fn in_segment(segment: &str, kind: RangeErrorKind) -> Self {
        Self {
            segment: Some(segment.to_string()),
            kind,
        }
    }
}

impl fmt::Display for InvalidRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.segment {
            Some(segment) => write!(f, "segment \"{}\": {}", segment, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for InvalidRangeError {}

/// Error types for PDF Locator MCP Server
#[derive(Error, Debug)]
pub enum Error {
    /// Page range expression could not be resolved
    #[error("Invalid page range: {0}")]
    InvalidPageRange(#[from] InvalidRangeError),

    /// Search pattern failed to compile
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Scanning one page ran past its time budget
    #[error("Search timed out after {timeout_ms}ms on page {page}")]
    SearchTimeout { page: u32, timeout_ms: u64 },

    /// Text of a single page could not be extracted
    #[error("Failed to extract text from page {page}: {reason}")]
    PageText { page: u32, reason: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected and no (or a wrong) password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// Bad configuration value
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted;
    /// range and pattern errors describe the caller's own input and pass through.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidPageRange(e) => format!("Invalid page range: {}", e),
            Error::InvalidPattern { pattern, reason } => {
                format!("Invalid pattern {:?}: {}", pattern, reason)
            }
            Error::SearchTimeout { timeout_ms, .. } => {
                format!("Search timed out after {}ms", timeout_ms)
            }
            Error::PageText { .. } => "Failed to extract page text".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::Config { reason } => format!("Invalid configuration: {}", reason),
        }
    }
}
