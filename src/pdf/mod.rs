//! PDF processing layer
//!
//! This module decodes PDFs into per-page text using PDFium.

mod reader;

pub use reader::{OutlineItem, PdfMetadataInfo, PdfReader};
