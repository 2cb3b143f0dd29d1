//! PDF reader wrapper for PDFium
//!
//! Decodes a document once into plain per-page text, metadata and outline.
//! Text is taken in PDFium's content order; no layout reconstruction.

use crate::error::{Error, Result};
use crate::locator::{PageSet, PageTextSource};
use pdfium_render::prelude::*;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn has_pdf_header(data: &[u8]) -> bool {
    data.len() >= 4 && &data[0..4] == b"%PDF"
}

/// PDF metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfMetadataInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Outline entry (bookmark)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub title: String,
    /// Destination page (1-indexed)
    pub page: Option<u32>,
    pub children: Vec<OutlineItem>,
}

/// Decoded document: page texts plus descriptive data.
///
/// A page whose text could not be extracted keeps the failure reason so
/// searches can skip it without losing the rest of the document.
#[derive(Debug, Clone, Default)]
pub struct PdfReader {
    pages: Vec<std::result::Result<String, String>>,
    metadata: PdfMetadataInfo,
    outline: Vec<OutlineItem>,
}

impl PdfReader {
    /// Open a PDF from bytes, extracting every page's text up front
    pub fn open_bytes(data: &[u8], password: Option<&str>) -> Result<Self> {
        if !has_pdf_header(data) {
            return Err(Error::InvalidPdf {
                reason: "Not a valid PDF file".to_string(),
            });
        }

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, password)
            .map_err(Self::map_pdfium_error)?;

        let metadata = Self::extract_metadata(&document);
        let outline = Self::collect_bookmarks(document.bookmarks().iter());
        let pages = Self::extract_page_texts(&document);

        tracing::debug!(pages = pages.len(), "document decoded");

        Ok(Self {
            pages,
            metadata,
            outline,
        })
    }

    /// Build a reader over text that is already extracted
    pub fn from_page_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: texts.into_iter().map(|t| Ok(t.into())).collect(),
            ..Self::default()
        }
    }

    /// Attach metadata to a reader built with [`PdfReader::from_page_texts`]
    pub fn with_metadata(mut self, metadata: PdfMetadataInfo) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach an outline to a reader built with [`PdfReader::from_page_texts`]
    pub fn with_outline(mut self, outline: Vec<OutlineItem>) -> Self {
        self.outline = outline;
        self
    }

    fn extract_metadata(document: &PdfDocument) -> PdfMetadataInfo {
        let meta = document.metadata();
        let tag = |kind: PdfDocumentMetadataTagType| {
            meta.get(kind).map(|tag| tag.value().to_string())
        };
        PdfMetadataInfo {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
            modification_date: tag(PdfDocumentMetadataTagType::ModificationDate),
        }
    }

    fn collect_bookmarks<'a>(
        bookmarks: impl Iterator<Item = PdfBookmark<'a>>,
    ) -> Vec<OutlineItem> {
        bookmarks
            .map(|bookmark| OutlineItem {
                title: bookmark.title().unwrap_or_default(),
                page: bookmark
                    .destination()
                    .and_then(|dest| dest.page_index().ok().map(|idx| idx as u32 + 1)),
                children: Self::collect_bookmarks(bookmark.iter_direct_children()),
            })
            .collect()
    }

    fn extract_page_texts(document: &PdfDocument) -> Vec<std::result::Result<String, String>> {
        let pages = document.pages();
        (0..pages.len())
            .map(|index| -> std::result::Result<String, String> {
                let page = pages.get(index).map_err(|e| e.to_string())?;
                let text = page.text().map_err(|e| e.to_string())?;
                Ok(text.all())
            })
            .inspect(|text| {
                if let Err(reason) = text {
                    tracing::warn!(error = %reason, "page text extraction failed");
                }
            })
            .collect()
    }

    /// Map PDFium errors to our error type
    fn map_pdfium_error(err: PdfiumError) -> Error {
        match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::PasswordRequired
            }
            _ => Error::Pdfium {
                reason: format!("{}", err),
            },
        }
    }

    /// Get the number of pages
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get PDF metadata
    pub fn metadata(&self) -> &PdfMetadataInfo {
        &self.metadata
    }

    /// Get bookmarks/outline
    pub fn outline(&self) -> &[OutlineItem] {
        &self.outline
    }

    /// Text of a specific page (1-indexed)
    pub fn page_text(&self, page: u32) -> Result<&str> {
        let entry = page
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .ok_or_else(|| Error::PageOutOfBounds {
                page,
                total: self.page_count(),
            })?;

        entry.as_deref().map_err(|reason| Error::PageText {
            page,
            reason: reason.clone(),
        })
    }

    /// Text of every page in `pages`, in ascending order
    pub fn pages_text(&self, pages: &PageSet) -> Result<Vec<(u32, String)>> {
        pages
            .iter()
            .map(|page| -> Result<(u32, String)> {
                Ok((page, self.page_text(page)?.to_string()))
            })
            .collect()
    }

    /// Approximate heap footprint of the extracted text
    pub fn text_bytes(&self) -> usize {
        self.pages
            .iter()
            .map(|p| match p {
                Ok(text) => text.len(),
                Err(reason) => reason.len(),
            })
            .sum()
    }
}

impl PageTextSource for PdfReader {
    fn page_count(&self) -> Result<u32> {
        Ok(PdfReader::page_count(self))
    }

    fn page_text(&self, page: u32) -> Result<&str> {
        PdfReader::page_text(self, page)
    }
}
