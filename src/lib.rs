//! Highlighted text extraction from PDF annotations using lopdf
//!
//! This crate provides:
//! - Annotation scanning for highlight markers
//! - Region-based text extraction (the text under each highlight quad)
//! - Page-numbered highlight records with a configurable front-matter offset
//! - XLSX export of the collected records

pub mod annotations;
pub mod document;
pub mod export;
pub mod extractor;
pub mod fonts;
pub mod geometry;
pub mod highlights;
pub mod tounicode;

pub use annotations::{Annotation, AnnotationKind};
pub use document::{Page, PdfDocument};
pub use export::{to_xlsx, SpreadsheetExport, XLSX_FILE_NAME, XLSX_MIME_TYPE};
pub use extractor::{Glyph, PageText};
pub use geometry::{Point, Quad, Rect};
pub use highlights::{
    clean_text, display_page, extract_highlights, extract_highlights_with_progress,
    HighlightOptions, HighlightRecord, DEFAULT_FRONT_MATTER,
};

use std::path::Path;

/// High-level highlight extraction result
#[derive(Debug)]
pub struct HighlightReport {
    /// Highlights in document order
    pub records: Vec<HighlightRecord>,
    /// Page count
    pub page_count: u32,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl HighlightReport {
    /// No highlighted text was found; this is a normal outcome, not an error
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the records into an XLSX workbook
    pub fn to_xlsx(&self) -> Result<SpreadsheetExport, PdfError> {
        to_xlsx(&self.records)
    }
}

/// Extract highlights from a PDF file
pub fn process_pdf<P: AsRef<Path>>(
    path: P,
    options: &HighlightOptions,
) -> Result<HighlightReport, PdfError> {
    let buffer = std::fs::read(path)?;
    process_pdf_mem(&buffer, options)
}

/// Extract highlights from a PDF memory buffer
pub fn process_pdf_mem(
    buffer: &[u8],
    options: &HighlightOptions,
) -> Result<HighlightReport, PdfError> {
    process_pdf_mem_with_progress(buffer, options, |_, _| {})
}

/// Extract highlights from a PDF memory buffer, reporting progress per page
pub fn process_pdf_mem_with_progress<F>(
    buffer: &[u8],
    options: &HighlightOptions,
    on_page: F,
) -> Result<HighlightReport, PdfError>
where
    F: FnMut(usize, usize),
{
    let start = std::time::Instant::now();

    let doc = PdfDocument::load_mem(buffer)?;
    let records = extract_highlights_with_progress(&doc, options, on_page)?;

    Ok(HighlightReport {
        records,
        page_count: doc.page_count() as u32,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Spreadsheet export error: {0}")]
    Export(String),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Parse(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for PdfError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        PdfError::Export(e.to_string())
    }
}
