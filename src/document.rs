//! Document loading and page access

use crate::annotations::{page_annotations, Annotation};
use crate::extractor::{extract_page_glyphs, PageText};
use crate::PdfError;
use lopdf::{Document, Object, ObjectId};
use std::path::Path;

/// A loaded PDF with its pages in page-tree order
pub struct PdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfDocument {
    /// Load a PDF from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PdfError> {
        let buffer = std::fs::read(path)?;
        Self::load_mem(&buffer)
    }

    /// Load a PDF from a memory buffer
    pub fn load_mem(buffer: &[u8]) -> Result<Self, PdfError> {
        let doc = Document::load_mem(buffer)?;
        Ok(Self::from_document(doc))
    }

    /// Wrap an already parsed lopdf document
    pub fn from_document(doc: Document) -> Self {
        // get_pages is keyed by 1-based page number, so values come out in order
        let page_ids = doc.get_pages().into_values().collect();
        Self { doc, page_ids }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Page by zero-based index
    pub fn page(&self, index: usize) -> Option<Page<'_>> {
        self.page_ids.get(index).map(|&id| Page {
            doc: &self.doc,
            id,
            index,
        })
    }

    /// All pages in order
    pub fn pages(&self) -> impl Iterator<Item = Page<'_>> {
        (0..self.page_count()).filter_map(move |i| self.page(i))
    }

    /// The underlying lopdf document
    pub fn inner(&self) -> &Document {
        &self.doc
    }
}

/// A borrowed view of one page
#[derive(Clone, Copy)]
pub struct Page<'a> {
    doc: &'a Document,
    id: ObjectId,
    index: usize,
}

impl<'a> Page<'a> {
    /// Zero-based page index
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    /// Annotations on this page; empty when the page has none
    pub fn annotations(&self) -> Result<Vec<Annotation>, PdfError> {
        page_annotations(self.doc, self.id)
    }

    /// Positioned text layer, used to extract text under arbitrary rectangles
    pub fn text(&self) -> Result<PageText, PdfError> {
        Ok(PageText::new(extract_page_glyphs(self.doc, self.id)?))
    }
}

/// Follow an indirect reference, returning the object itself when it is direct
/// or when the reference cannot be resolved
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}
