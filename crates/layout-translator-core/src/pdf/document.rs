use std::path::Path;
use std::sync::Arc;

use lopdf::{Document, Object};
use mupdf::Document as MuDocument;

use super::resources::{decode_pdf_string, resolve_dict};
use crate::error::{Error, Result};

/// Thread-safe handle over an input PDF.
///
/// The bytes are parsed once on open to validate them and read the page
/// count. Text extraction opens its own mupdf document; image scanning and
/// reassembly parse their own lopdf copy.
#[derive(Clone)]
pub struct PdfDocument {
    /// The raw PDF bytes, shared between the extractor and the reassembler
    bytes: Arc<Vec<u8>>,
    /// Cached metadata
    metadata: DocumentMetadata,
    /// Number of pages
    page_count: usize,
}

/// Document metadata from the trailer's `/Info` dictionary
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl DocumentMetadata {
    fn read(doc: &Document) -> Self {
        let Some(info) = doc.trailer.get(b"Info").ok().and_then(|obj| resolve_dict(doc, obj))
        else {
            return Self::default();
        };

        let get_meta = |key: &[u8]| -> Option<String> {
            match info.get(key) {
                Ok(Object::String(bytes, _)) => {
                    Some(decode_pdf_string(bytes)).filter(|s| !s.trim().is_empty())
                }
                _ => None,
            }
        };

        Self {
            title: get_meta(b"Title"),
            author: get_meta(b"Author"),
            subject: get_meta(b"Subject"),
            keywords: get_meta(b"Keywords"),
            creator: get_meta(b"Creator"),
            producer: get_meta(b"Producer"),
        }
    }
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = Document::load_mem(&bytes)
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc.get_pages().len();
        let metadata = DocumentMetadata::read(&doc);

        Ok(Self {
            bytes: Arc::new(bytes),
            metadata,
            page_count,
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    /// Get document metadata
    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get raw PDF bytes as a reference-counted pointer.
    pub fn bytes_arc(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    /// Parse a fresh working copy of the document.
    pub(crate) fn load(&self) -> Result<Document> {
        Document::load_mem(&self.bytes)
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }

    /// Open the document with mupdf for structured text.
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("metadata", &self.metadata)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
