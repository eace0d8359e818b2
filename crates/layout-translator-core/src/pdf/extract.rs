use bytes::Bytes;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use mupdf::Document as MuDocument;
use tracing::{debug, warn};

use super::content::{ImageScanner, ImageXObject, PageImages};
use super::document::PdfDocument;
use super::element::{Element, ImageElement, Page, TextElement};
use super::page_index::PageIndex;
use super::resources::{self, DEFAULT_MEDIA_BOX, deref, resource_entries};
use super::text::page_text_runs;
use crate::error::{Error, Result};

/// Pulls positioned text runs and images out of a document, page by page.
///
/// Text comes from mupdf's structured text, which decodes font encodings and
/// ToUnicode maps. Images come from a scan of the page content with lopdf.
pub struct ElementExtractor<'a> {
    /// The PDF document to extract from
    pub doc: &'a PdfDocument,
    /// Text runs shorter than this many characters are dropped
    pub min_length: usize,
    /// Join runs split by a hyphenated line break
    pub merge_hyphenated: bool,
}

impl<'a> ElementExtractor<'a> {
    /// Create a new extractor with default options
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            min_length: 1,
            merge_hyphenated: true,
        }
    }

    /// Extract every page of the document.
    ///
    /// Pages that fail to extract come back empty; only an unreadable
    /// document is an error.
    pub fn extract_document(&self) -> Result<Vec<Page>> {
        let doc = self.doc.load()?;
        let mu_doc = self.doc.open_document()?;
        let pages = doc.get_pages();

        Ok(pages
            .values()
            .enumerate()
            .map(|(page_num, &page_id)| self.extract_loaded(&doc, &mu_doc, page_num, page_id))
            .collect())
    }

    /// Extract a single page (zero-based).
    pub fn extract_page(&self, page_num: usize) -> Result<Page> {
        let doc = self.doc.load()?;
        let pages = doc.get_pages();
        let index = PageIndex::try_from_page_num(page_num, pages.len())?;
        let page_id = pages
            .get(&index.lopdf_page_number())
            .copied()
            .ok_or(Error::PdfInvalidPage {
                page: page_num,
                total: pages.len(),
            })?;
        let mu_doc = self.doc.open_document()?;
        Ok(self.extract_loaded(&doc, &mu_doc, page_num, page_id))
    }

    fn extract_loaded(
        &self,
        doc: &Document,
        mu_doc: &MuDocument,
        page_num: usize,
        page_id: ObjectId,
    ) -> Page {
        match self.try_extract(doc, mu_doc, page_num, page_id) {
            Ok(page) => {
                debug!(
                    "Page {}: {} elements extracted",
                    page_num + 1,
                    page.elements.len()
                );
                page
            }
            Err(e) => {
                warn!("{}; continuing with an empty page", e);
                let [x0, y0, x1, y1] =
                    resources::media_box(doc, page_id).unwrap_or(DEFAULT_MEDIA_BOX);
                Page::empty(page_num, x1 - x0, y1 - y0)
            }
        }
    }

    fn try_extract(
        &self,
        doc: &Document,
        mu_doc: &MuDocument,
        page_num: usize,
        page_id: ObjectId,
    ) -> Result<Page> {
        let index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;
        let media_box = resources::media_box(doc, page_id).map_err(|e| {
            Error::PdfTextExtraction {
                page: page_num + 1,
                reason: e.to_string(),
            }
        })?;

        let runs: Vec<TextElement> = page_text_runs(mu_doc, index)?
            .into_iter()
            .filter(|run| run.text.chars().count() >= self.min_length)
            .collect();
        let runs = if self.merge_hyphenated {
            merge_hyphenated_runs(runs)
        } else {
            runs
        };
        let mut elements: Vec<Element> = runs.into_iter().map(Element::Text).collect();

        // A page whose images cannot be read still keeps its text
        match scan_images(doc, page_num, page_id, media_box) {
            Ok(images) => elements.extend(images.into_iter().map(Element::Image)),
            Err(e) => warn!("{}; page {} keeps its text only", e, page_num + 1),
        }

        let [x0, y0, x1, y1] = media_box;
        Ok(Page {
            index: page_num,
            width: x1 - x0,
            height: y1 - y0,
            elements,
        })
    }
}

/// Images drawn by the page's own content stream, in drawing order.
fn scan_images(
    doc: &Document,
    page_num: usize,
    page_id: ObjectId,
    media_box: [f32; 4],
) -> Result<Vec<ImageElement>> {
    let images = load_images(doc, page_id)?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let scan_error = |reason: String| Error::PdfTextExtraction {
        page: page_num + 1,
        reason,
    };
    let raw = doc
        .get_page_content(page_id)
        .map_err(|e| scan_error(format!("Failed to read content stream: {e}")))?;
    let content = Content::decode(&raw)
        .map_err(|e| scan_error(format!("Failed to decode content stream: {e}")))?;

    Ok(ImageScanner::new(&images, media_box).run(&content.operations))
}

/// Image XObjects in the page's resources.
fn load_images(doc: &Document, page_id: ObjectId) -> Result<PageImages> {
    let resources = resources::page_resources(doc, page_id)?;
    let mut images = PageImages::new();

    for (key, obj) in resource_entries(doc, &resources, b"XObject") {
        let Some(Object::Stream(stream)) = deref(doc, obj) else {
            continue;
        };
        let is_image = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image");
        if !is_image {
            continue;
        }
        let dimension = |k: &[u8]| {
            stream
                .dict
                .get(k)
                .ok()
                .and_then(|o| o.as_i64().ok())
                .and_then(|v| u32::try_from(v).ok())
        };
        images.insert(
            key.to_vec(),
            ImageXObject {
                data: Bytes::from(stream.content.clone()),
                width: dimension(b"Width"),
                height: dimension(b"Height"),
            },
        );
    }

    Ok(images)
}

/// Whether `next` continues a word that `current` broke with a hyphen.
fn continues_hyphenated(current: &TextElement, next: &TextElement) -> bool {
    if !current.text.trim_end().ends_with('-') {
        return false;
    }

    let next_trimmed = next.text.trim_start();
    let next_starts_lower = next_trimmed
        .chars()
        .next()
        .is_some_and(char::is_lowercase);
    let next_is_fragment = next_trimmed.chars().count() < 20 && !next_trimmed.contains(' ');

    let vertical_gap = (next.bbox.y0 - current.bbox.y1).abs();
    let avg_height = (current.bbox.height() + next.bbox.height()) / 2.0;
    let close_vertically = vertical_gap < avg_height * 3.0;

    (next_starts_lower || next_is_fragment) && close_vertically
}

/// Merge adjacent text runs split by hyphenation, keeping reading order.
fn merge_hyphenated_runs(runs: Vec<TextElement>) -> Vec<TextElement> {
    let mut merged: Vec<TextElement> = Vec::with_capacity(runs.len());

    for next in runs {
        if let Some(current) = merged.last_mut()
            && continues_hyphenated(current, &next)
        {
            let trimmed = current.text.trim_end();
            let without_hyphen = trimmed.strip_suffix('-').unwrap_or(trimmed);
            current.text = format!("{}{}", without_hyphen, next.text.trim_start());
            current.bbox = current.bbox.union(next.bbox);
            current.line_count += next.line_count;
            current.font_size = match (current.font_size, next.font_size) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            continue;
        }
        merged.push(next);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::element::BoundingBox;

    fn run(text: &str, y0: f32) -> TextElement {
        TextElement {
            text: text.to_string(),
            bbox: BoundingBox::new(72.0, y0, 300.0, y0 + 12.0),
            font_size: Some(12.0),
            font_name: None,
            color: None,
            line_count: 1,
        }
    }

    fn texts(runs: &[TextElement]) -> Vec<&str> {
        runs.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_merges_hyphenated_continuation() {
        let merged = merge_hyphenated_runs(vec![run("A transla-", 100.0), run("tion of text", 114.0)]);
        assert_eq!(texts(&merged), vec!["A translation of text"]);
        assert_eq!(merged[0].line_count, 2);
        assert_eq!(merged[0].bbox, BoundingBox::new(72.0, 100.0, 300.0, 126.0));
    }

    #[test]
    fn test_does_not_merge_distant_or_capitalized_runs() {
        let far = merge_hyphenated_runs(vec![run("Ends with-", 100.0), run("continued", 400.0)]);
        assert_eq!(far.len(), 2);

        let capital =
            merge_hyphenated_runs(vec![run("Self-", 100.0), run("Contained Systems Inc", 114.0)]);
        assert_eq!(capital.len(), 2);

        let plain = merge_hyphenated_runs(vec![run("First.", 100.0), run("second", 114.0)]);
        assert_eq!(plain.len(), 2);
    }

    #[test]
    fn test_merged_font_size_takes_the_smaller() {
        let mut tail = run("ment", 114.0);
        tail.font_size = Some(10.0);
        let merged = merge_hyphenated_runs(vec![run("docu-", 100.0), tail]);
        assert_eq!(texts(&merged), vec!["document"]);
        assert_eq!(merged[0].font_size, Some(10.0));
    }
}
