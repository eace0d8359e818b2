//! Re-rendering translated text over a copy of the original document.
//!
//! # Coordinate System
//!
//! PDF uses a **bottom-left origin** coordinate system where:
//! - (0, 0) is at the bottom-left corner of the page
//! - X increases to the right
//! - Y increases upward
//!
//! Extracted elements use a **top-left origin** relative to the media box,
//! so the conversion here is:
//! ```text
//! pdf_x = media_x0 + x
//! pdf_y = media_y1 - y
//! ```
//!
//! # Overlay Strategy
//!
//! The original content streams stay untouched. Each affected page gets an
//! extra content stream that:
//! 1. covers every original text box with a white rectangle
//! 2. draws the translation at the box origin, one marked-content span per
//!    line carrying the drawn string as `/ActualText`

use std::fmt::Write;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::element::{Element, Page, TextElement};
use super::font::{FONT_RESOURCE, GlyphEncoder, OverlayFont, add_font_to_page, utf16_hex};
use super::resources::{self, decode_pdf_string};
use crate::config::{Lang, RenderConfig, TextColor};
use crate::error::{Error, Result};
use crate::text::prepare_for_display;

// =============================================================================
// Layout Constants
// =============================================================================

/// Font size used when neither the configuration nor the source run has one.
pub const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Line height as a multiple of font size.
const LINE_HEIGHT_FACTOR: f32 = 1.25;

/// Distance from the top of a text box to the first baseline, in font sizes.
const BASELINE_FACTOR: f32 = 0.8;

/// Horizontal padding on left side of cover rectangles (in points).
const RECT_LEFT_PADDING: f32 = 2.0;

/// Horizontal padding on right side of cover rectangles (in points).
const RECT_RIGHT_PADDING: f32 = 2.0;

/// Vertical padding above text in cover rectangle (in points).
const RECT_TOP_PADDING: f32 = 1.5;

/// Vertical padding below text in cover rectangle (in points).
const RECT_BOTTOM_PADDING: f32 = 1.5;

/// Margin kept from the page edge text wraps towards (in points).
const PAGE_MARGIN: f32 = 40.0;

/// Lines are never wrapped narrower than this (in points).
const MIN_WRAP_WIDTH: f32 = 100.0;

// =============================================================================
// Public Types
// =============================================================================

/// Overrides applied to every rendered run.
#[derive(Debug, Clone, Default)]
pub struct OverlayOptions {
    /// Text color for translations (if None, the source run's color)
    pub text_color: Option<TextColor>,
    /// Font size for translations (if None, the source run's size)
    pub font_size: Option<f32>,
}

impl From<&RenderConfig> for OverlayOptions {
    fn from(config: &RenderConfig) -> Self {
        Self {
            text_color: config.text_color,
            font_size: config.font_size,
        }
    }
}

// =============================================================================
// Render Data
// =============================================================================

/// A wrapped line ready to draw, in visual order.
struct RenderLine {
    text: String,
    x: f32,
}

/// Pre-calculated data for rendering a single text element.
struct RenderBlock {
    /// White rectangle position and size
    rect_x: f32,
    rect_y: f32,
    rect_width: f32,
    rect_height: f32,
    /// Baseline of the first line
    text_start_y: f32,
    font_size: f32,
    line_height: f32,
    color: TextColor,
    lines: Vec<RenderLine>,
}

impl RenderBlock {
    fn from_element(
        element: &TextElement,
        media_box: [f32; 4],
        options: &OverlayOptions,
        encoder: &GlyphEncoder<'_>,
        lang: &Lang,
    ) -> Self {
        let [page_left, page_bottom, page_right, page_top] = media_box;
        let font_size = options
            .font_size
            .or(element.font_size)
            .filter(|size| *size > 0.0)
            .unwrap_or(DEFAULT_FONT_SIZE);
        let color = options
            .text_color
            .or(element.color)
            .unwrap_or_default();
        let rtl = lang.is_rtl();

        let left = page_left + element.bbox.x0;
        let right = page_left + element.bbox.x1;
        let top_y = page_top - element.bbox.y0;

        // Wrap towards the page edge the text flows to
        let max_width = if rtl {
            right - page_left - PAGE_MARGIN
        } else {
            page_right - left - PAGE_MARGIN
        }
        .max(MIN_WRAP_WIDTH);

        let measure = |s: &str| encoder.string_width(s, font_size);
        let lines: Vec<RenderLine> = word_wrap(&element.text, max_width, measure)
            .iter()
            .map(|line| {
                let text = prepare_for_display(line, lang);
                let x = if rtl { right - measure(&text) } else { left };
                RenderLine { text, x }
            })
            .collect();

        let line_height = font_size * LINE_HEIGHT_FACTOR;
        #[allow(clippy::cast_precision_loss)]
        let text_height = lines.len() as f32 * line_height;

        // Rectangle covers the original box and whatever the new text spans
        let text_x0 = lines.iter().map(|l| l.x).fold(left, f32::min);
        let text_x1 = lines
            .iter()
            .map(|l| l.x + measure(&l.text))
            .fold(right, f32::max);

        let rect_x = (text_x0 - RECT_LEFT_PADDING).max(page_left);
        let rect_x1 = (text_x1 + RECT_RIGHT_PADDING).min(page_right);
        let rect_height =
            element.bbox.height().max(text_height) + RECT_TOP_PADDING + RECT_BOTTOM_PADDING;
        let rect_y = (top_y + RECT_TOP_PADDING - rect_height).max(page_bottom);

        Self {
            rect_x,
            rect_y,
            rect_width: (rect_x1 - rect_x).max(0.0),
            rect_height,
            text_start_y: top_y - font_size * BASELINE_FACTOR,
            font_size,
            line_height,
            color,
            lines,
        }
    }
}

// =============================================================================
// Document Reassembler
// =============================================================================

/// Produces the translated document from the original bytes and the
/// translated pages.
pub struct DocumentReassembler {
    /// Configuration options for overlay creation
    pub options: OverlayOptions,
    font: OverlayFont,
}

impl DocumentReassembler {
    pub const fn new(options: OverlayOptions, font: OverlayFont) -> Self {
        Self { options, font }
    }

    /// Build from render settings, loading the configured font file.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let font = OverlayFont::load(config.font_path.as_deref())?;
        Ok(Self::new(OverlayOptions::from(config), font))
    }

    /// Overlay the text elements of `pages` onto a copy of `pdf_bytes`.
    ///
    /// Every page of the original is kept; pages without text elements are
    /// left exactly as they were. Returns the new document's bytes.
    pub fn reassemble(&self, pdf_bytes: &[u8], pages: &[Page], lang: &Lang) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf_bytes)
            .map_err(|e| Error::Render(format!("Failed to load PDF: {e}")))?;
        let page_ids = doc.get_pages();
        let mut encoder = GlyphEncoder::new(&self.font)?;

        let mut overlays: Vec<(ObjectId, String)> = Vec::new();
        for page in pages {
            let Some(&page_id) = u32::try_from(page.index + 1)
                .ok()
                .and_then(|number| page_ids.get(&number))
            else {
                warn!("Skipping overlay for missing page {}", page.index + 1);
                continue;
            };

            let media_box = resources::media_box(&doc, page_id)?;
            let mut blocks = Vec::new();
            for element in &page.elements {
                match element {
                    Element::Text(text) => blocks.push(RenderBlock::from_element(
                        text,
                        media_box,
                        &self.options,
                        &encoder,
                        lang,
                    )),
                    Element::Image(_) => {}
                }
            }

            if blocks.is_empty() {
                continue;
            }
            debug!("Page {}: rendering {} text blocks", page.index + 1, blocks.len());
            overlays.push((page_id, create_overlay_content(&blocks, &mut encoder)));
        }

        if !overlays.is_empty() {
            let font_id = encoder.embed(&mut doc);
            for (page_id, content) in &overlays {
                add_font_to_page(&mut doc, *page_id, font_id)?;
                append_content_to_page(&mut doc, *page_id, content)?;
            }
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;

        Ok(output)
    }
}

/// Read back the lines a reassembled document records, page by page.
///
/// Every `/ActualText` span in a page's content is returned in drawing
/// order; for right-to-left targets that is the visual-order string. A page
/// whose content cannot be decoded reads as having no lines.
pub fn recorded_text(pdf_bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

    Ok(doc
        .get_pages()
        .values()
        .enumerate()
        .map(|(index, &page_id)| {
            let content = doc
                .get_page_content(page_id)
                .map_err(|e| e.to_string())
                .and_then(|raw| Content::decode(&raw).map_err(|e| e.to_string()));
            match content {
                Ok(content) => spans_actual_text(&content),
                Err(e) => {
                    debug!("Page {}: no recorded text ({})", index + 1, e);
                    Vec::new()
                }
            }
        })
        .collect())
}

fn spans_actual_text(content: &Content) -> Vec<String> {
    content
        .operations
        .iter()
        .filter(|op| op.operator == "BDC")
        .filter_map(|op| match op.operands.get(1) {
            Some(Object::Dictionary(props)) => match props.get(b"ActualText") {
                Ok(Object::String(bytes, _)) => Some(decode_pdf_string(bytes)),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// Create the overlay content stream for one page.
fn create_overlay_content(blocks: &[RenderBlock], encoder: &mut GlyphEncoder<'_>) -> String {
    let mut content = String::new();

    // Restore the state the original content started from
    content.push_str("Q\nq\n");

    // PHASE 1: Draw ALL white rectangles first to cover original text
    content.push_str("1 1 1 rg\n");
    for block in blocks {
        let _ = writeln!(
            content,
            "{:.2} {:.2} {:.2} {:.2} re f",
            block.rect_x, block.rect_y, block.rect_width, block.rect_height
        );
    }

    // PHASE 2: Draw ALL translated text on top
    // Reset text rendering mode to fill (0) - OCR layers use invisible mode (3)
    content.push_str("0 Tr\n");

    for block in blocks {
        let TextColor { r, g, b } = block.color;
        let _ = writeln!(content, "{r:.3} {g:.3} {b:.3} rg");

        for (j, line) in block.lines.iter().enumerate() {
            if line.text.is_empty() {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let y = block.text_start_y - (j as f32 * block.line_height);

            let _ = writeln!(
                content,
                "/Span <</ActualText <FEFF{}>>> BDC",
                utf16_hex(&line.text)
            );
            content.push_str("BT\n");
            let _ = writeln!(content, "/{FONT_RESOURCE} {:.2} Tf", block.font_size);
            let _ = writeln!(content, "{:.2} {:.2} Td", line.x, y);
            let _ = writeln!(content, "<{}> Tj", encoder.encode_hex(&line.text));
            content.push_str("ET\nEMC\n");
        }
    }

    content.push_str("Q\n");
    content
}

/// Bracket the page's existing contents with `q` and our overlay.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, content: &str) -> Result<()> {
    let save_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"q\n".to_vec(),
    )));
    let content_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        content.as_bytes().to_vec(),
    )));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(dict) = page {
        let mut contents = vec![Object::Reference(save_id)];
        match dict.get(b"Contents").ok().cloned() {
            Some(Object::Reference(existing_id)) => contents.push(Object::Reference(existing_id)),
            Some(Object::Array(arr)) => contents.extend(arr),
            _ => {}
        }
        contents.push(Object::Reference(content_id));
        dict.set("Contents", Object::Array(contents));
    }

    Ok(())
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Word wrap text so each line measures at most `max_width`.
///
/// A single word wider than the limit gets a line of its own.
fn word_wrap(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
            continue;
        }

        let candidate = format!("{current_line} {word}");
        if measure(&candidate) <= max_width {
            current_line = candidate;
        } else {
            lines.push(std::mem::replace(&mut current_line, word.to_string()));
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::element::BoundingBox;
    use crate::pdf::PdfDocument;
    use lopdf::content::{Content, Operation};

    fn create_test_pdf(page_texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let page_tree_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));

        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
        )]));

        let mut kids = Vec::new();
        for text in page_texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            kids.push(Object::Reference(doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(page_tree_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Reference(resources_id)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                ),
            ]))));
        }

        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            page_tree_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(page_tree_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut output = Vec::new();
        doc.save_to(&mut output).unwrap();
        output
    }

    fn element(text: &str) -> TextElement {
        TextElement {
            text: text.to_string(),
            bbox: BoundingBox::new(100.0, 84.0, 300.0, 108.0),
            font_size: Some(24.0),
            font_name: Some("Helvetica".into()),
            color: Some(TextColor::blue()),
            line_count: 1,
        }
    }

    fn measure_chars(s: &str) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let n = s.chars().count() as f32;
        n
    }

    #[test]
    fn test_word_wrap_basic() {
        let lines = word_wrap("Hello world this is a test", 10.0, measure_chars);
        assert_eq!(lines, vec!["Hello", "world this", "is a test"]);
    }

    #[test]
    fn test_word_wrap_empty() {
        let lines = word_wrap("", 10.0, measure_chars);
        assert_eq!(lines, vec![String::new()]);
    }

    #[test]
    fn test_word_wrap_long_word_gets_own_line() {
        let lines = word_wrap("a supercalifragilistic b", 5.0, measure_chars);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_font_size_and_color_priority() {
        let font = OverlayFont::Standard;
        let encoder = GlyphEncoder::new(&font).unwrap();
        let media = [0.0, 0.0, 612.0, 792.0];
        let en = Lang::new("en");

        let block =
            RenderBlock::from_element(&element("Hi"), media, &OverlayOptions::default(), &encoder, &en);
        assert!((block.font_size - 24.0).abs() < f32::EPSILON);
        assert_eq!(block.color, TextColor::blue());

        let forced = OverlayOptions {
            text_color: Some(TextColor::dark_red()),
            font_size: Some(9.0),
        };
        let block = RenderBlock::from_element(&element("Hi"), media, &forced, &encoder, &en);
        assert!((block.font_size - 9.0).abs() < f32::EPSILON);
        assert_eq!(block.color, TextColor::dark_red());

        let mut bare = element("Hi");
        bare.font_size = None;
        bare.color = None;
        let block = RenderBlock::from_element(&bare, media, &OverlayOptions::default(), &encoder, &en);
        assert!((block.font_size - DEFAULT_FONT_SIZE).abs() < f32::EPSILON);
        assert_eq!(block.color, TextColor::black());
    }

    #[test]
    fn test_rtl_lines_are_right_aligned() {
        let font = OverlayFont::Standard;
        let encoder = GlyphEncoder::new(&font).unwrap();
        let media = [0.0, 0.0, 612.0, 792.0];

        let block = RenderBlock::from_element(
            &element("مرحبا"),
            media,
            &OverlayOptions::default(),
            &encoder,
            &Lang::new("ar"),
        );
        let line = &block.lines[0];
        let width = encoder.string_width(&line.text, block.font_size);
        assert!((line.x + width - 300.0).abs() < 1e-3);
        // Reshaped and reversed: alef final form comes first visually
        assert!(line.text.starts_with('\u{FE8E}'));

        let ltr = RenderBlock::from_element(
            &element("Hello"),
            media,
            &OverlayOptions::default(),
            &encoder,
            &Lang::new("fr"),
        );
        assert!((ltr.lines[0].x - 100.0).abs() < f32::EPSILON);
        assert_eq!(ltr.lines[0].text, "Hello");
    }

    #[test]
    fn test_reassemble_preserves_pages_and_records_text() {
        let pdf = create_test_pdf(&["Hello", "Untouched"]);
        let page = Page {
            index: 0,
            width: 612.0,
            height: 792.0,
            elements: vec![Element::Text(element("Bonjour"))],
        };

        let reassembler = DocumentReassembler::new(OverlayOptions::default(), OverlayFont::Standard);
        let output = reassembler
            .reassemble(&pdf, &[page], &Lang::new("fr"))
            .unwrap();

        assert_eq!(PdfDocument::from_bytes(output.clone()).unwrap().page_count(), 2);

        let recorded = recorded_text(&output).unwrap();
        assert_eq!(recorded, vec![vec!["Bonjour".to_string()], Vec::new()]);
    }

    #[test]
    fn test_recorded_text_keeps_visual_order_for_rtl() {
        let pdf = create_test_pdf(&["Hello"]);
        let page = Page {
            index: 0,
            width: 612.0,
            height: 792.0,
            elements: vec![Element::Text(element("بب"))],
        };
        let reassembler = DocumentReassembler::new(OverlayOptions::default(), OverlayFont::Standard);
        let output = reassembler
            .reassemble(&pdf, &[page], &Lang::new("ar"))
            .unwrap();

        assert_eq!(recorded_text(&output).unwrap(), vec![vec!["\u{FE90}\u{FE91}".to_string()]]);
    }

    #[test]
    fn test_reassemble_without_text_is_a_plain_copy() {
        let pdf = create_test_pdf(&["Hello"]);
        let reassembler = DocumentReassembler::new(OverlayOptions::default(), OverlayFont::Standard);
        let output = reassembler.reassemble(&pdf, &[], &Lang::new("fr")).unwrap();

        let doc = lopdf::Document::load_mem(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(recorded_text(&output).unwrap(), vec![Vec::<String>::new()]);
        let page_id = doc.page_iter().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        assert!(content.operations.iter().any(|op| op.operator == "Tj"));
    }

    #[test]
    fn test_reassemble_rejects_garbage() {
        let reassembler = DocumentReassembler::new(OverlayOptions::default(), OverlayFont::Standard);
        assert!(matches!(
            reassembler.reassemble(b"nope", &[], &Lang::new("fr")),
            Err(Error::Render(_))
        ));
    }
}
