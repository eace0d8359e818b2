//! Positioned text runs from mupdf's structured text.
//!
//! mupdf resolves simple font encodings, `/Differences`, ToUnicode CMaps and
//! CID fonts, and reports each glyph's quad in page space with a top-left
//! origin. Each structured-text block becomes one text run.

use mupdf::{Document as MuDocument, Quad, TextPageOptions};

use super::element::{BoundingBox, TextElement};
use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// Glyph quads come out slightly shorter than the nominal font size.
const LINE_HEIGHT_TO_FONT_SIZE: f32 = 1.18;

const MIN_FONT_SIZE: f32 = 6.0;
const MAX_FONT_SIZE: f32 = 36.0;

/// Bounding box of a glyph quad.
fn quad_bbox(quad: &Quad) -> BoundingBox {
    BoundingBox::new(
        quad.ul.x.min(quad.ur.x).min(quad.ll.x).min(quad.lr.x),
        quad.ul.y.min(quad.ur.y).min(quad.ll.y).min(quad.lr.y),
        quad.ul.x.max(quad.ur.x).max(quad.ll.x).max(quad.lr.x),
        quad.ul.y.max(quad.ur.y).max(quad.ll.y).max(quad.lr.y),
    )
}

/// Characters of one structured-text line.
#[derive(Debug, Default)]
struct LineText {
    text: String,
    bbox: Option<BoundingBox>,
}

impl LineText {
    fn push(&mut self, c: Option<char>, bbox: BoundingBox) {
        if let Some(c) = c {
            self.text.push(c);
        }
        self.bbox = Some(self.bbox.map_or(bbox, |b| b.union(bbox)));
    }
}

/// Join the lines of one block into a run.
///
/// Lines are joined with a space, except that a trailing hyphen is dropped
/// and the next line appended directly. The font size is estimated from the
/// average line height.
fn join_block(lines: impl IntoIterator<Item = LineText>) -> Option<TextElement> {
    let mut text = String::new();
    let mut bbox: Option<BoundingBox> = None;
    let mut heights: Vec<f32> = Vec::new();

    for line in lines {
        let Some(line_bbox) = line.bbox else { continue };
        let trimmed = line.text.trim();
        if trimmed.is_empty() {
            continue;
        }

        if text.ends_with('-') {
            text.pop();
        } else if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(trimmed);

        bbox = Some(bbox.map_or(line_bbox, |b| b.union(line_bbox)));
        heights.push(line_bbox.height());
    }

    let bbox = bbox?;
    #[allow(clippy::cast_precision_loss)]
    let avg_height = heights.iter().sum::<f32>() / heights.len().max(1) as f32;
    let font_size = (avg_height * LINE_HEIGHT_TO_FONT_SIZE).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);

    Some(TextElement {
        text,
        bbox,
        font_size: Some((font_size * 10.0).round() / 10.0),
        font_name: None,
        color: None,
        line_count: heights.len(),
    })
}

/// Extract the text runs of one page in mupdf's reading order.
pub(crate) fn page_text_runs(doc: &MuDocument, index: PageIndex) -> Result<Vec<TextElement>> {
    let extraction_error = |reason: String| Error::PdfTextExtraction {
        page: index.display_number(),
        reason,
    };

    let page = doc
        .load_page(index.as_i32())
        .map_err(|e| extraction_error(format!("Failed to load page: {e}")))?;
    let text_page = page
        .to_text_page(TextPageOptions::empty())
        .map_err(|e| extraction_error(format!("Failed to get text page: {e}")))?;

    let mut runs = Vec::new();
    for block in text_page.blocks() {
        let lines = block.lines().map(|line| {
            let mut line_text = LineText::default();
            for text_char in line.chars() {
                line_text.push(text_char.char(), quad_bbox(&text_char.quad()));
            }
            line_text
        });
        if let Some(run) = join_block(lines) {
            runs.push(run);
        }
    }

    Ok(runs)
}
