//! Fonts for overlay text.
//!
//! Two options:
//! - **Embedded TrueType**, loaded from `render.font_path`. Embedded once per
//!   document as a composite font with Identity-H encoding, so any glyph the
//!   font has (Arabic presentation forms included) can be drawn.
//! - **Standard Helvetica** with WinAnsi encoding when no font is configured.
//!   Characters outside Latin-1 come out as `?`.
//!
//! # PDF Font Structure
//!
//! For Unicode text, PDFs use a composite font structure:
//! - **Type0 font**: The top-level font dictionary that references:
//!   - **CIDFont**: Contains glyph metrics and references:
//!     - **FontDescriptor**: Font metadata (flags, bounding box, etc.)
//!     - **FontFile2**: The embedded TrueType font program
//!   - **ToUnicode CMap**: Maps glyph IDs back to Unicode for copy/paste

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::Face;

use super::resources;
use crate::error::{Error, Result};

/// Average Helvetica advance as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f32 = 0.55;

/// Resource name the overlay font is registered under on each page.
pub const FONT_RESOURCE: &str = "FTrans";

/// A TrueType font program to embed.
pub struct EmbeddedFont {
    data: Vec<u8>,
    name: String,
}

impl EmbeddedFont {
    /// Validate and keep a TrueType font program.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let name = {
            let face = Face::parse(&data, 0)
                .map_err(|e| Error::Font(format!("Failed to parse font: {e}")))?;
            postscript_name(&face).unwrap_or_else(|| "EmbeddedFont".to_string())
        };
        Ok(Self { data, name })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Font(format!("Failed to read font {}: {}", path.display(), e)))?;
        Self::from_bytes(data)
    }

    /// PostScript name used for `/BaseFont`.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| Error::Font(format!("Failed to parse font: {e}")))
    }
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("bytes_len", &self.data.len())
            .finish()
    }
}

fn postscript_name(face: &Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .map(|name| name.chars().filter(|c| c.is_ascii_graphic()).collect::<String>())
        .filter(|name| !name.is_empty())
}

/// The font translated text is drawn with.
#[derive(Debug, Default)]
pub enum OverlayFont {
    #[default]
    Standard,
    Embedded(EmbeddedFont),
}

impl OverlayFont {
    /// Load the configured font, or fall back to the standard font.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self::Embedded(EmbeddedFont::from_file(path)?)),
            None => Ok(Self::Standard),
        }
    }

    pub const fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded(_))
    }
}

enum Encoding<'f> {
    WinAnsi,
    Identity { face: Face<'f>, font: &'f EmbeddedFont },
}

/// Measures and encodes strings for one output document, remembering the
/// glyphs it hands out so the embedded font only describes those.
pub struct GlyphEncoder<'f> {
    encoding: Encoding<'f>,
    used: BTreeMap<u16, char>,
}

impl<'f> GlyphEncoder<'f> {
    pub fn new(font: &'f OverlayFont) -> Result<Self> {
        let encoding = match font {
            OverlayFont::Standard => Encoding::WinAnsi,
            OverlayFont::Embedded(font) => Encoding::Identity {
                face: font.face()?,
                font,
            },
        };
        Ok(Self {
            encoding,
            used: BTreeMap::new(),
        })
    }

    fn glyph_id(face: &Face<'_>, c: char) -> u16 {
        face.glyph_index(c).map_or(0, |g| g.0)
    }

    /// Scale a font-unit width to PDF's 1000-unit system.
    fn scale_width(face: &Face<'_>, width: u16) -> i64 {
        let units_per_em = i64::from(face.units_per_em().max(1));
        (i64::from(width) * 1000) / units_per_em
    }

    /// Width of `text` in points at `font_size`.
    #[allow(clippy::cast_precision_loss)]
    pub fn string_width(&self, text: &str, font_size: f32) -> f32 {
        match &self.encoding {
            Encoding::WinAnsi => text.chars().count() as f32 * CHAR_WIDTH_FACTOR * font_size,
            Encoding::Identity { face, .. } => {
                let units_per_em = f32::from(face.units_per_em().max(1));
                let total_units: u32 = text
                    .chars()
                    .map(|c| {
                        let gid = ttf_parser::GlyphId(Self::glyph_id(face, c));
                        u32::from(face.glyph_hor_advance(gid).unwrap_or(0))
                    })
                    .sum();
                total_units as f32 * font_size / units_per_em
            }
        }
    }

    /// Encode `text` as the hex digits of a PDF string (no angle brackets).
    pub fn encode_hex(&mut self, text: &str) -> String {
        let mut hex = String::new();
        match &self.encoding {
            Encoding::WinAnsi => {
                for c in text.chars() {
                    let byte = u8::try_from(u32::from(c)).unwrap_or(b'?');
                    let _ = write!(hex, "{byte:02X}");
                }
            }
            Encoding::Identity { face, .. } => {
                for c in text.chars() {
                    let gid = Self::glyph_id(face, c);
                    if gid != 0 {
                        self.used.entry(gid).or_insert(c);
                    }
                    let _ = write!(hex, "{gid:04X}");
                }
            }
        }
        hex
    }

    /// Add the font objects to `doc` and return the font dictionary's id.
    pub fn embed(self, doc: &mut Document) -> ObjectId {
        match self.encoding {
            Encoding::WinAnsi => doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                ("BaseFont", Object::Name(b"Helvetica".to_vec())),
                ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
            ])),
            Encoding::Identity { face, font } => {
                let font_file_id = create_font_file(doc, font);
                let descriptor_id = create_font_descriptor(doc, &face, font, font_file_id);
                let cid_font_id = create_cid_font(doc, &face, font, descriptor_id, &self.used);
                let to_unicode_id = create_to_unicode_cmap(doc, &self.used);
                create_type0_font(doc, font, cid_font_id, to_unicode_id)
            }
        }
    }
}

/// Create the FontFile2 stream containing the raw TrueType data.
#[allow(clippy::cast_possible_wrap)] // Font size always fits in i64
fn create_font_file(doc: &mut Document, font: &EmbeddedFont) -> ObjectId {
    let mut dict = Dictionary::new();
    dict.set("Length1", Object::Integer(font.data.len() as i64));

    let stream = Stream::new(dict, font.data.clone()).with_compression(true);
    doc.add_object(Object::Stream(stream))
}

/// Create the FontDescriptor dictionary with font metrics.
fn create_font_descriptor(
    doc: &mut Document,
    face: &Face<'_>,
    font: &EmbeddedFont,
    font_file_id: ObjectId,
) -> ObjectId {
    let bbox = face.global_bounding_box();

    let dict = Dictionary::from_iter([
        ("Type", Object::Name(b"FontDescriptor".to_vec())),
        ("FontName", Object::Name(font.name.as_bytes().to_vec())),
        ("Flags", Object::Integer(32)), // Nonsymbolic
        (
            "FontBBox",
            Object::Array(vec![
                Object::Integer(i64::from(bbox.x_min)),
                Object::Integer(i64::from(bbox.y_min)),
                Object::Integer(i64::from(bbox.x_max)),
                Object::Integer(i64::from(bbox.y_max)),
            ]),
        ),
        ("ItalicAngle", Object::Integer(0)),
        ("Ascent", Object::Integer(i64::from(face.ascender()))),
        ("Descent", Object::Integer(i64::from(face.descender()))),
        (
            "CapHeight",
            Object::Integer(i64::from(
                face.capital_height().unwrap_or_else(|| face.ascender()),
            )),
        ),
        ("StemV", Object::Integer(80)),
        ("FontFile2", Object::Reference(font_file_id)),
    ]);

    doc.add_object(Object::Dictionary(dict))
}

/// Create the CIDFont dictionary with widths for the glyphs in use.
fn create_cid_font(
    doc: &mut Document,
    face: &Face<'_>,
    font: &EmbeddedFont,
    descriptor_id: ObjectId,
    used: &BTreeMap<u16, char>,
) -> ObjectId {
    let space = GlyphEncoder::glyph_id(face, ' ');
    let default_width = GlyphEncoder::scale_width(
        face,
        face.glyph_hor_advance(ttf_parser::GlyphId(space)).unwrap_or(0),
    );

    let dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"CIDFontType2".to_vec())),
        ("BaseFont", Object::Name(font.name.as_bytes().to_vec())),
        (
            "CIDSystemInfo",
            Object::Dictionary(Dictionary::from_iter([
                ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
                ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
                ("Supplement", Object::Integer(0)),
            ])),
        ),
        ("FontDescriptor", Object::Reference(descriptor_id)),
        ("DW", Object::Integer(default_width)),
        ("W", Object::Array(build_widths_array(face, used))),
        ("CIDToGIDMap", Object::Name(b"Identity".to_vec())),
    ]);

    doc.add_object(Object::Dictionary(dict))
}

/// Build the W (widths) array: `[gid [w1 w2 ...]]` for runs of consecutive
/// glyph ids.
fn build_widths_array(face: &Face<'_>, used: &BTreeMap<u16, char>) -> Vec<Object> {
    let mut result = Vec::new();
    let mut iter = used.keys().copied().peekable();

    while let Some(first_gid) = iter.next() {
        let width = |gid: u16| {
            Object::Integer(GlyphEncoder::scale_width(
                face,
                face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0),
            ))
        };
        let mut widths = vec![width(first_gid)];
        let mut expected_next = first_gid.saturating_add(1);

        while let Some(&gid) = iter.peek() {
            if gid != expected_next {
                break;
            }
            widths.push(width(gid));
            expected_next = expected_next.saturating_add(1);
            iter.next();
        }

        result.push(Object::Integer(i64::from(first_gid)));
        result.push(Object::Array(widths));
    }

    result
}

/// UTF-16BE hex of a character, as used in CMap and ActualText strings.
pub fn utf16_hex(text: &str) -> String {
    text.encode_utf16().fold(String::new(), |mut acc, unit| {
        let _ = write!(acc, "{unit:04X}");
        acc
    })
}

/// Create a ToUnicode CMap mapping each used glyph back to its character.
fn create_to_unicode_cmap(doc: &mut Document, used: &BTreeMap<u16, char>) -> ObjectId {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &char)> = used.iter().collect();
    // bfchar blocks hold at most 100 entries
    for block in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", block.len());
        for (gid, c) in block {
            let _ = writeln!(cmap, "<{:04X}> <{}>", gid, utf16_hex(&c.to_string()));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end",
    );

    let stream = Stream::new(Dictionary::new(), cmap.into_bytes());
    doc.add_object(Object::Stream(stream))
}

/// Create the Type0 (composite) font dictionary.
fn create_type0_font(
    doc: &mut Document,
    font: &EmbeddedFont,
    cid_font_id: ObjectId,
    to_unicode_id: ObjectId,
) -> ObjectId {
    let dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type0".to_vec())),
        ("BaseFont", Object::Name(font.name.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"Identity-H".to_vec())),
        ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
        ("ToUnicode", Object::Reference(to_unicode_id)),
    ]);

    doc.add_object(Object::Dictionary(dict))
}

/// Register `font_id` as [`FONT_RESOURCE`] in a page's Resources.
///
/// The resolved resources (inline, indirect or inherited) are copied inline
/// onto the page so other pages sharing them are not affected.
pub fn add_font_to_page(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let mut page_resources = resources::page_resources(doc, page_id)?;

    let mut fonts = page_resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resources::resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();

    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    page_resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(page_dict) = page {
        page_dict.set("Resources", Object::Dictionary(page_resources));
    }

    Ok(())
}
