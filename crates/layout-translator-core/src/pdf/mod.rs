mod content;
mod document;
mod element;
mod extract;
mod font;
mod overlay;
mod page_index;
mod resources;
mod text;

pub use content::Matrix;
pub use document::{DocumentMetadata, PdfDocument};
pub use element::{BoundingBox, Element, ImageElement, Page, TextElement};
pub use extract::ElementExtractor;
pub use font::{EmbeddedFont, OverlayFont};
pub use overlay::{DEFAULT_FONT_SIZE, DocumentReassembler, OverlayOptions, recorded_text};
pub use page_index::PageIndex;
pub use resources::decode_pdf_string;
