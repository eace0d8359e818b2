//! Text processing: sentence-aware chunking and display preparation for
//! right-to-left scripts.

mod chunker;
mod shaping;

pub use chunker::{Chunk, TextChunker, chunk_text};
pub use shaping::{prepare_for_display, reorder_visual, reshape_arabic};
