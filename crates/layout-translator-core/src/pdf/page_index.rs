//! Page index newtype shared by the two PDF backends.
//!
//! Callers count pages from zero as `usize`, mupdf loads pages by `i32`
//! index and lopdf keys its page map by one-based `u32` page numbers.

use crate::error::{Error, Result};

/// A zero-based page index known to be within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    /// Validate `page_num` against the document's page count.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self> {
        let invalid = || Error::PdfInvalidPage {
            page: page_num,
            total: total_pages,
        };
        if page_num >= total_pages {
            return Err(invalid());
        }
        i32::try_from(page_num).map(Self).map_err(|_| invalid())
    }

    /// Index as mupdf expects it.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// One-based page number, as keyed by `lopdf::Document::get_pages`.
    #[must_use]
    pub const fn lopdf_page_number(self) -> u32 {
        self.0.unsigned_abs() + 1
    }

    /// One-based page number for log and error messages.
    #[must_use]
    pub const fn display_number(self) -> usize {
        self.lopdf_page_number() as usize
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}
