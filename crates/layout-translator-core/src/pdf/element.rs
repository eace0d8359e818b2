use bytes::Bytes;

use crate::config::TextColor;

/// Axis-aligned box in page space with a top-left origin (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Convert to array format [x0, y0, x1, y1]
    pub const fn as_array(self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    /// Smallest box containing both.
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Bounding box of a set of points, or `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = (f32, f32)>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Self>, (x, y)| {
            let point = Self::new(x, y, x, y);
            Some(acc.map_or(point, |bbox| bbox.union(point)))
        })
    }
}

/// A run of text as it appeared on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub text: String,
    pub bbox: BoundingBox,
    /// Effective font size in points, when it could be determined
    pub font_size: Option<f32>,
    /// Name of the font that drew the run, when known
    pub font_name: Option<String>,
    /// Fill color of the run, when known; the overlay falls back to the
    /// configured color, then black
    pub color: Option<TextColor>,
    /// Number of source lines joined into this run
    pub line_count: usize,
}

impl TextElement {
    /// Copy of this element carrying different text; geometry and font
    /// metadata are kept.
    #[must_use]
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// An image drawn on the page. Images pass through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageElement {
    /// XObject resource name
    pub name: String,
    /// Raw (still encoded) stream data
    pub data: Bytes,
    pub bbox: BoundingBox,
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
}

/// Positioned content on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
}

impl Element {
    pub const fn bbox(&self) -> BoundingBox {
        match self {
            Self::Text(text) => text.bbox,
            Self::Image(image) => image.bbox,
        }
    }

    pub const fn as_text(&self) -> Option<&TextElement> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }

    pub const fn as_image(&self) -> Option<&ImageElement> {
        match self {
            Self::Image(image) => Some(image),
            Self::Text(_) => None,
        }
    }
}

/// One page of extracted content, elements in content-stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Zero-based page index
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub elements: Vec<Element>,
}

impl Page {
    pub const fn empty(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            elements: Vec::new(),
        }
    }

    pub fn text_elements(&self) -> impl Iterator<Item = &TextElement> {
        self.elements.iter().filter_map(Element::as_text)
    }

    pub fn image_elements(&self) -> impl Iterator<Item = &ImageElement> {
        self.elements.iter().filter_map(Element::as_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_points() {
        let bbox = BoundingBox::from_points([(10.0, 5.0), (2.0, 8.0), (4.0, 1.0)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(2.0, 1.0, 10.0, 8.0));
        assert!(BoundingBox::from_points([]).is_none());
    }

    #[test]
    fn test_with_text_keeps_geometry() {
        let element = TextElement {
            text: "Hello".into(),
            bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            font_size: Some(11.0),
            font_name: Some("Helvetica".into()),
            color: Some(TextColor::blue()),
            line_count: 2,
        };
        let translated = element.with_text("Bonjour");
        assert_eq!(translated.text, "Bonjour");
        assert_eq!(translated.bbox, element.bbox);
        assert_eq!(translated.font_size, Some(11.0));
        assert_eq!(translated.line_count, 2);
        assert_eq!(element.text, "Hello");
    }
}
