//! Content-stream scan for image placements.
//!
//! Only the operators that decide where an image lands are tracked: the
//! graphics state stack, `cm` and `Do`. Form XObjects are not descended into.

use std::collections::HashMap;

use bytes::Bytes;
use lopdf::Object;
use lopdf::content::Operation;

use super::element::{BoundingBox, ImageElement};
use super::resources::number;

/// A 2D transformation matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f32> = operands.iter().filter_map(number).collect();
        match v.as_slice() {
            &[a, b, c, d, e, f] => Some(Self::new(a, b, c, d, e, f)),
            _ => None,
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    #[must_use]
    pub fn multiply(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform(self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }
}

/// An image XObject available to the page.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    pub data: Bytes,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Image XObjects by resource name.
pub type PageImages = HashMap<Vec<u8>, ImageXObject>;

/// Walks the operators of one page and records every image drawn.
pub struct ImageScanner<'r> {
    images: &'r PageImages,
    media_box: [f32; 4],
    ctm: Matrix,
    saved: Vec<Matrix>,
    placed: Vec<ImageElement>,
}

impl<'r> ImageScanner<'r> {
    pub const fn new(images: &'r PageImages, media_box: [f32; 4]) -> Self {
        Self {
            images,
            media_box,
            ctm: Matrix::identity(),
            saved: Vec::new(),
            placed: Vec::new(),
        }
    }

    /// Scan `operations` and return the images in drawing order.
    pub fn run(mut self, operations: &[Operation]) -> Vec<ImageElement> {
        for op in operations {
            match op.operator.as_str() {
                "q" => self.saved.push(self.ctm),
                "Q" => {
                    if let Some(ctm) = self.saved.pop() {
                        self.ctm = ctm;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        self.ctm = m.multiply(self.ctm);
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.draw_image(name);
                    }
                }
                _ => {}
            }
        }
        self.placed
    }

    fn draw_image(&mut self, name: &[u8]) {
        let Some(image) = self.images.get(name) else {
            return;
        };
        let ctm = self.ctm;
        let corners =
            [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| ctm.transform(x, y));
        let Some(bbox) = BoundingBox::from_points(corners) else {
            return;
        };

        self.placed.push(ImageElement {
            name: String::from_utf8_lossy(name).into_owned(),
            data: image.data.clone(),
            bbox: self.to_page_space(bbox),
            pixel_width: image.width,
            pixel_height: image.height,
        });
    }

    /// Convert a box in PDF user space (bottom-left origin) to page space.
    fn to_page_space(&self, bbox: BoundingBox) -> BoundingBox {
        let [left, _, _, top] = self.media_box;
        BoundingBox::new(bbox.x0 - left, top - bbox.y1, bbox.x1 - left, top - bbox.y0)
    }
}
