use crate::ocr::model::{OcrElement, Vertex};
use crate::ocr::PageRect;

pub const POINTS_PER_INCH: f32 = 72.0;

/// Page extent in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Resolution of the source image; only used for pixel-space vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dpi {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned bounding box of a 4-vertex polygon, in page points.
///
/// Fewer than four vertices, a non-positive DPI for pixel vertices or
/// non-finite coordinates yield a zero rectangle.
pub fn polygon_to_page_rect(
    vertices: &[Vertex],
    normalized: bool,
    page: PageSize,
    dpi: Dpi,
) -> PageRect {
    if vertices.len() < 4 {
        return PageRect::default();
    }
    let corners = &vertices[..4];
    let min_x = corners.iter().map(|v| v.x).fold(f32::INFINITY, f32::min);
    let min_y = corners.iter().map(|v| v.y).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|v| v.x).fold(f32::NEG_INFINITY, f32::max);
    let max_y = corners.iter().map(|v| v.y).fold(f32::NEG_INFINITY, f32::max);
    if ![min_x, min_y, max_x, max_y].iter().all(|value| value.is_finite()) {
        return PageRect::default();
    }

    if normalized {
        return PageRect {
            x: min_x * page.width,
            y: min_y * page.height,
            width: (max_x - min_x) * page.width,
            height: (max_y - min_y) * page.height,
        };
    }

    if dpi.x <= 0.0 || dpi.y <= 0.0 {
        return PageRect::default();
    }
    PageRect {
        x: min_x * POINTS_PER_INCH / dpi.x,
        y: min_y * POINTS_PER_INCH / dpi.y,
        width: (max_x - min_x) * POINTS_PER_INCH / dpi.x,
        height: (max_y - min_y) * POINTS_PER_INCH / dpi.y,
    }
}

pub fn element_page_rect(element: &OcrElement, page: PageSize, dpi: Dpi) -> PageRect {
    match element.polygon() {
        Some(poly) => polygon_to_page_rect(poly.vertices, poly.normalized, page, dpi),
        None => PageRect::default(),
    }
}
