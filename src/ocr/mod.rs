mod canvas;
mod engine;
mod font;
mod model;

use serde::Serialize;

pub use canvas::{DrawOp, PageCanvas, RecordingCanvas};
pub use engine::{
    Dpi, MIN_FONT_SIZE, POINTS_PER_INCH, PageSize, RebuildContext, RebuildSettings,
    SPACING_MAX_ITERATIONS, SPACING_TOLERANCE_PT, UPRIGHT, drawable_text, element_page_rect,
    extract_span, fit_char_spacing, fit_element, fit_font_size, is_upright, polygon_to_page_rect,
    rebuild_page, resolve_style, sort_reading_order,
};
pub use font::{FontBook, FontFace, FontMetrics, FontStyle, SERIF_FALLBACKS, load_font_metrics};
pub use model::{
    BoundingPoly, Layout, OcrDocument, OcrElement, OcrMode, OcrPage, Polygon, TextAnchor,
    TextIndex, TextSegment, TextStyle, Vertex,
};

/// Rectangle in page points, origin at the top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn is_drawable(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// A text element ready to be drawn on one page.
#[derive(Debug, Clone)]
pub struct RenderedTextElement {
    pub text: String,
    pub rect: PageRect,
    pub style: FontStyle,
    pub face: FontFace,
    pub size: f32,
    pub spacing: f32,
}
