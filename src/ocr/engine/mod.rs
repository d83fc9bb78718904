mod fit;
mod geom;
mod order;
mod orientation;
mod text;

use tracing::debug;

use crate::ocr::canvas::PageCanvas;
use crate::ocr::font::FontBook;
use crate::ocr::model::{OcrDocument, OcrElement, OcrMode};
use crate::ocr::RenderedTextElement;

pub use fit::{
    MIN_FONT_SIZE, SPACING_MAX_ITERATIONS, SPACING_TOLERANCE_PT, fit_char_spacing, fit_element,
    fit_font_size, resolve_style,
};
pub use geom::{Dpi, POINTS_PER_INCH, PageSize, element_page_rect, polygon_to_page_rect};
pub use order::sort_reading_order;
pub use orientation::{UPRIGHT, is_upright};
pub use text::{drawable_text, extract_span};

/// Per-request options; read-only while pages are rebuilt.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildSettings {
    pub mode: OcrMode,
    pub dpi_x: f32,
    pub dpi_y: f32,
    pub text_visible: bool,
    pub box_visible: bool,
    pub style_info: bool,
}

impl Default for RebuildSettings {
    fn default() -> Self {
        Self {
            mode: OcrMode::Tokens,
            dpi_x: 150.0,
            dpi_y: 150.0,
            text_visible: false,
            box_visible: false,
            style_info: false,
        }
    }
}

impl RebuildSettings {
    pub fn dpi(&self) -> Dpi {
        Dpi {
            x: self.dpi_x,
            y: self.dpi_y,
        }
    }
}

/// Everything a page rebuild reads besides the OCR result itself.
#[derive(Debug, Clone, Copy)]
pub struct RebuildContext<'a> {
    pub settings: &'a RebuildSettings,
    pub fonts: &'a FontBook,
}

/// Draws the OCR text layer of `document` onto `canvas`.
///
/// Returns `false` when the document has no text, no page, or no element
/// list for the configured mode. Otherwise returns `true`, even when every
/// element ended up skipped.
pub fn rebuild_page<C: PageCanvas + ?Sized>(
    document: &OcrDocument,
    canvas: &mut C,
    ctx: &RebuildContext<'_>,
) -> bool {
    let full_text = document.full_text();
    if full_text.trim().is_empty() {
        debug!("OCR result has no text");
        return false;
    }
    let Some(page) = document.first_page() else {
        debug!("OCR result has no pages");
        return false;
    };
    let Some(mut elements) = page.elements(ctx.settings.mode) else {
        debug!("OCR result has no {} list", ctx.settings.mode);
        return false;
    };

    sort_reading_order(&mut elements);
    let total = elements.len();
    let page_size = PageSize {
        width: canvas.width(),
        height: canvas.height(),
    };

    let mut drawn = 0usize;
    for element in elements.iter().filter(|element| is_upright(element)) {
        let Some(rendered) = build_element(element, full_text, page_size, ctx) else {
            continue;
        };
        canvas.draw_text(&rendered, ctx.settings.text_visible);
        if ctx.settings.box_visible {
            canvas.draw_rectangle(rendered.rect);
        }
        drawn += 1;
    }
    debug!("drew {} of {} {}", drawn, total, ctx.settings.mode);
    true
}

fn build_element(
    element: &OcrElement,
    full_text: &str,
    page_size: PageSize,
    ctx: &RebuildContext<'_>,
) -> Option<RenderedTextElement> {
    let rect = element_page_rect(element, page_size, ctx.settings.dpi());
    let text = drawable_text(extract_span(element, full_text));
    if text.is_empty() {
        return None;
    }
    if !rect.is_drawable() {
        debug!("skipping '{}' with empty box", text);
        return None;
    }
    let style = resolve_style(element, ctx.settings.style_info);
    Some(fit_element(text, rect, style, ctx.fonts))
}
