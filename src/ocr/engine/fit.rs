use crate::ocr::font::{FontBook, FontFace, FontStyle};
use crate::ocr::model::OcrElement;
use crate::ocr::{PageRect, RenderedTextElement};

/// Smallest point size ever produced.
pub const MIN_FONT_SIZE: f32 = 1.0;
/// Width error, in points, accepted by the spacing search.
pub const SPACING_TOLERANCE_PT: f32 = 0.5;
/// Upper bound on spacing search iterations.
pub const SPACING_MAX_ITERATIONS: usize = 20;

/// Style from the element's style hints; Regular unless `style_info` is on.
pub fn resolve_style(element: &OcrElement, style_info: bool) -> FontStyle {
    if !style_info {
        return FontStyle::Regular;
    }
    element
        .style()
        .map(|style| FontStyle::from_flags(style.bold, style.italic))
        .unwrap_or(FontStyle::Regular)
}

/// Point size whose rendered sample height equals `box_height`.
pub fn fit_font_size(face: &FontFace, box_height: f32) -> f32 {
    if !(box_height > 0.0) {
        return MIN_FONT_SIZE;
    }
    let ratio = face.height_ratio();
    if !(ratio > 0.0) {
        return box_height.max(MIN_FONT_SIZE);
    }
    (box_height / ratio).max(MIN_FONT_SIZE)
}

/// Inter-character spacing that stretches `text` to `box_width`.
///
/// Linear correction over the gap count, re-measured each round; returns
/// the closest value seen once within tolerance or after the iteration cap.
pub fn fit_char_spacing(face: &FontFace, text: &str, size: f32, box_width: f32) -> f32 {
    let chars = text.chars().count();
    if chars <= 1 || !(box_width > 0.0) {
        return 0.0;
    }
    let gaps = (chars - 1) as f32;

    let mut spacing = 0.0f32;
    let mut best = spacing;
    let mut best_error = f32::INFINITY;
    for _ in 0..SPACING_MAX_ITERATIONS {
        let measured = face.text_width(text, size, spacing);
        let error = box_width - measured;
        if !error.is_finite() {
            break;
        }
        if error.abs() < best_error {
            best_error = error.abs();
            best = spacing;
        }
        if error.abs() <= SPACING_TOLERANCE_PT {
            break;
        }
        spacing += error / gaps;
    }
    best
}

/// Resolves font, size and spacing for one element's drawable text.
pub fn fit_element(
    text: String,
    rect: PageRect,
    style: FontStyle,
    fonts: &FontBook,
) -> RenderedTextElement {
    let face = fonts.face(style).clone();
    let size = fit_font_size(&face, rect.height);
    let spacing = fit_char_spacing(&face, &text, size, rect.width);
    RenderedTextElement {
        text,
        rect,
        style,
        face,
        size,
        spacing,
    }
}
