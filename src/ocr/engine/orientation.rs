use crate::ocr::model::OcrElement;

/// Orientation value marking an element as upright on the page.
pub const UPRIGHT: &str = "PAGE_UP";

/// Keeps elements without an orientation and those tagged upright.
pub fn is_upright(element: &OcrElement) -> bool {
    match element.orientation() {
        None => true,
        Some(value) => value == UPRIGHT,
    }
}
