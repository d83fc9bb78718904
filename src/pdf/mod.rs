mod compose;
mod raster;

pub use compose::{ComposedPage, compose_pdf};
pub use raster::{RasterPage, command_exists, image_page, rasterize_pdf};

fn pt_to_mm(pt: f32) -> printpdf::Mm {
    let inches = pt / crate::ocr::POINTS_PER_INCH;
    printpdf::Mm(inches * 25.4)
}
