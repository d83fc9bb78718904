use anyhow::{Context, Result, anyhow};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb, TextRenderingMode,
};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::debug;

use super::pt_to_mm;
use crate::ocr::{
    Dpi, DrawOp, FontBook, FontFace, FontMetrics, FontStyle, PageRect, PageSize,
    RenderedTextElement, fit_element,
};

const OUTLINE_THICKNESS_PT: f32 = 0.05;

/// A rebuilt page: its scan and the text layer recorded for it.
pub struct ComposedPage<'a> {
    pub image_png: &'a [u8],
    pub size: PageSize,
    pub dpi: Dpi,
    pub ops: &'a [DrawOp],
}

/// Writes `pages` into one PDF, each page as its scan with the OCR text
/// layer on top.
pub fn compose_pdf(title: &str, pages: &[ComposedPage<'_>]) -> Result<Vec<u8>> {
    let first = pages.first().ok_or_else(|| anyhow!("no pages to write"))?;
    let (doc, page, layer) = PdfDocument::new(
        title,
        pt_to_mm(first.size.width),
        pt_to_mm(first.size.height),
        "Scan 1",
    );
    let mut targets = vec![(page, layer)];
    for (idx, composed) in pages.iter().enumerate().skip(1) {
        targets.push(doc.add_page(
            pt_to_mm(composed.size.width),
            pt_to_mm(composed.size.height),
            format!("Scan {}", idx + 1),
        ));
    }

    let mut fonts = FontRefs::default();
    for (composed, (page, layer)) in pages.iter().zip(targets) {
        let page_ref = doc.get_page(page);
        place_scan(page_ref.get_layer(layer), composed)?;

        let text_layer = page_ref.add_layer("OCR text");
        for op in composed.ops {
            match op {
                DrawOp::Text { element, visible } => {
                    let (font, element) = fonts.resolve(&doc, element)?;
                    write_text(&text_layer, &font, &element, *visible, composed.size.height);
                }
                DrawOp::Rectangle(rect) => draw_outline(&text_layer, rect, composed.size.height),
            }
        }
    }

    let mut buffer = Vec::new();
    {
        let mut writer = std::io::BufWriter::new(&mut buffer);
        doc.save(&mut writer)
            .map_err(|err| anyhow!("failed to write pdf: {:?}", err))?;
    }
    Ok(buffer)
}

fn place_scan(layer: PdfLayerReference, page: &ComposedPage<'_>) -> Result<()> {
    let image = printpdf::image_crate::load_from_memory(page.image_png)
        .with_context(|| "failed to decode page image")?;
    let transform = ImageTransform {
        translate_x: Some(Mm(0.0)),
        translate_y: Some(Mm(0.0)),
        rotate: None,
        scale_x: Some(1.0),
        scale_y: Some(page.dpi.x / page.dpi.y),
        dpi: Some(page.dpi.x),
    };
    Image::from_dynamic_image(&image).add_to_layer(layer, transform);
    Ok(())
}

fn write_text(
    layer: &PdfLayerReference,
    font: &IndirectFontRef,
    element: &RenderedTextElement,
    visible: bool,
    page_height: f32,
) {
    let baseline = element.rect.y + element.face.ascent_ratio() * element.size;
    layer.begin_text_section();
    layer.set_font(font, element.size);
    layer.set_text_cursor(pt_to_mm(element.rect.x), pt_to_mm(page_height - baseline));
    layer.set_character_spacing(element.spacing);
    if visible {
        layer.set_fill_color(red());
        layer.set_text_rendering_mode(TextRenderingMode::Fill);
    } else {
        layer.set_text_rendering_mode(TextRenderingMode::Invisible);
    }
    layer.write_text(element.text.clone(), font);
    layer.end_text_section();
}

fn draw_outline(layer: &PdfLayerReference, rect: &PageRect, page_height: f32) {
    let left = pt_to_mm(rect.x);
    let right = pt_to_mm(rect.x + rect.width);
    let top = pt_to_mm(page_height - rect.y);
    let bottom = pt_to_mm(page_height - rect.y - rect.height);
    let line = Line {
        points: vec![
            (Point::new(left, top), false),
            (Point::new(right, top), false),
            (Point::new(right, bottom), false),
            (Point::new(left, bottom), false),
        ],
        is_closed: true,
    };
    layer.set_outline_color(red());
    layer.set_outline_thickness(OUTLINE_THICKNESS_PT);
    layer.add_line(line);
}

fn red() -> Color {
    Color::Rgb(Rgb::new(1.0, 0.0, 0.0, None))
}

/// Font resources added to one document, created on first use. Embedded
/// fonts are keyed by their loaded data so one file is embedded once.
#[derive(Default)]
struct FontRefs {
    embedded: HashMap<(usize, u32), Option<IndirectFontRef>>,
    builtin: HashMap<FontStyle, IndirectFontRef>,
}

impl FontRefs {
    /// Font to draw `element` with. When its face cannot be embedded the
    /// element is refitted to built-in Times so the drawn text still fills
    /// its box.
    fn resolve<'e>(
        &mut self,
        doc: &PdfDocumentReference,
        element: &'e RenderedTextElement,
    ) -> Result<(IndirectFontRef, Cow<'e, RenderedTextElement>)> {
        let FontFace::Embedded(metrics) = &element.face else {
            return Ok((self.builtin(doc, element.style)?, Cow::Borrowed(element)));
        };
        if let Some(font) = self.embedded(doc, metrics) {
            return Ok((font, Cow::Borrowed(element)));
        }
        let refitted = refit_builtin(element);
        Ok((self.builtin(doc, element.style)?, Cow::Owned(refitted)))
    }

    fn embedded(
        &mut self,
        doc: &PdfDocumentReference,
        metrics: &FontMetrics,
    ) -> Option<IndirectFontRef> {
        let key = (metrics.data_id(), metrics.face_index());
        self.embedded
            .entry(key)
            .or_insert_with(|| {
                if metrics.face_index() != 0 {
                    debug!("face {} of a collection; using Times", metrics.face_index());
                    return None;
                }
                match doc.add_external_font(metrics.data()) {
                    Ok(font) => Some(font),
                    Err(err) => {
                        let family = metrics.family().unwrap_or("font");
                        debug!("embedding {} failed ({:?}); using Times", family, err);
                        None
                    }
                }
            })
            .clone()
    }

    fn builtin(&mut self, doc: &PdfDocumentReference, style: FontStyle) -> Result<IndirectFontRef> {
        if let Some(font) = self.builtin.get(&style) {
            return Ok(font.clone());
        }
        let builtin = match style {
            FontStyle::Regular => BuiltinFont::TimesRoman,
            FontStyle::Bold => BuiltinFont::TimesBold,
            FontStyle::Italic => BuiltinFont::TimesItalic,
            FontStyle::BoldItalic => BuiltinFont::TimesBoldItalic,
        };
        let font = doc
            .add_builtin_font(builtin)
            .map_err(|err| anyhow!("failed to add built-in font: {:?}", err))?;
        self.builtin.insert(style, font.clone());
        Ok(font)
    }
}

fn refit_builtin(element: &RenderedTextElement) -> RenderedTextElement {
    fit_element(
        element.text.clone(),
        element.rect,
        element.style,
        &FontBook::builtin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{
        PageCanvas, RecordingCanvas, fit_char_spacing, fit_font_size, load_font_metrics,
    };
    use std::io::Cursor;

    fn blank_png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn writes_multi_page_pdf_with_text_layer() {
        let png = blank_png(120, 160);
        let dpi = Dpi { x: 72.0, y: 72.0 };
        let size = PageSize {
            width: 120.0,
            height: 160.0,
        };
        let mut canvas = RecordingCanvas::new(size.width, size.height);
        let rect = PageRect {
            x: 10.0,
            y: 20.0,
            width: 60.0,
            height: 12.0,
        };
        let fonts = FontBook::builtin();
        let element = fit_element("Searchable".to_string(), rect, FontStyle::Bold, &fonts);
        canvas.draw_text(&element, false);
        canvas.draw_rectangle(rect);
        let ops = canvas.into_ops();

        let pages = [
            ComposedPage {
                image_png: &png,
                size,
                dpi,
                ops: &ops,
            },
            ComposedPage {
                image_png: &png,
                size,
                dpi,
                ops: &[],
            },
        ];
        let pdf = compose_pdf("test", &pages).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    fn rect() -> PageRect {
        PageRect {
            x: 10.0,
            y: 20.0,
            width: 80.0,
            height: 14.0,
        }
    }

    fn embedded_element(metrics: FontMetrics, style: FontStyle) -> RenderedTextElement {
        RenderedTextElement {
            text: "Collection".to_string(),
            rect: rect(),
            style,
            face: FontFace::Embedded(metrics),
            size: 31.0,
            spacing: -4.0,
        }
    }

    #[test]
    fn unembeddable_faces_are_refitted_to_times() {
        let doc = PdfDocument::empty("fonts");
        let mut fonts = FontRefs::default();
        for metrics in [
            FontMetrics::unparsed(vec![0; 64], 1),
            FontMetrics::unparsed(b"not a font".to_vec(), 0),
        ] {
            let element = embedded_element(metrics, FontStyle::Bold);
            let (_, drawn) = fonts.resolve(&doc, &element).unwrap();
            let times = FontFace::Builtin(FontStyle::Bold);
            let size = fit_font_size(&times, rect().height);
            assert!(matches!(drawn, Cow::Owned(_)));
            assert!(matches!(drawn.face, FontFace::Builtin(FontStyle::Bold)));
            assert_eq!(drawn.size, size);
            assert_eq!(
                drawn.spacing,
                fit_char_spacing(&times, "Collection", size, rect().width)
            );
        }
    }

    #[test]
    fn builtin_faces_are_drawn_as_fitted() {
        let doc = PdfDocument::empty("fonts");
        let mut fonts = FontRefs::default();
        let builtin = FontBook::builtin();
        let element = fit_element("Times".to_string(), rect(), FontStyle::Italic, &builtin);
        let (_, drawn) = fonts.resolve(&doc, &element).unwrap();
        assert!(matches!(drawn, Cow::Borrowed(_)));
        assert!(fonts.embedded.is_empty());
    }

    #[test]
    fn one_font_file_is_embedded_once() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/fonts/Tuffy.ttf");
        let metrics = load_font_metrics(&path).unwrap();
        let doc = PdfDocument::empty("fonts");
        let mut fonts = FontRefs::default();
        for style in FontStyle::ALL {
            let element = embedded_element(metrics.clone(), style);
            fonts.resolve(&doc, &element).unwrap();
        }
        assert_eq!(fonts.embedded.len(), 1);
    }

    #[test]
    fn refuses_empty_documents() {
        assert!(compose_pdf("empty", &[]).is_err());
    }
}
