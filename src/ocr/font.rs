use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Glyphs with ascenders, descenders and diacritics used to measure how tall
/// rendered text is relative to its point size.
const SAMPLE_TEXT: &str = "ÁÉÍÓÚÑÄÖÜbdfhklgjpqy|";

/// Serif families tried, in order, when no family is configured.
pub const SERIF_FALLBACKS: &[&str] = &[
    "Times New Roman",
    "Liberation Serif",
    "DejaVu Serif",
    "Noto Serif",
    "serif",
];

/// Rendered height over point size for built-in faces (size = 90% of box).
const BUILTIN_HEIGHT_RATIO: f32 = 1.0 / 0.9;
const BUILTIN_ASCENT_RATIO: f32 = 0.89;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub const ALL: [FontStyle; 4] = [
        FontStyle::Regular,
        FontStyle::Bold,
        FontStyle::Italic,
        FontStyle::BoldItalic,
    ];

    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => FontStyle::BoldItalic,
            (true, false) => FontStyle::Bold,
            (false, true) => FontStyle::Italic,
            (false, false) => FontStyle::Regular,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }

    fn index(&self) -> usize {
        match self {
            FontStyle::Regular => 0,
            FontStyle::Bold => 1,
            FontStyle::Italic => 2,
            FontStyle::BoldItalic => 3,
        }
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascent: i16,
    descent: i16,
    family: Option<String>,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    /// Identity of the loaded font data; clones of one load share it.
    pub fn data_id(&self) -> usize {
        Arc::as_ptr(&self.data) as usize
    }

    #[cfg(test)]
    pub(crate) fn unparsed(data: Vec<u8>, face_index: u32) -> Self {
        Self {
            data: Arc::new(data),
            face_index,
            units_per_em: 1000,
            space_advance: 250,
            ascent: 800,
            descent: -200,
            family: None,
        }
    }

    fn advance_units(&self, text: &str) -> Option<u32> {
        let face = Face::parse(&self.data, self.face_index).ok()?;
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        Some(advance)
    }

    fn units(&self) -> f32 {
        self.units_per_em.max(1) as f32
    }
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

/// A face the fitter can measure and the PDF writer can draw with.
#[derive(Debug, Clone)]
pub enum FontFace {
    /// Parsed font file, embedded into the output.
    Embedded(FontMetrics),
    /// PDF base-14 Times face; widths are estimated.
    Builtin(FontStyle),
}

impl FontFace {
    pub fn family(&self) -> &str {
        match self {
            FontFace::Embedded(metrics) => metrics.family().unwrap_or("embedded"),
            FontFace::Builtin(_) => "Times",
        }
    }

    /// Visible width of `text` at `size` with `spacing` added between
    /// consecutive characters.
    pub fn text_width(&self, text: &str, size: f32, spacing: f32) -> f32 {
        let gaps = text.chars().count().saturating_sub(1) as f32;
        let natural = match self {
            FontFace::Embedded(metrics) => match metrics.advance_units(text) {
                Some(units) => units as f32 * (size / metrics.units()),
                None => estimate_text_width_units(text) * size,
            },
            FontFace::Builtin(_) => estimate_text_width_units(text) * size,
        };
        natural + spacing * gaps
    }

    /// Height of the sample text divided by the point size it was set at.
    pub fn height_ratio(&self) -> f32 {
        match self {
            FontFace::Embedded(metrics) => {
                let extent = (metrics.ascent as f32 - metrics.descent as f32) / metrics.units();
                if extent > 0.0 {
                    extent
                } else {
                    BUILTIN_HEIGHT_RATIO
                }
            }
            FontFace::Builtin(_) => BUILTIN_HEIGHT_RATIO,
        }
    }

    /// Distance from the top of the sample extent to the baseline, per point.
    pub fn ascent_ratio(&self) -> f32 {
        match self {
            FontFace::Embedded(metrics) if metrics.ascent > 0 => {
                metrics.ascent as f32 / metrics.units()
            }
            _ => BUILTIN_ASCENT_RATIO,
        }
    }
}

/// One resolved face per style, shared read-only by every page worker.
#[derive(Debug, Clone)]
pub struct FontBook {
    faces: [FontFace; 4],
}

impl FontBook {
    pub fn builtin() -> Self {
        Self {
            faces: FontStyle::ALL.map(FontFace::Builtin),
        }
    }

    /// Resolves faces from `font_path` or the system font database. With a
    /// font file, bold and italic come from installed faces of the file's
    /// family when there are any. A style that cannot be resolved falls back
    /// to the built-in Times face.
    pub fn load(font_path: Option<&Path>, font_family: Option<&str>) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();

        if let Some(path) = font_path {
            match load_font_metrics(path) {
                Ok(metrics) => {
                    debug!("using font file {}", path.display());
                    let faces = FontStyle::ALL.map(|style| {
                        let face = styled_sibling(&db, &metrics, style).unwrap_or_else(|| {
                            if style != FontStyle::Regular {
                                debug!(
                                    "no {:?} face for {}; using the file",
                                    style,
                                    path.display()
                                );
                            }
                            metrics.clone()
                        });
                        FontFace::Embedded(face)
                    });
                    return Self { faces };
                }
                Err(err) => warn!("{:#}; falling back to system fonts", err),
            }
        }

        let mut families: Vec<&str> = Vec::new();
        if let Some(family) = font_family.filter(|value| !value.trim().is_empty()) {
            families.push(family);
        }
        families.extend_from_slice(SERIF_FALLBACKS);

        let faces = FontStyle::ALL.map(|style| {
            for family in &families {
                match load_font_metrics_from_family(&db, family, style) {
                    Ok(metrics) => {
                        debug!(
                            "resolved {:?} to {}",
                            style,
                            metrics.family().unwrap_or(family)
                        );
                        return FontFace::Embedded(metrics);
                    }
                    Err(err) => debug!("{:#}", err),
                }
            }
            warn!("no serif font found for {:?}; using built-in Times", style);
            FontFace::Builtin(style)
        });
        Self { faces }
    }

    pub fn face(&self, style: FontStyle) -> &FontFace {
        &self.faces[style.index()]
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data, 0)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

fn load_font_metrics_from_data(data: &[u8], face_index: u32) -> Result<FontMetrics> {
    let face = Face::parse(data, face_index).map_err(|err| anyhow!("{}", err))?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    let (ascent, descent) = sample_extent(&face);
    Ok(FontMetrics {
        data: Arc::new(data.to_vec()),
        face_index,
        units_per_em,
        space_advance,
        ascent,
        descent,
        family: extract_family_name(&face),
    })
}

fn sample_extent(face: &Face<'_>) -> (i16, i16) {
    let mut top = i16::MIN;
    let mut bottom = i16::MAX;
    for ch in SAMPLE_TEXT.chars() {
        let Some(bbox) = face
            .glyph_index(ch)
            .and_then(|glyph| face.glyph_bounding_box(glyph))
        else {
            continue;
        };
        top = top.max(bbox.y_max);
        bottom = bottom.min(bbox.y_min);
    }
    if top <= bottom {
        return (face.ascender(), face.descender());
    }
    (top, bottom)
}

fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: &str,
    style: FontStyle,
) -> Result<FontMetrics> {
    let families = if family.eq_ignore_ascii_case("serif") {
        vec![fontdb::Family::Serif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        weight: if style.is_bold() {
            fontdb::Weight::BOLD
        } else {
            fontdb::Weight::NORMAL
        },
        style: if style.is_italic() {
            fontdb::Style::Italic
        } else {
            fontdb::Style::Normal
        },
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {} ({:?})", family, style))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    embeddable_metrics(&data, face_index)
        .with_context(|| format!("skipping {} ({:?})", family, style))
}

/// Metrics for a face the PDF writer can embed; it only takes the first
/// face of a collection.
fn embeddable_metrics(data: &[u8], face_index: u32) -> Result<FontMetrics> {
    if face_index != 0 {
        return Err(anyhow!(
            "face {} of a font collection cannot be embedded",
            face_index
        ));
    }
    load_font_metrics_from_data(data, face_index)
}

/// Bold/italic face of the same family as `metrics`, from the system fonts.
fn styled_sibling(
    db: &fontdb::Database,
    metrics: &FontMetrics,
    style: FontStyle,
) -> Option<FontMetrics> {
    if style == FontStyle::Regular {
        return None;
    }
    let family = metrics.family()?;
    let sibling = load_font_metrics_from_family(db, family, style).ok()?;
    (sibling.data() != metrics.data()).then_some(sibling)
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

fn estimate_char_units_for_width(ch: char) -> f32 {
    if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_uppercase() {
        0.67
    } else if ch.is_ascii_alphanumeric() {
        0.5
    } else if ch.is_ascii() {
        0.33
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    ) {
        1.0
    } else {
        0.6
    }
}

fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().map(estimate_char_units_for_width).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_flags_map_to_four_styles() {
        assert_eq!(FontStyle::from_flags(false, false), FontStyle::Regular);
        assert_eq!(FontStyle::from_flags(true, false), FontStyle::Bold);
        assert_eq!(FontStyle::from_flags(false, true), FontStyle::Italic);
        assert_eq!(FontStyle::from_flags(true, true), FontStyle::BoldItalic);
        assert!(FontStyle::BoldItalic.is_bold() && FontStyle::BoldItalic.is_italic());
    }

    #[test]
    fn builtin_book_keeps_the_requested_style() {
        let book = FontBook::builtin();
        for style in FontStyle::ALL {
            assert!(matches!(book.face(style), FontFace::Builtin(found) if *found == style));
        }
    }

    #[test]
    fn missing_font_file_falls_back_without_error() {
        let book = FontBook::load(Some(Path::new("/nonexistent/font.ttf")), None);
        let face = book.face(FontStyle::Bold);
        assert!(face.text_width("abc", 10.0, 0.0) > 0.0);
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/fonts")
            .join(name)
    }

    #[test]
    fn only_first_face_of_a_collection_is_accepted() {
        let data = std::fs::read(fixture("collection.ttc")).unwrap();
        assert!(embeddable_metrics(&data, 0).is_ok());
        let err = embeddable_metrics(&data, 1).unwrap_err();
        assert!(err.to_string().contains("cannot be embedded"));
    }

    #[test]
    fn font_file_serves_every_style_from_one_load() {
        let book = FontBook::load(Some(&fixture("Tuffy.ttf")), None);
        let FontFace::Embedded(regular) = book.face(FontStyle::Regular) else {
            panic!("font file was not used");
        };
        assert_eq!(regular.family(), Some("Tuffy"));
        for style in FontStyle::ALL {
            let FontFace::Embedded(metrics) = book.face(style) else {
                panic!("{:?} fell back to built-in", style);
            };
            if metrics.data() == regular.data() {
                assert_eq!(metrics.data_id(), regular.data_id());
            }
        }
    }

    #[test]
    fn spacing_adds_once_per_gap() {
        let face = FontFace::Builtin(FontStyle::Regular);
        let natural = face.text_width("abcd", 12.0, 0.0);
        let spaced = face.text_width("abcd", 12.0, 2.0);
        assert!((spaced - natural - 6.0).abs() < 1e-4);
        assert_eq!(face.text_width("a", 12.0, 5.0), face.text_width("a", 12.0, 0.0));
    }
}
