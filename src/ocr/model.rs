use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Granularity of recognized elements consulted for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrMode {
    Lines,
    #[default]
    Tokens,
    Symbols,
}

impl OcrMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrMode::Lines => "lines",
            OcrMode::Tokens => "tokens",
            OcrMode::Symbols => "symbols",
        }
    }
}

impl fmt::Display for OcrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "lines" | "line" => Ok(OcrMode::Lines),
            "tokens" | "token" | "words" => Ok(OcrMode::Tokens),
            "symbols" | "symbol" | "chars" => Ok(OcrMode::Symbols),
            other => Err(format!(
                "unknown OCR mode '{}' (expected lines, tokens or symbols)",
                other
            )),
        }
    }
}

/// Structured OCR result for one page, as returned by Document AI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrDocument {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    pages: Option<Vec<OcrPage>>,
}

impl OcrDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).with_context(|| "failed to parse OCR result JSON")
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).with_context(|| "failed to parse OCR result JSON")
    }

    /// Full recognized text of the page; empty when absent.
    pub fn full_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn first_page(&self) -> Option<&OcrPage> {
        self.pages.as_ref().and_then(|pages| pages.first())
    }
}

/// Elements are kept as raw JSON until a mode is selected so that one
/// malformed element cannot reject the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    lines: Option<Vec<Value>>,
    #[serde(default)]
    tokens: Option<Vec<Value>>,
    #[serde(default)]
    symbols: Option<Vec<Value>>,
}

impl OcrPage {
    /// Returns `None` when the page carries no list for `mode`.
    pub fn elements(&self, mode: OcrMode) -> Option<Vec<OcrElement>> {
        let raw = match mode {
            OcrMode::Lines => self.lines.as_ref(),
            OcrMode::Tokens => self.tokens.as_ref(),
            OcrMode::Symbols => self.symbols.as_ref(),
        }?;
        let mut elements = Vec::with_capacity(raw.len());
        for (idx, value) in raw.iter().enumerate() {
            match OcrElement::deserialize(value) {
                Ok(element) => elements.push(element),
                Err(err) => debug!("skipping malformed {} element {}: {}", mode, idx, err),
            }
        }
        Some(elements)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrElement {
    #[serde(default)]
    pub layout: Option<Layout>,
    #[serde(default, alias = "styleInfo")]
    pub text_style: Option<TextStyle>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub text_anchor: Option<TextAnchor>,
    #[serde(default)]
    pub bounding_poly: Option<BoundingPoly>,
    #[serde(default)]
    pub orientation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnchor {
    #[serde(default)]
    pub text_segments: Vec<TextSegment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(default)]
    pub start_index: Option<TextIndex>,
    #[serde(default)]
    pub end_index: Option<TextIndex>,
}

/// Document AI encodes int64 offsets as decimal strings; plain numbers are
/// accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextIndex {
    Number(i64),
    Text(String),
}

impl TextIndex {
    pub fn value(&self) -> Option<i64> {
        match self {
            TextIndex::Number(value) => Some(*value),
            TextIndex::Text(value) => value.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingPoly {
    #[serde(default)]
    pub normalized_vertices: Vec<Vertex>,
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// Zero coordinates are omitted from proto3 JSON, hence the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

/// Vertices of an element together with the coordinate space they use.
#[derive(Debug, Clone, Copy)]
pub struct Polygon<'a> {
    pub vertices: &'a [Vertex],
    pub normalized: bool,
}

impl OcrElement {
    pub fn polygon(&self) -> Option<Polygon<'_>> {
        let poly = self.layout.as_ref()?.bounding_poly.as_ref()?;
        if !poly.normalized_vertices.is_empty() {
            return Some(Polygon {
                vertices: &poly.normalized_vertices,
                normalized: true,
            });
        }
        if !poly.vertices.is_empty() {
            return Some(Polygon {
                vertices: &poly.vertices,
                normalized: false,
            });
        }
        None
    }

    /// First vertex of the polygon, `(0, 0)` when there is none.
    pub fn top_left(&self) -> (f32, f32) {
        self.polygon()
            .and_then(|poly| poly.vertices.first())
            .map(|vertex| (vertex.x, vertex.y))
            .unwrap_or((0.0, 0.0))
    }

    /// `(start, end)` of the first text segment. Missing indices read as 0;
    /// `None` when the anchor is absent or an index is not a number.
    pub fn text_range(&self) -> Option<(i64, i64)> {
        let segment = self
            .layout
            .as_ref()?
            .text_anchor
            .as_ref()?
            .text_segments
            .first()?;
        let start = match &segment.start_index {
            Some(index) => index.value()?,
            None => 0,
        };
        let end = match &segment.end_index {
            Some(index) => index.value()?,
            None => 0,
        };
        Some((start, end))
    }

    pub fn orientation(&self) -> Option<&str> {
        self.layout
            .as_ref()?
            .orientation
            .as_deref()
            .filter(|value| !value.trim().is_empty())
    }

    pub fn style(&self) -> Option<TextStyle> {
        self.text_style
    }
}
