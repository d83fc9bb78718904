mod documentai;
mod retry;

use anyhow::Result;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

pub use documentai::{DocumentAi, DocumentAiConfig, resolve_access_token};

pub type OcrFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send + 'a>>;

/// One page image to recognize.
#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    pub bytes: &'a [u8],
    pub mime: &'a str,
    pub language: &'a str,
    pub enable_symbols: bool,
    pub style_info: bool,
}

/// Produces the structured OCR result for one page. `Ok(None)` means the
/// service returned no document; the page is skipped.
pub trait OcrService: Send + Sync {
    fn recognize<'a>(&'a self, request: OcrRequest<'a>) -> OcrFuture<'a>;
}
