use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::ocr::OcrMode;

/// OCR results and page text kept next to the output, one set of files per
/// page and mode. A cached result means the service is not called again.
#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
    stem: String,
    mode: OcrMode,
    compress: bool,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>, stem: &str, mode: OcrMode, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.to_string(),
            mode,
            compress,
        }
    }

    fn page_path(&self, index: usize, extension: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_page_{:03}_{}.{}",
            self.stem,
            index,
            self.mode.as_str(),
            extension
        ))
    }

    pub fn result_path(&self, index: usize) -> PathBuf {
        self.page_path(index, if self.compress { "zip" } else { "json" })
    }

    pub fn text_path(&self, index: usize) -> PathBuf {
        self.page_path(index, "txt")
    }

    pub fn pdf_path(&self, index: usize) -> PathBuf {
        self.page_path(index, "pdf")
    }

    pub fn load(&self, index: usize) -> Result<Option<Value>> {
        let path = self.result_path(index);
        if !path.exists() {
            return Ok(None);
        }
        debug!("using cached OCR result {}", path.display());
        let json = if self.compress {
            read_zipped_json(&path)?
        } else {
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read cache: {}", path.display()))?
        };
        let value = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse cache: {}", path.display()))?;
        Ok(Some(value))
    }

    pub fn store(&self, index: usize, document: &Value) -> Result<PathBuf> {
        let path = self.result_path(index);
        let json = serde_json::to_string_pretty(document)
            .with_context(|| "failed to serialize OCR result")?;
        if self.compress {
            let entry = format!("{}_page_{:03}_{}.json", self.stem, index, self.mode.as_str());
            fs::write(&path, zip_json(&entry, &json)?)
                .with_context(|| format!("failed to write cache: {}", path.display()))?;
        } else {
            fs::write(&path, json)
                .with_context(|| format!("failed to write cache: {}", path.display()))?;
        }
        Ok(path)
    }

    pub fn store_text(&self, index: usize, text: &str) -> Result<PathBuf> {
        let path = self.text_path(index);
        fs::write(&path, text)
            .with_context(|| format!("failed to write page text: {}", path.display()))?;
        Ok(path)
    }
}

fn zip_json(entry: &str, json: &str) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(entry, options)
        .with_context(|| "failed to start zip entry")?;
    writer
        .write_all(json.as_bytes())
        .with_context(|| "failed to write zip entry")?;
    let cursor = writer
        .finish()
        .with_context(|| "failed to finalize zip output")?;
    Ok(cursor.into_inner())
}

fn read_zipped_json(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read cache: {}", path.display()))?;
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).with_context(|| "failed to read zip archive")?;
    if archive.is_empty() {
        return Err(anyhow!("cache archive is empty: {}", path.display()));
    }
    let mut file = archive
        .by_index(0)
        .with_context(|| "failed to read zip entry")?;
    let mut json = String::new();
    file.read_to_string(&mut json)
        .with_context(|| "failed to read zip entry content")?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_files_by_page_and_mode() {
        let cache = PageCache::new("/out", "scan", OcrMode::Tokens, false);
        assert_eq!(cache.result_path(3), PathBuf::from("/out/scan_page_003_tokens.json"));
        assert_eq!(cache.text_path(3), PathBuf::from("/out/scan_page_003_tokens.txt"));
        assert_eq!(cache.pdf_path(12), PathBuf::from("/out/scan_page_012_tokens.pdf"));

        let zipped = PageCache::new("/out", "scan", OcrMode::Lines, true);
        assert_eq!(zipped.result_path(0), PathBuf::from("/out/scan_page_000_lines.zip"));
    }

    #[test]
    fn stores_and_loads_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path(), "doc", OcrMode::Symbols, false);
        assert!(cache.load(0).unwrap().is_none());

        let document = json!({ "text": "abc", "pages": [] });
        let path = cache.store(0, &document).unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("\"text\": \"abc\""));
        assert_eq!(cache.load(0).unwrap(), Some(document));
    }

    #[test]
    fn stores_and_loads_zipped_json() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path(), "doc", OcrMode::Tokens, true);
        let document = json!({ "text": "zipped", "pages": [{ "tokens": [] }] });
        let path = cache.store(4, &document).unwrap();
        assert!(fs::read(&path).unwrap().starts_with(b"PK"));
        assert_eq!(cache.load(4).unwrap(), Some(document));
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path(), "doc", OcrMode::Tokens, false);
        fs::write(cache.result_path(1), "{ not json").unwrap();
        assert!(cache.load(1).is_err());
    }
}
