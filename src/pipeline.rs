use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::PageCache;
use crate::ocr::{
    Dpi, DrawOp, FontBook, OcrDocument, OcrMode, PageSize, RebuildContext, RebuildSettings,
    RecordingCanvas, rebuild_page,
};
use crate::pdf::{ComposedPage, RasterPage, compose_pdf, image_page, rasterize_pdf};
use crate::service::{OcrRequest, OcrService};
use crate::settings::Settings;

const PDF_MIME: &str = "application/pdf";
const PNG_MIME: &str = "image/png";

/// One input file and where its outputs go.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub input: PathBuf,
    /// Defaults to the input's directory.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub total_pages: usize,
    pub rebuilt_pages: Vec<usize>,
    pub skipped_pages: Vec<usize>,
    pub pdf_path: PathBuf,
    pub text_path: PathBuf,
    pub page_pdf_paths: Vec<PathBuf>,
}

struct PageJob<'a> {
    service: &'a dyn OcrService,
    cache: &'a PageCache,
    ocr_permits: &'a Semaphore,
    rebuild: Arc<RebuildSettings>,
    fonts: Arc<FontBook>,
    language: &'a str,
    title: &'a str,
    page_pdfs: bool,
}

struct RebuiltPage {
    index: usize,
    png: Arc<Vec<u8>>,
    dpi: Dpi,
    size: PageSize,
    text: String,
    ops: Vec<DrawOp>,
    pdf_path: Option<PathBuf>,
}

impl RebuiltPage {
    fn composed(&self) -> ComposedPage<'_> {
        ComposedPage {
            image_png: self.png.as_slice(),
            size: self.size,
            dpi: self.dpi,
            ops: &self.ops,
        }
    }
}

/// OCRs every page of `job.input`, rebuilds its text layer and writes the
/// searchable PDF and plain text next to the per-page cache.
///
/// Pages that fail are skipped with a warning; the call fails only when no
/// page could be rebuilt.
pub async fn process_document(
    job: &DocumentJob,
    settings: &Settings,
    service: &dyn OcrService,
    fonts: Arc<FontBook>,
) -> Result<DocumentReport> {
    let bytes = fs::read(&job.input)
        .with_context(|| format!("failed to read input: {}", job.input.display()))?;
    let stem = job
        .input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| anyhow!("input has no file name: {}", job.input.display()))?;

    let pages = load_pages(bytes, settings.rebuild_settings().dpi()).await?;
    if pages.is_empty() {
        return Err(anyhow!("{} has no pages", job.input.display()));
    }
    process_pages(&pages, &stem, &output_dir(job), settings, service, fonts).await
}

/// Rebuilds already rasterized `pages` into `{stem}_ocr.pdf` and
/// `{stem}_ocr.txt` under `output_dir`, keeping the input page order.
pub async fn process_pages(
    pages: &[RasterPage],
    stem: &str,
    output_dir: &Path,
    settings: &Settings,
    service: &dyn OcrService,
    fonts: Arc<FontBook>,
) -> Result<DocumentReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let rebuild = Arc::new(settings.rebuild_settings());
    info!("{}: {} page(s), mode {}", stem, pages.len(), rebuild.mode);

    let cache = PageCache::new(output_dir, stem, rebuild.mode, settings.compress_cache);
    let ocr_permits = Semaphore::new(settings.ocr_concurrency.max(1));
    let page_job = PageJob {
        service,
        cache: &cache,
        ocr_permits: &ocr_permits,
        rebuild,
        fonts,
        language: &settings.ocr_language,
        title: stem,
        page_pdfs: settings.page_pdfs,
    };

    let outcomes: Vec<Option<RebuiltPage>> = stream::iter(pages)
        .map(|page| process_page(page, &page_job))
        .buffered(settings.page_concurrency())
        .collect()
        .await;

    let mut report = DocumentReport {
        total_pages: pages.len(),
        pdf_path: output_dir.join(format!("{}_ocr.pdf", stem)),
        text_path: output_dir.join(format!("{}_ocr.txt", stem)),
        ..DocumentReport::default()
    };
    let mut rebuilt = Vec::new();
    for (page, outcome) in pages.iter().zip(outcomes) {
        match outcome {
            Some(done) => {
                report.rebuilt_pages.push(page.index);
                report.page_pdf_paths.extend(done.pdf_path.clone());
                rebuilt.push(done);
            }
            None => report.skipped_pages.push(page.index),
        }
    }
    if rebuilt.is_empty() {
        return Err(anyhow!("no pages were processed successfully"));
    }

    let rebuilt = write_pdf(stem.to_string(), rebuilt, report.pdf_path.clone()).await?;
    fs::write(&report.text_path, merged_text(&rebuilt))
        .with_context(|| format!("failed to write {}", report.text_path.display()))?;

    info!(
        "{}: rebuilt {} of {} page(s)",
        stem,
        report.rebuilt_pages.len(),
        report.total_pages
    );
    Ok(report)
}

fn output_dir(job: &DocumentJob) -> PathBuf {
    if let Some(dir) = &job.output_dir {
        return dir.clone();
    }
    job.input
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn load_pages(bytes: Vec<u8>, dpi: Dpi) -> Result<Vec<RasterPage>> {
    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .ok_or_else(|| anyhow!("unable to detect input type"))?;
    debug!("input detected as {}", mime);
    if mime == PDF_MIME {
        return tokio::task::spawn_blocking(move || rasterize_pdf(&bytes, dpi))
            .await
            .map_err(|err| anyhow!("pdf rendering task failed: {}", err))?;
    }
    if mime.starts_with("image/") {
        return Ok(vec![image_page(&bytes, dpi)?]);
    }
    Err(anyhow!("unsupported input type: {}", mime))
}

async fn process_page(page: &RasterPage, job: &PageJob<'_>) -> Option<RebuiltPage> {
    match rebuild_raster_page(page, job).await {
        Ok(Some(rebuilt)) => Some(rebuilt),
        Ok(None) => None,
        Err(err) => {
            warn!("page {}: {:#}", page.index, err);
            None
        }
    }
}

async fn rebuild_raster_page(page: &RasterPage, job: &PageJob<'_>) -> Result<Option<RebuiltPage>> {
    let Some(value) = recognize_page(page, job).await? else {
        warn!("page {}: OCR returned no document", page.index);
        return Ok(None);
    };
    let document = OcrDocument::from_value(value)?;
    let text = document.full_text().to_string();
    let size = page.page_size();

    let settings = Arc::clone(&job.rebuild);
    let fonts = Arc::clone(&job.fonts);
    let (rebuilt, ops) = tokio::task::spawn_blocking(move || {
        let mut canvas = RecordingCanvas::new(size.width, size.height);
        let ctx = RebuildContext {
            settings: &settings,
            fonts: &fonts,
        };
        let rebuilt = rebuild_page(&document, &mut canvas, &ctx);
        (rebuilt, canvas.into_ops())
    })
    .await
    .map_err(|err| anyhow!("rebuild worker failed: {}", err))?;
    if !rebuilt {
        warn!("page {}: failed to rebuild text layer", page.index);
        return Ok(None);
    }

    job.cache.store_text(page.index, &text)?;
    let done = RebuiltPage {
        index: page.index,
        png: Arc::clone(&page.png),
        dpi: page.dpi,
        size,
        text,
        ops,
        pdf_path: None,
    };
    if !job.page_pdfs {
        return Ok(Some(done));
    }
    let path = job.cache.pdf_path(page.index);
    let title = format!("{} page {}", job.title, page.index);
    let mut written = write_pdf(title, vec![done], path.clone()).await?;
    let done = written
        .pop()
        .ok_or_else(|| anyhow!("page {}: pdf writer returned no page", page.index))?;
    Ok(Some(RebuiltPage {
        pdf_path: Some(path),
        ..done
    }))
}

/// Composes `pages` into `path` on a blocking worker and hands them back.
async fn write_pdf(
    title: String,
    pages: Vec<RebuiltPage>,
    path: PathBuf,
) -> Result<Vec<RebuiltPage>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<RebuiltPage>> {
        let pdf = {
            let composed: Vec<ComposedPage<'_>> =
                pages.iter().map(RebuiltPage::composed).collect();
            compose_pdf(&title, &composed)?
        };
        fs::write(&path, pdf).with_context(|| format!("failed to write {}", path.display()))?;
        debug!("wrote {} page(s) to {}", pages.len(), path.display());
        Ok(pages)
    })
    .await
    .map_err(|err| anyhow!("pdf writer failed: {}", err))?
}

async fn recognize_page(page: &RasterPage, job: &PageJob<'_>) -> Result<Option<Value>> {
    if let Some(cached) = job.cache.load(page.index)? {
        return Ok(Some(cached));
    }
    let request = OcrRequest {
        bytes: page.png.as_slice(),
        mime: PNG_MIME,
        language: job.language,
        enable_symbols: job.rebuild.mode == OcrMode::Symbols,
        style_info: job.rebuild.style_info,
    };
    let document = {
        let _permit = job
            .ocr_permits
            .acquire()
            .await
            .with_context(|| "OCR throttle closed")?;
        debug!("page {}: sending to OCR", page.index);
        job.service.recognize(request).await?
    };
    if let Some(document) = &document {
        job.cache.store(page.index, document)?;
    }
    Ok(document)
}

fn merged_text(pages: &[RebuiltPage]) -> String {
    let mut text = String::new();
    for page in pages {
        debug!("page {}: {} char(s) of text", page.index, page.text.chars().count());
        text.push_str(&page.text);
        text.push_str("\n\n");
    }
    text
}
