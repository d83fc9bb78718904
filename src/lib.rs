use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod cache;
pub mod logging;
pub mod ocr;
mod paths;
pub mod pdf;
pub mod pipeline;
pub mod service;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use ocr::{OcrDocument, OcrMode, PageCanvas, RebuildContext, RebuildSettings, rebuild_page};
pub use pipeline::{DocumentJob, DocumentReport, process_document, process_pages};
pub use service::{DocumentAi, DocumentAiConfig, OcrService};
pub use settings::Settings;

/// Command-line options; every `Some`/`true` overrides the loaded settings.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub input: PathBuf,
    pub mode: Option<OcrMode>,
    pub dpi: Option<f32>,
    pub dpi_x: Option<f32>,
    pub dpi_y: Option<f32>,
    pub lang: Option<String>,
    pub show_text: bool,
    pub show_boxes: bool,
    pub style_info: bool,
    pub project: Option<String>,
    pub location: Option<String>,
    pub processor: Option<String>,
    pub token: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<DocumentReport> {
    if !config.input.exists() {
        return Err(anyhow!("input not found: {}", config.input.display()));
    }
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;
    apply_overrides(&mut settings, &config)?;

    let token = service::resolve_access_token(settings.access_token.as_deref())
        .with_context(|| "no access token for Document AI")?;
    let service = DocumentAi::new(DocumentAiConfig {
        project: settings.service_project.clone().unwrap_or_default(),
        location: settings.service_location.clone(),
        processor: settings.service_processor.clone().unwrap_or_default(),
        endpoint: settings.service_endpoint.clone(),
        access_token: token,
    })?;

    let font_path = settings.font_path.as_deref().map(Path::new);
    let fonts = Arc::new(ocr::FontBook::load(font_path, settings.font_family.as_deref()));

    let job = DocumentJob {
        input: config.input,
        output_dir: config.output_dir,
    };
    process_document(&job, &settings, &service, fonts).await
}

fn apply_overrides(settings: &mut Settings, config: &Config) -> Result<()> {
    if let Some(mode) = config.mode {
        settings.ocr_mode = mode;
    }
    for dpi in [config.dpi, config.dpi_x, config.dpi_y].into_iter().flatten() {
        if !(dpi.is_finite() && dpi > 0.0) {
            return Err(anyhow!("dpi must be positive: {}", dpi));
        }
    }
    if let Some(dpi) = config.dpi {
        settings.dpi_x = dpi;
        settings.dpi_y = dpi;
    }
    if let Some(dpi) = config.dpi_x {
        settings.dpi_x = dpi;
    }
    if let Some(dpi) = config.dpi_y {
        settings.dpi_y = dpi;
    }
    if let Some(lang) = non_empty(&config.lang) {
        settings.ocr_language = lang;
    }
    settings.text_visible |= config.show_text;
    settings.box_visible |= config.show_boxes;
    settings.style_info |= config.style_info;
    if let Some(project) = non_empty(&config.project) {
        settings.service_project = Some(project);
    }
    if let Some(location) = non_empty(&config.location) {
        settings.service_location = location;
    }
    if let Some(processor) = non_empty(&config.processor) {
        settings.service_processor = Some(processor);
    }
    if let Some(token) = non_empty(&config.token) {
        settings.access_token = Some(token);
    }
    if let Some(concurrency) = config.concurrency {
        settings.concurrency = concurrency;
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Human-readable summary printed after a run.
pub fn format_report(report: &DocumentReport) -> String {
    let mut lines = vec![
        format!("pdf: {}", report.pdf_path.display()),
        format!("text: {}", report.text_path.display()),
        format!(
            "pages: {} of {} rebuilt",
            report.rebuilt_pages.len(),
            report.total_pages
        ),
    ];
    if !report.skipped_pages.is_empty() {
        let skipped: Vec<String> = report
            .skipped_pages
            .iter()
            .map(|index| index.to_string())
            .collect();
        lines.push(format!("skipped pages: {}", skipped.join(", ")));
    }
    lines.join("\n")
}
