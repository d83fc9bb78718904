use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::{OcrMode, RebuildSettings};
use crate::paths;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ocr_mode: OcrMode,
    pub dpi_x: f32,
    pub dpi_y: f32,
    pub ocr_language: String,
    pub style_info: bool,
    pub text_visible: bool,
    pub box_visible: bool,
    pub font_family: Option<String>,
    pub font_path: Option<String>,
    pub service_project: Option<String>,
    pub service_location: String,
    pub service_processor: Option<String>,
    pub service_endpoint: Option<String>,
    pub access_token: Option<String>,
    /// Pages processed at once; 0 means one per CPU.
    pub concurrency: usize,
    pub ocr_concurrency: usize,
    pub page_pdfs: bool,
    pub compress_cache: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_mode: OcrMode::Tokens,
            dpi_x: 150.0,
            dpi_y: 150.0,
            ocr_language: "en".to_string(),
            style_info: false,
            text_visible: false,
            box_visible: false,
            font_family: None,
            font_path: None,
            service_project: None,
            service_location: "eu".to_string(),
            service_processor: None,
            service_endpoint: None,
            access_token: None,
            concurrency: 0,
            ocr_concurrency: 4,
            page_pdfs: true,
            compress_cache: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSection>,
    overlay: Option<OverlaySection>,
    service: Option<ServiceSection>,
    pipeline: Option<PipelineSection>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    mode: Option<OcrMode>,
    dpi_x: Option<f32>,
    dpi_y: Option<f32>,
    language: Option<String>,
    style_info: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySection {
    text_visible: Option<bool>,
    box_visible: Option<bool>,
    font_family: Option<String>,
    font_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceSection {
    project: Option<String>,
    location: Option<String>,
    processor: Option<String>,
    endpoint: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSection {
    concurrency: Option<usize>,
    ocr_concurrency: Option<usize>,
    page_pdfs: Option<bool>,
    compress_cache: Option<bool>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = paths::settings_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            settings.merge_file(&path)?;
        }
    }
    Ok(settings)
}

impl Settings {
    fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings: {}", path.display()))?;
        let parsed: SettingsFile = toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            if let Some(mode) = ocr.mode {
                self.ocr_mode = mode;
            }
            if let Some(dpi) = ocr.dpi_x.filter(|dpi| *dpi > 0.0) {
                self.dpi_x = dpi;
            }
            if let Some(dpi) = ocr.dpi_y.filter(|dpi| *dpi > 0.0) {
                self.dpi_y = dpi;
            }
            if let Some(language) = non_blank(ocr.language) {
                self.ocr_language = language;
            }
            if let Some(style_info) = ocr.style_info {
                self.style_info = style_info;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(visible) = overlay.text_visible {
                self.text_visible = visible;
            }
            if let Some(visible) = overlay.box_visible {
                self.box_visible = visible;
            }
            if let Some(family) = non_blank(overlay.font_family) {
                self.font_family = Some(family);
            }
            if let Some(path) = non_blank(overlay.font_path) {
                self.font_path = Some(path);
            }
        }
        if let Some(service) = incoming.service {
            if let Some(project) = non_blank(service.project) {
                self.service_project = Some(project);
            }
            if let Some(location) = non_blank(service.location) {
                self.service_location = location;
            }
            if let Some(processor) = non_blank(service.processor) {
                self.service_processor = Some(processor);
            }
            if let Some(endpoint) = non_blank(service.endpoint) {
                self.service_endpoint = Some(endpoint);
            }
            if let Some(token) = non_blank(service.access_token) {
                self.access_token = Some(token);
            }
        }
        if let Some(pipeline) = incoming.pipeline {
            if let Some(concurrency) = pipeline.concurrency {
                self.concurrency = concurrency;
            }
            if let Some(limit) = pipeline.ocr_concurrency.filter(|limit| *limit > 0) {
                self.ocr_concurrency = limit;
            }
            if let Some(page_pdfs) = pipeline.page_pdfs {
                self.page_pdfs = page_pdfs;
            }
            if let Some(compress) = pipeline.compress_cache {
                self.compress_cache = compress;
            }
        }
    }

    /// The read-only options every page of one document is rebuilt with.
    pub fn rebuild_settings(&self) -> RebuildSettings {
        RebuildSettings {
            mode: self.ocr_mode,
            dpi_x: self.dpi_x,
            dpi_y: self.dpi_y,
            text_visible: self.text_visible,
            box_visible: self.box_visible,
            style_info: self.style_info,
        }
    }

    pub fn page_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get().max(1)
        } else {
            self.concurrency
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = paths::settings_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}
