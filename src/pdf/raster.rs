use anyhow::{Context, Result, anyhow};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;
use tracing::debug;

use crate::ocr::{Dpi, POINTS_PER_INCH, PageSize};

/// One page as a PNG image, the form it is sent to OCR and drawn under the
/// text layer.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub index: usize,
    pub png: Arc<Vec<u8>>,
    pub width_px: u32,
    pub height_px: u32,
    /// Resolution the pixels were rendered or scanned at.
    pub dpi: Dpi,
}

impl RasterPage {
    fn from_png(index: usize, png: Vec<u8>, dpi: Dpi) -> Result<Self> {
        let image = image::load_from_memory(&png)
            .with_context(|| format!("failed to decode rendered page {}", index + 1))?;
        Ok(Self {
            index,
            width_px: image.width(),
            height_px: image.height(),
            png: Arc::new(png),
            dpi,
        })
    }

    pub fn page_size(&self) -> PageSize {
        PageSize {
            width: self.width_px as f32 * POINTS_PER_INCH / self.dpi.x,
            height: self.height_px as f32 * POINTS_PER_INCH / self.dpi.y,
        }
    }
}

/// Single page from an image file scanned at `dpi`, re-encoded as PNG.
pub fn image_page(bytes: &[u8], dpi: Dpi) -> Result<RasterPage> {
    let image = image::load_from_memory(bytes).with_context(|| "failed to decode input image")?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .with_context(|| "failed to encode input image as png")?;
    Ok(RasterPage {
        index: 0,
        width_px: image.width(),
        height_px: image.height(),
        png: Arc::new(png),
        dpi,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Renderer {
    Mutool,
    Pdftoppm,
}

impl Renderer {
    fn program(self) -> &'static str {
        match self {
            Renderer::Mutool => "mutool",
            Renderer::Pdftoppm => "pdftoppm",
        }
    }

    fn args(self, dpi: Dpi, input: &Path, out_dir: &Path) -> Vec<OsString> {
        let x = resolution(dpi.x);
        let y = resolution(dpi.y);
        match self {
            Renderer::Mutool => vec![
                "draw".into(),
                "-r".into(),
                x.into(),
                "-o".into(),
                out_dir.join("page-%03d.png").into_os_string(),
                input.as_os_str().to_os_string(),
            ],
            Renderer::Pdftoppm => vec![
                "-png".into(),
                "-rx".into(),
                x.into(),
                "-ry".into(),
                y.into(),
                input.as_os_str().to_os_string(),
                out_dir.join("page").into_os_string(),
            ],
        }
    }
}

fn resolution(dpi: f32) -> String {
    format!("{}", dpi.round().max(1.0) as u32)
}

/// mutool renders one resolution for both axes; pdftoppm takes one per axis.
fn pick_renderer(dpi: Dpi, has_mutool: bool, has_pdftoppm: bool) -> Result<Renderer> {
    let uniform = resolution(dpi.x) == resolution(dpi.y);
    if has_mutool && uniform {
        return Ok(Renderer::Mutool);
    }
    if has_pdftoppm {
        return Ok(Renderer::Pdftoppm);
    }
    if has_mutool {
        return Err(anyhow!(
            "mutool cannot render dpi_x {} with a different dpi_y {}; install poppler (pdftoppm) \
             or use one dpi",
            dpi.x,
            dpi.y
        ));
    }
    Err(anyhow!(
        "pdf rendering requires mutool or pdftoppm (install mupdf or poppler)"
    ))
}

/// Renders every page of `pdf_bytes` at `dpi` with mutool or pdftoppm.
pub fn rasterize_pdf(pdf_bytes: &[u8], dpi: Dpi) -> Result<Vec<RasterPage>> {
    let renderer = pick_renderer(dpi, command_exists("mutool"), command_exists("pdftoppm"))?;
    let dir = tempdir().with_context(|| "failed to create temp dir for pdf")?;
    let input_path = dir.path().join("input.pdf");
    fs::write(&input_path, pdf_bytes).with_context(|| "failed to write temp pdf")?;

    debug!(
        "rendering pdf with {} at {}x{} dpi",
        renderer.program(),
        dpi.x,
        dpi.y
    );
    let output = Command::new(renderer.program())
        .args(renderer.args(dpi, &input_path, dir.path()))
        .output()
        .with_context(|| format!("failed to run {}", renderer.program()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} failed: {}", renderer.program(), stderr.trim()));
    }

    let mut entries: Vec<_> = fs::read_dir(dir.path())
        .with_context(|| "failed to read temp pdf directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_page_png(path))
        .collect();
    entries.sort();

    let mut pages = Vec::with_capacity(entries.len());
    for (index, path) in entries.into_iter().enumerate() {
        let bytes = fs::read(&path).with_context(|| "failed to read rendered pdf page")?;
        pages.push(RasterPage::from_png(index, bytes, dpi)?);
    }
    Ok(pages)
}

fn is_page_png(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("page"))
        .unwrap_or(false)
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("png"))
            .unwrap_or(false)
}

pub fn command_exists(cmd: &str) -> bool {
    let path = Path::new(cmd);
    if path.components().count() > 1 {
        return is_executable(path);
    }

    let path_var = match env::var_os("PATH") {
        Some(value) => value,
        None => return false,
    };

    #[cfg(windows)]
    let candidates = windows_command_candidates(cmd);
    #[cfg(not(windows))]
    let candidates = vec![cmd.to_string()];

    for dir in env::split_paths(&path_var) {
        for candidate in &candidates {
            if is_executable(&dir.join(candidate)) {
                return true;
            }
        }
    }
    false
}

fn is_executable(path: &Path) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(value) => value,
        Err(_) => return false,
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(windows)]
fn windows_command_candidates(cmd: &str) -> Vec<String> {
    let path = Path::new(cmd);
    if path.extension().is_some() {
        return vec![cmd.to_string()];
    }
    let pathext = env::var_os("PATHEXT").unwrap_or_else(|| ".EXE;.CMD;.BAT;.COM".into());
    pathext
        .to_string_lossy()
        .split(';')
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!("{}{}", cmd, ext.to_lowercase()))
        .collect()
}
