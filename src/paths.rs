use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "OCR_LAYER_RUST_DIR";
const BASE_DIR_NAME: &str = ".ocr-layer-rust";

/// Directory holding the user's settings files.
pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    default_base_dir()
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV)
        .ok()
        .and_then(|value| normalize_dir(&value))
}

fn default_base_dir() -> Option<PathBuf> {
    home().map(|home| home.join(BASE_DIR_NAME))
}

fn home() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(PathBuf::from(home))
        }
    })
}

fn normalize_dir(value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(normalize_path(&expand_tilde(trimmed)))
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

fn expand_tilde(value: &str) -> PathBuf {
    if (value == "~" || value.starts_with("~/"))
        && let Some(home) = home()
    {
        return match value.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => home,
        };
    }
    PathBuf::from(value)
}
