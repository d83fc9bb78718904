use std::path::Path;
use std::sync::Mutex;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

const BASE_DIR_ENV: &str = "OCR_LAYER_RUST_DIR";

fn set_env(name: &str, value: Option<&std::ffi::OsStr>) {
    // SAFETY: every test touching the environment holds ENV_MUTEX.
    unsafe {
        match value {
            Some(value) => std::env::set_var(name, value),
            None => std::env::remove_var(name),
        }
    }
}

/// Runs `func` with `HOME` pointing at a fresh temp dir and no base dir
/// override.
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var_os("HOME");
    let old_base = std::env::var_os(BASE_DIR_ENV);
    set_env("HOME", Some(dir.path().as_os_str()));
    set_env(BASE_DIR_ENV, None);
    let result = func(dir.path());
    set_env("HOME", old_home.as_deref());
    set_env(BASE_DIR_ENV, old_base.as_deref());
    result
}

/// Sets the base dir override for the duration of `func`. Call inside
/// [`with_temp_home`].
pub(crate) fn with_base_dir<F, R>(value: &str, func: F) -> R
where
    F: FnOnce() -> R,
{
    set_env(BASE_DIR_ENV, Some(std::ffi::OsStr::new(value)));
    let result = func();
    set_env(BASE_DIR_ENV, None);
    result
}
