use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DAEMON_TCP_PORT: u16 = 9876;

/// When set, binaries are looked up on PATH only, never beside the executable.
static USE_SYSTEM_DEPS: AtomicBool = AtomicBool::new(false);

pub fn set_use_system_deps(use_system: bool) {
    USE_SYSTEM_DEPS.store(use_system, Ordering::Relaxed);
}

pub fn should_use_system_deps() -> bool {
    USE_SYSTEM_DEPS.load(Ordering::Relaxed)
}

#[cfg(unix)]
pub fn mpv_socket_name() -> String {
    format!("{}/tuner-mpv-{}.sock", std::env::temp_dir().display(), std::process::id())
}

#[cfg(windows)]
pub fn mpv_socket_name() -> String {
    format!("tuner-mpv-{}", std::process::id())
}

#[cfg(unix)]
pub fn mpv_socket_arg(name: &str) -> String {
    format!("--input-ipc-server={}", name)
}

#[cfg(windows)]
pub fn mpv_socket_arg(name: &str) -> String {
    format!("--input-ipc-server=\\\\.\\pipe\\{}", name)
}

pub fn data_dir() -> PathBuf {
    // XDG layout on macOS too, for consistency
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join("tuner")
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tuner")
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("tuner")
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tuner")
    }
}

#[cfg(unix)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv"]
}

#[cfg(windows)]
fn mpv_binary_names() -> &'static [&'static str] {
    &["mpv.exe", "mpv"]
}

fn find_beside_exe(names: &[&str]) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    for name in names {
        let p = dir.join(name);
        if p.exists() {
            return Some(p);
        }
        let p = dir.join("external").join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        for name in names {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Find the mpv binary used as playback back-end.
///
/// Searches in order:
/// 1. MPV_PATH environment variable
/// 2. Beside current executable (unless use_system_deps is set)
/// 3. PATH
pub fn find_mpv_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("MPV_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    if !should_use_system_deps() {
        if let Some(p) = find_beside_exe(mpv_binary_names()) {
            return Some(p);
        }
    }

    find_on_path(mpv_binary_names())
}
