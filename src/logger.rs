//! Session log for HistLab.
//!
//! One file per launch, truncated on `init()`:
//!   Windows:  `%APPDATA%\HistLab\histlab.log`
//!   Linux:    `$XDG_DATA_HOME/HistLab/histlab.log` or `~/.local/share/HistLab/histlab.log`
//!   macOS:    `~/Library/Application Support/HistLab/histlab.log`
//!
//! Use `log_info!` / `log_warn!` / `log_err!`.  Until `init()` has run
//! (unit tests, the headless report) they do nothing.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static SINK_PATH: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// Where this session is logging, once `init()` succeeded.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK_PATH.get()
}

fn append(line: &str) {
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "{line}");
    }
}

/// Append `[HH:MM:SS] [LEVEL] msg`.  I/O errors are swallowed.
pub fn write(level: Level, msg: &str) {
    append(&format_line(&clock(), level, msg));
}

fn format_line(clock: &str, level: Level, msg: &str) -> String {
    format!("[{clock}] [{}] {msg}", level.tag())
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open (truncating) the session log, write the header and hook panics.
/// Call once from `main` before the first log line.
pub fn init() {
    let path = data_dir().join("HistLab").join("histlab.log");
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let _ = SINK.set(Mutex::new(file));
    let _ = SINK_PATH.set(path.clone());

    append(&format!(
        "=== HistLab session started (unix {}) ===",
        unix_secs().unwrap_or(0)
    ));
    append(&format!("Log file: {}", path.display()));
    append("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

/// Platform data directory, without the app folder.
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_secs() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// UTC wall clock within the day.
fn clock() -> String {
    match unix_secs() {
        Some(secs) => format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60),
        None => "??:??:??".to_string(),
    }
}
