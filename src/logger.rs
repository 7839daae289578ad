//! Process-wide logging setup
//!
//! Console output always goes to stderr. The log file under
//! `<local-data>/DirProbe/logs/` is always written in debug builds and only
//! with `DIRPROBE_ENABLE_LOGGING=1` in release builds.
//!
//! | Variable                  | Effect                                      |
//! |---------------------------|---------------------------------------------|
//! | `DIRPROBE_LOG`            | `EnvFilter` directives (default `info`)     |
//! | `DIRPROBE_LOG_VERBOSE=1`  | default level becomes `debug`               |
//! | `DIRPROBE_ENABLE_LOGGING=1` | enable the log file in release builds     |

use crate::constants::MAX_LOG_BYTES;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "DIRPROBE_LOG";
pub const VERBOSE_ENV: &str = "DIRPROBE_LOG_VERBOSE";
pub const ENABLE_FILE_ENV: &str = "DIRPROBE_ENABLE_LOGGING";

static LOG_FILE: OnceLock<Option<PathBuf>> = OnceLock::new();

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

fn log_file_name() -> &'static str {
    // Use different log file names for debug vs release
    if cfg!(debug_assertions) {
        "dirprobe-dev.log"
    } else {
        "dirprobe.log"
    }
}

fn file_logging_enabled() -> bool {
    cfg!(debug_assertions) || env_flag(ENABLE_FILE_ENV)
}

/// Move `path` aside to `<name>.log.bak` once it grows past `max_bytes`
fn rotate_if_needed(path: &Path, max_bytes: u64) {
    if let Ok(meta) = fs::metadata(path) {
        if meta.len() > max_bytes {
            let backup = path.with_extension("log.bak");
            let _ = fs::remove_file(&backup);
            let _ = fs::rename(path, &backup);
        }
    }
}

fn open_log_file(dir: &Path) -> Option<(PathBuf, File)> {
    fs::create_dir_all(dir).ok()?;
    let path = dir.join(log_file_name());
    rotate_if_needed(&path, MAX_LOG_BYTES);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;
    Some((path, file))
}

fn build_filter() -> EnvFilter {
    let default_level = if env_flag(VERBOSE_ENV) { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber
///
/// Safe to call more than once; only the first call has any effect. Returns
/// the path of the log file when file logging is active.
pub fn init_logging() -> Option<&'static Path> {
    LOG_FILE
        .get_or_init(|| {
            let file = if file_logging_enabled() {
                crate::paths::logs_dir().and_then(|dir| open_log_file(&dir))
            } else {
                None
            };
            let (path, writer) = match file {
                Some((path, file)) => (Some(path), Some(file)),
                None => (None, None),
            };

            let file_layer = writer.map(|file| {
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
            });

            // Another subscriber may already be installed (tests, embedding hosts)
            let _ = tracing_subscriber::registry()
                .with(build_filter())
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .with(file_layer)
                .try_init();

            path
        })
        .as_deref()
}
