//! Logging init: file under the XDG state dir, or graceful fallback to stderr.
//!
//! Progress rendering owns the terminal, so normal runs log to
//! `~/.local/state/snag/snag.log` and only fall back to stderr when that
//! file cannot be opened.

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Log sink handed to the subscriber: the shared log file, or stderr when
/// cloning the file handle fails mid-run.
enum LogSink {
    File(fs::File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initializes logging to the XDG state log file. Returns Err when the log
/// directory is unusable so the caller can fall back to `init_stderr`.
pub fn init(verbose: bool) -> Result<()> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("snag")?;
    let log_dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&log_dir)?;
    let log_path: PathBuf = log_dir.join("snag.log");

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(move || {
            file.try_clone()
                .map(LogSink::File)
                .unwrap_or(LogSink::Stderr)
        })
        .with_ansi(false)
        .init();

    tracing::debug!("logging to {}", log_path.display());
    Ok(())
}

/// Stderr-only logging, used when `init` fails.
pub fn init_stderr(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}
