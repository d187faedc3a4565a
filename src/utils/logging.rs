use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the run log file alive and syncs it to disk on drop.
/// Hold it until the end of `main`.
pub struct LogGuard {
    file: Option<Arc<File>>,
    path: Option<PathBuf>,
}

impl LogGuard {
    pub fn log_file(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_all();
        }
    }
}

/// Log file name for a run started at `now`: `run_17-10-2026_09-30-00.log`
pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("run_{}.log", now.format("%d-%m-%Y_%H-%M-%S"))
}

fn open_log_file(log_dir: &Path) -> std::io::Result<(File, PathBuf)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file_name(chrono::Local::now()));
    let file = File::create(&path)?;
    Ok((file, path))
}

/// Install the process-wide subscriber: console output plus a plain-text copy in `log_dir`.
/// Falls back to console only when the log file can't be created.
pub fn init_logging(log_dir: &Path) -> LogGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("price_tracker=info,warn"));

    let console_layer = fmt::layer().with_target(true).with_thread_ids(true);

    let (file, path, open_error) = match open_log_file(log_dir) {
        Ok((file, path)) => (Some(Arc::new(file)), Some(path), None),
        Err(e) => (None, None, Some(e)),
    };

    let file_layer = file.clone().map(|file| {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(file)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(e) = open_error {
        tracing::warn!(
            "Could not create log file in {}: {} (console logging only)",
            log_dir.display(),
            e
        );
    }

    LogGuard { file, path }
}
