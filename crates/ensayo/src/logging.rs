//! Logging initialization.
//!
//! Console output is filtered through `RUST_LOG` (default `info`); passing
//! an output directory adds a plain-text file layer writing
//! `<output>/tests.log` so a run leaves an inspectable transcript next to
//! its screenshots and downloads.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::result::EnsayoResult;

/// File name of the run transcript inside the output directory.
pub const LOG_FILE_NAME: &str = "tests.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize console logging. Safe to call more than once; later calls
/// are no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Initialize console logging plus a `tests.log` transcript under
/// `output_dir`.
///
/// # Errors
///
/// Returns an error when the output directory or log file cannot be
/// created.
pub fn init_with_file(output_dir: &Path) -> EnsayoResult<()> {
    std::fs::create_dir_all(output_dir)?;
    let file = std::fs::File::create(output_dir.join(LOG_FILE_NAME))?;
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init();
    Ok(())
}
