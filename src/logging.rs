//! Log subscriber setup
//!
//! The live display owns the terminal, so log lines cannot simply be printed
//! to it. They go to a file when one was configured, and to stderr only when
//! `RUST_LOG` asks for them explicitly.

use eyre::{eyre, Result, WrapErr};
use std::{env, fs::File, path::Path, sync::Mutex};
use tracing_subscriber::EnvFilter;

/// Level used when logging to a file without RUST_LOG
const DEFAULT_FILE_FILTER: &str = "info";

/// Install the global log subscriber
pub fn init(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("Failed to create log file {}", path.display()))?;
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILE_FILTER));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| eyre!("Failed to install the log subscriber: {err}"))
        }
        None if env::var_os(EnvFilter::DEFAULT_ENV).is_some() => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| eyre!("Failed to install the log subscriber: {err}")),
        None => Ok(()),
    }
}
