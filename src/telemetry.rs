#![cfg(feature = "tracing")]
//! Optional subscriber setup for binaries and tests that embed the catalog.
//!
//! The library itself only emits `tracing` events and spans; installing a subscriber is left to the application.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::config_err;
use crate::error::Result;

/// Install a global subscriber filtered by `RUST_LOG`. Output goes to `log_file` when given, to stdout otherwise.
pub fn setup_tracing(log_file: Option<&Path>) -> Result<()> {
    let dest_writer = Mutex::new(if let Some(log_file) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|err| config_err!("cannot open log file {}: {err}", log_file.display()))?;
        Box::new(file) as Box<dyn io::Write + Send>
    }
    else {
        Box::new(io::stdout()) as Box<dyn io::Write + Send>
    });

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(dest_writer)
                .with_span_events(FmtSpan::CLOSE),
        )
        .try_init()
        .map_err(|err| config_err!("tracing: {err}"))?;

    info!("Tracing initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_once() {
        let log_file = std::env::temp_dir().join(format!("book-catalog-{}.log", std::process::id()));
        setup_tracing(Some(&log_file)).unwrap();
        assert!(log_file.exists());

        // A global subscriber can only be installed once.
        assert!(setup_tracing(None).is_err());

        let _ = std::fs::remove_file(&log_file);
    }
}
