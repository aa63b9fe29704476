//! Tracing subscriber for the command-line front end.
//!
//! Progress reaches the terminal as transfer events. Diagnostics go to the
//! systemd journal when enabled and reachable, otherwise to a daily log file
//! in the configured directory.

use anyhow::{Context, Result};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const LOG_ENV: &str = "PIWIGO_DIGIKAM_LOG";
const LOG_FILE_PREFIX: &str = "piwigo-digikam.log";

// Dropping the guard stops the background writer.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Filter directive to use: a non-blank `PIWIGO_DIGIKAM_LOG` wins over the
/// configured level.
fn filter_directive(env_value: Option<String>, config: &LoggingConfig) -> String {
    env_value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| config.level.clone())
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let directive = filter_directive(std::env::var(LOG_ENV).ok(), config);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter '{}'", directive))?;

    #[cfg(target_os = "linux")]
    {
        if config.journald {
            if let Ok(journald) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(journald)
                    .try_init()?;
                tracing::info!("Logging to journald ({})", directive);
                return Ok(());
            }
        }
    }

    let dir = config.directory();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create log directory {:?}", dir))?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging to {:?} ({})", dir, directive);
    Ok(())
}
