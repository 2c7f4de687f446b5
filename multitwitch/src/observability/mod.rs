//! Logging and tracing setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingSettings};

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. With
/// [`LogFormat::Auto`], debug builds log pretty output and release builds
/// log JSON.
///
/// # Errors
///
/// Returns an error if the configured filter does not parse or a global
/// subscriber is already installed
pub fn init(settings: &LoggingSettings) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter)?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json(settings.format) {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

const fn use_json(format: LogFormat) -> bool {
    match format {
        LogFormat::Json => true,
        LogFormat::Pretty => false,
        LogFormat::Auto => !cfg!(debug_assertions),
    }
}
