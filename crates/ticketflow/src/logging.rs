//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LogFormat;
use crate::result::{HarnessError, HarnessResult};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Fails, rather than panicking,
/// when `filter` does not parse or a subscriber is already installed.
pub fn init_tracing(filter: &str, format: LogFormat) -> HarnessResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::try_new(filter).map_err(|e| {
            HarnessError::invalid_configuration(format!("bad log filter '{filter}': {e}"))
        })?,
    };

    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| {
        HarnessError::invalid_configuration(format!("tracing already initialized: {e}"))
    })
}
