//! Tracing subscriber setup.

use rivalry_types::{LogConfig, Result, RivalryError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `config.filter`.
///
/// # Errors
/// `Configuration` for an unparseable filter or if a subscriber is
/// already installed.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    installed.map_err(|e| RivalryError::Configuration(format!("tracing already initialised: {e}")))
}

fn filter(config: &LogConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(from_env) => Ok(from_env),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| RivalryError::Configuration(format!("invalid log filter {:?}: {e}", config.filter))),
    }
}
