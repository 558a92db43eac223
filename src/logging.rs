//! `tracing` subscriber installation.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

/// Environment variable holding a filter directive. It wins over [`Config::log_filter`].
pub const ENV_VAR: &str = "TIDEWATER_LOG";

static INSTALLED: Once = Once::new();

/// Installs a formatting subscriber for the process (idempotent).
///
/// Does nothing if another global subscriber is already set, so applications keep control of
/// their own logging.
pub fn init(config: &Config) {
    INSTALLED.call_once(|| {
        let filter = filter(config);
        let result = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(true).with_filter(filter))
            .try_init();
        if result.is_err() {
            tracing::debug!("a global subscriber is already installed");
        }
    });
}

fn filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
