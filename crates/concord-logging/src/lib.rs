//! Concord Logging
//!
//! One place to install the tracing subscriber. `RUST_LOG` wins over the
//! default directive passed by the caller:
//!
//! ```no_run
//! concord_logging::init("concord_admm=info");
//! ```
//!
//! The reasoner logs each round at `info`, term building at `debug` and
//! residuals every 50 iterations at `trace`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when neither the caller nor `RUST_LOG` picks one.
pub const DEFAULT_DIRECTIVE: &str = "concord_admm=info,concord_knapsack=warn";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into())
}

/// Install the global subscriber.
///
/// # Panics
///
/// If a global subscriber is already installed.
pub fn init(default: &str) {
    tracing_subscriber::registry()
        .with(filter(default))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the global subscriber unless one is already set.
///
/// Returns whether this call installed it. Tests call this from every case.
pub fn try_init(default: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(default))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}
