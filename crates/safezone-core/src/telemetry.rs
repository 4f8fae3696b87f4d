//! Tracing initialisation for SafeZone binaries.
//!
//! The global subscriber can only be set once per process; later calls to
//! [`init_tracing`] are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// * `json` - emit newline-delimited JSON instead of human-readable lines
///   (`safezoned --json`). Targets are dropped from JSON lines; the `event`
///   field already names the source.
/// * `level` - verbosity used when `RUST_LOG` is unset (`safezoned --verbose`
///   selects `DEBUG`, otherwise `INFO`). A `RUST_LOG` such as
///   `safezone_core::scheduler=debug` narrows it per module.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry.with(fmt::layer().with_target(true)).try_init().ok();
    }
}
