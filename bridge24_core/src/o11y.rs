//! Tracing bootstrap.
//!
//! Reads `RUST_LOG` (fallback `BRIDGE24_LOG`) and installs a global fmt
//! subscriber. Safe to call once from the binary entry point.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize global logging from the environment.
///
/// `default_directive` is used when neither `RUST_LOG` nor `BRIDGE24_LOG`
/// is set (the CLI passes `debug` under `--verbose`, `info` otherwise).
pub fn init_global_from_env(default_directive: &str) -> crate::Result<()> {
    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("BRIDGE24_LOG"))
        .unwrap_or_else(|_| default_directive.to_string());

    let filter = EnvFilter::try_new(filter)
        .map_err(|e| crate::Error::InvalidInput(format!("invalid log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| crate::Error::backend("tracing init", e))?;

    Ok(())
}
