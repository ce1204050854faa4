//! Tracing subscriber setup.
//!
//! Logs go to stderr so `smehub request` can keep stdout for its JSON output.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "smehub=info,smehub_core=info,smehub_storage=info,tower_http=info";

/// Filter used when `RUST_LOG` is unset and `--verbose` is given.
const VERBOSE_FILTER: &str = "smehub=debug,smehub_core=debug,smehub_storage=debug,tower_http=debug,info";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over both built-in filters.
pub(crate) fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(verbose)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
