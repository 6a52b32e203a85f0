//! Tracing setup for the `esu` binary.
//!
//! Log lines go to **stderr** so stdout stays machine-readable (query JSON,
//! NDJSON scan output). `RUST_LOG` wins when set; otherwise the level is
//! `warn`, or `debug` for this crate and the core with `--verbose`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,elasticutils=debug,elasticutils_core=debug"
    } else {
        "warn,elasticutils_core=info"
    }
}

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    // fails only when a global subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
