//! Logging setup.
//!
//! Logs go to **stderr** through a `tracing` subscriber: stdout carries the
//! handshake line the host reads on startup and nothing else.
//!
//! The filter comes from `RUST_LOG`, for example:
//!
//! ```bash
//! # lifecycle operations and remote calls
//! RUST_LOG=zentral_provider=debug ./zentral-provider
//!
//! # include the HTTP client internals
//! RUST_LOG=debug,hyper=info ./zentral-provider
//! ```
//!
//! Attribute values are never logged, only type names and ids, so sensitive
//! attributes stay out of the logs at every level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is unset.
pub const DEFAULT_LEVEL: &str = "info";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry().with(env_filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the stderr subscriber, filtered by `RUST_LOG` (default `info`).
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LEVEL);
}

/// Like [`init_logging`] with another level when `RUST_LOG` is unset.
///
/// ```ignore
/// zentral_provider::init_logging_with_default("debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Install the subscriber unless one is already set.
///
/// Returns `false` when a global subscriber was already installed, as
/// happens when several tests initialize logging in the same process.
pub fn try_init_logging() -> bool {
    subscriber(DEFAULT_LEVEL).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    // the global subscriber can only be set once per process, so only the
    // filters are checked here

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LEVEL).is_ok());
        assert!(EnvFilter::try_new("zentral_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,zentral_provider::resource=trace").is_ok());
    }

    #[test]
    fn test_try_init_twice() {
        try_init_logging();
        assert!(!try_init_logging());
    }
}
