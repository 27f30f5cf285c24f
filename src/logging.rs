//! Diagnostic logging to stderr, so stdout stays a clean data stream.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "BLE_ADVERT_DATA_LOG";

fn default_level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Filter from `BLE_ADVERT_DATA_LOG`, then `RUST_LOG`, then the default level.
pub fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose)))
}

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(false), "info");
        assert_eq!(default_level(true), "debug");
    }

    #[test]
    fn test_init_twice() {
        init(false);
        init(true);
    }
}
