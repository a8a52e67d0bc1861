//! Tracing setup
//!
//! Logs go to stderr; stdout is reserved for the plugin handshake.

use tracing_subscriber::EnvFilter;

/// Variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "METAKUBE_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter from `METAKUBE_LOG`, then `RUST_LOG`, then `info`
pub fn env_filter() -> EnvFilter {
    let directive = std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_DIRECTIVE.to_string());
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("subscriber installed");
    }
}
