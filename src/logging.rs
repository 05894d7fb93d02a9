//! Tracing subscriber setup for the `quiz-rag` binary.
//!
//! Library modules only emit `tracing` events. The binary installs a
//! subscriber once at startup; events go to stderr so command output on
//! stdout stays machine-readable.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter directive for a `-v` count: 0 → `warn`, 1 → `info`, 2+ → `debug`.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flag.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "info");
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "debug");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(0);
        init_logging(2);
    }
}
