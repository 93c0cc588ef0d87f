//! Subscriber bootstrap for binaries and examples.
//!
//! Library code only emits through `tracing` macros; installing a subscriber
//! is left to the application unless the `tracing-basic` feature is on.

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns false when a global subscriber was already installed.
#[cfg(feature = "tracing-basic")]
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
