//! # Logging Initialization
//!
//! Thin wrapper around `tracing-subscriber`, mirroring the parent stack's
//! `tasker_shared::logging::init_tracing`. Respects `RUST_LOG`; defaults to
//! `info` so a default deployment isn't silent.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Safe to call once at process
/// startup; a second call is a no-op (the underlying `try_init` swallows the
/// "already set" error, matching the parent stack's idempotent bootstrap).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
