//! # Provider Error Types

use thiserror::Error;

/// Errors surfaced by the messaging-provider port. Every variant here maps
/// to a "transient or permanent remote failure" per spec §7 — the
/// orchestrator treats them identically (log, retry next tick), so this
/// type exists mainly for diagnostics, not branching logic.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("provider credentials or workspace not configured: {0}")]
    NotConfigured(String),

    #[error("failed to parse provider response: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider operation not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}
