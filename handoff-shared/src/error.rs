//! # Error Taxonomy
//!
//! Unifies the error kinds spec'd in §7: a `NotConfigured` credential/workspace
//! gap, a transient or permanent remote failure (both treated identically —
//! this engine never poisons a row based on a provider response), a
//! persistence failure, and a precondition violation (the expected race
//! between polling and callbacks).

use thiserror::Error;

/// Result alias used throughout the orchestrator.
pub type HandoffResult<T> = Result<T, HandoffError>;

#[derive(Debug, Error)]
pub enum HandoffError {
    /// Provider credentials or workspace sid could not be resolved.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// A remote call to the messaging provider failed, transiently or
    /// permanently. The engine treats both the same way: log, don't mutate
    /// persistence, let the next tick retry.
    #[error("provider call failed: {0}")]
    ProviderCall(String),

    /// The persistence port returned an error.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// A precondition the pipeline relies on no longer holds (task missing,
    /// status changed underneath it, epoch marks inconsistent). Expected
    /// under concurrent polling/callback races — callers skip silently.
    #[error("precondition violation: {0}")]
    Precondition(String),

    /// Input received from an external caller (HTTP handoff command, webhook)
    /// was invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl HandoffError {
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::NotConfigured(msg.into())
    }

    pub fn provider_call(msg: impl Into<String>) -> Self {
        Self::ProviderCall(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error should surface as a 400 from the HTTP handoff
    /// commands (§4.7) rather than a 500. Precondition and invalid-input
    /// errors are caller mistakes; everything else is ours.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::InvalidInput(_))
    }
}
