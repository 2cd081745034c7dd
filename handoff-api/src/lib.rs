//! # handoff-api
//!
//! The two in-scope HTTP surfaces named in spec §6.3 and §4.7: the provider
//! webhook inbound endpoint, and the four handoff commands for internal
//! tasks. Everything else the original system routes (auth, user CRUD, flow
//! compiler, DB admin UI) is out of scope and not built here.

mod commands;
mod webhook;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use handoff_orchestrator::{ActivitySink, InternalPipeline};

/// Shared handler state: the internal pipeline (backs the four handoff
/// commands) and the activity sink (backs the webhook).
#[derive(Clone)]
pub struct AppState {
    pub internal: Arc<InternalPipeline>,
    pub activity: Arc<ActivitySink>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Builds the axum router for the webhook and the handoff commands. The
/// caller (`handoff-server`) nests this under whatever path prefix and
/// layers (tracing, CORS) it wants.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tasks/twilio/inbound", post(webhook::inbound))
        .route("/tasks/{id}/assign", post(commands::assign))
        .route("/tasks/{id}/start-handoff", post(commands::start_handoff))
        .route("/tasks/{id}/register-greeting", post(commands::register_greeting))
        .route("/tasks/{id}/mark-activity", post(commands::mark_activity))
        .with_state(state)
}
