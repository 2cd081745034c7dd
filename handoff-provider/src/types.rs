//! # Provider-facing Types
//!
//! Shapes returned by the messaging-provider port. These intentionally stay
//! close to the provider's raw wire shapes (attributes as opaque JSON
//! strings/values) — parsing and precedence rules (§4.4, §4.5) live in the
//! orchestrator, not here, since the port's job is only to fetch, not to
//! interpret domain meaning out of provider payloads.

use serde::{Deserialize, Serialize};

/// TaskRouter task status filter used by `ListAssignedTasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatusFilter {
    Assigned,
    Reserved,
}

impl TaskStatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Reserved => "reserved",
        }
    }
}

/// A TaskRouter task as returned by `ListAssignedTasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderTask {
    pub task_sid: String,
    /// Raw `task.attributes` JSON string, parsed by the flex pipeline.
    pub attributes: String,
    pub assignment_status: String,
}

/// An accepted reservation for a task, as returned by
/// `ListAcceptedReservations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_sid: String,
    pub worker_sid: String,
    /// The reservation's own record of the worker's friendly name, if the
    /// provider includes one inline (fallback source in §4.4c).
    pub worker_name: Option<String>,
}

/// A worker record as returned by `FetchWorker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_sid: String,
    pub friendly_name: Option<String>,
    /// Raw `attributes` JSON, searched for `full_name`/`fullName`/`fullname`/
    /// `name` per §4.4d.
    pub attributes: serde_json::Value,
}

/// A conversation participant as returned by
/// `ListConversationParticipants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub identity: Option<String>,
    /// Messaging binding address (SMS/WhatsApp number), when this
    /// participant was added via a binding rather than an identity.
    pub messaging_binding_address: Option<String>,
    /// Raw `attributes` JSON string, searched for worker sid fields and
    /// substring matches per §4.5 rules 3 and 4.
    pub attributes: Option<String>,
}
