//! # Persisted Task Models
//!
//! `InternalTask` (§3.1) and `FlexTask` (§3.2). Timestamps are stored and
//! compared at millisecond precision via `chrono::DateTime<Utc>`; the epoch
//! invariants (ping/inactive only after greeting, greeting reset clears both
//! marks) are enforced by the port's write operations, not by these structs
//! directly — they are plain records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an [`InternalTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalTaskStatus {
    Open,
    Assigned,
    Closed,
}

impl InternalTaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Closed => "closed",
        }
    }
}

/// An SMS-mediated handoff (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTask {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_contact: String,
    pub operator_id: Option<String>,
    pub operator_name: Option<String>,
    pub status: InternalTaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub greeting_sent_at: Option<DateTime<Utc>>,
    pub ping_sent_at: Option<DateTime<Utc>>,
    pub inactive_sent_at: Option<DateTime<Utc>>,
    pub last_customer_activity_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<String>,
}

impl InternalTask {
    /// True once the customer has spoken in the current greeting epoch
    /// (§3.1 invariant: no further ping/inactive once this holds).
    pub fn customer_replied_this_epoch(&self) -> bool {
        match (self.last_customer_activity_at, self.greeting_sent_at) {
            (Some(activity), Some(greeting)) => activity > greeting,
            _ => false,
        }
    }
}

/// Observed provider attributes to upsert into a [`FlexTask`] row (§4.4e).
/// Fields absent from the provider payload stay `None` and are not
/// clobbered on conflict — see [`crate::port::PersistencePort::upsert_flex_base_state`].
#[derive(Debug, Clone, Default)]
pub struct FlexTaskObservation {
    pub conversation_sid: Option<String>,
    pub channel_type: Option<String>,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_from: Option<String>,
    pub worker_sid: Option<String>,
    pub worker_name: Option<String>,
    pub task_assignment_status: Option<String>,
    pub task_attributes: Option<String>,
}

/// Automation state mirroring a provider-managed task (§3.2). Has no
/// `status` column: a flex task's lifecycle is driven entirely by the
/// provider (assignment status, reservations) and the greeting/ping/inactive
/// marks below; "closed" is an external effect (conversation closed, task
/// completed), not a local field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlexTask {
    pub task_sid: String,
    pub conversation_sid: Option<String>,
    pub channel_type: Option<String>,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_from: Option<String>,
    pub worker_sid: Option<String>,
    pub worker_name: Option<String>,
    pub task_assignment_status: Option<String>,
    pub task_attributes: Option<String>,
    pub greeting_sent_at: Option<DateTime<Utc>>,
    pub ping_sent_at: Option<DateTime<Utc>>,
    pub inactive_sent_at: Option<DateTime<Utc>>,
    pub last_customer_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlexTask {
    pub fn customer_replied_this_epoch(&self) -> bool {
        match (self.last_customer_activity_at, self.greeting_sent_at) {
            (Some(activity), Some(greeting)) => activity > greeting,
            _ => false,
        }
    }
}
