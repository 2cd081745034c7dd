//! # Messaging Provider Port
//!
//! The nine-operation façade named in spec §2.3/§9: SMS send, Conversations
//! messaging, participant/worker lookups, and TaskRouter task
//! enumeration/completion. `async_trait` + `dyn` so the orchestrator can
//! hold either the live REST client or the fake behind one trait object,
//! matching the "capability-typed port, not a vendor SDK binding" design
//! note.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{Participant, ProviderTask, Reservation, TaskStatusFilter, WorkerInfo};

#[async_trait]
pub trait MessagingProviderPort: Send + Sync + std::fmt::Debug {
    /// Send a plain SMS to a phone number. Used by the internal pipeline's
    /// greeting/ping/closure sends.
    async fn send_sms(&self, to: &str, body: &str) -> Result<String, ProviderError>;

    /// Post a message into a Conversations-backed conversation, attributed
    /// to `author` (a worker participant identity, or the automation author
    /// when none resolves). Used by the flex pipeline.
    async fn post_conversation_message(
        &self,
        conversation_sid: &str,
        body: &str,
        author: &str,
    ) -> Result<String, ProviderError>;

    /// List a conversation's participants (§4.5 worker-identity resolution
    /// reads this). `limit` bounds the page size.
    async fn list_conversation_participants(
        &self,
        conversation_sid: &str,
        limit: usize,
    ) -> Result<Vec<Participant>, ProviderError>;

    /// Fetch a TaskRouter worker's record by sid, within a workspace.
    async fn fetch_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
    ) -> Result<WorkerInfo, ProviderError>;

    /// Enumerate TaskRouter tasks in the given assignment statuses, within a
    /// workspace, bounded by `limit`.
    async fn list_assigned_tasks(
        &self,
        workspace_sid: &str,
        statuses: &[TaskStatusFilter],
        limit: usize,
    ) -> Result<Vec<ProviderTask>, ProviderError>;

    /// List accepted reservations for a task, bounded by `limit`.
    async fn list_accepted_reservations(
        &self,
        workspace_sid: &str,
        task_sid: &str,
        limit: usize,
    ) -> Result<Vec<Reservation>, ProviderError>;

    /// Close a Conversations-backed conversation. Called after the closure
    /// message is sent on inactivity, unless disabled by config.
    async fn close_conversation(&self, conversation_sid: &str) -> Result<(), ProviderError>;

    /// Mark a TaskRouter task complete with a reason, after closing its
    /// conversation.
    async fn complete_task(
        &self,
        workspace_sid: &str,
        task_sid: &str,
        reason: &str,
    ) -> Result<(), ProviderError>;
}
