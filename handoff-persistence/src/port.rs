//! # Persistence Port
//!
//! The denormalized-reads design note (§9): lookups by contact and by
//! conversation are distinct physical tables/queries, not `ALLOW FILTERING`
//! scans on the primary table. This trait exposes them as typed queries and
//! leaves the physical layout to the implementation — [`crate::postgres`]
//! backs it with ordinary indexed columns since no wide-column driver exists
//! in this stack; see `DESIGN.md` for that call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_shared::HandoffError;
use uuid::Uuid;

use crate::models::{FlexTask, FlexTaskObservation, InternalTask};

#[async_trait]
pub trait PersistencePort: Send + Sync + std::fmt::Debug {
    // ---- InternalTask (§4.3, §4.7) ----

    /// Tasks with `status = assigned`, oldest-updated first, bounded by
    /// `batch_size`. Drives the internal pipeline's per-tick scan.
    async fn find_internal_assigned(
        &self,
        batch_size: u32,
    ) -> Result<Vec<InternalTask>, HandoffError>;

    async fn get_internal(&self, id: Uuid) -> Result<Option<InternalTask>, HandoffError>;

    /// `assign` (§4.7): sets operator, `status=assigned`, `assigned_at` only
    /// if previously unset, `updated_at=now`. Fails with `Precondition` if
    /// the task doesn't exist.
    async fn assign_internal(
        &self,
        id: Uuid,
        operator_id: &str,
        operator_name: &str,
        now: DateTime<Utc>,
    ) -> Result<InternalTask, HandoffError>;

    /// Sets `greeting_sent_at=now` and clears `ping_sent_at`/`inactive_sent_at`
    /// (§3.1: setting greeting starts a fresh epoch).
    async fn set_internal_greeting_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    async fn mark_internal_ping_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    /// Closes the task for inactivity: `inactive_sent_at=now`, `closed_at=now`,
    /// `status=closed`, `close_reason="inactivity"` (§4.3 `onInactive`).
    async fn close_internal_due_to_inactivity(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    /// `markActivity` (§4.6, §4.7): sets `last_customer_activity_at=now`.
    async fn mark_internal_activity(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    /// Tasks with `status=assigned` and `customer_contact = contact`, used by
    /// `MarkByContact` (§4.6) to pick the most-recently-updated match.
    async fn find_internal_assigned_by_contact(
        &self,
        contact: &str,
    ) -> Result<Vec<InternalTask>, HandoffError>;

    // ---- FlexTask (§4.4, §4.6) ----

    async fn get_flex(&self, task_sid: &str) -> Result<Option<FlexTask>, HandoffError>;

    async fn find_flex_by_conversation(
        &self,
        conversation_sid: &str,
    ) -> Result<Option<FlexTask>, HandoffError>;

    /// Upserts observed provider attributes (§4.4e). Present fields
    /// overwrite; absent fields leave the stored value untouched. When
    /// `conversation_sid` is present, also maintains the
    /// `flex_tasks_by_conversation` reverse-lookup row (last write wins).
    async fn upsert_flex_base_state(
        &self,
        task_sid: &str,
        observation: FlexTaskObservation,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    async fn set_flex_greeting_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    async fn mark_flex_ping_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    /// Sets `inactive_sent_at=now`. Closing the conversation and completing
    /// the provider task are external effects the flex pipeline performs
    /// itself after this call succeeds (§4.4 `flexOnInactive`).
    async fn mark_flex_inactive_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;

    async fn mark_flex_activity(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError>;
}
