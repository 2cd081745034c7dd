//! # In-memory Persistence
//!
//! A `PersistencePort` implementation backed by `HashMap`s behind a mutex,
//! used by orchestrator tests to assert on exact write sequences without a
//! database. Mirrors the Postgres implementation's semantics exactly —
//! same upsert-not-clobber rule, same epoch-reset-on-greeting rule.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_shared::HandoffError;
use uuid::Uuid;

use crate::models::{FlexTask, FlexTaskObservation, InternalTask, InternalTaskStatus};
use crate::port::PersistencePort;

#[derive(Debug, Default)]
struct State {
    internal: HashMap<Uuid, InternalTask>,
    flex: HashMap<String, FlexTask>,
    flex_by_conversation: HashMap<String, String>,
}

/// In-memory `PersistencePort`. Seed internal tasks with [`Self::insert_internal`]
/// before exercising the pipelines against it.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    state: Mutex<State>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("in-memory persistence mutex poisoned")
    }

    /// Seed an internal task directly, bypassing `assign`. Used by tests to
    /// set up fixtures in one step.
    pub fn insert_internal(&self, task: InternalTask) {
        self.lock().internal.insert(task.id, task);
    }

    /// Seed a flex task directly.
    pub fn insert_flex(&self, task: FlexTask) {
        let mut state = self.lock();
        if let Some(conversation_sid) = task.conversation_sid.clone() {
            state
                .flex_by_conversation
                .insert(conversation_sid, task.task_sid.clone());
        }
        state.flex.insert(task.task_sid.clone(), task);
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn find_internal_assigned(
        &self,
        batch_size: u32,
    ) -> Result<Vec<InternalTask>, HandoffError> {
        let state = self.lock();
        let mut tasks: Vec<InternalTask> = state
            .internal
            .values()
            .filter(|t| t.status == InternalTaskStatus::Assigned)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.updated_at);
        tasks.truncate(batch_size as usize);
        Ok(tasks)
    }

    async fn get_internal(&self, id: Uuid) -> Result<Option<InternalTask>, HandoffError> {
        Ok(self.lock().internal.get(&id).cloned())
    }

    async fn assign_internal(
        &self,
        id: Uuid,
        operator_id: &str,
        operator_name: &str,
        now: DateTime<Utc>,
    ) -> Result<InternalTask, HandoffError> {
        let mut state = self.lock();
        let task = state
            .internal
            .get_mut(&id)
            .ok_or_else(|| HandoffError::precondition(format!("internal task {id} not found")))?;
        task.operator_id = Some(operator_id.to_string());
        task.operator_name = Some(operator_name.to_string());
        task.status = InternalTaskStatus::Assigned;
        if task.assigned_at.is_none() {
            task.assigned_at = Some(now);
        }
        task.updated_at = now;
        Ok(task.clone())
    }

    async fn set_internal_greeting_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .internal
            .get_mut(&id)
            .ok_or_else(|| HandoffError::precondition(format!("internal task {id} not found")))?;
        task.greeting_sent_at = Some(now);
        task.ping_sent_at = None;
        task.inactive_sent_at = None;
        task.updated_at = now;
        Ok(())
    }

    async fn mark_internal_ping_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .internal
            .get_mut(&id)
            .ok_or_else(|| HandoffError::precondition(format!("internal task {id} not found")))?;
        task.ping_sent_at = Some(now);
        task.updated_at = now;
        Ok(())
    }

    async fn close_internal_due_to_inactivity(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .internal
            .get_mut(&id)
            .ok_or_else(|| HandoffError::precondition(format!("internal task {id} not found")))?;
        task.inactive_sent_at = Some(now);
        task.closed_at = Some(now);
        task.status = InternalTaskStatus::Closed;
        task.close_reason = Some("inactivity".to_string());
        task.updated_at = now;
        Ok(())
    }

    async fn mark_internal_activity(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .internal
            .get_mut(&id)
            .ok_or_else(|| HandoffError::precondition(format!("internal task {id} not found")))?;
        task.last_customer_activity_at = Some(now);
        task.updated_at = now;
        Ok(())
    }

    async fn find_internal_assigned_by_contact(
        &self,
        contact: &str,
    ) -> Result<Vec<InternalTask>, HandoffError> {
        let state = self.lock();
        let mut tasks: Vec<InternalTask> = state
            .internal
            .values()
            .filter(|t| t.status == InternalTaskStatus::Assigned && t.customer_contact == contact)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| std::cmp::Reverse(t.updated_at));
        Ok(tasks)
    }

    async fn get_flex(&self, task_sid: &str) -> Result<Option<FlexTask>, HandoffError> {
        Ok(self.lock().flex.get(task_sid).cloned())
    }

    async fn find_flex_by_conversation(
        &self,
        conversation_sid: &str,
    ) -> Result<Option<FlexTask>, HandoffError> {
        let state = self.lock();
        let Some(task_sid) = state.flex_by_conversation.get(conversation_sid) else {
            return Ok(None);
        };
        Ok(state.flex.get(task_sid).cloned())
    }

    async fn upsert_flex_base_state(
        &self,
        task_sid: &str,
        observation: FlexTaskObservation,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let entry = state
            .flex
            .entry(task_sid.to_string())
            .or_insert_with(|| FlexTask {
                task_sid: task_sid.to_string(),
                conversation_sid: None,
                channel_type: None,
                customer_name: None,
                customer_address: None,
                customer_from: None,
                worker_sid: None,
                worker_name: None,
                task_assignment_status: None,
                task_attributes: None,
                greeting_sent_at: None,
                ping_sent_at: None,
                inactive_sent_at: None,
                last_customer_activity_at: None,
                created_at: now,
                updated_at: now,
            });

        if let Some(v) = observation.conversation_sid {
            entry.conversation_sid = Some(v);
        }
        if let Some(v) = observation.channel_type {
            entry.channel_type = Some(v);
        }
        if let Some(v) = observation.customer_name {
            entry.customer_name = Some(v);
        }
        if let Some(v) = observation.customer_address {
            entry.customer_address = Some(v);
        }
        if let Some(v) = observation.customer_from {
            entry.customer_from = Some(v);
        }
        if let Some(v) = observation.worker_sid {
            entry.worker_sid = Some(v);
        }
        if let Some(v) = observation.worker_name {
            entry.worker_name = Some(v);
        }
        if let Some(v) = observation.task_assignment_status {
            entry.task_assignment_status = Some(v);
        }
        if let Some(v) = observation.task_attributes {
            entry.task_attributes = Some(v);
        }
        entry.updated_at = now;

        if let Some(conversation_sid) = entry.conversation_sid.clone() {
            state
                .flex_by_conversation
                .insert(conversation_sid, task_sid.to_string());
        }
        Ok(())
    }

    async fn set_flex_greeting_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .flex
            .get_mut(task_sid)
            .ok_or_else(|| HandoffError::precondition(format!("flex task {task_sid} not found")))?;
        task.greeting_sent_at = Some(now);
        task.ping_sent_at = None;
        task.inactive_sent_at = None;
        task.updated_at = now;
        Ok(())
    }

    async fn mark_flex_ping_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .flex
            .get_mut(task_sid)
            .ok_or_else(|| HandoffError::precondition(format!("flex task {task_sid} not found")))?;
        task.ping_sent_at = Some(now);
        task.updated_at = now;
        Ok(())
    }

    async fn mark_flex_inactive_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .flex
            .get_mut(task_sid)
            .ok_or_else(|| HandoffError::precondition(format!("flex task {task_sid} not found")))?;
        task.inactive_sent_at = Some(now);
        task.updated_at = now;
        Ok(())
    }

    async fn mark_flex_activity(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut state = self.lock();
        let task = state
            .flex
            .get_mut(task_sid)
            .ok_or_else(|| HandoffError::precondition(format!("flex task {task_sid} not found")))?;
        task.last_customer_activity_at = Some(now);
        task.updated_at = now;
        Ok(())
    }
}
