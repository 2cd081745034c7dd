//! # Fake Messaging Provider
//!
//! A scriptable stand-in for [`RestMessagingProvider`], used to drive the
//! end-to-end scenario matrix in spec §8 without a network. Responses are
//! seeded ahead of time; every call is appended to a shared log so tests can
//! assert on what the orchestrator actually sent, in order.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::port::MessagingProviderPort;
use crate::types::{Participant, ProviderTask, Reservation, TaskStatusFilter, WorkerInfo};

/// One observed call, recorded in invocation order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    SendSms { to: String, body: String },
    PostConversationMessage {
        conversation_sid: String,
        body: String,
        author: String,
    },
    ListConversationParticipants { conversation_sid: String },
    FetchWorker { workspace_sid: String, worker_sid: String },
    ListAssignedTasks { workspace_sid: String },
    ListAcceptedReservations { workspace_sid: String, task_sid: String },
    CloseConversation { conversation_sid: String },
    CompleteTask { workspace_sid: String, task_sid: String, reason: String },
}

#[derive(Debug, Default)]
struct Scripted {
    participants: Vec<Participant>,
    worker: Option<WorkerInfo>,
    assigned_tasks: Vec<ProviderTask>,
    accepted_reservations: Vec<Reservation>,
    fail_send_sms: bool,
    fail_post_conversation_message: bool,
}

/// In-memory [`MessagingProviderPort`] double. All responses default to
/// empty/success; call the `with_*`/`set_*` setters to script a scenario.
#[derive(Debug)]
pub struct FakeMessagingProvider {
    calls: Mutex<Vec<RecordedCall>>,
    scripted: Mutex<Scripted>,
}

impl Default for FakeMessagingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMessagingProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(Scripted::default()),
        }
    }

    /// Snapshot of every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("fake provider call log poisoned").clone()
    }

    pub fn set_participants(&self, participants: Vec<Participant>) {
        self.scripted.lock().expect("fake provider state poisoned").participants = participants;
    }

    pub fn set_worker(&self, worker: WorkerInfo) {
        self.scripted.lock().expect("fake provider state poisoned").worker = Some(worker);
    }

    pub fn set_assigned_tasks(&self, tasks: Vec<ProviderTask>) {
        self.scripted.lock().expect("fake provider state poisoned").assigned_tasks = tasks;
    }

    pub fn set_accepted_reservations(&self, reservations: Vec<Reservation>) {
        self.scripted
            .lock()
            .expect("fake provider state poisoned")
            .accepted_reservations = reservations;
    }

    pub fn fail_next_send_sms(&self) {
        self.scripted.lock().expect("fake provider state poisoned").fail_send_sms = true;
    }

    pub fn fail_next_post_conversation_message(&self) {
        self.scripted
            .lock()
            .expect("fake provider state poisoned")
            .fail_post_conversation_message = true;
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("fake provider call log poisoned").push(call);
    }
}

#[async_trait]
impl MessagingProviderPort for FakeMessagingProvider {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String, ProviderError> {
        self.record(RecordedCall::SendSms {
            to: to.to_string(),
            body: body.to_string(),
        });
        let mut scripted = self.scripted.lock().expect("fake provider state poisoned");
        if scripted.fail_send_sms {
            scripted.fail_send_sms = false;
            return Err(ProviderError::api(500, "fake: send_sms scripted failure"));
        }
        Ok(format!("SM-fake-{}", self.calls().len()))
    }

    async fn post_conversation_message(
        &self,
        conversation_sid: &str,
        body: &str,
        author: &str,
    ) -> Result<String, ProviderError> {
        self.record(RecordedCall::PostConversationMessage {
            conversation_sid: conversation_sid.to_string(),
            body: body.to_string(),
            author: author.to_string(),
        });
        let mut scripted = self.scripted.lock().expect("fake provider state poisoned");
        if scripted.fail_post_conversation_message {
            scripted.fail_post_conversation_message = false;
            return Err(ProviderError::api(
                500,
                "fake: post_conversation_message scripted failure",
            ));
        }
        Ok(format!("IM-fake-{}", self.calls().len()))
    }

    async fn list_conversation_participants(
        &self,
        conversation_sid: &str,
        limit: usize,
    ) -> Result<Vec<Participant>, ProviderError> {
        self.record(RecordedCall::ListConversationParticipants {
            conversation_sid: conversation_sid.to_string(),
        });
        let scripted = self.scripted.lock().expect("fake provider state poisoned");
        Ok(scripted.participants.iter().take(limit).cloned().collect())
    }

    async fn fetch_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
    ) -> Result<WorkerInfo, ProviderError> {
        self.record(RecordedCall::FetchWorker {
            workspace_sid: workspace_sid.to_string(),
            worker_sid: worker_sid.to_string(),
        });
        let scripted = self.scripted.lock().expect("fake provider state poisoned");
        scripted
            .worker
            .clone()
            .ok_or_else(|| ProviderError::NotFound(format!("no fake worker scripted for {worker_sid}")))
    }

    async fn list_assigned_tasks(
        &self,
        workspace_sid: &str,
        _statuses: &[TaskStatusFilter],
        limit: usize,
    ) -> Result<Vec<ProviderTask>, ProviderError> {
        self.record(RecordedCall::ListAssignedTasks {
            workspace_sid: workspace_sid.to_string(),
        });
        let scripted = self.scripted.lock().expect("fake provider state poisoned");
        Ok(scripted.assigned_tasks.iter().take(limit).cloned().collect())
    }

    async fn list_accepted_reservations(
        &self,
        workspace_sid: &str,
        task_sid: &str,
        limit: usize,
    ) -> Result<Vec<Reservation>, ProviderError> {
        self.record(RecordedCall::ListAcceptedReservations {
            workspace_sid: workspace_sid.to_string(),
            task_sid: task_sid.to_string(),
        });
        let scripted = self.scripted.lock().expect("fake provider state poisoned");
        Ok(scripted
            .accepted_reservations
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn close_conversation(&self, conversation_sid: &str) -> Result<(), ProviderError> {
        self.record(RecordedCall::CloseConversation {
            conversation_sid: conversation_sid.to_string(),
        });
        Ok(())
    }

    async fn complete_task(
        &self,
        workspace_sid: &str,
        task_sid: &str,
        reason: &str,
    ) -> Result<(), ProviderError> {
        self.record(RecordedCall::CompleteTask {
            workspace_sid: workspace_sid.to_string(),
            task_sid: task_sid.to_string(),
            reason: reason.to_string(),
        });
        Ok(())
    }
}
