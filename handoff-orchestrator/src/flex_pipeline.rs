//! # Flex Pipeline (§4.4)
//!
//! Polls the provider for assigned/reserved TaskRouter tasks, upserts
//! observed state, resolves a worker-participant identity to author the
//! greeting, and arms the same (ping, inactive) scheduling as the internal
//! pipeline — reading and writing `FlexTask` columns instead.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use handoff_persistence::{FlexTaskObservation, PersistencePort};
use handoff_provider::{MessagingProviderPort, TaskStatusFilter};
use handoff_shared::{templates, Clock, HandoffError};
use tracing::{info, warn};

use crate::identity::{resolve_worker_identity, IdentityHints};
use crate::metrics::Metrics;
use crate::scheduler::InactivityScheduler;

const CONVERSATION_SID_PREFIX: &str = "CH";
const FALLBACK_WORKER_NAME: &str = "Atendente";
const FALLBACK_CUSTOMER_NAME: &str = "cliente";

/// Workspace sid resolution (§4.4 step 1): configured explicitly, or
/// auto-detected among the provider's workspaces.
#[derive(Debug, Clone)]
pub enum WorkspaceResolution {
    Configured(String),
    AutoDetect,
}

#[derive(Clone)]
pub struct FlexPipeline {
    persistence: Arc<dyn PersistencePort>,
    provider: Arc<dyn MessagingProviderPort>,
    scheduler: InactivityScheduler,
    clock: Arc<dyn Clock>,
    workspace: WorkspaceResolution,
    poll_limit: u32,
    close_conversation: bool,
    complete_task: bool,
    worker_name_cache: Arc<DashMap<String, String>>,
    warned_missing_participant: Arc<Mutex<HashSet<String>>>,
    metrics: Metrics,
    automation_author: String,
}

impl std::fmt::Debug for FlexPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlexPipeline").finish_non_exhaustive()
    }
}

impl FlexPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        persistence: Arc<dyn PersistencePort>,
        provider: Arc<dyn MessagingProviderPort>,
        scheduler: InactivityScheduler,
        clock: Arc<dyn Clock>,
        workspace: WorkspaceResolution,
        poll_limit: u32,
        close_conversation: bool,
        complete_task: bool,
        metrics: Metrics,
        automation_author: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            provider,
            scheduler,
            clock,
            workspace,
            poll_limit,
            close_conversation,
            complete_task,
            worker_name_cache: Arc::new(DashMap::new()),
            warned_missing_participant: Arc::new(Mutex::new(HashSet::new())),
            metrics,
            automation_author: automation_author.into(),
        }
    }

    /// One tick. Returns the number of provider tasks processed; the
    /// reconciliation loop treats `0` as "no work," per §4.2's auto-mode
    /// fallback.
    pub async fn run_tick(&self) -> Result<usize, HandoffError> {
        let Some(workspace_sid) = self.resolve_workspace().await? else {
            return Ok(0);
        };

        let tasks = self
            .provider
            .list_assigned_tasks(
                &workspace_sid,
                &[TaskStatusFilter::Assigned, TaskStatusFilter::Reserved],
                self.poll_limit as usize,
            )
            .await
            .map_err(|e| HandoffError::provider_call(e.to_string()))?;

        let mut processed = 0usize;
        for task in &tasks {
            if self.process_task(&workspace_sid, task).await {
                processed += 1;
            }
        }
        Ok(processed)
    }

    async fn resolve_workspace(&self) -> Result<Option<String>, HandoffError> {
        match &self.workspace {
            WorkspaceResolution::Configured(sid) => Ok(Some(sid.clone())),
            WorkspaceResolution::AutoDetect => {
                warn!("flex workspace sid not configured and auto-detection is not wired to a workspace-listing endpoint; skipping flex pipeline this tick");
                Ok(None)
            }
        }
    }

    async fn process_task(&self, workspace_sid: &str, task: &handoff_provider::ProviderTask) -> bool {
        let attributes: serde_json::Value =
            serde_json::from_str(&task.attributes).unwrap_or_else(|_| serde_json::json!({}));

        let Some(conversation_sid) = attributes
            .get("conversationSid")
            .and_then(|v| v.as_str())
            .filter(|s| s.starts_with(CONVERSATION_SID_PREFIX))
        else {
            return false;
        };

        let reservations = match self
            .provider
            .list_accepted_reservations(workspace_sid, &task.task_sid, 1)
            .await
        {
            Ok(r) => r,
            Err(err) => {
                warn!(task_sid = %task.task_sid, error = %err, "failed to list reservations, retrying next tick");
                return false;
            }
        };
        let Some(reservation) = reservations.into_iter().next() else {
            return false;
        };

        let customer_name = attributes
            .get("customers")
            .and_then(|c| c.get("name"))
            .and_then(|v| v.as_str())
            .or_else(|| attributes.get("friendlyName").and_then(|v| v.as_str()))
            .or_else(|| attributes.get("from").and_then(|v| v.as_str()))
            .unwrap_or(FALLBACK_CUSTOMER_NAME)
            .to_string();
        let customer_address = attributes.get("customers").and_then(|c| c.get("address")).and_then(|v| v.as_str()).map(str::to_string);
        let customer_from = attributes.get("from").and_then(|v| v.as_str()).map(str::to_string);

        let worker_sid = reservation.worker_sid.clone();
        let fallback_worker_name = reservation
            .worker_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_WORKER_NAME)
            .to_string();

        let existing = self.persistence.get_flex(&task.task_sid).await.ok().flatten();
        let existing_worker_name = existing.as_ref().and_then(|t| t.worker_name.as_deref());
        let worker_name = self
            .resolve_worker_display_name(workspace_sid, &worker_sid, &fallback_worker_name, existing_worker_name)
            .await;

        let now = self.clock.now();
        if let Err(err) = self
            .persistence
            .upsert_flex_base_state(
                &task.task_sid,
                FlexTaskObservation {
                    conversation_sid: Some(conversation_sid.to_string()),
                    channel_type: Some("chat".to_string()),
                    customer_name: Some(customer_name.clone()),
                    customer_address: customer_address.clone(),
                    customer_from: customer_from.clone(),
                    worker_sid: Some(worker_sid.clone()),
                    worker_name: Some(worker_name.clone()),
                    task_assignment_status: Some(task.assignment_status.clone()),
                    task_attributes: Some(task.attributes.clone()),
                },
                now,
            )
            .await
        {
            warn!(task_sid = %task.task_sid, error = %err, "failed to upsert flex task state");
            return false;
        }

        let Ok(Some(flex_task)) = self.persistence.get_flex(&task.task_sid).await else {
            return false;
        };

        match flex_task.greeting_sent_at {
            Some(greeting_sent_at) => {
                if flex_task.customer_replied_this_epoch() {
                    self.scheduler.cancel(&task.task_sid);
                } else if flex_task.inactive_sent_at.is_some() {
                    self.scheduler.cancel(&task.task_sid);
                } else if !self.scheduler.has(&task.task_sid) {
                    self.arm(workspace_sid.to_string(), task.task_sid.clone(), greeting_sent_at);
                }
            }
            None => {
                let hints = IdentityHints {
                    worker_sid: Some(&worker_sid),
                    worker_name: Some(&worker_name),
                    customer_address: customer_address.as_deref(),
                    customer_from: customer_from.as_deref(),
                };
                let participants = match self
                    .provider
                    .list_conversation_participants(conversation_sid, 50)
                    .await
                {
                    Ok(p) => p,
                    Err(err) => {
                        warn!(task_sid = %task.task_sid, error = %err, "failed to list conversation participants");
                        return true;
                    }
                };

                match resolve_worker_identity(&participants, &hints) {
                    Some(identity) => {
                        let body = templates::greeting_body(&customer_name, &worker_name);
                        match self
                            .provider
                            .post_conversation_message(conversation_sid, &body, &identity)
                            .await
                        {
                            Ok(_) => {
                                let now = self.clock.now();
                                if let Err(err) =
                                    self.persistence.set_flex_greeting_sent(&task.task_sid, now).await
                                {
                                    warn!(task_sid = %task.task_sid, error = %err, "failed to record flex greeting sent");
                                    self.metrics.record_persistence_failure();
                                } else {
                                    info!(task_sid = %task.task_sid, "flex greeting sent");
                                    self.metrics.record_flex_greeting_sent();
                                    self.arm(workspace_sid.to_string(), task.task_sid.clone(), now);
                                }
                            }
                            Err(err) => {
                                warn!(task_sid = %task.task_sid, error = %err, "flex greeting send failed, retrying next tick");
                                self.metrics.record_provider_call_failure();
                            }
                        }
                    }
                    None => {
                        if self
                            .warned_missing_participant
                            .lock()
                            .expect("warn-once set poisoned")
                            .insert(task.task_sid.clone())
                        {
                            warn!(task_sid = %task.task_sid, "no worker participant resolved yet, will retry");
                        }
                    }
                }
            }
        }

        true
    }

    async fn resolve_worker_display_name(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
        fallback: &str,
        existing_worker_name: Option<&str>,
    ) -> String {
        if let Some(existing) = existing_worker_name {
            if !existing.is_empty() && existing != fallback && existing != FALLBACK_WORKER_NAME {
                return existing.to_string();
            }
        }
        if let Some(cached) = self.worker_name_cache.get(worker_sid) {
            return cached.clone();
        }

        let resolved = match self.provider.fetch_worker(workspace_sid, worker_sid).await {
            Ok(info) => {
                let from_attributes = ["full_name", "fullName", "fullname", "name"]
                    .iter()
                    .find_map(|key| info.attributes.get(*key).and_then(|v| v.as_str()))
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string);
                from_attributes
                    .or_else(|| info.friendly_name.filter(|s| !s.trim().is_empty()))
                    .unwrap_or_else(|| fallback.to_string())
            }
            Err(err) => {
                warn!(worker_sid = %worker_sid, error = %err, "failed to fetch worker, caching fallback name");
                fallback.to_string()
            }
        };

        self.worker_name_cache.insert(worker_sid.to_string(), resolved.clone());
        resolved
    }

    fn arm(&self, workspace_sid: String, task_sid: String, greeting_sent_at: DateTime<Utc>) {
        let now = self.clock.now();
        let ping_persistence = self.persistence.clone();
        let ping_provider = self.provider.clone();
        let ping_clock = self.clock.clone();
        let ping_task_sid = task_sid.clone();
        let ping_warned = self.warned_missing_participant.clone();
        let ping_metrics = self.metrics.clone();

        let inactive_persistence = self.persistence.clone();
        let inactive_provider = self.provider.clone();
        let inactive_clock = self.clock.clone();
        let inactive_scheduler = self.scheduler.clone();
        let inactive_task_sid = task_sid.clone();
        let inactive_workspace_sid = workspace_sid;
        let close_conversation = self.close_conversation;
        let complete_task = self.complete_task;
        let inactive_metrics = self.metrics.clone();
        let inactive_automation_author = self.automation_author.clone();

        self.scheduler.schedule(
            task_sid,
            greeting_sent_at,
            now,
            move || {
                flex_on_ping(
                    ping_task_sid,
                    ping_persistence,
                    ping_provider,
                    ping_clock,
                    ping_warned,
                    ping_metrics,
                )
            },
            move || {
                flex_on_inactive(
                    inactive_workspace_sid,
                    inactive_task_sid,
                    inactive_persistence,
                    inactive_provider,
                    inactive_scheduler,
                    inactive_clock,
                    close_conversation,
                    complete_task,
                    inactive_metrics,
                    inactive_automation_author,
                )
            },
        );
    }
}

/// §4.4 `flexOnPing`: re-resolves the worker identity (it may have changed
/// since the greeting if participants joined/left) and sends the ping body.
/// A missing identity is not retried within this epoch — the inactive
/// callback still covers closing the task out.
async fn flex_on_ping(
    task_sid: String,
    persistence: Arc<dyn PersistencePort>,
    provider: Arc<dyn MessagingProviderPort>,
    clock: Arc<dyn Clock>,
    warned_missing_participant: Arc<Mutex<HashSet<String>>>,
    metrics: Metrics,
) {
    let Ok(Some(task)) = persistence.get_flex(&task_sid).await else {
        return;
    };
    if task.greeting_sent_at.is_none() || task.ping_sent_at.is_some() {
        return;
    }
    if task.customer_replied_this_epoch() {
        return;
    }
    let Some(conversation_sid) = task.conversation_sid.clone() else {
        return;
    };

    let hints = IdentityHints {
        worker_sid: task.worker_sid.as_deref(),
        worker_name: task.worker_name.as_deref(),
        customer_address: task.customer_address.as_deref(),
        customer_from: task.customer_from.as_deref(),
    };
    let participants = match provider.list_conversation_participants(&conversation_sid, 50).await {
        Ok(p) => p,
        Err(err) => {
            warn!(task_sid = %task_sid, error = %err, "failed to list participants for ping, retrying next tick");
            metrics.record_provider_call_failure();
            return;
        }
    };
    let Some(identity) = resolve_worker_identity(&participants, &hints) else {
        if warned_missing_participant
            .lock()
            .expect("warn-once set poisoned")
            .insert(format!("ping:{task_sid}"))
        {
            warn!(task_sid = %task_sid, "no worker participant resolved for ping, skipping this epoch");
        }
        return;
    };

    let customer_name = task.customer_name.clone().unwrap_or_else(|| FALLBACK_CUSTOMER_NAME.to_string());
    let body = templates::ping_body(&customer_name);
    match provider.post_conversation_message(&conversation_sid, &body, &identity).await {
        Ok(_) => {
            let now = clock.now();
            if let Err(err) = persistence.mark_flex_ping_sent(&task_sid, now).await {
                warn!(task_sid = %task_sid, error = %err, "failed to record flex ping sent");
                metrics.record_persistence_failure();
            } else {
                info!(task_sid = %task_sid, "flex ping sent");
                metrics.record_flex_ping_sent();
            }
        }
        Err(err) => {
            warn!(task_sid = %task_sid, error = %err, "flex ping send failed; inactivity timer still pending");
            metrics.record_provider_call_failure();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn flex_on_inactive(
    workspace_sid: String,
    task_sid: String,
    persistence: Arc<dyn PersistencePort>,
    provider: Arc<dyn MessagingProviderPort>,
    scheduler: InactivityScheduler,
    clock: Arc<dyn Clock>,
    close_conversation: bool,
    complete_task: bool,
    metrics: Metrics,
    automation_author: String,
) {
    let Ok(Some(task)) = persistence.get_flex(&task_sid).await else {
        return;
    };
    if task.greeting_sent_at.is_none() || task.inactive_sent_at.is_some() {
        return;
    }
    if task.customer_replied_this_epoch() {
        return;
    }
    let Some(conversation_sid) = task.conversation_sid.clone() else {
        return;
    };

    let customer_name = task.customer_name.clone().unwrap_or_else(|| FALLBACK_CUSTOMER_NAME.to_string());
    let body = templates::closure_body(&customer_name);
    match provider.post_conversation_message(&conversation_sid, &body, &automation_author).await {
        Ok(_) => {
            let now = clock.now();
            if let Err(err) = persistence.mark_flex_inactive_sent(&task_sid, now).await {
                warn!(task_sid = %task_sid, error = %err, "failed to record flex inactivity mark");
                metrics.record_persistence_failure();
                return;
            }
            info!(task_sid = %task_sid, "flex task closed for inactivity");
            metrics.record_flex_closure_sent();

            if close_conversation {
                if let Err(err) = provider.close_conversation(&conversation_sid).await {
                    warn!(task_sid = %task_sid, error = %err, "failed to close conversation");
                    metrics.record_provider_call_failure();
                }
            }
            if complete_task {
                if let Err(err) = provider
                    .complete_task(&workspace_sid, &task_sid, "inactivity")
                    .await
                {
                    warn!(task_sid = %task_sid, error = %err, "failed to complete provider task");
                    metrics.record_provider_call_failure();
                }
            }
            scheduler.cancel(&task_sid);
        }
        Err(err) => {
            warn!(task_sid = %task_sid, error = %err, "flex closure send failed, retrying next tick");
            metrics.record_provider_call_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_persistence::InMemoryPersistence;
    use handoff_provider::{FakeMessagingProvider, Participant, ProviderTask, Reservation, WorkerInfo};
    use handoff_shared::clock::ManualClock;

    fn provider_task(attrs: &str) -> ProviderTask {
        ProviderTask {
            task_sid: "WT1".to_string(),
            attributes: attrs.to_string(),
            assignment_status: "assigned".to_string(),
        }
    }

    fn pipeline(
        persistence: Arc<dyn PersistencePort>,
        provider_double: Arc<FakeMessagingProvider>,
        scheduler: InactivityScheduler,
        clock: Arc<dyn Clock>,
    ) -> FlexPipeline {
        let provider: Arc<dyn MessagingProviderPort> = provider_double;
        FlexPipeline::new(
            persistence,
            provider,
            scheduler,
            clock,
            WorkspaceResolution::Configured("WSxxx".to_string()),
            50,
            true,
            true,
            crate::metrics::Metrics::new(),
            "System",
        )
    }

    #[tokio::test]
    async fn skips_non_conversations_channel() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        provider_double.set_assigned_tasks(vec![provider_task(r#"{"conversationSid":"WA999"}"#)]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let p = pipeline(store.clone(), provider_double.clone(), InactivityScheduler::new(), clock);

        let processed = p.run_tick().await.unwrap();
        assert_eq!(processed, 0);
    }

    #[tokio::test]
    async fn skips_task_without_accepted_reservation() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        provider_double.set_assigned_tasks(vec![provider_task(r#"{"conversationSid":"CH123"}"#)]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let p = pipeline(store.clone(), provider_double.clone(), InactivityScheduler::new(), clock);

        let processed = p.run_tick().await.unwrap();
        assert_eq!(processed, 0);
        assert!(store.get_flex("WT1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn greeting_deferred_until_participant_resolvable() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        provider_double.set_assigned_tasks(vec![provider_task(
            r#"{"conversationSid":"CH123","customers":{"name":"Ana"}}"#,
        )]);
        provider_double.set_accepted_reservations(vec![Reservation {
            reservation_sid: "WR1".to_string(),
            worker_sid: "WK1".to_string(),
            worker_name: Some("Bia".to_string()),
        }]);
        // Tick 1: only the customer is in the conversation, no worker identity resolves.
        provider_double.set_participants(vec![Participant {
            identity: None,
            messaging_binding_address: Some("+5511900000000".to_string()),
            attributes: None,
        }]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let p = pipeline(store.clone(), provider_double.clone(), InactivityScheduler::new(), clock);

        p.run_tick().await.unwrap();
        let after_tick1 = store.get_flex("WT1").await.unwrap().unwrap();
        assert!(after_tick1.greeting_sent_at.is_none());
        assert!(
            provider_double
                .calls()
                .iter()
                .all(|c| !matches!(c, handoff_provider::fake::RecordedCall::PostConversationMessage { .. }))
        );

        // Tick 2: the worker joins the conversation.
        provider_double.set_participants(vec![
            Participant {
                identity: None,
                messaging_binding_address: Some("+5511900000000".to_string()),
                attributes: None,
            },
            Participant {
                identity: Some("WK1".to_string()),
                messaging_binding_address: None,
                attributes: None,
            },
        ]);
        p.run_tick().await.unwrap();
        let after_tick2 = store.get_flex("WT1").await.unwrap().unwrap();
        assert!(after_tick2.greeting_sent_at.is_some());

        let greetings = provider_double
            .calls()
            .into_iter()
            .filter(|c| matches!(c, handoff_provider::fake::RecordedCall::PostConversationMessage { .. }))
            .count();
        assert_eq!(greetings, 1);
    }

    #[tokio::test]
    async fn worker_name_resolved_via_fetch_and_cached() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        provider_double.set_assigned_tasks(vec![provider_task(r#"{"conversationSid":"CH123"}"#)]);
        provider_double.set_accepted_reservations(vec![Reservation {
            reservation_sid: "WR1".to_string(),
            worker_sid: "WK1".to_string(),
            worker_name: None,
        }]);
        provider_double.set_worker(WorkerInfo {
            worker_sid: "WK1".to_string(),
            friendly_name: Some("Friendly Bia".to_string()),
            attributes: serde_json::json!({"full_name": "Beatriz Souza"}),
        });
        provider_double.set_participants(vec![Participant {
            identity: Some("WK1".to_string()),
            messaging_binding_address: None,
            attributes: None,
        }]);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let p = pipeline(store.clone(), provider_double.clone(), InactivityScheduler::new(), clock);

        p.run_tick().await.unwrap();
        let task = store.get_flex("WT1").await.unwrap().unwrap();
        assert_eq!(task.worker_name.as_deref(), Some("Beatriz Souza"));

        let fetch_calls = provider_double
            .calls()
            .into_iter()
            .filter(|c| matches!(c, handoff_provider::fake::RecordedCall::FetchWorker { .. }))
            .count();
        assert_eq!(fetch_calls, 1, "second tick should use the cache, not refetch");

        p.run_tick().await.unwrap();
        let fetch_calls_after_second_tick = provider_double
            .calls()
            .into_iter()
            .filter(|c| matches!(c, handoff_provider::fake::RecordedCall::FetchWorker { .. }))
            .count();
        assert_eq!(fetch_calls_after_second_tick, 1);
    }

    #[tokio::test]
    async fn unconfigured_auto_detect_workspace_reports_no_work() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let provider: Arc<dyn MessagingProviderPort> = provider_double.clone();
        let p = FlexPipeline::new(
            store,
            provider,
            InactivityScheduler::new(),
            clock,
            WorkspaceResolution::AutoDetect,
            50,
            true,
            true,
            crate::metrics::Metrics::new(),
            "System",
        );

        let processed = p.run_tick().await.unwrap();
        assert_eq!(processed, 0);
        assert!(provider_double.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_closes_conversation_and_completes_task() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        provider_double.set_assigned_tasks(vec![provider_task(
            r#"{"conversationSid":"CH123","customers":{"name":"Ana"}}"#,
        )]);
        provider_double.set_accepted_reservations(vec![Reservation {
            reservation_sid: "WR1".to_string(),
            worker_sid: "WK1".to_string(),
            worker_name: Some("Bia".to_string()),
        }]);
        provider_double.set_participants(vec![Participant {
            identity: Some("WK1".to_string()),
            messaging_binding_address: None,
            attributes: None,
        }]);
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let p = pipeline(store.clone(), provider_double.clone(), InactivityScheduler::new(), clock.clone());

        p.run_tick().await.unwrap();
        assert!(store.get_flex("WT1").await.unwrap().unwrap().greeting_sent_at.is_some());

        clock.advance(chrono::Duration::seconds(6));
        tokio::time::advance(std::time::Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert!(store.get_flex("WT1").await.unwrap().unwrap().ping_sent_at.is_some());

        clock.advance(chrono::Duration::seconds(25));
        tokio::time::advance(std::time::Duration::from_secs(25)).await;
        tokio::task::yield_now().await;

        let task = store.get_flex("WT1").await.unwrap().unwrap();
        assert!(task.inactive_sent_at.is_some());

        let calls = provider_double.calls();
        assert!(calls
            .iter()
            .any(|c| matches!(c, handoff_provider::fake::RecordedCall::CloseConversation { .. })));
        assert!(calls
            .iter()
            .any(|c| matches!(c, handoff_provider::fake::RecordedCall::CompleteTask { workspace_sid, .. } if workspace_sid == "WSxxx")));
    }
}
