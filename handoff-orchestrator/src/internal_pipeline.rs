//! # Internal Pipeline (§4.3)
//!
//! Drives the SMS-mediated handoff: greets newly-assigned tasks, arms
//! ping/inactive timers anchored to the greeting, and re-checks
//! preconditions inside each callback before acting (§5 ordering
//! guarantees — a callback may run after `Cancel` lost the race, or after
//! the customer replied).

use std::sync::Arc;

use handoff_persistence::PersistencePort;
use handoff_provider::MessagingProviderPort;
use handoff_shared::{templates, Clock, HandoffError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::scheduler::InactivityScheduler;

#[derive(Clone)]
pub struct InternalPipeline {
    persistence: Arc<dyn PersistencePort>,
    provider: Arc<dyn MessagingProviderPort>,
    scheduler: InactivityScheduler,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl std::fmt::Debug for InternalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalPipeline").finish_non_exhaustive()
    }
}

impl InternalPipeline {
    pub fn new(
        persistence: Arc<dyn PersistencePort>,
        provider: Arc<dyn MessagingProviderPort>,
        scheduler: InactivityScheduler,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            persistence,
            provider,
            scheduler,
            clock,
            metrics,
        }
    }

    /// One tick of the internal pipeline. Returns the number of tasks
    /// examined, for the reconciliation loop's "did flex do work" check
    /// (internal work never gates §4.2 step 2/3, but callers may still log
    /// it).
    pub async fn run_tick(&self, batch_size: u32) -> Result<usize, HandoffError> {
        let tasks = self.persistence.find_internal_assigned(batch_size).await?;
        let count = tasks.len();

        for task in tasks {
            if task.operator_id.is_none() || task.operator_name.is_none() {
                continue;
            }

            match task.greeting_sent_at {
                Some(greeting_sent_at) => {
                    if task.customer_replied_this_epoch() {
                        self.scheduler.cancel(&task.id.to_string());
                        continue;
                    }
                    if task.inactive_sent_at.is_some() {
                        self.scheduler.cancel(&task.id.to_string());
                        continue;
                    }
                    if !self.scheduler.has(&task.id.to_string()) {
                        self.arm(task.id, greeting_sent_at);
                    }
                }
                None => {
                    let operator_name = task.operator_name.clone().unwrap_or_default();
                    let body = templates::greeting_body(&task.customer_name, &operator_name);
                    match self.provider.send_sms(&task.customer_contact, &body).await {
                        Ok(_) => {
                            let now = self.clock.now();
                            if let Err(err) =
                                self.persistence.set_internal_greeting_sent(task.id, now).await
                            {
                                warn!(task_id = %task.id, error = %err, "failed to record greeting sent");
                                self.metrics.record_persistence_failure();
                                continue;
                            }
                            info!(task_id = %task.id, "internal greeting sent");
                            self.metrics.record_internal_greeting_sent();
                            self.arm(task.id, now);
                        }
                        Err(err) => {
                            warn!(task_id = %task.id, error = %err, "internal greeting send failed, retrying next tick");
                            self.metrics.record_provider_call_failure();
                        }
                    }
                }
            }
        }

        Ok(count)
    }

    fn arm(&self, task_id: Uuid, greeting_sent_at: chrono::DateTime<chrono::Utc>) {
        let now = self.clock.now();
        let ping_persistence = self.persistence.clone();
        let ping_provider = self.provider.clone();
        let ping_clock = self.clock.clone();
        let ping_metrics = self.metrics.clone();

        let inactive_persistence = self.persistence.clone();
        let inactive_provider = self.provider.clone();
        let inactive_scheduler = self.scheduler.clone();
        let inactive_clock = self.clock.clone();
        let inactive_metrics = self.metrics.clone();

        self.scheduler.schedule(
            task_id.to_string(),
            greeting_sent_at,
            now,
            move || on_ping(task_id, ping_persistence, ping_provider, ping_clock, ping_metrics),
            move || {
                on_inactive(
                    task_id,
                    inactive_persistence,
                    inactive_provider,
                    inactive_scheduler,
                    inactive_clock,
                    inactive_metrics,
                )
            },
        );
    }

    /// `assign` (§4.7): sets operator, `status=assigned`, `assignedAt` if
    /// previously unset.
    pub async fn assign(
        &self,
        task_id: Uuid,
        operator_id: &str,
        operator_name: &str,
    ) -> Result<handoff_persistence::InternalTask, HandoffError> {
        let now = self.clock.now();
        self.persistence.assign_internal(task_id, operator_id, operator_name, now).await
    }

    /// `startHandoff` (§4.7): assigns, then (if `send_greeting`) sends the
    /// greeting SMS. A greeting failure fails the whole call — unlike the
    /// reconciliation tick, this is a synchronous, caller-facing command.
    pub async fn start_handoff(
        &self,
        task_id: Uuid,
        operator_id: &str,
        operator_name: &str,
        send_greeting: bool,
    ) -> Result<handoff_persistence::InternalTask, HandoffError> {
        let task = self.assign(task_id, operator_id, operator_name).await?;
        if !send_greeting {
            return Ok(task);
        }

        let body = templates::greeting_body(&task.customer_name, operator_name);
        self.provider
            .send_sms(&task.customer_contact, &body)
            .await
            .map_err(|e| HandoffError::provider_call(e.to_string()))?;

        let now = self.clock.now();
        self.persistence.set_internal_greeting_sent(task_id, now).await?;
        self.metrics.record_internal_greeting_sent();
        self.arm(task_id, now);

        self.persistence
            .get_internal(task_id)
            .await?
            .ok_or_else(|| HandoffError::precondition("task disappeared after greeting"))
    }

    /// `registerGreeting` (§4.7): records that a greeting was sent
    /// out-of-band. Requires `status = assigned`.
    pub async fn register_greeting(&self, task_id: Uuid) -> Result<(), HandoffError> {
        let task = self
            .persistence
            .get_internal(task_id)
            .await?
            .ok_or_else(|| HandoffError::precondition("task not found"))?;
        if task.status != handoff_persistence::InternalTaskStatus::Assigned {
            return Err(HandoffError::precondition("task is not assigned"));
        }

        let now = self.clock.now();
        self.persistence.set_internal_greeting_sent(task_id, now).await?;
        self.arm(task_id, now);
        Ok(())
    }

    /// `markActivity` (§4.7): writes `lastCustomerActivityAt=now` and
    /// cancels timers.
    pub async fn mark_activity(&self, task_id: Uuid) -> Result<(), HandoffError> {
        let now = self.clock.now();
        self.persistence.mark_internal_activity(task_id, now).await?;
        self.scheduler.cancel(&task_id.to_string());
        Ok(())
    }
}

async fn on_ping(
    task_id: Uuid,
    persistence: Arc<dyn PersistencePort>,
    provider: Arc<dyn MessagingProviderPort>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
) {
    let Ok(Some(task)) = persistence.get_internal(task_id).await else {
        return;
    };
    if task.status != handoff_persistence::InternalTaskStatus::Assigned {
        return;
    }
    if task.greeting_sent_at.is_none() || task.ping_sent_at.is_some() {
        return;
    }
    if task.customer_replied_this_epoch() {
        return;
    }

    let body = templates::ping_body(&task.customer_name);
    match provider.send_sms(&task.customer_contact, &body).await {
        Ok(_) => {
            let now = clock.now();
            if let Err(err) = persistence.mark_internal_ping_sent(task_id, now).await {
                warn!(task_id = %task_id, error = %err, "failed to record ping sent");
                metrics.record_persistence_failure();
            } else {
                info!(task_id = %task_id, "internal ping sent");
                metrics.record_internal_ping_sent();
            }
        }
        Err(err) => {
            warn!(task_id = %task_id, error = %err, "internal ping send failed; inactivity timer still pending");
            metrics.record_provider_call_failure();
        }
    }
}

async fn on_inactive(
    task_id: Uuid,
    persistence: Arc<dyn PersistencePort>,
    provider: Arc<dyn MessagingProviderPort>,
    scheduler: InactivityScheduler,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
) {
    let Ok(Some(task)) = persistence.get_internal(task_id).await else {
        return;
    };
    if task.status != handoff_persistence::InternalTaskStatus::Assigned {
        return;
    }
    if task.greeting_sent_at.is_none() || task.inactive_sent_at.is_some() {
        return;
    }
    if task.customer_replied_this_epoch() {
        return;
    }

    let body = templates::closure_body(&task.customer_name);
    match provider.send_sms(&task.customer_contact, &body).await {
        Ok(_) => {
            let now = clock.now();
            match persistence.close_internal_due_to_inactivity(task_id, now).await {
                Ok(()) => {
                    info!(task_id = %task_id, "internal task closed for inactivity");
                    metrics.record_internal_closure_sent();
                    scheduler.cancel(&task_id.to_string());
                }
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "failed to record inactivity closure");
                    metrics.record_persistence_failure();
                }
            }
        }
        Err(err) => {
            warn!(task_id = %task_id, error = %err, "internal closure send failed, retrying next tick");
            metrics.record_provider_call_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use handoff_persistence::{InMemoryPersistence, InternalTask, InternalTaskStatus};
    use handoff_provider::FakeMessagingProvider;
    use handoff_shared::clock::ManualClock;

    fn sample(now: chrono::DateTime<chrono::Utc>) -> InternalTask {
        InternalTask {
            id: Uuid::new_v4(),
            customer_name: "Ana".to_string(),
            customer_contact: "+5511900000001".to_string(),
            operator_id: Some("OP1".to_string()),
            operator_name: Some("Bia".to_string()),
            status: InternalTaskStatus::Assigned,
            created_at: now,
            updated_at: now,
            assigned_at: Some(now),
            greeting_sent_at: None,
            ping_sent_at: None,
            inactive_sent_at: None,
            last_customer_activity_at: None,
            closed_at: None,
            close_reason: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_sends_greeting_ping_and_closure() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let store = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        let provider: Arc<dyn MessagingProviderPort> = provider_double.clone();
        let scheduler = InactivityScheduler::new();
        let persistence: Arc<dyn PersistencePort> = store.clone();
        let pipeline = InternalPipeline::new(
            persistence.clone(),
            provider,
            scheduler,
            clock.clone(),
            crate::metrics::Metrics::new(),
        );

        let task = sample(now);
        let id = task.id;
        store.insert_internal(task);

        pipeline.run_tick(100).await.unwrap();
        let reloaded = persistence.get_internal(id).await.unwrap().unwrap();
        assert!(reloaded.greeting_sent_at.is_some());

        tokio::time::advance(std::time::Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        tokio::time::advance(std::time::Duration::from_secs(25)).await;
        tokio::task::yield_now().await;

        let calls = provider_double.calls();
        assert_eq!(calls.len(), 3, "greeting, ping, closure");
    }

    fn unassigned(now: chrono::DateTime<chrono::Utc>) -> InternalTask {
        InternalTask {
            id: Uuid::new_v4(),
            customer_name: "Ana".to_string(),
            customer_contact: "+5511900000001".to_string(),
            operator_id: None,
            operator_name: None,
            status: InternalTaskStatus::Open,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            greeting_sent_at: None,
            ping_sent_at: None,
            inactive_sent_at: None,
            last_customer_activity_at: None,
            closed_at: None,
            close_reason: None,
        }
    }

    #[tokio::test]
    async fn start_handoff_assigns_greets_and_arms() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let store = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        let provider: Arc<dyn MessagingProviderPort> = provider_double.clone();
        let scheduler = InactivityScheduler::new();
        let persistence: Arc<dyn PersistencePort> = store.clone();
        let pipeline = InternalPipeline::new(
            persistence.clone(),
            provider,
            scheduler.clone(),
            clock.clone(),
            crate::metrics::Metrics::new(),
        );

        let task = unassigned(now);
        let id = task.id;
        store.insert_internal(task);

        let updated = pipeline.start_handoff(id, "OP1", "Bia", true).await.unwrap();
        assert!(updated.greeting_sent_at.is_some());
        assert_eq!(updated.operator_name.as_deref(), Some("Bia"));
        assert!(scheduler.has(&id.to_string()));
        assert_eq!(provider_double.calls().len(), 1);
    }

    #[tokio::test]
    async fn start_handoff_without_greeting_only_assigns() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let store = Arc::new(InMemoryPersistence::new());
        let provider_double = Arc::new(FakeMessagingProvider::new());
        let provider: Arc<dyn MessagingProviderPort> = provider_double.clone();
        let scheduler = InactivityScheduler::new();
        let persistence: Arc<dyn PersistencePort> = store.clone();
        let pipeline = InternalPipeline::new(
            persistence,
            provider,
            scheduler.clone(),
            clock.clone(),
            crate::metrics::Metrics::new(),
        );

        let task = unassigned(now);
        let id = task.id;
        store.insert_internal(task);

        let updated = pipeline.start_handoff(id, "OP1", "Bia", false).await.unwrap();
        assert!(updated.greeting_sent_at.is_none());
        assert!(provider_double.calls().is_empty());
        assert!(!scheduler.has(&id.to_string()));
    }

    #[tokio::test]
    async fn register_greeting_rejects_unassigned_task() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let store = Arc::new(InMemoryPersistence::new());
        let provider: Arc<dyn MessagingProviderPort> = Arc::new(FakeMessagingProvider::new());
        let persistence: Arc<dyn PersistencePort> = store.clone();
        let pipeline = InternalPipeline::new(
            persistence,
            provider,
            InactivityScheduler::new(),
            clock,
            crate::metrics::Metrics::new(),
        );

        let task = unassigned(now);
        let id = task.id;
        store.insert_internal(task);

        let err = pipeline.register_greeting(id).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn mark_activity_cancels_scheduler_entry() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let store = Arc::new(InMemoryPersistence::new());
        let provider: Arc<dyn MessagingProviderPort> = Arc::new(FakeMessagingProvider::new());
        let scheduler = InactivityScheduler::new();
        let persistence: Arc<dyn PersistencePort> = store.clone();
        let pipeline = InternalPipeline::new(
            persistence,
            provider,
            scheduler.clone(),
            clock.clone(),
            crate::metrics::Metrics::new(),
        );

        let task = sample(now);
        let id = task.id;
        store.insert_internal(task);
        pipeline.run_tick(100).await.unwrap();
        assert!(scheduler.has(&id.to_string()));

        pipeline.mark_activity(id).await.unwrap();
        assert!(!scheduler.has(&id.to_string()));
    }
}
