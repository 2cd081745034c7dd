//! # Customer-Activity Sink (§4.6)
//!
//! The two entry points the webhook layer calls on an inbound message.
//! Both swallow persistence errors and cancel the affected scheduler entry
//! on success — the provider must never see anything but success, or it
//! retries the webhook delivery (§7).

use std::sync::Arc;

use handoff_persistence::PersistencePort;
use handoff_shared::Clock;
use tracing::warn;

use crate::scheduler::InactivityScheduler;

#[derive(Clone)]
pub struct ActivitySink {
    persistence: Arc<dyn PersistencePort>,
    scheduler: InactivityScheduler,
    clock: Arc<dyn Clock>,
    automation_author: String,
}

impl std::fmt::Debug for ActivitySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivitySink").finish_non_exhaustive()
    }
}

impl ActivitySink {
    /// `automation_author` (§6.1 `TASKS_AUTOMATION_AUTHOR`) is the author
    /// string an unrecognized-author message is compared against in
    /// `mark_by_conversation_sid`'s classification — it must match whatever
    /// the flex pipeline actually posts automation messages as.
    pub fn new(
        persistence: Arc<dyn PersistencePort>,
        scheduler: InactivityScheduler,
        clock: Arc<dyn Clock>,
        automation_author: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            scheduler,
            clock,
            automation_author: automation_author.into(),
        }
    }

    /// `MarkByContact` (§4.6): picks the most-recently-updated `assigned`
    /// internal task for `customer_contact` and marks activity on it. Other
    /// assigned tasks for the same contact, if any, keep their timers (§9
    /// open question, preserved as-is).
    pub async fn mark_by_contact(&self, customer_contact: &str) {
        let candidates = match self.persistence.find_internal_assigned_by_contact(customer_contact).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(customer_contact, error = %err, "markByContact: lookup failed, swallowing");
                return;
            }
        };

        let Some(task) = candidates.into_iter().max_by_key(|t| t.updated_at) else {
            return;
        };

        let now = self.clock.now();
        if let Err(err) = self.persistence.mark_internal_activity(task.id, now).await {
            warn!(task_id = %task.id, error = %err, "markByContact: write failed, swallowing");
            return;
        }
        self.scheduler.cancel(&task.id.to_string());
    }

    /// `MarkByConversationSid` (§4.6): requires a non-empty `author`.
    /// Classifies the author as customer-or-not per the priority rules, and
    /// marks activity only when the author is the customer.
    pub async fn mark_by_conversation_sid(&self, conversation_sid: &str, author: Option<&str>) {
        let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) else {
            return;
        };

        let task = match self.persistence.find_flex_by_conversation(conversation_sid).await {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(err) => {
                warn!(conversation_sid, error = %err, "markByConversationSid: lookup failed, swallowing");
                return;
            }
        };

        if !is_customer_author(author, &task, &self.automation_author) {
            return;
        }

        let now = self.clock.now();
        if let Err(err) = self.persistence.mark_flex_activity(&task.task_sid, now).await {
            warn!(task_sid = %task.task_sid, error = %err, "markByConversationSid: write failed, swallowing");
            return;
        }
        self.scheduler.cancel(&task.task_sid);
    }
}

/// §4.6 classification: if a customer address/from is known on the row, the
/// author counts as customer iff it matches one of them (case-insensitive,
/// trimmed); otherwise it counts as customer iff it is *not* the automation
/// author and not the stored worker identity — i.e. an unrecognized author is
/// assumed to be the customer.
fn is_customer_author(author: &str, task: &handoff_persistence::FlexTask, automation_author: &str) -> bool {
    let eq_ci = |a: &str, b: &str| a.trim().eq_ignore_ascii_case(b.trim());

    let known_customer = [task.customer_address.as_deref(), task.customer_from.as_deref()]
        .into_iter()
        .flatten()
        .next();
    if let Some(_known) = known_customer {
        return [task.customer_address.as_deref(), task.customer_from.as_deref()]
            .into_iter()
            .flatten()
            .any(|candidate| eq_ci(author, candidate));
    }

    let is_automation = eq_ci(author, automation_author);
    let is_worker = [task.worker_name.as_deref(), task.worker_sid.as_deref()]
        .into_iter()
        .flatten()
        .any(|candidate| eq_ci(author, candidate));
    !is_automation && !is_worker
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use handoff_persistence::{FlexTaskObservation, InMemoryPersistence, InternalTask, InternalTaskStatus};
    use handoff_shared::clock::ManualClock;
    use uuid::Uuid;

    fn internal_task(contact: &str, updated_at: chrono::DateTime<Utc>) -> InternalTask {
        InternalTask {
            id: Uuid::new_v4(),
            customer_name: "Ana".to_string(),
            customer_contact: contact.to_string(),
            operator_id: Some("OP1".to_string()),
            operator_name: Some("Bia".to_string()),
            status: InternalTaskStatus::Assigned,
            created_at: updated_at,
            updated_at,
            assigned_at: Some(updated_at),
            greeting_sent_at: Some(updated_at),
            ping_sent_at: None,
            inactive_sent_at: None,
            last_customer_activity_at: None,
            closed_at: None,
            close_reason: None,
        }
    }

    #[tokio::test]
    async fn mark_by_contact_picks_most_recently_updated() {
        let store = Arc::new(InMemoryPersistence::new());
        let now = Utc::now();
        let older = internal_task("+5511900000001", now - chrono::Duration::seconds(10));
        let newer = internal_task("+5511900000001", now);
        let newer_id = newer.id;
        store.insert_internal(older);
        store.insert_internal(newer);

        let persistence: Arc<dyn PersistencePort> = store.clone();
        let sink = ActivitySink::new(persistence.clone(), InactivityScheduler::new(), Arc::new(ManualClock::new(now)), "System");
        sink.mark_by_contact("+5511900000001").await;

        let reloaded = persistence.get_internal(newer_id).await.unwrap().unwrap();
        assert!(reloaded.last_customer_activity_at.is_some());
    }

    #[tokio::test]
    async fn mark_by_contact_with_no_match_is_a_no_op() {
        let store: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
        let sink = ActivitySink::new(store, InactivityScheduler::new(), Arc::new(ManualClock::new(Utc::now())), "System");
        sink.mark_by_contact("+5511900000099").await;
    }

    async fn seeded_flex(
        store: &Arc<InMemoryPersistence>,
        customer_from: Option<&str>,
        worker_name: Option<&str>,
    ) {
        let now = Utc::now();
        let persistence: &dyn PersistencePort = store.as_ref();
        persistence
            .upsert_flex_base_state(
                "WT1",
                FlexTaskObservation {
                    conversation_sid: Some("CH1".to_string()),
                    customer_from: customer_from.map(str::to_string),
                    worker_name: worker_name.map(str::to_string),
                    worker_sid: Some("WK1".to_string()),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        persistence.set_flex_greeting_sent("WT1", now).await.unwrap();
    }

    #[tokio::test]
    async fn mark_by_conversation_sid_ignores_operator_author() {
        let store = Arc::new(InMemoryPersistence::new());
        seeded_flex(&store, Some("+5511900000000"), Some("Bia")).await;

        let persistence: Arc<dyn PersistencePort> = store.clone();
        let sink = ActivitySink::new(persistence.clone(), InactivityScheduler::new(), Arc::new(ManualClock::new(Utc::now())), "System");
        sink.mark_by_conversation_sid("CH1", Some("Bia")).await;

        let task = persistence.get_flex("WT1").await.unwrap().unwrap();
        assert!(task.last_customer_activity_at.is_none());
    }

    #[tokio::test]
    async fn mark_by_conversation_sid_marks_known_customer_address() {
        let store = Arc::new(InMemoryPersistence::new());
        seeded_flex(&store, Some("+5511900000000"), Some("Bia")).await;

        let persistence: Arc<dyn PersistencePort> = store.clone();
        let sink = ActivitySink::new(persistence.clone(), InactivityScheduler::new(), Arc::new(ManualClock::new(Utc::now())), "System");
        sink.mark_by_conversation_sid("CH1", Some("+5511900000000")).await;

        let task = persistence.get_flex("WT1").await.unwrap().unwrap();
        assert!(task.last_customer_activity_at.is_some());
    }

    #[tokio::test]
    async fn mark_by_conversation_sid_requires_nonempty_author() {
        let store = Arc::new(InMemoryPersistence::new());
        seeded_flex(&store, Some("+5511900000000"), Some("Bia")).await;

        let persistence: Arc<dyn PersistencePort> = store.clone();
        let sink = ActivitySink::new(persistence.clone(), InactivityScheduler::new(), Arc::new(ManualClock::new(Utc::now())), "System");
        sink.mark_by_conversation_sid("CH1", Some("  ")).await;
        sink.mark_by_conversation_sid("CH1", None).await;

        let task = persistence.get_flex("WT1").await.unwrap().unwrap();
        assert!(task.last_customer_activity_at.is_none());
    }

    #[tokio::test]
    async fn mark_by_conversation_sid_treats_unrecognized_author_as_customer() {
        // No customer_address/from known on this row; an author that is
        // neither "System" nor the stored worker identity counts as customer.
        let store = Arc::new(InMemoryPersistence::new());
        seeded_flex(&store, None, Some("Bia")).await;

        let persistence: Arc<dyn PersistencePort> = store.clone();
        let sink = ActivitySink::new(persistence.clone(), InactivityScheduler::new(), Arc::new(ManualClock::new(Utc::now())), "System");
        sink.mark_by_conversation_sid("CH1", Some("+5511988887777")).await;

        let task = persistence.get_flex("WT1").await.unwrap().unwrap();
        assert!(task.last_customer_activity_at.is_some());
    }

    #[tokio::test]
    async fn mark_by_conversation_sid_honors_configured_automation_author() {
        // No customer_address/from known on this row; a non-default
        // TASKS_AUTOMATION_AUTHOR must be compared against, not the literal
        // "System" — otherwise an automation-posted closure message would be
        // misclassified as the customer and cancel the inactivity timer.
        let store = Arc::new(InMemoryPersistence::new());
        seeded_flex(&store, None, Some("Bia")).await;

        let persistence: Arc<dyn PersistencePort> = store.clone();
        let sink = ActivitySink::new(
            persistence.clone(),
            InactivityScheduler::new(),
            Arc::new(ManualClock::new(Utc::now())),
            "Automação",
        );
        sink.mark_by_conversation_sid("CH1", Some("Automação")).await;

        let task = persistence.get_flex("WT1").await.unwrap().unwrap();
        assert!(task.last_customer_activity_at.is_none(), "configured automation author must not count as customer");
    }
}
