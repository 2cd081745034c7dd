//! # Postgres-backed Persistence
//!
//! Concrete `PersistencePort` over `sqlx::PgPool`. Every write is a single
//! blind `INSERT ... ON CONFLICT` or `UPDATE`, matching the wide-column
//! store's upsert-oriented access pattern (§6.2) even though the physical
//! engine here is relational — see `DESIGN.md` for that substitution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handoff_shared::HandoffError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{FlexTask, FlexTaskObservation, InternalTask, InternalTaskStatus};
use crate::port::PersistencePort;

fn parse_status(raw: &str) -> InternalTaskStatus {
    match raw {
        "assigned" => InternalTaskStatus::Assigned,
        "closed" => InternalTaskStatus::Closed,
        _ => InternalTaskStatus::Open,
    }
}

#[derive(sqlx::FromRow)]
struct InternalTaskRow {
    id: Uuid,
    customer_name: String,
    customer_contact: String,
    operator_id: Option<String>,
    operator_name: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    assigned_at: Option<DateTime<Utc>>,
    greeting_sent_at: Option<DateTime<Utc>>,
    ping_sent_at: Option<DateTime<Utc>>,
    inactive_sent_at: Option<DateTime<Utc>>,
    last_customer_activity_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    close_reason: Option<String>,
}

impl From<InternalTaskRow> for InternalTask {
    fn from(row: InternalTaskRow) -> Self {
        InternalTask {
            id: row.id,
            customer_name: row.customer_name,
            customer_contact: row.customer_contact,
            operator_id: row.operator_id,
            operator_name: row.operator_name,
            status: parse_status(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
            assigned_at: row.assigned_at,
            greeting_sent_at: row.greeting_sent_at,
            ping_sent_at: row.ping_sent_at,
            inactive_sent_at: row.inactive_sent_at,
            last_customer_activity_at: row.last_customer_activity_at,
            closed_at: row.closed_at,
            close_reason: row.close_reason,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlexTaskRow {
    task_sid: String,
    conversation_sid: Option<String>,
    channel_type: Option<String>,
    customer_name: Option<String>,
    customer_address: Option<String>,
    customer_from: Option<String>,
    worker_sid: Option<String>,
    worker_name: Option<String>,
    task_assignment_status: Option<String>,
    task_attributes: Option<String>,
    greeting_sent_at: Option<DateTime<Utc>>,
    ping_sent_at: Option<DateTime<Utc>>,
    inactive_sent_at: Option<DateTime<Utc>>,
    last_customer_activity_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FlexTaskRow> for FlexTask {
    fn from(row: FlexTaskRow) -> Self {
        FlexTask {
            task_sid: row.task_sid,
            conversation_sid: row.conversation_sid,
            channel_type: row.channel_type,
            customer_name: row.customer_name,
            customer_address: row.customer_address,
            customer_from: row.customer_from,
            worker_sid: row.worker_sid,
            worker_name: row.worker_name,
            task_assignment_status: row.task_assignment_status,
            task_attributes: row.task_attributes,
            greeting_sent_at: row.greeting_sent_at,
            ping_sent_at: row.ping_sent_at,
            inactive_sent_at: row.inactive_sent_at,
            last_customer_activity_at: row.last_customer_activity_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn not_found(kind: &str, key: impl std::fmt::Display) -> HandoffError {
    HandoffError::precondition(format!("{kind} {key} not found"))
}

/// Postgres-backed `PersistencePort`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PersistencePort for PostgresPersistence {
    async fn find_internal_assigned(
        &self,
        batch_size: u32,
    ) -> Result<Vec<InternalTask>, HandoffError> {
        let rows = sqlx::query_as::<_, InternalTaskRow>(
            "SELECT id, customer_name, customer_contact, operator_id, operator_name, status, \
             created_at, updated_at, assigned_at, greeting_sent_at, ping_sent_at, \
             inactive_sent_at, last_customer_activity_at, closed_at, close_reason \
             FROM tasks WHERE status = 'assigned' ORDER BY updated_at ASC LIMIT $1",
        )
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_internal(&self, id: Uuid) -> Result<Option<InternalTask>, HandoffError> {
        let row = sqlx::query_as::<_, InternalTaskRow>(
            "SELECT id, customer_name, customer_contact, operator_id, operator_name, status, \
             created_at, updated_at, assigned_at, greeting_sent_at, ping_sent_at, \
             inactive_sent_at, last_customer_activity_at, closed_at, close_reason \
             FROM tasks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    async fn assign_internal(
        &self,
        id: Uuid,
        operator_id: &str,
        operator_name: &str,
        now: DateTime<Utc>,
    ) -> Result<InternalTask, HandoffError> {
        let row = sqlx::query_as::<_, InternalTaskRow>(
            "UPDATE tasks SET operator_id = $2, operator_name = $3, status = 'assigned', \
             assigned_at = COALESCE(assigned_at, $4), updated_at = $4 \
             WHERE id = $1 \
             RETURNING id, customer_name, customer_contact, operator_id, operator_name, status, \
             created_at, updated_at, assigned_at, greeting_sent_at, ping_sent_at, \
             inactive_sent_at, last_customer_activity_at, closed_at, close_reason",
        )
        .bind(id)
        .bind(operator_id)
        .bind(operator_name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        row.map(Into::into).ok_or_else(|| not_found("internal task", id))
    }

    async fn set_internal_greeting_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE tasks SET greeting_sent_at = $2, ping_sent_at = NULL, \
             inactive_sent_at = NULL, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("internal task", id));
        }
        Ok(())
    }

    async fn mark_internal_ping_sent(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query("UPDATE tasks SET ping_sent_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("internal task", id));
        }
        Ok(())
    }

    async fn close_internal_due_to_inactivity(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE tasks SET inactive_sent_at = $2, closed_at = $2, status = 'closed', \
             close_reason = 'inactivity', updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("internal task", id));
        }
        Ok(())
    }

    async fn mark_internal_activity(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE tasks SET last_customer_activity_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("internal task", id));
        }
        Ok(())
    }

    async fn find_internal_assigned_by_contact(
        &self,
        contact: &str,
    ) -> Result<Vec<InternalTask>, HandoffError> {
        let rows = sqlx::query_as::<_, InternalTaskRow>(
            "SELECT id, customer_name, customer_contact, operator_id, operator_name, status, \
             created_at, updated_at, assigned_at, greeting_sent_at, ping_sent_at, \
             inactive_sent_at, last_customer_activity_at, closed_at, close_reason \
             FROM tasks WHERE customer_contact = $1 AND status = 'assigned' \
             ORDER BY updated_at DESC",
        )
        .bind(contact)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_flex(&self, task_sid: &str) -> Result<Option<FlexTask>, HandoffError> {
        let row = sqlx::query_as::<_, FlexTaskRow>(
            "SELECT task_sid, conversation_sid, channel_type, customer_name, customer_address, \
             customer_from, worker_sid, worker_name, task_assignment_status, task_attributes, \
             greeting_sent_at, ping_sent_at, inactive_sent_at, last_customer_activity_at, \
             created_at, updated_at FROM flex_tasks WHERE task_sid = $1",
        )
        .bind(task_sid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    async fn find_flex_by_conversation(
        &self,
        conversation_sid: &str,
    ) -> Result<Option<FlexTask>, HandoffError> {
        let row = sqlx::query_as::<_, FlexTaskRow>(
            "SELECT f.task_sid, f.conversation_sid, f.channel_type, f.customer_name, \
             f.customer_address, f.customer_from, f.worker_sid, f.worker_name, \
             f.task_assignment_status, f.task_attributes, f.greeting_sent_at, f.ping_sent_at, \
             f.inactive_sent_at, f.last_customer_activity_at, f.created_at, f.updated_at \
             FROM flex_tasks_by_conversation c \
             JOIN flex_tasks f ON f.task_sid = c.task_sid \
             WHERE c.conversation_sid = $1",
        )
        .bind(conversation_sid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        Ok(row.map(Into::into))
    }

    async fn upsert_flex_base_state(
        &self,
        task_sid: &str,
        observation: FlexTaskObservation,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| HandoffError::persistence(e.to_string()))?;

        sqlx::query(
            "INSERT INTO flex_tasks (task_sid, conversation_sid, channel_type, customer_name, \
             customer_address, customer_from, worker_sid, worker_name, task_assignment_status, \
             task_attributes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11) \
             ON CONFLICT (task_sid) DO UPDATE SET \
             conversation_sid = COALESCE(EXCLUDED.conversation_sid, flex_tasks.conversation_sid), \
             channel_type = COALESCE(EXCLUDED.channel_type, flex_tasks.channel_type), \
             customer_name = COALESCE(EXCLUDED.customer_name, flex_tasks.customer_name), \
             customer_address = COALESCE(EXCLUDED.customer_address, flex_tasks.customer_address), \
             customer_from = COALESCE(EXCLUDED.customer_from, flex_tasks.customer_from), \
             worker_sid = COALESCE(EXCLUDED.worker_sid, flex_tasks.worker_sid), \
             worker_name = COALESCE(EXCLUDED.worker_name, flex_tasks.worker_name), \
             task_assignment_status = COALESCE(EXCLUDED.task_assignment_status, flex_tasks.task_assignment_status), \
             task_attributes = COALESCE(EXCLUDED.task_attributes, flex_tasks.task_attributes), \
             updated_at = EXCLUDED.updated_at",
        )
        .bind(task_sid)
        .bind(&observation.conversation_sid)
        .bind(&observation.channel_type)
        .bind(&observation.customer_name)
        .bind(&observation.customer_address)
        .bind(&observation.customer_from)
        .bind(&observation.worker_sid)
        .bind(&observation.worker_name)
        .bind(&observation.task_assignment_status)
        .bind(&observation.task_attributes)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;

        if let Some(conversation_sid) = &observation.conversation_sid {
            sqlx::query(
                "INSERT INTO flex_tasks_by_conversation (conversation_sid, task_sid) \
                 VALUES ($1, $2) \
                 ON CONFLICT (conversation_sid) DO UPDATE SET task_sid = EXCLUDED.task_sid",
            )
            .bind(conversation_sid)
            .bind(task_sid)
            .execute(&mut *tx)
            .await
            .map_err(|e| HandoffError::persistence(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| HandoffError::persistence(e.to_string()))?;
        Ok(())
    }

    async fn set_flex_greeting_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE flex_tasks SET greeting_sent_at = $2, ping_sent_at = NULL, \
             inactive_sent_at = NULL, updated_at = $2 WHERE task_sid = $1",
        )
        .bind(task_sid)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("flex task", task_sid));
        }
        Ok(())
    }

    async fn mark_flex_ping_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE flex_tasks SET ping_sent_at = $2, updated_at = $2 WHERE task_sid = $1",
        )
        .bind(task_sid)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("flex task", task_sid));
        }
        Ok(())
    }

    async fn mark_flex_inactive_sent(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE flex_tasks SET inactive_sent_at = $2, updated_at = $2 WHERE task_sid = $1",
        )
        .bind(task_sid)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("flex task", task_sid));
        }
        Ok(())
    }

    async fn mark_flex_activity(
        &self,
        task_sid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), HandoffError> {
        let result = sqlx::query(
            "UPDATE flex_tasks SET last_customer_activity_at = $2, updated_at = $2 WHERE task_sid = $1",
        )
        .bind(task_sid)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| HandoffError::persistence(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(not_found("flex task", task_sid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(parse_status("assigned"), InternalTaskStatus::Assigned);
        assert_eq!(parse_status("closed"), InternalTaskStatus::Closed);
        assert_eq!(parse_status("open"), InternalTaskStatus::Open);
        assert_eq!(parse_status("anything-else"), InternalTaskStatus::Open);
    }
}
