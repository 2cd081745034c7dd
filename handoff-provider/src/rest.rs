//! # Live REST Client
//!
//! Talks to the messaging provider's HTTP API with HTTP Basic Auth (account
//! sid / auth token), the conventional auth scheme for this class of
//! provider. Wraps every call with an optional circuit breaker, following the
//! parent stack's `MessageClient::with_breaker` pattern — when the breaker is
//! open, calls fail fast with `ProviderError::NotConfigured`-shaped behavior
//! instead of waiting out the SDK's own timeout.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use handoff_shared::resilience::CircuitBreaker;
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::port::MessagingProviderPort;
use crate::types::{Participant, ProviderTask, Reservation, TaskStatusFilter, WorkerInfo};

/// Account-level credentials for the messaging provider.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// Live messaging-provider client.
#[derive(Debug, Clone)]
pub struct RestMessagingProvider {
    http: reqwest::Client,
    base_url: String,
    credentials: ProviderCredentials,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl RestMessagingProvider {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.twilio.com/2010-04-01".to_string(),
            credentials,
            circuit_breaker: None,
        }
    }

    /// Wire in a circuit breaker (TAS-174-style opt-in protection).
    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Override the base URL, for pointing at a sandbox/mock endpoint in
    /// integration tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn with_breaker<F, T, Fut>(&self, op: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        if let Some(cb) = &self.circuit_breaker {
            if !cb.should_allow() {
                return Err(ProviderError::Api {
                    status: 503,
                    message: "circuit breaker open".to_string(),
                });
            }
            let start = Instant::now();
            let result = op().await;
            match &result {
                Ok(_) => cb.record_success_manual(start.elapsed()),
                Err(_) => cb.record_failure_manual(start.elapsed()),
            }
            result
        } else {
            op().await
        }
    }

    fn basic_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(
            &self.credentials.account_sid,
            Some(&self.credentials.auth_token),
        )
    }
}

#[derive(Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Deserialize)]
struct ParticipantsResponse {
    participants: Vec<RawParticipant>,
}

#[derive(Deserialize)]
struct RawParticipant {
    identity: Option<String>,
    #[serde(rename = "messaging_binding")]
    messaging_binding: Option<RawMessagingBinding>,
    attributes: Option<String>,
}

#[derive(Deserialize)]
struct RawMessagingBinding {
    address: Option<String>,
}

#[derive(Deserialize)]
struct WorkerResponse {
    sid: String,
    friendly_name: Option<String>,
    attributes: Option<String>,
}

#[derive(Deserialize)]
struct TasksResponse {
    tasks: Vec<RawTask>,
}

#[derive(Deserialize)]
struct RawTask {
    sid: String,
    attributes: String,
    assignment_status: String,
}

#[derive(Deserialize)]
struct ReservationsResponse {
    reservations: Vec<RawReservation>,
}

#[derive(Deserialize)]
struct RawReservation {
    sid: String,
    worker_sid: String,
    worker_name: Option<String>,
}

#[async_trait]
impl MessagingProviderPort for RestMessagingProvider {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String, ProviderError> {
        self.with_breaker(|| async {
            let url = format!(
                "{}/Accounts/{}/Messages.json",
                self.base_url, self.credentials.account_sid
            );
            let form = [
                ("To", to),
                ("From", self.credentials.from_number.as_str()),
                ("Body", body),
            ];
            let request = self.basic_auth(self.http.post(&url).form(&form));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            let parsed: MessageResponse = response.json().await?;
            Ok(parsed.sid)
        })
        .await
    }

    async fn post_conversation_message(
        &self,
        conversation_sid: &str,
        body: &str,
        author: &str,
    ) -> Result<String, ProviderError> {
        self.with_breaker(|| async {
            let url = format!(
                "{}/Conversations/{}/Messages.json",
                self.base_url, conversation_sid
            );
            let form = [("Body", body), ("Author", author)];
            let request = self.basic_auth(self.http.post(&url).form(&form));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            let parsed: MessageResponse = response.json().await?;
            Ok(parsed.sid)
        })
        .await
    }

    async fn list_conversation_participants(
        &self,
        conversation_sid: &str,
        limit: usize,
    ) -> Result<Vec<Participant>, ProviderError> {
        self.with_breaker(|| async {
            let url = format!(
                "{}/Conversations/{}/Participants.json?PageSize={}",
                self.base_url, conversation_sid, limit
            );
            let request = self.basic_auth(self.http.get(&url));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            let parsed: ParticipantsResponse = response.json().await?;
            Ok(parsed
                .participants
                .into_iter()
                .take(limit)
                .map(|p| Participant {
                    identity: p.identity,
                    messaging_binding_address: p.messaging_binding.and_then(|b| b.address),
                    attributes: p.attributes,
                })
                .collect())
        })
        .await
    }

    async fn fetch_worker(
        &self,
        workspace_sid: &str,
        worker_sid: &str,
    ) -> Result<WorkerInfo, ProviderError> {
        self.with_breaker(|| async {
            let url = format!(
                "{}/Workspaces/{}/Workers/{}.json",
                self.base_url, workspace_sid, worker_sid
            );
            let request = self.basic_auth(self.http.get(&url));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            let parsed: WorkerResponse = response.json().await?;
            let attributes = parsed
                .attributes
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or_else(|| json!({}));
            Ok(WorkerInfo {
                worker_sid: parsed.sid,
                friendly_name: parsed.friendly_name,
                attributes,
            })
        })
        .await
    }

    async fn list_assigned_tasks(
        &self,
        workspace_sid: &str,
        statuses: &[TaskStatusFilter],
        limit: usize,
    ) -> Result<Vec<ProviderTask>, ProviderError> {
        self.with_breaker(|| async {
            let status_csv = statuses
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let url = format!(
                "{}/Workspaces/{}/Tasks.json?AssignmentStatus={}&PageSize={}",
                self.base_url, workspace_sid, status_csv, limit
            );
            let request = self.basic_auth(self.http.get(&url));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            let parsed: TasksResponse = response.json().await?;
            Ok(parsed
                .tasks
                .into_iter()
                .take(limit)
                .map(|t| ProviderTask {
                    task_sid: t.sid,
                    attributes: t.attributes,
                    assignment_status: t.assignment_status,
                })
                .collect())
        })
        .await
    }

    async fn list_accepted_reservations(
        &self,
        workspace_sid: &str,
        task_sid: &str,
        limit: usize,
    ) -> Result<Vec<Reservation>, ProviderError> {
        self.with_breaker(|| async {
            let url = format!(
                "{}/Workspaces/{}/Tasks/{}/Reservations.json?ReservationStatus=accepted&PageSize={}",
                self.base_url, workspace_sid, task_sid, limit
            );
            let request = self.basic_auth(self.http.get(&url));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            let parsed: ReservationsResponse = response.json().await?;
            Ok(parsed
                .reservations
                .into_iter()
                .take(limit)
                .map(|r| Reservation {
                    reservation_sid: r.sid,
                    worker_sid: r.worker_sid,
                    worker_name: r.worker_name,
                })
                .collect())
        })
        .await
    }

    async fn close_conversation(&self, conversation_sid: &str) -> Result<(), ProviderError> {
        self.with_breaker(|| async {
            let url = format!("{}/Conversations/{}.json", self.base_url, conversation_sid);
            let form = [("State", "closed")];
            let request = self.basic_auth(self.http.post(&url).form(&form));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn complete_task(
        &self,
        workspace_sid: &str,
        task_sid: &str,
        reason: &str,
    ) -> Result<(), ProviderError> {
        self.with_breaker(|| async {
            let url = format!(
                "{}/Workspaces/{}/Tasks/{}.json",
                self.base_url, workspace_sid, task_sid
            );
            let form = [
                ("AssignmentStatus", "completed"),
                ("Reason", reason),
            ];
            let request = self.basic_auth(self.http.post(&url).form(&form));
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(ProviderError::api(
                    response.status().as_u16(),
                    response.text().await.unwrap_or_default(),
                ));
            }
            Ok(())
        })
        .await
    }
}
