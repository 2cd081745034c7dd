//! # handoff-provider
//!
//! A capability-typed façade over the messaging provider's SMS, Conversations,
//! and TaskRouter surfaces (§2.3, §9 "Capability-typed provider port"). Rather
//! than binding orchestrator logic to the vendor SDK directly, this crate
//! defines a narrow trait with exactly the operations the orchestrator needs,
//! a live REST-backed implementation, and a fake used to drive the test
//! matrix in spec §8.

pub mod error;
pub mod fake;
pub mod port;
pub mod rest;
pub mod types;

pub use error::ProviderError;
pub use fake::FakeMessagingProvider;
pub use port::MessagingProviderPort;
pub use rest::{ProviderCredentials, RestMessagingProvider};
pub use types::{
    Participant, ProviderTask, Reservation, TaskStatusFilter, WorkerInfo,
};
