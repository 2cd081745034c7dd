//! # Orchestrator
//!
//! Wires the persistence and provider ports together: the inactivity
//! scheduler (§4.1), the internal and flex pipelines (§4.3, §4.4), worker
//! identity resolution (§4.5), the customer-activity sink (§4.6), the
//! reconciliation loop (§4.2), and process lifecycle (§3.4, §5).

pub mod activity;
pub mod flex_pipeline;
pub mod identity;
pub mod internal_pipeline;
pub mod lifecycle;
pub mod metrics;
pub mod reconcile;
pub mod scheduler;

pub use activity::ActivitySink;
pub use flex_pipeline::{FlexPipeline, WorkspaceResolution};
pub use identity::{resolve_worker_identity, IdentityHints};
pub use internal_pipeline::InternalPipeline;
pub use lifecycle::Orchestrator;
pub use metrics::{Metrics, MetricsSnapshot};
pub use reconcile::Dispatcher;
pub use scheduler::InactivityScheduler;
