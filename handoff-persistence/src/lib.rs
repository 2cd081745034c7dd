//! # handoff-persistence
//!
//! The `PersistencePort` trait (§6.2) and two implementations: a Postgres
//! backing store for production, and an in-memory double for orchestrator
//! tests. See `DESIGN.md` for why Postgres stands in for the wide-column
//! store the spec describes.

pub mod memory;
pub mod models;
pub mod port;
pub mod postgres;

pub use memory::InMemoryPersistence;
pub use models::{FlexTask, FlexTaskObservation, InternalTask, InternalTaskStatus};
pub use port::PersistencePort;
pub use postgres::PostgresPersistence;
