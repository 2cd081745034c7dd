//! # Reconciliation Loop (§4.2)
//!
//! A single dispatcher ticks every `poll_interval`. Ticks are
//! non-overlapping: a tick that finds the previous one still running drops
//! itself rather than queueing (§5 "Non-overlap"). `auto` mode prefers the
//! flex pipeline when it reports work, falling back to internal otherwise —
//! the truth table from the source's `autoProcessAssignedTasks` (§9 open
//! question, resolved there).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use handoff_shared::config::SourceMode;
use tracing::{debug, warn};

use crate::flex_pipeline::FlexPipeline;
use crate::internal_pipeline::InternalPipeline;
use crate::metrics::Metrics;

/// Drives one tick of both pipelines per §4.2's three-step algorithm.
/// Holds no scheduling state of its own beyond the overlap guard — the
/// dispatcher that owns this is responsible for the `tokio::time::interval`.
#[derive(Clone)]
pub struct Dispatcher {
    internal: InternalPipeline,
    flex: FlexPipeline,
    source_mode: SourceMode,
    batch_size: u32,
    metrics: Metrics,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        internal: InternalPipeline,
        flex: FlexPipeline,
        source_mode: SourceMode,
        batch_size: u32,
        metrics: Metrics,
    ) -> Self {
        Self {
            internal,
            flex,
            source_mode,
            batch_size,
            metrics,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One reconciliation tick. Returns immediately, recording a skip, if a
    /// previous tick is still in flight. Never returns an error: each
    /// pipeline already treats its own provider/persistence failures as
    /// "log and retry next tick" (§7); this just orders the two pipelines.
    pub async fn tick(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("tick skipped: previous tick still running");
            self.metrics.record_tick_skipped_overlap();
            return;
        }

        self.metrics.record_tick_run();
        self.run_tick_body().await;
        self.running.store(false, Ordering::Release);
    }

    async fn run_tick_body(&self) {
        let mut flex_did_work = false;

        if self.source_mode != SourceMode::Internal {
            match self.flex.run_tick().await {
                Ok(processed) => flex_did_work = processed > 0,
                Err(err) => warn!(error = %err, "flex pipeline tick failed"),
            }
            if self.source_mode == SourceMode::Flex {
                return;
            }
        }

        if self.source_mode != SourceMode::Flex && !(self.source_mode == SourceMode::Auto && flex_did_work) {
            if let Err(err) = self.internal.run_tick(self.batch_size).await {
                warn!(error = %err, "internal pipeline tick failed");
            }
        }
    }
}
