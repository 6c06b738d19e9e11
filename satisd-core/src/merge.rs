//! Folds pending registrations into the configuration document.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::DocumentError, pipeline::Pipeline};

/// Timing knobs for the merge worker.
#[derive(Debug, Clone)]
pub struct MergeWorkerConfig {
    /// Longest idle wait before the trigger is re-checked.
    pub poll_interval: Duration,
    /// Delay after a failed read or write before trying again.
    pub retry_delay: Duration,
}

impl Default for MergeWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Result of one [`MergeWorker::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// `needsConfigWrite` was not armed.
    Idle,
    /// Armed, but another cycle already merged everything.
    NothingPending,
    /// The document was rewritten.
    Merged {
        /// Number of package updates folded in.
        updates: usize,
        /// Document generation after the write.
        generation: u64,
    },
}

/// Drains the update registry into the document whenever a merge is
/// requested, then asks for a rebuild.
#[derive(Debug)]
pub struct MergeWorker {
    pipeline: Arc<Pipeline>,
    config: MergeWorkerConfig,
}

impl MergeWorker {
    /// Creates a worker over the shared pipeline.
    pub fn new(pipeline: Arc<Pipeline>, config: MergeWorkerConfig) -> Self {
        Self { pipeline, config }
    }

    /// Runs until `cancel` fires. Failures are logged and retried after the
    /// configured delay with the pending updates and the trigger intact.
    pub async fn run(self, cancel: CancellationToken) {
        info!("config merge worker started");
        let triggers = self.pipeline.triggers();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                armed = triggers.config_write.wait_armed(self.config.poll_interval) => {
                    if !armed {
                        continue;
                    }
                }
            }

            match self.run_cycle().await {
                Ok(MergeOutcome::Merged {
                    updates,
                    generation,
                }) => {
                    info!(updates, generation, "generated config file");
                }
                Ok(outcome) => debug!(?outcome, "merge cycle skipped"),
                Err(err) => {
                    warn!(
                        error = %err,
                        retry_in = ?self.config.retry_delay,
                        "config merge failed"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        }

        info!("config merge worker stopped");
    }

    /// One merge cycle.
    ///
    /// Takes the `needsConfigWrite` request, reads the document, drains the
    /// registry, applies every update and persists the result. On success
    /// `needsRebuild` is armed. On failure the request is re-armed and any
    /// drained updates are put back.
    pub async fn run_cycle(&self) -> Result<MergeOutcome, DocumentError> {
        let triggers = self.pipeline.triggers();
        let _gate = self.pipeline.cycle_gate().await;

        if !triggers.config_write.take() {
            return Ok(MergeOutcome::Idle);
        }

        let mut document = match self.pipeline.document().load().await {
            Ok(document) => document,
            Err(err) => {
                triggers.config_write.arm();
                return Err(err);
            }
        };

        let updates = self.pipeline.registry().drain_all();
        if updates.is_empty() {
            return Ok(MergeOutcome::NothingPending);
        }

        for update in &updates {
            document.apply(update);
        }

        match self.pipeline.document().persist(&document).await {
            Ok(generation) => {
                triggers.rebuild.arm();
                Ok(MergeOutcome::Merged {
                    updates: updates.len(),
                    generation,
                })
            }
            Err(err) => {
                let restored = self.pipeline.registry().restore(updates);
                debug!(restored, "pending updates restored after failed write");
                triggers.config_write.arm();
                Err(err)
            }
        }
    }
}
