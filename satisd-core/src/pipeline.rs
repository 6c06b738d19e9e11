//! Shared state handed to the HTTP surface and both workers.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::debug;

use crate::{
    document::DocumentStore,
    package::PackageUpdate,
    registry::UpdateRegistry,
    trigger::{BuildTriggers, TriggerSnapshot},
};

/// All state shared between the HTTP surface and the two workers.
///
/// Constructed once at startup and handed out behind an `Arc`.
#[derive(Debug)]
pub struct Pipeline {
    registry: UpdateRegistry,
    document: DocumentStore,
    triggers: BuildTriggers,
    /// Serializes merge cycles against builds. A merge holds it for its whole
    /// cycle and a build for the whole builder run, so the document is never
    /// replaced while the builder reads it. Neither holds the document lock
    /// while waiting here, which keeps `/config.json` readers unblocked.
    cycle_gate: AsyncMutex<()>,
    last_built: Mutex<Option<u64>>,
}

impl Pipeline {
    /// Wraps an opened document store with an empty registry and disarmed
    /// triggers.
    pub fn new(document: DocumentStore) -> Self {
        Self {
            registry: UpdateRegistry::new(),
            document,
            triggers: BuildTriggers::new(),
            cycle_gate: AsyncMutex::new(()),
            last_built: Mutex::new(None),
        }
    }

    /// Pending updates.
    pub fn registry(&self) -> &UpdateRegistry {
        &self.registry
    }

    /// The configuration document.
    pub fn document(&self) -> &DocumentStore {
        &self.document
    }

    /// Trigger flags.
    pub fn triggers(&self) -> &BuildTriggers {
        &self.triggers
    }

    /// Records a published package and schedules a merge.
    pub fn register(&self, update: PackageUpdate) {
        if let Some(previous) = self.registry.register(update) {
            debug!(package = %previous.name, "superseded pending update");
        }
        self.triggers.config_write.arm();
    }

    /// Schedules a build without touching the document.
    pub fn request_rebuild(&self) {
        self.triggers.rebuild.arm();
    }

    /// Generation of the document used by the last successful build.
    pub fn last_built_generation(&self) -> Option<u64> {
        *self.last_built.lock()
    }

    /// Point-in-time summary for status reporting.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            pending_updates: self.registry.len(),
            triggers: self.triggers.snapshot(),
            document_generation: self.document.generation(),
            last_built_generation: self.last_built_generation(),
        }
    }

    pub(crate) async fn cycle_gate(&self) -> MutexGuard<'_, ()> {
        self.cycle_gate.lock().await
    }

    pub(crate) fn mark_built(&self, generation: u64) {
        *self.last_built.lock() = Some(generation);
    }
}

/// Serializable pipeline summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    /// Registrations not merged yet.
    pub pending_updates: usize,
    /// Both trigger flags.
    #[serde(flatten)]
    pub triggers: TriggerSnapshot,
    /// Rewrites of the document since startup.
    pub document_generation: u64,
    /// Document generation the current artifacts were built from.
    pub last_built_generation: Option<u64>,
}
