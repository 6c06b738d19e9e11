//! Two-stage trigger state driving the pipeline.
//!
//! Each flag is a `watch` channel rather than a bare boolean so workers can
//! block until the state they care about is reached instead of polling it.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

/// A boolean signal that can be waited on.
#[derive(Debug)]
pub struct TriggerFlag {
    state: watch::Sender<bool>,
}

impl Default for TriggerFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerFlag {
    /// A disarmed flag.
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(false),
        }
    }

    /// Arms the flag and wakes any waiter. Returns the previous state.
    pub fn arm(&self) -> bool {
        self.state.send_replace(true)
    }

    /// Disarms the flag, returning whether it was armed. A worker that gets
    /// `true` owns the request and must re-arm on failure.
    pub fn take(&self) -> bool {
        self.state.send_replace(false)
    }

    /// Current state.
    pub fn is_armed(&self) -> bool {
        *self.state.borrow()
    }

    /// Waits up to `within` for the flag to become armed.
    pub async fn wait_armed(&self, within: Duration) -> bool {
        self.wait_for(true, within).await
    }

    /// Waits up to `within` for the flag to become disarmed.
    pub async fn wait_cleared(&self, within: Duration) -> bool {
        self.wait_for(false, within).await
    }

    async fn wait_for(&self, wanted: bool, within: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let reached = async move {
            rx.wait_for(|armed| *armed == wanted).await.is_ok()
        };
        tokio::time::timeout(within, reached).await.unwrap_or(false)
    }
}

/// `needsConfigWrite` and `needsRebuild`.
#[derive(Debug, Default)]
pub struct BuildTriggers {
    /// Registrations are waiting to be merged into the document.
    pub config_write: TriggerFlag,
    /// Artifacts should be regenerated from the document.
    pub rebuild: TriggerFlag,
}

impl BuildTriggers {
    /// Both flags disarmed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of both flags.
    pub fn snapshot(&self) -> TriggerSnapshot {
        TriggerSnapshot {
            needs_config_write: self.config_write.is_armed(),
            needs_rebuild: self.rebuild.is_armed(),
        }
    }
}

/// Serializable view of [`BuildTriggers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSnapshot {
    /// Registrations are waiting to be merged.
    pub needs_config_write: bool,
    /// A build has been requested.
    pub needs_rebuild: bool,
}
