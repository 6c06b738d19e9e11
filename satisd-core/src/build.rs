//! Runs the external builder whenever a rebuild is requested.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{error::BuildError, pipeline::Pipeline};

/// Invocation of `<builder> build <config> <output>`.
#[derive(Debug, Clone)]
pub struct Builder {
    program: PathBuf,
    config_path: PathBuf,
    output_path: PathBuf,
    terminate_on_shutdown: bool,
}

impl Builder {
    /// Describes the builder without running it.
    pub fn new(
        program: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            config_path: config_path.into(),
            output_path: output_path.into(),
            terminate_on_shutdown: false,
        }
    }

    /// Kill an in-flight build when shutdown is requested instead of letting
    /// it finish.
    pub fn terminate_on_shutdown(mut self, terminate: bool) -> Self {
        self.terminate_on_shutdown = terminate;
        self
    }

    /// Path of the builder executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("build")
            .arg(&self.config_path)
            .arg(&self.output_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(self.terminate_on_shutdown);
        command
    }

    /// Runs one build to completion. Standard streams are shared with the
    /// daemon so the builder's output shows up in the operator's terminal.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), BuildError> {
        let mut child =
            self.command().spawn().map_err(|source| BuildError::Spawn {
                path: self.program.clone(),
                source,
            })?;

        let status = if self.terminate_on_shutdown {
            tokio::select! {
                status = child.wait() => status.map_err(BuildError::Wait)?,
                _ = cancel.cancelled() => {
                    warn!(pid = ?child.id(), "terminating builder for shutdown");
                    if let Err(err) = child.start_kill() {
                        warn!(error = %err, "failed to signal builder");
                    }
                    child.wait().await.map_err(BuildError::Wait)?;
                    return Err(BuildError::Terminated);
                }
            }
        } else {
            child.wait().await.map_err(BuildError::Wait)?
        };

        if status.success() {
            Ok(())
        } else {
            Err(BuildError::Failed { status })
        }
    }
}

/// What the build worker does after a failed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildFailurePolicy {
    /// Keep the rebuild request armed and retry with exponential backoff.
    #[default]
    Retry,
    /// Stop the worker with the error, which shuts the daemon down.
    Exit,
}

/// Timing and failure handling for the build worker.
#[derive(Debug, Clone)]
pub struct BuildWorkerConfig {
    /// Longest idle wait before the trigger is re-checked.
    pub poll_interval: Duration,
    /// First retry delay after a failed build.
    pub backoff_initial: Duration,
    /// Upper bound for the retry delay.
    pub backoff_max: Duration,
    /// Reaction to a failed build.
    pub failure_policy: BuildFailurePolicy,
}

impl Default for BuildWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(300),
            failure_policy: BuildFailurePolicy::Retry,
        }
    }
}

/// Doubling delay with an upper bound.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Starts at `initial`, never exceeds `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; the following one is doubled.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.max)
            .min(self.max);
        delay
    }

    /// Back to the initial delay after a success.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Result of one [`BuildWorker::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// No rebuild requested.
    Idle,
    /// A rebuild is requested but registrations are still waiting to be
    /// merged; building now would use a stale document.
    Deferred,
    /// The builder succeeded.
    Built {
        /// Document generation the artifacts reflect.
        generation: u64,
        /// Wall-clock build time.
        elapsed: Duration,
    },
}

/// Invokes the builder when `needsRebuild` is armed. There is exactly one
/// of these per daemon, so builds never overlap.
#[derive(Debug)]
pub struct BuildWorker {
    pipeline: Arc<Pipeline>,
    builder: Builder,
    config: BuildWorkerConfig,
}

impl BuildWorker {
    /// Creates a worker over the shared pipeline.
    pub fn new(
        pipeline: Arc<Pipeline>,
        builder: Builder,
        config: BuildWorkerConfig,
    ) -> Self {
        Self {
            pipeline,
            builder,
            config,
        }
    }

    /// Runs until `cancel` fires. Returns an error only when the failure
    /// policy is [`BuildFailurePolicy::Exit`] and a build fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), BuildError> {
        info!(builder = %self.builder.program().display(), "build worker started");
        let triggers = self.pipeline.triggers();
        let mut backoff =
            Backoff::new(self.config.backoff_initial, self.config.backoff_max);

        while !cancel.is_cancelled() {
            match self.run_cycle(&cancel).await {
                Ok(BuildOutcome::Idle) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = triggers.rebuild.wait_armed(self.config.poll_interval) => {}
                    }
                }
                Ok(BuildOutcome::Deferred) => {
                    debug!("rebuild deferred until pending updates are merged");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = triggers.config_write.wait_cleared(self.config.poll_interval) => {}
                    }
                }
                Ok(BuildOutcome::Built {
                    generation,
                    elapsed,
                }) => {
                    info!(generation, ?elapsed, "repository generated");
                    backoff.reset();
                }
                Err(BuildError::Terminated) => break,
                Err(err) => match self.config.failure_policy {
                    BuildFailurePolicy::Exit => {
                        error!(error = %err, "failed to execute builder");
                        return Err(err);
                    }
                    BuildFailurePolicy::Retry => {
                        let delay = backoff.next_delay();
                        warn!(error = %err, retry_in = ?delay, "build failed");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                },
            }
        }

        info!("build worker stopped");
        Ok(())
    }

    /// One build cycle.
    ///
    /// Waits for any merge in progress, defers while registrations are still
    /// pending, then takes the rebuild request and runs the builder with the
    /// cycle gate held so no merge can replace the file mid-build. A failed
    /// build re-arms the request.
    pub async fn run_cycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        let triggers = self.pipeline.triggers();
        let document = self.pipeline.document();

        let gate = self.pipeline.cycle_gate().await;
        if !triggers.rebuild.is_armed() {
            return Ok(BuildOutcome::Idle);
        }
        if triggers.config_write.is_armed() {
            return Ok(BuildOutcome::Deferred);
        }
        triggers.rebuild.take();
        let generation = document.generation();

        info!(generation, "building repository");
        let started = Instant::now();
        let result = self.builder.run(cancel).await;
        drop(gate);

        match result {
            Ok(()) => {
                self.pipeline.mark_built(generation);
                Ok(BuildOutcome::Built {
                    generation,
                    elapsed: started.elapsed(),
                })
            }
            Err(err) => {
                triggers.rebuild.arm();
                Err(err)
            }
        }
    }
}
