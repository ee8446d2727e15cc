use std::time::Duration;

use async_trait::async_trait;
use mockrobot_common::{Process, ProcessId, ProcessKind, ProcessStatus, Result};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::CancelSignal;
use crate::DriverSettings;

/// One status query against the device.
///
/// The tracker is handed a probe for the duration of a single
/// [`ProcessTracker::track`] call and never keeps it.
#[async_trait]
pub trait StatusProbe: Send {
    /// Sends `status%<id>` and decodes the reply.
    async fn query(&mut self, process_id: ProcessId) -> Result<ProcessStatus>;
}

/// How a tracked process ended, from the driver's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    /// The device reported a terminal status.
    Finished(ProcessStatus),
    /// The ceiling elapsed first. The process may still be running.
    TimedOut {
        /// The ceiling that elapsed.
        ceiling: Duration,
        /// Status queries sent before giving up.
        polls: u32,
    },
    /// The session was aborted while polling.
    Cancelled,
}

/// Polls a process until it reaches a terminal status.
#[derive(Clone, Debug)]
pub struct ProcessTracker {
    poll_interval: Duration,
    home_timeout: Duration,
    motion_timeout: Duration,
}

impl ProcessTracker {
    /// A tracker with explicit timings.
    pub fn new(poll_interval: Duration, home_timeout: Duration, motion_timeout: Duration) -> Self {
        Self {
            poll_interval,
            home_timeout,
            motion_timeout,
        }
    }

    /// A tracker using the timings from `settings`.
    pub fn from_settings(settings: &DriverSettings) -> Self {
        Self::new(
            settings.poll_interval(),
            settings.home_timeout(),
            settings.motion_timeout(),
        )
    }

    /// Delay between two status queries.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long a process of `kind` may stay in progress.
    pub fn ceiling(&self, kind: ProcessKind) -> Duration {
        match kind {
            ProcessKind::Home => self.home_timeout,
            ProcessKind::Pick | ProcessKind::Place => self.motion_timeout,
        }
    }

    /// Polls `process` through `probe` until it is terminal, its ceiling
    /// elapses, or `cancel` fires.
    ///
    /// Each iteration waits one interval and then sends exactly one query; the
    /// last wait is shortened so a final query lands on the deadline. Both
    /// waits are abandoned as soon as `cancel` fires. Errors from the probe end
    /// tracking immediately.
    pub async fn track<P>(
        &self,
        process: &mut Process,
        probe: &mut P,
        cancel: &CancelSignal,
    ) -> Result<TrackOutcome>
    where
        P: StatusProbe + ?Sized,
    {
        let ceiling = self.ceiling(process.kind());
        let deadline = Instant::now() + ceiling;
        let mut polls = 0u32;

        debug!(
            "Tracking {} process {} (ceiling {:?})",
            process.kind(),
            process.id(),
            ceiling
        );

        loop {
            let wait = self
                .poll_interval
                .min(deadline.saturating_duration_since(Instant::now()));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(process)),
                _ = tokio::time::sleep(wait) => {}
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.cancelled(process)),
                status = probe.query(process.id()) => status?,
            };
            polls += 1;
            process.record(status)?;

            if status.is_terminal() {
                info!(
                    "{} process {} reached `{}` after {} poll(s)",
                    process.kind(),
                    process.id(),
                    status,
                    polls
                );
                return Ok(TrackOutcome::Finished(status));
            }

            if Instant::now() >= deadline {
                warn!(
                    "{} process {} still in progress after {:?}; giving up",
                    process.kind(),
                    process.id(),
                    ceiling
                );
                return Ok(TrackOutcome::TimedOut { ceiling, polls });
            }
        }
    }

    fn cancelled(&self, process: &Process) -> TrackOutcome {
        info!(
            "Stopped tracking {} process {}: session aborted",
            process.kind(),
            process.id()
        );
        TrackOutcome::Cancelled
    }
}
