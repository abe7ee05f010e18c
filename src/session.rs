/// Preview session lifecycle: launch the pipeline, probe readiness, poll
/// the output file's mtime for frames, and tear everything down.
use crate::config::PreviewConfig;
use crate::launcher::{self, ChildHandle, LaunchError};
use crate::pipeline::PipelineSpec;
use crate::probe::{self, Readiness};
use crate::shutdown;
use crate::status::StatusEmitter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Init,
    Starting,
    Ready,
    Monitoring,
    Stopping,
    Stopped,
}

/// What a single monitor tick observed. Split out from the async loop so
/// the frame-counting rules are testable without timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// mtime changed; the new cumulative frame count.
    Frame(u64),
    /// No change (includes the artifact being momentarily absent).
    NoChange,
    /// Stale threshold crossed; one warning was emitted, counter reset.
    Stale,
}

/// Fatal session errors. Everything else is handled inside the session.
#[derive(Debug)]
pub enum PreviewError {
    Launch(LaunchError),
    /// Warm-up elapsed without the output artifact appearing.
    NotReady { path: PathBuf },
}

impl std::fmt::Display for PreviewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreviewError::Launch(e) => write!(f, "{e}"),
            PreviewError::NotReady { path } => {
                write!(f, "pipeline produced no output at {}", path.display())
            }
        }
    }
}

impl std::error::Error for PreviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PreviewError::Launch(e) => Some(e),
            PreviewError::NotReady { .. } => None,
        }
    }
}

/// Root entity for one supervised preview run.
///
/// Owns at most one child process group at a time. The stop flag is
/// shared with the signal listeners; everything else is exclusively
/// owned. `stop()` is idempotent and never errors, so duplicate signal
/// delivery and the NotReady cleanup path both funnel through it safely.
pub struct PreviewSession<O: Write, E: Write> {
    output_path: PathBuf,
    warmup: Duration,
    tick: Duration,
    grace: Duration,
    report_every: u64,
    stale_after: u32,
    emitter: StatusEmitter<O, E>,
    state: PreviewState,
    child: Option<ChildHandle>,
    frame_count: u64,
    last_mtime: Option<SystemTime>,
    stale_ticks: u32,
    stop_flag: Arc<AtomicBool>,
}

impl<O: Write, E: Write> PreviewSession<O, E> {
    pub fn new(output_path: PathBuf, config: &PreviewConfig, emitter: StatusEmitter<O, E>) -> Self {
        Self {
            output_path,
            warmup: Duration::from_millis(config.timing.warmup_ms),
            tick: Duration::from_millis(config.timing.tick_ms),
            grace: Duration::from_millis(config.timing.grace_ms),
            report_every: config.monitor.report_every.max(1),
            stale_after: config.monitor.stale_after.max(1),
            emitter,
            state: PreviewState::Init,
            child: None,
            frame_count: 0,
            last_mtime: None,
            stale_ticks: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag shared with the signal listeners; raising it stops the
    /// monitor loop at its next tick boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    /// Current lifecycle state (for tests/diagnostics).
    #[allow(dead_code)]
    pub fn state(&self) -> PreviewState {
        self.state
    }

    /// Cumulative frames observed so far.
    #[allow(dead_code)]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run the full lifecycle: launch → probe → monitor → stop.
    ///
    /// Returns the final frame count. On `Err` the child has already been
    /// torn down and the terminal status line emitted; the caller only
    /// maps the error to an exit code.
    pub async fn run(&mut self, spec: &PipelineSpec) -> Result<u64, PreviewError> {
        self.state = PreviewState::Starting;

        let handle = match launcher::launch(&self.output_path, spec) {
            Ok(handle) => handle,
            Err(e) => {
                self.emitter.error(&e.to_string());
                self.stop().await;
                return Err(PreviewError::Launch(e));
            }
        };
        self.child = Some(handle);
        self.emitter.starting();

        match probe::probe_ready(&self.output_path, self.warmup).await {
            Readiness::Ready => {
                self.state = PreviewState::Ready;
                self.emitter.ready();
            }
            Readiness::NotReady => {
                self.emitter.error("Pipeline failed to start");
                self.stop().await;
                return Err(PreviewError::NotReady {
                    path: self.output_path.clone(),
                });
            }
        }

        self.monitor().await;
        self.stop().await;
        Ok(self.frame_count)
    }

    /// Poll the output artifact at the fixed tick period until the stop
    /// flag is raised.
    async fn monitor(&mut self) {
        self.state = PreviewState::Monitoring;
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !self.stop_flag.load(Ordering::SeqCst) {
            interval.tick().await;
            // Any read failure mid-tick is a race with the writer and
            // counts as no change, never as an error.
            let mtime = std::fs::metadata(&self.output_path)
                .and_then(|m| m.modified())
                .ok();
            self.observe_tick(mtime);
        }
        tracing::debug!(frames = self.frame_count, "monitor loop stopped");
    }

    /// Apply one tick's observation to the session counters.
    ///
    /// A changed mtime is one new frame; `FRAME:<n>` is emitted at the
    /// reporting granularity. `stale_after` unchanged ticks produce one
    /// liveness warning and reset the counter — informational, the loop
    /// keeps going.
    fn observe_tick(&mut self, mtime: Option<SystemTime>) -> TickOutcome {
        let Some(mtime) = mtime else {
            // Artifact momentarily missing: no frame, no error.
            return TickOutcome::NoChange;
        };

        if self.last_mtime != Some(mtime) {
            self.frame_count += 1;
            self.last_mtime = Some(mtime);
            self.stale_ticks = 0;
            if self.frame_count % self.report_every == 0 {
                self.emitter.frame(self.frame_count);
            }
            return TickOutcome::Frame(self.frame_count);
        }

        self.stale_ticks += 1;
        if self.stale_ticks > self.stale_after {
            self.emitter.warning("No new frames");
            self.stale_ticks = 0;
            return TickOutcome::Stale;
        }
        TickOutcome::NoChange
    }

    /// Shutdown supervisor: idempotent, never errors.
    ///
    /// Signals the whole process group (graceful, then forceful, then
    /// direct-by-pid), deletes the output artifact, and emits exactly one
    /// terminal status line — `PREVIEW_INTERRUPTED` when the stop flag
    /// was raised by a signal, otherwise the frame-count summary.
    pub async fn stop(&mut self) {
        if self.state == PreviewState::Stopped {
            return;
        }
        self.state = PreviewState::Stopping;

        if let Some(mut handle) = self.child.take() {
            shutdown::terminate_group(&mut handle, self.grace).await;
        }
        shutdown::remove_artifact(&self.output_path);

        self.state = PreviewState::Stopped;
        if self.stop_flag.load(Ordering::SeqCst) {
            self.emitter.interrupted();
        } else {
            self.emitter.stopped(self.frame_count);
        }
    }
}
