//! End-to-end supervision of a single tiling job
//!
//! A [`JobSupervisor`] owns one worker process from argument construction to
//! reaped exit: spawn with stdout piped, register in the [`JobRegistry`],
//! drain stdout through the progress scanner, wait for exit bounded by the
//! job timeout, classify the outcome, and unconditionally deregister before
//! reporting done. Only pre-spawn failures surface as errors; after spawn,
//! every abnormal condition folds into the returned [`ExitOutcome`] so the
//! cleanup and notification contract always holds.
//!
//! Termination requests arrive through the job's [`CancellationToken`]
//! (a signal bridge cancels them process-wide, a caller can cancel one
//! job's token directly). The request itself never interrupts the reap:
//! the child is always waited on here.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SpawnerError;
use crate::job::TilingJob;
use crate::progress::ProgressCurve;
use crate::registry::{JobEntry, JobRegistry};
use crate::scanner;

pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync>;
pub type DoneCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Terminal state of a supervised job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Worker exited on its own; carries the raw exit code, zero or not.
    Completed { code: i32 },
    /// Worker outlived the exit-wait bound and was forcibly terminated.
    TimedOut,
    /// Worker died abnormally (killed by a signal we did not send, or the
    /// wait itself failed). Logged, never escalated.
    Failed,
    /// Worker was terminated on an external stop request.
    Killed,
}

impl ExitOutcome {
    /// Conventional shell exit code for this outcome: the worker's own code
    /// when it completed, 124 for timeouts, 143 for requested kills, 1 for
    /// abnormal deaths.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitOutcome::Completed { code } => *code,
            ExitOutcome::TimedOut => 124,
            ExitOutcome::Killed => 143,
            ExitOutcome::Failed => 1,
        }
    }
}

/// Grace period between SIGTERM and SIGKILL when terminating a worker group.
const KILL_GRACE: Duration = Duration::from_millis(100);

/// Removes the registry entry when dropped, so no entry outlives the job's
/// Running state even if a caller-supplied callback panics mid-run.
struct RegistryGuard<'a> {
    registry: &'a JobRegistry,
    pid: u32,
}

impl Drop for RegistryGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.pid);
    }
}

pub struct JobSupervisor {
    job: TilingJob,
    registry: JobRegistry,
    cancel: CancellationToken,
    curve: ProgressCurve,
    on_progress: Option<ProgressCallback>,
    on_done: Option<DoneCallback>,
}

impl JobSupervisor {
    /// Cancelling `cancel` is the external kill switch for this job; hand a
    /// child of a signal-bridge root token to tie it to SIGINT/SIGTERM.
    pub fn new(job: TilingJob, registry: JobRegistry, cancel: CancellationToken) -> Self {
        Self {
            job,
            registry,
            cancel,
            curve: ProgressCurve::default(),
            on_progress: None,
            on_done: None,
        }
    }

    pub fn with_curve(mut self, curve: ProgressCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Synchronous per-tick percentage callback, invoked in stream order.
    pub fn on_progress(mut self, callback: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Invoked with the job id exactly once per run, after the terminal state
    /// is reached and the registry entry is gone, on every post-spawn path.
    pub fn on_done(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }

    pub fn job(&self) -> &TilingJob {
        &self.job
    }

    /// Run the job to a terminal state.
    ///
    /// Errors only before a worker exists (`Configuration`, spawn failures);
    /// any later trouble is logged and folded into the outcome.
    pub async fn run(self) -> Result<ExitOutcome, SpawnerError> {
        let argv = self.job.argv()?;
        let mut child = self.spawn(&argv)?;
        let pid = child.id().unwrap_or(0);

        info!(
            pid,
            job_id = %self.job.job_id,
            input = %self.job.input.display(),
            profile = %self.job.profile,
            alpha = %self.job.alpha,
            timeout_secs = self.job.timeout.as_secs(),
            argv = ?argv,
            "worker spawned"
        );
        self.registry.insert(pid, JobEntry::for_job(&self.job, argv));
        let registration = RegistryGuard {
            registry: &self.registry,
            pid,
        };

        let outcome = self.drive(&mut child, pid).await;

        // Deregister before notifying; the guard also covers unwinds out of
        // a panicking progress callback.
        drop(registration);
        info!(pid, job_id = %self.job.job_id, ?outcome, "job reached terminal state");
        if let Some(done) = &self.on_done {
            done(&self.job.job_id);
        }
        Ok(outcome)
    }

    fn spawn(&self, argv: &[String]) -> Result<Child, SpawnerError> {
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdout(Stdio::piped())
            // stderr stays inherited: worker diagnostics flow to our own.
            .kill_on_drop(true);
        // Own process group so terminate requests reach the worker's own
        // children (the tiler forks per zoom level).
        #[cfg(unix)]
        command.process_group(0);

        command
            .spawn()
            .map_err(|err| SpawnerError::from_spawn(&argv[0], err))
    }

    /// Stream stdout to completion, then wait for exit within the timeout.
    /// Infallible by policy: post-spawn problems become an outcome.
    async fn drive(&self, child: &mut Child, pid: u32) -> ExitOutcome {
        let mut kill_requested = false;

        match child.stdout.take() {
            Some(stdout) => {
                let summary = scanner::scan(stdout, &self.curve, &self.cancel, |percent| {
                    self.registry.update_progress(pid, percent);
                    if let Some(progress) = &self.on_progress {
                        progress(percent);
                    }
                })
                .await;
                debug!(
                    pid,
                    ticks = summary.ticks,
                    last_percent = summary.last_percent,
                    interrupted = summary.interrupted,
                    "worker stdout closed"
                );
                if summary.interrupted {
                    self.terminate(child, pid).await;
                    kill_requested = true;
                }
            }
            None => warn!(pid, "worker stdout was not captured, no progress to scan"),
        }

        // The stream has closed (or was abandoned on a stop request); the
        // timeout bounds only this reap, measured from here.
        let deadline = Instant::now() + self.job.timeout;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled(), if !kill_requested => {
                    self.terminate(child, pid).await;
                    kill_requested = true;
                }
                waited = tokio::time::timeout_at(deadline, child.wait()) => {
                    return match waited {
                        Ok(Ok(status)) => classify_exit(status, kill_requested, pid),
                        Ok(Err(err)) => {
                            warn!(pid, "waiting for worker failed: {err}");
                            ExitOutcome::Failed
                        }
                        Err(_) => {
                            warn!(
                                pid,
                                timeout_secs = self.job.timeout.as_secs(),
                                "worker still running after timeout, terminating"
                            );
                            self.terminate(child, pid).await;
                            // Reap so the worker cannot linger as a zombie.
                            let _ = child.wait().await;
                            ExitOutcome::TimedOut
                        }
                    };
                }
            }
        }
    }

    /// Two-stage terminate request: SIGTERM to the worker's process group,
    /// a short grace, SIGKILL if it is still alive, then the portable kill
    /// as fallback. Failures (worker already gone) are logged and swallowed.
    async fn terminate(&self, child: &mut Child, pid: u32) {
        warn!(pid, job_id = %self.job.job_id, "terminating worker");

        #[cfg(unix)]
        if child.id().is_some() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let group = Pid::from_raw(-(pid as i32));
            match signal::kill(group, Signal::SIGTERM) {
                Ok(()) => debug!(pid, "sent SIGTERM to worker process group"),
                Err(err) => warn!(pid, "SIGTERM to worker process group failed: {err}"),
            }
            tokio::time::sleep(KILL_GRACE).await;
            if let Ok(None) = child.try_wait() {
                if let Err(err) = signal::kill(group, Signal::SIGKILL) {
                    warn!(pid, "SIGKILL to worker process group failed: {err}");
                }
            }
        }

        match child.start_kill() {
            Ok(()) => debug!(pid, "kill request delivered"),
            Err(err) => warn!(pid, "kill request failed, worker already gone: {err}"),
        }
    }
}

/// Map a reaped exit status onto a terminal outcome.
fn classify_exit(status: std::process::ExitStatus, kill_requested: bool, pid: u32) -> ExitOutcome {
    if kill_requested {
        info!(pid, "worker terminated on request");
        return ExitOutcome::Killed;
    }

    if let Some(code) = status.code() {
        if code == 0 {
            info!(pid, "worker exited cleanly");
        } else {
            info!(pid, code, "worker exited with nonzero status");
        }
        return ExitOutcome::Completed { code };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            warn!(
                pid,
                signal = sig,
                "worker killed by signal; if you did not kill it, something likely went wrong"
            );
            return ExitOutcome::Failed;
        }
    }

    warn!(pid, "worker ended with unrecognized status {status:?}");
    ExitOutcome::Failed
}
