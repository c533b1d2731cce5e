//! Backend Polling
//!
//! Backends that submit a job and then wait for it share one loop: ask the
//! engine for its state, forward progress, sleep, repeat. The loop always
//! has a way out, either the job finishing, an external cancel flag, or
//! an optional timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::runner::RunnerLifecycle;
use super::status::ServiceStatus;
use crate::error::{Result, RunnerError};

/// Default pause between two checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What one check of the backend returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Running { progress: u8, message: String },
    Finished(ServiceStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

impl PollSettings {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Calls `check` until it reports a finished job.
///
/// Running states are forwarded through
/// [`RunnerLifecycle::update_status`]. Errors from `check` end the loop
/// unchanged. Setting `cancel` ends it with [`RunnerError::Cancelled`].
pub fn poll_until<F>(
    lifecycle: &mut RunnerLifecycle,
    settings: &PollSettings,
    cancel: &AtomicBool,
    mut check: F,
) -> Result<ServiceStatus>
where
    F: FnMut() -> Result<PollState>,
{
    let started = Instant::now();
    let mut polls = 0u64;

    loop {
        if cancel.load(Ordering::SeqCst) {
            warn!("Polling cancelled after {} check(s)", polls);
            return Err(RunnerError::Cancelled);
        }

        polls += 1;
        match check()? {
            PollState::Finished(status) => {
                info!(
                    "Job finished with status {} after {} check(s)",
                    status, polls
                );
                return Ok(status);
            }
            PollState::Running { progress, message } => {
                debug!("Poll {}: {}% {}", polls, progress, message);
                lifecycle.update_status(progress, &message);
            }
        }

        if let Some(timeout) = settings.timeout {
            if started.elapsed() >= timeout {
                warn!("Job did not finish within {:?}", timeout);
                return Err(RunnerError::Timeout(timeout));
            }
        }

        thread::sleep(settings.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{RecordingReporter, ServiceConfig};
    use crate::parameters::{ServiceInputs, ServiceOutputs};
    use crate::workflow::{parse_document, CwlWorkflow};
    use std::sync::Arc;

    fn lifecycle(reporter: &RecordingReporter) -> RunnerLifecycle {
        let source = "class: Workflow\nid: wf\ninputs: {}\noutputs: {}\nsteps: {}\n";
        let document = parse_document(source).unwrap();
        RunnerLifecycle::new(
            CwlWorkflow::new(document, "wf").unwrap(),
            ServiceConfig::new("wf", "/tmp"),
            ServiceInputs::default(),
            ServiceOutputs::default(),
        )
        .with_reporter(reporter.clone())
    }

    fn fast() -> PollSettings {
        PollSettings::new(Duration::from_millis(1))
    }

    fn running(progress: u8, message: &str) -> PollState {
        PollState::Running {
            progress,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_forwards_progress_until_finished() {
        let reporter = RecordingReporter::new();
        let mut lifecycle = lifecycle(&reporter);
        let cancel = AtomicBool::new(false);
        let mut states = vec![
            running(20, "pending"),
            running(60, "running"),
            PollState::Finished(ServiceStatus::Succeeded),
        ]
        .into_iter();

        let check = || Ok(states.next().unwrap());
        let status = poll_until(&mut lifecycle, &fast(), &cancel, check).unwrap();

        assert_eq!(status, ServiceStatus::Succeeded);
        let updates = reporter.updates();
        let messages: Vec<_> = updates.into_iter().map(|u| u.message).collect();
        assert_eq!(messages, vec!["pending", "running"]);
        assert_eq!(lifecycle.progress(), 60);
    }

    #[test]
    fn test_cancel_flag_stops_polling() {
        let reporter = RecordingReporter::new();
        let mut lifecycle = lifecycle(&reporter);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let mut checks = 0;

        let result = poll_until(&mut lifecycle, &fast(), &cancel, || {
            checks += 1;
            if checks == 3 {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(running(10, "waiting"))
        });

        assert!(matches!(result, Err(RunnerError::Cancelled)));
        assert_eq!(checks, 3);
    }

    #[test]
    fn test_timeout() {
        let reporter = RecordingReporter::new();
        let mut lifecycle = lifecycle(&reporter);
        let cancel = AtomicBool::new(false);
        let settings = fast().with_timeout(Duration::from_millis(10));

        let result = poll_until(&mut lifecycle, &settings, &cancel, || {
            Ok(running(0, "queued"))
        });

        assert!(matches!(result, Err(RunnerError::Timeout(_))));
        assert!(!reporter.updates().is_empty());
    }

    #[test]
    fn test_check_error_propagates() {
        let reporter = RecordingReporter::new();
        let mut lifecycle = lifecycle(&reporter);
        let cancel = AtomicBool::new(false);

        let check = || Err(RunnerError::backend("job vanished"));
        let result = poll_until(&mut lifecycle, &fast(), &cancel, check);

        assert!(matches!(result, Err(RunnerError::Backend(_))));
        assert!(reporter.updates().is_empty());
    }
}
