//! Run Status
//!
//! Host-facing status codes, the runner's internal phase, and the
//! collaborator that forwards progress to the host.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;

/// Process-wide status codes understood by the host service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ServiceStatus {
    Accepted,
    Started,
    Paused,
    Succeeded,
    Failed,
    Deployed,
    Undeployed,
}

impl ServiceStatus {
    /// Numeric code as exchanged with the host.
    pub fn code(&self) -> i32 {
        match self {
            Self::Accepted => 0,
            Self::Started => 1,
            Self::Paused => 2,
            Self::Succeeded => 3,
            Self::Failed => 4,
            Self::Deployed => 6,
            Self::Undeployed => 7,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Accepted),
            1 => Some(Self::Started),
            2 => Some(Self::Paused),
            3 => Some(Self::Succeeded),
            4 => Some(Self::Failed),
            6 => Some(Self::Deployed),
            7 => Some(Self::Undeployed),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Accepted => "ACCEPTED",
            Self::Started => "STARTED",
            Self::Paused => "PAUSED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Deployed => "DEPLOYED",
            Self::Undeployed => "UNDEPLOYED",
        };
        f.write_str(name)
    }
}

/// Phase of a single run.
///
/// `Created -> Preparing -> Executing -> Finalizing -> Succeeded | Failed`.
/// Transitions follow what the backend calls; nothing is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunnerPhase {
    Created,
    Preparing,
    Executing,
    Finalizing,
    Succeeded,
    Failed,
}

impl RunnerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RunnerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Preparing => "preparing",
            Self::Executing => "executing",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Receives progress and failures on behalf of the host.
pub trait StatusReporter {
    /// Progress is a percentage (0-100); it is not checked for monotonicity.
    fn update_status(&mut self, progress: u8, message: &str);

    fn report_failure(&mut self, message: &str);
}

/// Reporter that only logs.
#[derive(Debug, Default, Clone)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn update_status(&mut self, progress: u8, message: &str) {
        info!("[{:>3}%] {}", progress, message);
    }

    fn report_failure(&mut self, message: &str) {
        error!("Run failed: {}", message);
    }
}

/// A timestamped status update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Reporter that keeps every update in memory.
///
/// Clones share the same record, so one clone can be handed to a runner
/// while another is kept to read the history back.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    updates: Rc<RefCell<Vec<StatusUpdate>>>,
    failures: Rc<RefCell<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.borrow().clone()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.borrow().clone()
    }

    /// Most recent progress value, if any.
    pub fn last_progress(&self) -> Option<u8> {
        self.updates.borrow().last().map(|update| update.progress)
    }
}

impl StatusReporter for RecordingReporter {
    fn update_status(&mut self, progress: u8, message: &str) {
        self.updates.borrow_mut().push(StatusUpdate {
            progress,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn report_failure(&mut self, message: &str) {
        self.failures.borrow_mut().push(message.to_string());
    }
}
