//! Runner Execution Module
//!
//! Provides the lifecycle every CWL runner shares, independent of the
//! engine that actually executes the workflow.
//!
//! # Architecture
//!
//! - [`runner`]: Lifecycle state, the backend capability set and the driver
//! - [`handler`]: Deployment hooks around execution
//! - [`config`]: Host configuration and runner settings
//! - [`status`]: Status codes, phases and progress reporting
//! - [`poll`]: Cancellable polling loop for asynchronous backends

pub mod config;
pub mod handler;
pub mod poll;
pub mod runner;
pub mod status;

pub use config::{
    LocalEnvironment, MainSettings, RunnerSettings, ServiceConfig, DEFAULT_MAX_CORES,
    DEFAULT_MAX_RAM_MIB,
};
pub use handler::{ExecutionHandler, NoOpHandler, RunArtifacts};
pub use poll::{poll_until, PollSettings, PollState, DEFAULT_POLL_INTERVAL};
pub use runner::{PreparedRun, Runner, RunnerBackend, RunnerLifecycle};
pub use status::{
    LogReporter, RecordingReporter, RunnerPhase, ServiceStatus, StatusReporter, StatusUpdate,
};
