//! CWLRunner - Foundation for CWL Workflow Runners
//!
//! Building blocks for services that execute Common Workflow Language
//! application packages on some engine (Kubernetes, Argo, WES, ...).
//! The engine itself is not part of this crate; it plugs in through
//! [`execution::RunnerBackend`].
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: CWL document model, workflow selection and resource estimation
//! - [`parameters`]: Marshalling of host inputs and outputs to typed CWL values
//! - [`execution`]: Runner lifecycle, execution hooks and status reporting
//! - [`monitoring`]: Phase timeline and host capacity checks
//!
//! # Example
//!
//! ```rust,no_run
//! use cwlrunner::execution::{RunnerLifecycle, ServiceConfig};
//! use cwlrunner::parameters::{ServiceInputs, ServiceOutputs};
//! use cwlrunner::CwlWorkflow;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Select the workflow inside the application package
//!     let workflow = CwlWorkflow::load("app-package.cwl", "water-bodies")?;
//!
//!     // Host-supplied configuration and inputs
//!     let config = ServiceConfig::load("conf.json")?;
//!     let inputs = ServiceInputs::load("inputs.json")?;
//!     let outputs = ServiceOutputs::declare(workflow.list_outputs());
//!
//!     let lifecycle = RunnerLifecycle::new(workflow, config, inputs, outputs);
//!     lifecycle.assert_parameters()?;
//!     println!("Pod limits: {} cores, {} MiB", lifecycle.max_cores(), lifecycle.max_ram());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod parameters;
pub mod workflow;

// Re-export commonly used types
pub use error::{Result, RunnerError};
pub use execution::{ExecutionHandler, Runner, RunnerBackend, RunnerLifecycle, ServiceStatus};
pub use parameters::{CwlValue, ServiceInputs, ServiceOutputs};
pub use workflow::{load_document, CwlWorkflow, ResourceBags, ResourceRequirement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "CWLRunner";
