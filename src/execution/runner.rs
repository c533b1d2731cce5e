//! Runner Lifecycle
//!
//! A run moves through `prepare -> execute -> finalize`. The generic part
//! lives in [`RunnerLifecycle`]; everything that talks to a real engine is
//! supplied by a [`RunnerBackend`]. [`Runner`] ties the two together and
//! turns whatever happens into one terminal [`ServiceStatus`].
//!
//! # Structure
//!
//! ```text
//! Runner::run
//!   ├── backend.validate_inputs(lifecycle)
//!   └── backend.execute(lifecycle)
//!         ├── lifecycle.prepare(backend)   pre hook, parameters, wrap
//!         ├── lifecycle.update_status(..)  progress to the host
//!         └── lifecycle.finalize(..)       post hook, outputs
//! ```

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use once_cell::unsync::OnceCell;
use serde::Serialize;
use uuid::Uuid;

use super::config::{RunnerSettings, ServiceConfig};
use super::handler::{ExecutionHandler, NoOpHandler, RunArtifacts};
use super::status::{LogReporter, RunnerPhase, ServiceStatus, StatusReporter};
use crate::error::{Result, RunnerError};
use crate::monitoring::PhaseTimeline;
use crate::parameters::{CwlValue, ServiceInputs, ServiceOutputs};
use crate::workflow::{CwlWorkflow, ResourceBags};

/// What `prepare` hands to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRun {
    /// Workflow document after the backend's stage-in/stage-out wrapping
    pub wrapped_workflow: serde_yaml::Value,
    /// Job order for the engine
    pub parameters: IndexMap<String, CwlValue>,
}

/// Engine-specific part of a runner.
pub trait RunnerBackend {
    /// Returns the workflow document the engine should actually run.
    fn wrap(&self, lifecycle: &RunnerLifecycle) -> Result<serde_yaml::Value>;

    /// Last chance to edit the processing parameters. Passes them through by default.
    fn get_processing_parameters(
        &self,
        _lifecycle: &RunnerLifecycle,
        parameters: IndexMap<String, CwlValue>,
    ) -> Result<IndexMap<String, CwlValue>> {
        Ok(parameters)
    }

    /// Backend-specific input checks. Reports failure by returning false.
    fn validate_inputs(&self, _lifecycle: &RunnerLifecycle) -> bool {
        true
    }

    /// Runs the workflow, calling back into the lifecycle.
    fn execute(&mut self, lifecycle: &mut RunnerLifecycle) -> Result<ServiceStatus>;
}

/// State of a single run.
pub struct RunnerLifecycle {
    workflow: CwlWorkflow,
    config: ServiceConfig,
    inputs: ServiceInputs,
    outputs: ServiceOutputs,
    settings: RunnerSettings,
    handler: Box<dyn ExecutionHandler>,
    reporter: Box<dyn StatusReporter>,
    phase: RunnerPhase,
    progress: u8,
    message: String,
    namespace: OnceCell<String>,
    prepared: Option<PreparedRun>,
    timeline: PhaseTimeline,
}

impl RunnerLifecycle {
    /// Creates a run with the no-op handler and a logging reporter.
    pub fn new(
        workflow: CwlWorkflow,
        config: ServiceConfig,
        inputs: ServiceInputs,
        outputs: ServiceOutputs,
    ) -> Self {
        let mut timeline = PhaseTimeline::new();
        timeline.record(RunnerPhase::Created);

        Self {
            workflow,
            config,
            inputs,
            outputs,
            settings: RunnerSettings::default(),
            handler: Box::new(NoOpHandler),
            reporter: Box::new(LogReporter),
            phase: RunnerPhase::Created,
            progress: 0,
            message: String::new(),
            namespace: OnceCell::new(),
            prepared: None,
            timeline,
        }
    }

    pub fn with_handler(mut self, handler: impl ExecutionHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn with_reporter(mut self, reporter: impl StatusReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn workflow(&self) -> &CwlWorkflow {
        &self.workflow
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ServiceConfig {
        &mut self.config
    }

    pub fn inputs(&self) -> &ServiceInputs {
        &self.inputs
    }

    pub fn outputs(&self) -> &ServiceOutputs {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut ServiceOutputs {
        &mut self.outputs
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn handler(&self) -> &dyn ExecutionHandler {
        self.handler.as_ref()
    }

    pub fn phase(&self) -> RunnerPhase {
        self.phase
    }

    /// Last progress passed to `update_status`.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Last message passed to `update_status`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bundle cached by the last successful `prepare`.
    pub fn prepared(&self) -> Option<&PreparedRun> {
        self.prepared.as_ref()
    }

    pub fn timeline(&self) -> &PhaseTimeline {
        &self.timeline
    }

    fn enter(&mut self, phase: RunnerPhase) {
        info!("Run {} entering phase {}", self.workflow.id(), phase);
        self.phase = phase;
        self.timeline.record(phase);
    }

    /// Identifier of the workflow being run.
    pub fn workflow_id(&self) -> &str {
        let identifier = self.config.workflow_identifier();
        if identifier.is_empty() {
            self.workflow.id()
        } else {
            identifier
        }
    }

    /// Runs the pre-execution hook, then resolves and caches the
    /// processing parameters and the wrapped workflow.
    ///
    /// Hook and backend errors are returned as-is.
    pub fn prepare<B>(&mut self, backend: &B) -> Result<PreparedRun>
    where
        B: RunnerBackend + ?Sized,
    {
        self.enter(RunnerPhase::Preparing);

        self.handler.pre_execution_hook(&mut self.config)?;

        let mut parameters = self.inputs.get_processing_parameters()?;
        for (name, value) in self.handler.get_additional_parameters() {
            if parameters.contains_key(&name) {
                warn!("Additional parameter '{}' overrides a service input", name);
            }
            parameters.insert(name, value);
        }
        let parameters = backend.get_processing_parameters(self, parameters)?;
        let wrapped_workflow = backend.wrap(self)?;

        info!(
            "Prepared run {} with {} parameter(s)",
            self.get_namespace_name(),
            parameters.len()
        );

        let prepared = PreparedRun {
            wrapped_workflow,
            parameters,
        };
        self.prepared = Some(prepared.clone());
        self.enter(RunnerPhase::Executing);

        Ok(prepared)
    }

    /// Forwards progress to the host. Progress above 100 is capped.
    pub fn update_status(&mut self, progress: u8, message: &str) {
        let progress = progress.min(100);
        self.progress = progress;
        self.message = message.to_string();
        self.reporter.update_status(progress, message);
    }

    /// Runs the post-execution hook, then lets the handler fill the outputs.
    pub fn finalize(&mut self, artifacts: &RunArtifacts) -> Result<()> {
        self.enter(RunnerPhase::Finalizing);

        self.handler
            .post_execution_hook(&mut self.config, artifacts)?;
        self.handler.handle_outputs(artifacts, &mut self.outputs)?;

        debug!(
            "Finalized run with {} tool log(s)",
            artifacts.tool_logs.len()
        );
        Ok(())
    }

    /// Per-run isolation name, computed once.
    ///
    /// `{identifier}-{usid}` when the host supplied a usid, otherwise a
    /// random UUID suffix. Lower-case, with anything other than ASCII
    /// letters, digits and `-` replaced by `-`.
    pub fn get_namespace_name(&self) -> &str {
        self.namespace.get_or_init(|| {
            let suffix = self
                .config
                .lenv
                .usid
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let raw = format!("{}-{}", self.workflow_id(), suffix);
            let name: String = raw
                .to_lowercase()
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        c
                    } else {
                        '-'
                    }
                })
                .collect();
            debug!("Namespace for this run: {}", name);
            name
        })
    }

    /// Fails with the first mandatory workflow input the host did not send.
    pub fn assert_parameters(&self) -> Result<()> {
        for name in self.workflow.list_inputs(true) {
            if !self.inputs.contains(&name) {
                error!("Mandatory input '{}' is missing", name);
                return Err(RunnerError::InputNotFound(name));
            }
        }
        Ok(())
    }

    pub fn get_workflow_inputs(&self, mandatory_only: bool) -> Vec<String> {
        self.workflow.list_inputs(mandatory_only)
    }

    /// Resource bags using the configured scatter multiplier.
    pub fn evaluate_resources(&self) -> ResourceBags {
        self.workflow
            .evaluate_resources(self.settings.scatter_multiplier)
    }

    pub fn max_cores(&self) -> u64 {
        self.evaluate_resources()
            .max_cores(self.settings.default_max_cores)
    }

    /// RAM limit in MiB.
    pub fn max_ram(&self) -> u64 {
        self.evaluate_resources()
            .max_ram(self.settings.default_max_ram_mib)
    }

    pub fn set_job_id(&mut self, job_id: &str) {
        info!("Job id: {}", job_id);
        self.handler.set_job_id(job_id);
    }

    /// Writes a failure to the host's message channel and the reporter.
    pub fn record_failure(&mut self, message: &str) {
        error!("{}", message);
        self.config.set_message(message);
        self.reporter.report_failure(message);
    }

    /// Moves to a terminal phase. Anything but success counts as failure.
    pub fn complete(&mut self, status: ServiceStatus) -> ServiceStatus {
        let status = if status == ServiceStatus::Succeeded {
            self.update_status(100, "Run succeeded");
            self.enter(RunnerPhase::Succeeded);
            ServiceStatus::Succeeded
        } else {
            self.enter(RunnerPhase::Failed);
            ServiceStatus::Failed
        };

        info!(
            "Run {} finished with status {} after {:.2?}",
            self.workflow_id(),
            status,
            self.timeline.elapsed()
        );
        debug!("{}", self.timeline.summary());
        status
    }
}

/// A lifecycle driven by one backend.
pub struct Runner<B: RunnerBackend> {
    backend: B,
    lifecycle: RunnerLifecycle,
}

impl<B: RunnerBackend> Runner<B> {
    pub fn new(backend: B, lifecycle: RunnerLifecycle) -> Self {
        Self { backend, lifecycle }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn lifecycle(&self) -> &RunnerLifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut RunnerLifecycle {
        &mut self.lifecycle
    }

    pub fn into_parts(self) -> (B, RunnerLifecycle) {
        (self.backend, self.lifecycle)
    }

    /// Validates inputs and executes, always ending in `Succeeded` or `Failed`.
    ///
    /// Errors escaping `execute` are recorded through the failure channel.
    pub fn run(&mut self) -> ServiceStatus {
        info!("Starting run of {}", self.lifecycle.workflow_id());

        if !self.backend.validate_inputs(&self.lifecycle) {
            self.lifecycle.record_failure("Input validation failed");
            return self.lifecycle.complete(ServiceStatus::Failed);
        }

        let status = match self.backend.execute(&mut self.lifecycle) {
            Ok(ServiceStatus::Succeeded) => ServiceStatus::Succeeded,
            Ok(other) => {
                self.lifecycle
                    .record_failure(&format!("Execution ended with status {}", other));
                ServiceStatus::Failed
            }
            Err(e) => {
                self.lifecycle.record_failure(&e.to_string());
                ServiceStatus::Failed
            }
        };

        self.lifecycle.complete(status)
    }
}
