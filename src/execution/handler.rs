//! Execution Handlers
//!
//! An execution handler is the deployment-specific part of a run: it can
//! inject secrets and environment before execution, and decides what to
//! do with the backend's artifacts afterwards. [`NoOpHandler`] is used
//! when nothing is wired in.

use indexmap::IndexMap;
use serde_json::Value;

use super::config::ServiceConfig;
use crate::error::Result;
use crate::parameters::{CwlValue, ServiceOutputs};

/// What a backend hands back once the workflow has run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunArtifacts {
    /// Path or content of the engine log
    pub log: String,
    /// CWL output object
    pub output: Value,
    /// Resource usage report of the run
    pub usage_report: Value,
    /// Paths of per-tool logs
    pub tool_logs: Vec<String>,
}

/// Lifecycle hooks supplied by the deployment.
///
/// Hook failures are not caught by the lifecycle; they reach the backend's
/// `execute` and end the run as failed.
pub trait ExecutionHandler {
    /// Runs before processing parameters are resolved. May edit `config`.
    fn pre_execution_hook(&mut self, config: &mut ServiceConfig) -> Result<()>;

    /// Runs after execution with all artifacts.
    fn post_execution_hook(
        &mut self,
        config: &mut ServiceConfig,
        artifacts: &RunArtifacts,
    ) -> Result<()>;

    fn get_secrets(&self) -> IndexMap<String, Value>;

    /// Parameters merged into the processing parameters of the run.
    fn get_additional_parameters(&self) -> IndexMap<String, CwlValue>;

    fn get_pod_env_vars(&self) -> IndexMap<String, String>;

    fn get_pod_node_selector(&self) -> IndexMap<String, String>;

    /// Turns artifacts into service outputs.
    fn handle_outputs(
        &mut self,
        artifacts: &RunArtifacts,
        outputs: &mut ServiceOutputs,
    ) -> Result<()>;

    fn set_job_id(&mut self, job_id: &str);
}

/// Handler whose hooks do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ExecutionHandler for NoOpHandler {
    fn pre_execution_hook(&mut self, _config: &mut ServiceConfig) -> Result<()> {
        Ok(())
    }

    fn post_execution_hook(
        &mut self,
        _config: &mut ServiceConfig,
        _artifacts: &RunArtifacts,
    ) -> Result<()> {
        Ok(())
    }

    fn get_secrets(&self) -> IndexMap<String, Value> {
        IndexMap::new()
    }

    fn get_additional_parameters(&self) -> IndexMap<String, CwlValue> {
        IndexMap::new()
    }

    fn get_pod_env_vars(&self) -> IndexMap<String, String> {
        IndexMap::new()
    }

    fn get_pod_node_selector(&self) -> IndexMap<String, String> {
        IndexMap::new()
    }

    fn handle_outputs(
        &mut self,
        _artifacts: &RunArtifacts,
        _outputs: &mut ServiceOutputs,
    ) -> Result<()> {
        Ok(())
    }

    fn set_job_id(&mut self, _job_id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop_handler_is_neutral() {
        let mut handler = NoOpHandler;
        let mut config = ServiceConfig::new("wf", "/tmp");
        let before = config.clone();
        let mut outputs = ServiceOutputs::declare(["result"]);
        let artifacts = RunArtifacts {
            log: "engine.log".to_string(),
            output: json!({"result": 1}),
            usage_report: json!({}),
            tool_logs: vec!["step.log".to_string()],
        };

        handler.pre_execution_hook(&mut config).unwrap();
        handler
            .post_execution_hook(&mut config, &artifacts)
            .unwrap();
        handler.handle_outputs(&artifacts, &mut outputs).unwrap();
        handler.set_job_id("job-1");

        assert_eq!(config, before);
        assert_eq!(outputs.get_output_parameters()["result"], None);
        assert!(handler.get_secrets().is_empty());
        assert!(handler.get_additional_parameters().is_empty());
        assert!(handler.get_pod_env_vars().is_empty());
        assert!(handler.get_pod_node_selector().is_empty());
    }
}
