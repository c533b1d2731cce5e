//! Service Outputs
//!
//! Outputs are written back untouched: whatever shape the backend
//! produced is stored under the descriptor's `value`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RunnerError};

/// One output slot as described by the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Any other host fields, kept as-is
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// All outputs of one execution request, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ServiceOutputs {
    outputs: IndexMap<String, OutputDescriptor>,
}

impl ServiceOutputs {
    pub fn new(outputs: IndexMap<String, OutputDescriptor>) -> Self {
        Self { outputs }
    }

    /// Declares outputs by name, all unset.
    pub fn declare<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: names
                .into_iter()
                .map(|name| (name.into(), OutputDescriptor::default()))
                .collect(),
        }
    }

    /// Parses outputs from JSON or YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| RunnerError::HostDocument {
            document: "outputs",
            source,
        })
    }

    /// Name of the first declared output.
    pub fn primary_output_name(&self) -> Option<&str> {
        self.outputs.keys().next().map(String::as_str)
    }

    /// Stores `value` in the first declared output.
    pub fn set_primary_output(&mut self, value: Value) -> Result<()> {
        let (_, descriptor) = self
            .outputs
            .get_index_mut(0)
            .ok_or_else(|| RunnerError::OutputNotFound("<primary>".to_string()))?;
        descriptor.value = Some(value);
        Ok(())
    }

    /// Stores `value` in a named output.
    pub fn set_output(&mut self, name: &str, value: Value) -> Result<()> {
        let descriptor = self
            .outputs
            .get_mut(name)
            .ok_or_else(|| RunnerError::OutputNotFound(name.to_string()))?;
        descriptor.value = Some(value);
        Ok(())
    }

    pub fn descriptor(&self, name: &str) -> Option<&OutputDescriptor> {
        self.outputs.get(name)
    }

    /// Output name to current value (`None` when unset).
    pub fn get_output_parameters(&self) -> IndexMap<String, Option<Value>> {
        self.outputs
            .iter()
            .map(|(name, descriptor)| (name.clone(), descriptor.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
