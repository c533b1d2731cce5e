//! CWL Document Parser
//!
//! Loads CWL documents from YAML or JSON text. A document is either a
//! single process object or a packed `$graph` holding several of them.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_yaml::Value;

use super::model::{CwlDocument, Process};
use crate::error::{Result, RunnerError};

/// Document keys that may carry the software version extension.
const SOFTWARE_VERSION_KEYS: &[&str] = &["s:softwareVersion", "https://schema.org/softwareVersion"];

/// Loads a CWL document from a file.
///
/// # Example
///
/// ```rust,no_run
/// use cwlrunner::workflow::load_document;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let document = load_document("app-package.cwl")?;
///     println!("Loaded {} processes", document.processes.len());
///     Ok(())
/// }
/// ```
pub fn load_document(path: impl AsRef<Path>) -> Result<CwlDocument> {
    let path = path.as_ref();
    info!("Loading CWL document from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|source| RunnerError::Io {
        path: path.display().to_string(),
        source,
    })?;

    debug!("CWL content loaded ({} bytes)", content.len());
    parse_document(&content)
}

/// Parses CWL text (YAML or JSON) into a [`CwlDocument`].
pub fn parse_document(content: &str) -> Result<CwlDocument> {
    let raw: Value = serde_yaml::from_str(content)?;
    document_from_value(raw)
}

/// Builds a [`CwlDocument`] from an already-parsed YAML value.
pub fn document_from_value(raw: Value) -> Result<CwlDocument> {
    let fields = raw
        .as_mapping()
        .ok_or_else(|| RunnerError::InvalidDocument("top level must be a mapping".to_string()))?;

    let cwl_version = fields
        .get("cwlVersion")
        .and_then(Value::as_str)
        .map(str::to_string);

    let software_version = SOFTWARE_VERSION_KEYS
        .iter()
        .find_map(|key| fields.get(*key))
        .and_then(scalar_to_string);

    let processes: Vec<Process> = match fields.get("$graph") {
        Some(Value::Sequence(items)) => items
            .iter()
            .cloned()
            .map(serde_yaml::from_value)
            .collect::<std::result::Result<_, _>>()?,
        Some(_) => {
            return Err(RunnerError::InvalidDocument(
                "'$graph' must be a list of process objects".to_string(),
            ))
        }
        None => vec![serde_yaml::from_value(raw.clone())?],
    };

    info!(
        "Parsed CWL document: {} processes (cwlVersion: {})",
        processes.len(),
        cwl_version.as_deref().unwrap_or("unspecified")
    );

    Ok(CwlDocument {
        cwl_version,
        software_version,
        processes,
        raw,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
