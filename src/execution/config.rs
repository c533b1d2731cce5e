//! Runner Configuration
//!
//! [`ServiceConfig`] is the host's nested configuration mapping with the
//! keys the runner relies on pulled out into typed fields. Everything
//! else is preserved so execution handlers can read and inject values.
//!
//! [`RunnerSettings`] holds the knobs that used to come from ambient
//! environment variables; they are read once at the process boundary.

use std::env;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RunnerError};
use crate::workflow::DEFAULT_SCATTER_MULTIPLIER;

/// Default core limit when the workflow declares none.
pub const DEFAULT_MAX_CORES: u64 = 2;

/// Default RAM limit in MiB when the workflow declares none.
pub const DEFAULT_MAX_RAM_MIB: u64 = 4096;

/// The `lenv` section: per-request values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LocalEnvironment {
    /// Identifier of the deployed process (the workflow id)
    #[serde(rename = "Identifier", default)]
    pub identifier: String,

    /// Unique id of this execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usid: Option<String>,

    /// Error/status message channel read by the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// The `main` section: service-wide settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MainSettings {
    #[serde(rename = "tmpPath", default = "default_tmp_path")]
    pub tmp_path: PathBuf,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

fn default_tmp_path() -> PathBuf {
    env::temp_dir()
}

impl Default for MainSettings {
    fn default() -> Self {
        Self {
            tmp_path: default_tmp_path(),
            extra: IndexMap::new(),
        }
    }
}

/// Host configuration for one execution.
///
/// # Example
///
/// ```
/// use cwlrunner::execution::ServiceConfig;
///
/// let mut config = ServiceConfig::new("water-bodies", "/tmp/zoo");
/// config.set("pod_env_vars", "A", "1".into());
/// assert_eq!(config.workflow_identifier(), "water-bodies");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub lenv: LocalEnvironment,

    #[serde(default)]
    pub main: MainSettings,

    /// Every other section, in host order
    #[serde(flatten)]
    pub sections: IndexMap<String, IndexMap<String, Value>>,
}

impl ServiceConfig {
    pub fn new(identifier: impl Into<String>, tmp_path: impl Into<PathBuf>) -> Self {
        Self {
            lenv: LocalEnvironment {
                identifier: identifier.into(),
                ..LocalEnvironment::default()
            },
            main: MainSettings {
                tmp_path: tmp_path.into(),
                extra: IndexMap::new(),
            },
            sections: IndexMap::new(),
        }
    }

    /// Parses a configuration from JSON or YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| RunnerError::HostDocument {
            document: "configuration",
            source,
        })
    }

    /// Loads a configuration from a JSON or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RunnerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn workflow_identifier(&self) -> &str {
        &self.lenv.identifier
    }

    pub fn tmp_path(&self) -> &Path {
        &self.main.tmp_path
    }

    /// Reads `section.key`, including untyped keys of `lenv` and `main`.
    pub fn get(&self, section: &str, key: &str) -> Option<&Value> {
        match section {
            "lenv" => self.lenv.extra.get(key),
            "main" => self.main.extra.get(key),
            other => self.sections.get(other)?.get(key),
        }
    }

    /// Writes `section.key`, creating the section when needed.
    pub fn set(&mut self, section: &str, key: &str, value: Value) {
        let target = match section {
            "lenv" => &mut self.lenv.extra,
            "main" => &mut self.main.extra,
            other => self.sections.entry(other.to_string()).or_default(),
        };
        target.insert(key.to_string(), value);
    }

    /// Writes the message the host shows for this execution.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.lenv.message = Some(message.into());
    }

    pub fn message(&self) -> Option<&str> {
        self.lenv.message.as_deref()
    }
}

/// Tunables for resource estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Assumed fan-out of a scattered step
    pub scatter_multiplier: u64,
    pub default_max_cores: u64,
    pub default_max_ram_mib: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            scatter_multiplier: DEFAULT_SCATTER_MULTIPLIER,
            default_max_cores: DEFAULT_MAX_CORES,
            default_max_ram_mib: DEFAULT_MAX_RAM_MIB,
        }
    }
}

impl RunnerSettings {
    /// Reads `SCATTER_MULTIPLIER`, `DEFAULT_MAX_CORES` and `DEFAULT_MAX_RAM`.
    ///
    /// Unset or non-numeric values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str, default: u64| match lookup(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring non-numeric {}='{}', using {}", key, raw, default);
                default
            }),
        };

        Self {
            scatter_multiplier: read("SCATTER_MULTIPLIER", defaults.scatter_multiplier),
            default_max_cores: read("DEFAULT_MAX_CORES", defaults.default_max_cores),
            default_max_ram_mib: read("DEFAULT_MAX_RAM", defaults.default_max_ram_mib),
        }
    }

    pub fn with_scatter_multiplier(mut self, multiplier: u64) -> Self {
        self.scatter_multiplier = multiplier;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    const HOST_CONFIG: &str = r#"
{
  "lenv": {"Identifier": "water-bodies", "usid": "1234-ABCD", "status": "0"},
  "main": {"tmpPath": "/tmp/zoo", "serverAddress": "http://localhost"},
  "auth_env": {"user": "bob"}
}
"#;

    #[test]
    fn test_parse_host_config() {
        let config = ServiceConfig::parse(HOST_CONFIG).unwrap();

        assert_eq!(config.workflow_identifier(), "water-bodies");
        assert_eq!(config.lenv.usid.as_deref(), Some("1234-ABCD"));
        assert_eq!(config.tmp_path(), Path::new("/tmp/zoo"));
        assert_eq!(config.get("lenv", "status"), Some(&json!("0")));
        let server = config.get("main", "serverAddress");
        assert_eq!(server, Some(&json!("http://localhost")));
        assert_eq!(config.get("auth_env", "user"), Some(&json!("bob")));
        assert!(config.get("auth_env", "missing").is_none());
        assert!(config.get("missing", "user").is_none());
    }

    #[test]
    fn test_set_creates_sections() {
        let mut config = ServiceConfig::new("wf", "/tmp");
        config.set("pod_env_vars", "AWS_REGION", json!("eu-central-1"));
        config.set("lenv", "job_id", json!("42"));

        let region = config.get("pod_env_vars", "AWS_REGION");
        assert_eq!(region, Some(&json!("eu-central-1")));
        assert_eq!(config.get("lenv", "job_id"), Some(&json!("42")));
    }

    #[test]
    fn test_message_channel() {
        let mut config = ServiceConfig::new("wf", "/tmp");
        assert!(config.message().is_none());
        config.set_message("Pod failed");
        assert_eq!(config.message(), Some("Pod failed"));
    }

    #[test]
    fn test_serialization_keeps_sections() {
        let config = ServiceConfig::parse(HOST_CONFIG).unwrap();
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["lenv"]["Identifier"], json!("water-bodies"));
        assert_eq!(json["main"]["tmpPath"], json!("/tmp/zoo"));
        assert_eq!(json["auth_env"]["user"], json!("bob"));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = RunnerSettings::default();
        assert_eq!(settings.scatter_multiplier, 2);
        assert_eq!(settings.default_max_cores, DEFAULT_MAX_CORES);
        assert_eq!(settings.default_max_ram_mib, DEFAULT_MAX_RAM_MIB);
        assert_eq!(settings.with_scatter_multiplier(5).scatter_multiplier, 5);
    }

    #[test]
    fn test_settings_from_lookup() {
        let vars = HashMap::from([("SCATTER_MULTIPLIER", "4"), ("DEFAULT_MAX_CORES", "lots")]);
        let settings = RunnerSettings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.scatter_multiplier, 4);
        assert_eq!(settings.default_max_cores, DEFAULT_MAX_CORES);
        assert_eq!(settings.default_max_ram_mib, DEFAULT_MAX_RAM_MIB);
    }
}
