//! CWL Document Model
//!
//! Typed view of the parts of a CWL document the runner reasons about:
//! process objects, their parameters, steps and requirement/hint lists.
//! Everything else in the document is ignored here and stays available
//! through [`CwlDocument::raw`].
//!
//! # Example YAML Format
//!
//! ```yaml
//! cwlVersion: v1.2
//! $graph:
//!   - class: Workflow
//!     id: main
//!     label: NDVI
//!     inputs:
//!       aoi: string
//!       bands:
//!         type: string[]
//!     outputs:
//!       stac:
//!         type: Directory
//!         outputSource: ndvi/results
//!     steps:
//!       ndvi:
//!         run: "#ndvi-tool"
//!         scatter: band
//!   - class: CommandLineTool
//!     id: ndvi-tool
//!     requirements:
//!       ResourceRequirement:
//!         coresMin: 2
//!         ramMin: 2048
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Kind of CWL process object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum ProcessClass {
    Workflow,
    CommandLineTool,
    ExpressionTool,
    Operation,
    #[serde(other)]
    Other,
}

/// A CWL process object: a workflow, a tool, or any other process class.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Identifier with any leading `#` removed
    #[serde(default, deserialize_with = "normalized_id")]
    pub id: String,

    pub class: ProcessClass,

    #[serde(default, deserialize_with = "scalar_string")]
    pub label: Option<String>,

    #[serde(default, deserialize_with = "doc_text")]
    pub doc: Option<String>,

    #[serde(default, deserialize_with = "id_keyed")]
    pub inputs: Vec<InputParameter>,

    #[serde(default, deserialize_with = "id_keyed")]
    pub outputs: Vec<OutputParameter>,

    #[serde(default, deserialize_with = "id_keyed")]
    pub steps: Vec<Step>,

    #[serde(default, deserialize_with = "class_keyed")]
    pub requirements: Vec<Requirement>,

    #[serde(default, deserialize_with = "class_keyed")]
    pub hints: Vec<Requirement>,

    /// Declared software version (`s:softwareVersion`)
    #[serde(
        default,
        rename = "s:softwareVersion",
        alias = "https://schema.org/softwareVersion",
        deserialize_with = "scalar_string"
    )]
    pub software_version: Option<String>,
}

impl Process {
    /// Returns true if this process is a workflow.
    pub fn is_workflow(&self) -> bool {
        self.class == ProcessClass::Workflow
    }
}

/// One entry of a `requirements` or `hints` list.
#[derive(Debug, Clone, Deserialize)]
pub struct Requirement {
    pub class: String,

    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// A workflow step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default, deserialize_with = "normalized_id")]
    pub id: String,

    /// The tool or sub-workflow this step runs
    pub run: RunTarget,

    /// Input names the step scatters over (empty when not scattered)
    #[serde(default, deserialize_with = "string_or_list")]
    pub scatter: Vec<String>,

    #[serde(default)]
    pub scatter_method: Option<String>,

    #[serde(default, deserialize_with = "class_keyed")]
    pub requirements: Vec<Requirement>,

    #[serde(default, deserialize_with = "class_keyed")]
    pub hints: Vec<Requirement>,
}

impl Step {
    /// Short name of the step (last path segment of its identifier).
    pub fn name(&self) -> &str {
        short_name(&self.id)
    }

    /// Returns true if the step declares a scatter.
    pub fn is_scattered(&self) -> bool {
        !self.scatter.is_empty()
    }
}

/// The `run` field of a step.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunTarget {
    /// Reference to another process, e.g. `#ndvi-tool`
    Reference(String),
    /// Process embedded in the step
    Inline(Box<Process>),
}

/// A declared input of a process.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParameter {
    #[serde(default, deserialize_with = "normalized_id")]
    pub id: String,

    #[serde(default, rename = "type")]
    pub cwl_type: CwlType,

    #[serde(default, deserialize_with = "scalar_string")]
    pub label: Option<String>,

    #[serde(default, deserialize_with = "doc_text")]
    pub doc: Option<String>,

    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub min_occurs: Option<u32>,
}

impl InputParameter {
    /// Short name of the input (`#main/aoi` -> `aoi`).
    pub fn name(&self) -> &str {
        short_name(&self.id)
    }

    /// An input is mandatory unless it has a default, accepts `null`,
    /// or allows zero occurrences.
    pub fn is_mandatory(&self) -> bool {
        self.default.is_none() && !self.cwl_type.is_optional() && self.min_occurs != Some(0)
    }
}

/// A declared output of a process.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputParameter {
    #[serde(default, deserialize_with = "normalized_id")]
    pub id: String,

    #[serde(default, rename = "type")]
    pub cwl_type: CwlType,

    #[serde(default, deserialize_with = "scalar_string")]
    pub label: Option<String>,

    #[serde(default, deserialize_with = "doc_text")]
    pub doc: Option<String>,
}

impl OutputParameter {
    /// Short name of the output.
    pub fn name(&self) -> &str {
        short_name(&self.id)
    }
}

/// A CWL type declaration.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CwlType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    File,
    Directory,
    #[default]
    Any,
    Array(Box<CwlType>),
    Enum(Vec<String>),
    Record,
    Union(Vec<CwlType>),
    /// Reference to a schema-defined type
    Named(String),
}

impl CwlType {
    /// Returns true if `null` is an accepted value.
    pub fn is_optional(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Union(members) => members.iter().any(|member| *member == Self::Null),
            _ => false,
        }
    }

    /// Parses a type name, expanding the `T?` and `T[]` shorthands.
    pub fn parse_name(name: &str) -> Self {
        if let Some(inner) = name.strip_suffix('?') {
            return Self::Union(vec![Self::Null, Self::parse_name(inner)]);
        }
        if let Some(inner) = name.strip_suffix("[]") {
            return Self::Array(Box::new(Self::parse_name(inner)));
        }

        match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            "File" => Self::File,
            "Directory" => Self::Directory,
            "Any" => Self::Any,
            other => Self::Named(fragment(other).to_string()),
        }
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::String(name) => Ok(Self::parse_name(name)),
            Value::Sequence(members) => members
                .iter()
                .map(Self::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Union),
            Value::Mapping(fields) => match fields.get("type").and_then(Value::as_str) {
                Some("array") => {
                    let items = fields
                        .get("items")
                        .ok_or_else(|| "Array type without 'items'".to_string())?;
                    Ok(Self::Array(Box::new(Self::from_value(items)?)))
                }
                Some("enum") => {
                    let symbols = fields
                        .get("symbols")
                        .and_then(Value::as_sequence)
                        .map(|symbols| {
                            symbols
                                .iter()
                                .filter_map(Value::as_str)
                                .map(|symbol| short_name(symbol).to_string())
                                .collect()
                        })
                        .unwrap_or_default();
                    Ok(Self::Enum(symbols))
                }
                Some("record") => Ok(Self::Record),
                Some(other) => Ok(Self::parse_name(other)),
                None => Err("Type mapping without 'type' field".to_string()),
            },
            other => Err(format!("Unsupported type declaration: {:?}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for CwlType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(de::Error::custom)
    }
}

impl fmt::Display for CwlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean => write!(f, "boolean"),
            Self::Int => write!(f, "int"),
            Self::Long => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::File => write!(f, "File"),
            Self::Directory => write!(f, "Directory"),
            Self::Any => write!(f, "Any"),
            Self::Array(items) => write!(f, "{}[]", items),
            Self::Enum(symbols) => write!(f, "enum({})", symbols.join("|")),
            Self::Record => write!(f, "record"),
            Self::Union(members) => {
                let non_null: Vec<_> = members.iter().filter(|m| **m != Self::Null).collect();
                if non_null.len() == 1 && non_null.len() < members.len() {
                    return write!(f, "{}?", non_null[0]);
                }
                let names: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "[{}]", names.join(", "))
            }
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A parsed CWL document: either a single process or a `$graph` of them.
#[derive(Debug, Clone)]
pub struct CwlDocument {
    pub cwl_version: Option<String>,

    /// Software version declared at the document level
    pub software_version: Option<String>,

    /// Process objects in declaration order
    pub processes: Vec<Process>,

    /// The document as it was read
    pub raw: Value,
}

impl CwlDocument {
    /// Finds a process by identifier (a leading `#` is ignored).
    pub fn find_process(&self, id: &str) -> Option<&Process> {
        let id = fragment(id);
        self.processes.iter().find(|process| process.id == id)
    }

    /// Returns the identifiers of all processes.
    pub fn process_ids(&self) -> Vec<&str> {
        self.processes
            .iter()
            .map(|process| process.id.as_str())
            .collect()
    }
}

/// Returns the part of an identifier after its last `#`.
///
/// `file:///tmp/app.cwl#main`, `#main` and `main` all give `main`.
pub fn fragment(id: &str) -> &str {
    id.rsplit('#').next().unwrap_or(id)
}

/// Returns the last `/`-separated segment of an identifier's fragment.
pub fn short_name(id: &str) -> &str {
    let id = fragment(id);
    id.rsplit('/').next().unwrap_or(id)
}

fn normalized_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    Ok(fragment(&id).to_string())
}

/// Accepts any scalar and renders it as a string.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        _ => Err(de::Error::custom("Expected a scalar value")),
    }
}

/// `doc` may be a string or a list of lines.
fn doc_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Sequence(lines) => {
            let lines: Vec<&str> = lines.iter().filter_map(Value::as_str).collect();
            Ok(Some(lines.join("\n")))
        }
        _ => Err(de::Error::custom("Expected string or list for 'doc'")),
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(de::Error::custom("Expected string in list")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected string or list of strings")),
    }
}

/// List-or-map field where map keys become `id` and a non-mapping value
/// is shorthand for `type`.
fn id_keyed<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    keyed_list(value, "id", Some("type")).map_err(de::Error::custom)
}

/// List-or-map field where map keys become `class`.
fn class_keyed<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    keyed_list(value, "class", None).map_err(de::Error::custom)
}

fn keyed_list<T: DeserializeOwned>(
    value: Value,
    key_field: &str,
    shorthand_field: Option<&str>,
) -> Result<Vec<T>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| serde_yaml::from_value(item).map_err(|e| e.to_string()))
            .collect(),
        Value::Mapping(entries) => entries
            .into_iter()
            .map(|(key, entry)| {
                let key = key
                    .as_str()
                    .ok_or_else(|| format!("Expected string key, found {:?}", key))?
                    .to_string();

                let key_name = Value::String(key_field.to_string());
                let entry = match (entry, shorthand_field) {
                    (Value::Mapping(mut fields), _) => {
                        fields.insert(key_name, Value::String(key));
                        Value::Mapping(fields)
                    }
                    (other, Some(field)) => {
                        let mut fields = Mapping::new();
                        fields.insert(key_name, Value::String(key));
                        fields.insert(Value::String(field.to_string()), other);
                        Value::Mapping(fields)
                    }
                    (_, None) => return Err(format!("Expected a mapping for '{}'", key)),
                };

                serde_yaml::from_value(entry).map_err(|e| e.to_string())
            })
            .collect(),
        other => Err(format!("Expected a list or a map, found {:?}", other)),
    }
}
