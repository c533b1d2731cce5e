//! Service Inputs
//!
//! The host service hands inputs over as string-typed descriptors
//! (`dataType`, `value`, `maxOccurs`, `cacheFile`, `mimeType`). This
//! module turns them into [`CwlValue`]s:
//!
//! 1. a scalar value declared with `maxOccurs > 1` becomes a one-element list
//! 2. a descriptor with `cacheFile` becomes a `File` reference
//! 3. otherwise the value is converted according to `dataType`

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use log::debug;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_yaml::Value;

use super::value::{CwlValue, FileRef};
use crate::error::{Result, RunnerError};

/// A raw value as supplied by the host: one string or a list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Single(String),
    Many(Vec<String>),
}

impl RawValue {
    /// Wraps a single value in a list when the parameter allows many.
    fn normalized(&self, allows_many: bool) -> RawValue {
        match self {
            Self::Single(value) if allows_many => Self::Many(vec![value.clone()]),
            other => other.clone(),
        }
    }
}

impl Default for RawValue {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

fn scalar_text(value: Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("Expected a scalar value, found {:?}", other)),
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::Sequence(items) => items
                .into_iter()
                .map(scalar_text)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Self::Many)
                .map_err(de::Error::custom),
            other => scalar_text(other)
                .map(Self::Single)
                .map_err(de::Error::custom),
        }
    }
}

impl Serialize for RawValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Single(value) => serializer.serialize_str(value),
            Self::Many(values) => values.serialize(serializer),
        }
    }
}

/// Declared upper bound of occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u64),
    Unbounded,
}

impl MaxOccurs {
    /// True when more than one value is allowed.
    pub fn allows_many(&self) -> bool {
        match self {
            Self::Bounded(n) => *n > 1,
            Self::Unbounded => true,
        }
    }
}

impl<'de> Deserialize<'de> for MaxOccurs {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .map(Self::Bounded)
                .ok_or_else(|| de::Error::custom(format!("Invalid maxOccurs: {}", n))),
            Value::String(s) if s.trim().eq_ignore_ascii_case("unbounded") => Ok(Self::Unbounded),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Self::Bounded)
                .map_err(|_| de::Error::custom(format!("Invalid maxOccurs: {}", s))),
            other => Err(de::Error::custom(format!("Invalid maxOccurs: {:?}", other))),
        }
    }
}

impl Serialize for MaxOccurs {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Bounded(n) => serializer.serialize_u64(*n),
            Self::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

/// One input as described by the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default)]
    pub value: RawValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurs: Option<MaxOccurs>,

    /// Local path of a file the host already downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<RawValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl InputDescriptor {
    /// A plain value with an optional data type.
    pub fn new(value: impl Into<RawValue>, data_type: Option<&str>) -> Self {
        Self {
            data_type: data_type.map(str::to_string),
            value: value.into(),
            ..Self::default()
        }
    }

    /// A file already staged at `path`.
    pub fn cached_file(path: &str, mime_type: Option<&str>) -> Self {
        Self {
            cache_file: Some(RawValue::from(path)),
            mime_type: mime_type.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_max_occurs(mut self, max_occurs: MaxOccurs) -> Self {
        self.max_occurs = Some(max_occurs);
        self
    }

    fn allows_many(&self) -> bool {
        self.max_occurs.map_or(false, |m| m.allows_many())
    }

    /// Converts this descriptor into a typed value.
    pub fn convert(&self, name: &str) -> Result<CwlValue> {
        let allows_many = self.allows_many();

        if let Some(cache_file) = &self.cache_file {
            let file = |path: &String| CwlValue::File(FileRef::new(path, self.mime_type.clone()));
            return Ok(match cache_file.normalized(allows_many) {
                RawValue::Single(path) => file(&path),
                RawValue::Many(paths) => CwlValue::Array(paths.iter().map(file).collect()),
            });
        }

        let data_type = self.data_type.as_deref();
        match self.value.normalized(allows_many) {
            RawValue::Single(value) => convert_scalar(name, &value, data_type),
            RawValue::Many(values) => values
                .iter()
                .map(|value| convert_scalar(name, value, data_type))
                .collect::<Result<Vec<_>>>()
                .map(CwlValue::Array),
        }
    }
}

fn convert_scalar(name: &str, value: &str, data_type: Option<&str>) -> Result<CwlValue> {
    let conversion_error = |kind: &str| RunnerError::Conversion {
        name: name.to_string(),
        value: value.to_string(),
        data_type: kind.to_string(),
    };

    match data_type.unwrap_or("string") {
        kind @ ("integer" | "int" | "long") => value
            .trim()
            .parse::<i64>()
            .map(CwlValue::Int)
            .map_err(|_| conversion_error(kind)),
        kind @ ("float" | "double") => value
            .trim()
            .parse::<f64>()
            .map(CwlValue::Float)
            .map_err(|_| conversion_error(kind)),
        kind @ ("boolean" | "bool") => parse_bool(value)
            .map(CwlValue::Boolean)
            .ok_or_else(|| conversion_error(kind)),
        _ => Ok(CwlValue::String(value.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// All inputs of one execution request, in the order the host sent them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ServiceInputs {
    inputs: IndexMap<String, InputDescriptor>,
}

impl ServiceInputs {
    pub fn new(inputs: IndexMap<String, InputDescriptor>) -> Self {
        Self { inputs }
    }

    /// Parses inputs from JSON or YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| RunnerError::HostDocument {
            document: "inputs",
            source,
        })
    }

    /// Loads inputs from a JSON or YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RunnerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: InputDescriptor) {
        self.inputs.insert(name.into(), descriptor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.inputs.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn descriptor(&self, name: &str) -> Option<&InputDescriptor> {
        self.inputs.get(name)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Returns the converted value of one input.
    pub fn get_input_value(&self, name: &str) -> Result<CwlValue> {
        self.inputs
            .get(name)
            .ok_or_else(|| RunnerError::InputNotFound(name.to_string()))?
            .convert(name)
    }

    /// Converts every input, keeping the host's order.
    pub fn get_processing_parameters(&self) -> Result<IndexMap<String, CwlValue>> {
        let mut parameters = IndexMap::with_capacity(self.inputs.len());
        for (name, descriptor) in &self.inputs {
            let value = descriptor.convert(name)?;
            debug!("Input '{}' -> {:?}", name, value);
            parameters.insert(name.clone(), value);
        }
        Ok(parameters)
    }
}

impl fmt::Display for ServiceInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inputs [{}]",
            self.inputs.len(),
            self.names().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> ServiceInputs {
        ServiceInputs::parse(
            r#"
{
  "aoi": {"dataType": "string", "value": "-118.98,33.76,-118.33,34.35"},
  "resolution": {"dataType": "integer", "value": "10"},
  "threshold": {"dataType": "float", "value": "0.25"},
  "mask": {"dataType": "boolean", "value": "1"},
  "bands": {"dataType": "string", "value": "B03", "maxOccurs": "999"},
  "item": {
    "cacheFile": "/tmp/zoo/cache/item.json",
    "mimeType": "application/json",
    "value": "https://x/item.json"
  },
  "scene": {"cacheFile": "/tmp/zoo/cache/scene.tif"},
  "mode": {"dataType": "enumeration", "value": "fast"},
  "note": {"value": "plain"}
}
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_scalar_conversions() {
        let params = sample_inputs().get_processing_parameters().unwrap();

        assert_eq!(params["aoi"], CwlValue::from("-118.98,33.76,-118.33,34.35"));
        assert_eq!(params["resolution"], CwlValue::Int(10));
        assert_eq!(params["threshold"], CwlValue::Float(0.25));
        assert_eq!(params["mask"], CwlValue::Boolean(true));
        assert_eq!(params["mode"], CwlValue::from("fast"));
        assert_eq!(params["note"], CwlValue::from("plain"));
    }

    #[test]
    fn test_every_entry_converted_in_order() {
        let inputs = sample_inputs();
        let params = inputs.get_processing_parameters().unwrap();

        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys, inputs.names());
    }

    #[test]
    fn test_scalar_with_max_occurs_becomes_list() {
        let params = sample_inputs().get_processing_parameters().unwrap();
        let bands = CwlValue::Array(vec![CwlValue::from("B03")]);
        assert_eq!(params["bands"], bands);
    }

    #[test]
    fn test_array_elements_converted_individually() {
        let raw = RawValue::from(vec!["1", "2"]);
        let descriptor = InputDescriptor::new(raw, Some("integer"))
            .with_max_occurs(MaxOccurs::Unbounded);
        assert_eq!(
            descriptor.convert("levels").unwrap(),
            CwlValue::Array(vec![CwlValue::Int(1), CwlValue::Int(2)])
        );

        let wrapped = InputDescriptor::new("7", Some("integer"))
            .with_max_occurs(MaxOccurs::Bounded(5));
        let expected = CwlValue::Array(vec![CwlValue::Int(7)]);
        assert_eq!(wrapped.convert("levels").unwrap(), expected);
    }

    #[test]
    fn test_max_occurs_one_stays_scalar() {
        let descriptor = InputDescriptor::new("7", Some("integer"))
            .with_max_occurs(MaxOccurs::Bounded(1));
        assert_eq!(descriptor.convert("level").unwrap(), CwlValue::Int(7));
    }

    #[test]
    fn test_cache_file_becomes_file_reference() {
        let params = sample_inputs().get_processing_parameters().unwrap();

        assert_eq!(
            params["item"],
            CwlValue::File(FileRef::new(
                "/tmp/zoo/cache/item.json",
                Some("application/json".to_string())
            ))
        );
        assert_eq!(
            params["scene"],
            CwlValue::File(FileRef::new("/tmp/zoo/cache/scene.tif", None))
        );
    }

    #[test]
    fn test_file_never_converted_numerically() {
        let mut descriptor = InputDescriptor::cached_file("/tmp/cache/42", Some("image/tiff"));
        descriptor.data_type = Some("integer".to_string());

        let first = descriptor.convert("dem").unwrap();
        let second = descriptor.convert("dem").unwrap();
        assert_eq!(first, second);
        assert!(first.as_file().is_some());
    }

    #[test]
    fn test_cache_file_list_with_max_occurs() {
        let descriptor = InputDescriptor::cached_file("/tmp/cache/a.tif", None)
            .with_max_occurs(MaxOccurs::Unbounded);
        let value = descriptor.convert("scenes").unwrap();
        assert_eq!(
            value,
            CwlValue::Array(vec![CwlValue::File(FileRef::new("/tmp/cache/a.tif", None))])
        );
    }

    #[test]
    fn test_conversion_failure_surfaces() {
        let content = r#"{"threshold": {"dataType": "float", "value": "high"}}"#;
        let inputs = ServiceInputs::parse(content).unwrap();

        match inputs.get_processing_parameters() {
            Err(RunnerError::Conversion {
                name,
                value,
                data_type,
            }) => {
                assert_eq!(name, "threshold");
                assert_eq!(value, "high");
                assert_eq!(data_type, "float");
            }
            other => panic!("Expected conversion failure, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_conventions() {
        let cases = [
            ("1", true),
            ("true", true),
            ("TRUE", true),
            ("0", false),
            ("false", false),
        ];
        for (raw, expected) in cases {
            let value = InputDescriptor::new(raw, Some("boolean")).convert("flag");
            assert_eq!(value.unwrap(), CwlValue::Boolean(expected));
        }
        let invalid = InputDescriptor::new("maybe", Some("boolean"));
        assert!(invalid.convert("flag").is_err());
    }

    #[test]
    fn test_get_input_value() {
        let inputs = sample_inputs();
        let resolution = inputs.get_input_value("resolution").unwrap();
        assert_eq!(resolution, CwlValue::Int(10));

        match inputs.get_input_value("missing") {
            Err(RunnerError::InputNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("expected a missing input, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_host_values_are_stringified() {
        let content = r#"{"n": {"dataType": "integer", "value": 5, "maxOccurs": 1}}"#;
        let inputs = ServiceInputs::parse(content).unwrap();
        assert_eq!(inputs.descriptor("n").unwrap().value, RawValue::from("5"));
        assert_eq!(inputs.get_input_value("n").unwrap(), CwlValue::Int(5));
    }

    #[test]
    fn test_null_value_is_treated_as_absent() {
        let inputs = ServiceInputs::parse(
            r#"{
                "aoi": {"value": "-121.4,38.0"},
                "stac_items": {"value": null},
                "cache": {"cacheFile": null, "value": "x"}
            }"#,
        )
        .unwrap();

        assert_eq!(inputs.len(), 3);
        let absent = InputDescriptor::default();
        assert_eq!(inputs.descriptor("stac_items"), Some(&absent));
        let stac_items = inputs.get_input_value("stac_items").unwrap();
        assert_eq!(stac_items, CwlValue::from(""));
        let cache = inputs.get_input_value("cache").unwrap();
        assert_eq!(cache, CwlValue::from("x"));
    }

    #[test]
    fn test_malformed_inputs_name_the_document() {
        match ServiceInputs::parse("[1, 2]") {
            Err(RunnerError::HostDocument { document, .. }) => assert_eq!(document, "inputs"),
            other => panic!("expected a host document error, got {:?}", other),
        }
    }

    #[test]
    fn test_max_occurs_forms() {
        let parse = |raw: &str| serde_json::from_str::<MaxOccurs>(raw);
        assert_eq!(parse("3").unwrap(), MaxOccurs::Bounded(3));
        assert_eq!(parse("\"10\"").unwrap(), MaxOccurs::Bounded(10));
        assert_eq!(parse("\"unbounded\"").unwrap(), MaxOccurs::Unbounded);
        assert!(parse("\"many\"").is_err());
        assert!(!MaxOccurs::Bounded(1).allows_many());
    }

    #[test]
    fn test_load_from_file() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("inputs.json");
        std::fs::write(&path, r#"{"aoi": {"value": "x"}}"#).unwrap();

        let inputs = ServiceInputs::load(&path).unwrap();
        assert!(inputs.contains("aoi"));
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs.to_string(), "1 inputs [aoi]");
    }
}
