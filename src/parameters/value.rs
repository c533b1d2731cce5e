//! Typed CWL Values
//!
//! The values a runner hands to a CWL engine as a job order. They
//! serialize to the JSON shape CWL expects, e.g. files become
//! `{"class": "File", "path": ..., "format": ...}`.

use serde::Serialize;

/// A reference to a file staged by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename = "File")]
pub struct FileRef {
    pub path: String,

    /// MIME type of the file, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl FileRef {
    pub fn new(path: impl Into<String>, format: Option<String>) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CwlValue {
    Int(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    File(FileRef),
    Array(Vec<CwlValue>),
}

impl CwlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}

impl From<i64> for CwlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CwlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CwlValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for CwlValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CwlValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<FileRef> for CwlValue {
    fn from(value: FileRef) -> Self {
        Self::File(value)
    }
}
