//! Workflow Definition Module
//!
//! Provides data structures and utilities for reading CWL documents and
//! reasoning about the workflow they describe.
//!
//! # Structure
//!
//! - [`model`]: Typed CWL process, parameter and step structures
//! - [`parser`]: YAML/JSON loading, `$graph` handling
//! - [`descriptor`]: Workflow selection, metadata, input listing, resource aggregation
//! - [`resources`]: `ResourceRequirement` resolution and per-field bags

pub mod descriptor;
pub mod model;
pub mod parser;
pub mod resources;

pub use descriptor::{CwlWorkflow, WorkflowMetadata, DEFAULT_SCATTER_MULTIPLIER};
pub use model::{CwlDocument, CwlType, InputParameter, OutputParameter, Process, ProcessClass, Step};
pub use parser::{load_document, parse_document};
pub use resources::{resolve_resource_requirement, ResourceBags, ResourceField, ResourceRequirement};
