//! Parameter Marshalling Module
//!
//! Bridges the host service's string-typed parameters and typed CWL values.
//!
//! - [`inputs`]: Host input descriptors to [`CwlValue`]s
//! - [`outputs`]: Backend results back into host output descriptors
//! - [`value`]: The typed value representation

pub mod inputs;
pub mod outputs;
pub mod value;

pub use inputs::{InputDescriptor, MaxOccurs, RawValue, ServiceInputs};
pub use outputs::{OutputDescriptor, ServiceOutputs};
pub use value::{CwlValue, FileRef};
