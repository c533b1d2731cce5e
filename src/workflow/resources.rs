//! Resource Requirements
//!
//! Resolution of CWL `ResourceRequirement` objects and the per-field
//! "bags" the aggregator fills. A field that is not declared stays
//! `None` all the way through: it means "unconstrained", never zero.

use std::fmt;

use log::warn;
use serde::Serialize;
use serde_yaml::Value;

use super::model::{Process, Requirement, Step};

/// Class name of the CWL resource requirement.
pub const RESOURCE_REQUIREMENT: &str = "ResourceRequirement";

/// The eight numeric fields of a `ResourceRequirement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceField {
    CoresMin,
    CoresMax,
    RamMin,
    RamMax,
    TmpdirMin,
    TmpdirMax,
    OutdirMin,
    OutdirMax,
}

impl ResourceField {
    pub const ALL: [ResourceField; 8] = [
        Self::CoresMin,
        Self::CoresMax,
        Self::RamMin,
        Self::RamMax,
        Self::TmpdirMin,
        Self::TmpdirMax,
        Self::OutdirMin,
        Self::OutdirMax,
    ];

    /// Field name as written in CWL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoresMin => "coresMin",
            Self::CoresMax => "coresMax",
            Self::RamMin => "ramMin",
            Self::RamMax => "ramMax",
            Self::TmpdirMin => "tmpdirMin",
            Self::TmpdirMax => "tmpdirMax",
            Self::OutdirMin => "outdirMin",
            Self::OutdirMax => "outdirMax",
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved `ResourceRequirement`.
///
/// Cores are counts, ram/tmpdir/outdir are mebibytes. Fractional values
/// are rounded up; expression-valued fields are unknown before the run
/// and are left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmpdir_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmpdir_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdir_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdir_max: Option<u64>,
}

impl ResourceRequirement {
    /// Reads the numeric fields of a `ResourceRequirement` entry.
    pub fn from_requirement(requirement: &Requirement) -> Self {
        let mut resolved = Self::default();
        for field in ResourceField::ALL {
            if let Some(value) = requirement.fields.get(field.as_str()) {
                *resolved.slot_mut(field) = numeric_field(field, value);
            }
        }
        resolved
    }

    /// Returns the value of a field.
    pub fn get(&self, field: ResourceField) -> Option<u64> {
        match field {
            ResourceField::CoresMin => self.cores_min,
            ResourceField::CoresMax => self.cores_max,
            ResourceField::RamMin => self.ram_min,
            ResourceField::RamMax => self.ram_max,
            ResourceField::TmpdirMin => self.tmpdir_min,
            ResourceField::TmpdirMax => self.tmpdir_max,
            ResourceField::OutdirMin => self.outdir_min,
            ResourceField::OutdirMax => self.outdir_max,
        }
    }

    /// Sets the value of a field.
    pub fn with(mut self, field: ResourceField, value: u64) -> Self {
        *self.slot_mut(field) = Some(value);
        self
    }

    fn slot_mut(&mut self, field: ResourceField) -> &mut Option<u64> {
        match field {
            ResourceField::CoresMin => &mut self.cores_min,
            ResourceField::CoresMax => &mut self.cores_max,
            ResourceField::RamMin => &mut self.ram_min,
            ResourceField::RamMax => &mut self.ram_max,
            ResourceField::TmpdirMin => &mut self.tmpdir_min,
            ResourceField::TmpdirMax => &mut self.tmpdir_max,
            ResourceField::OutdirMin => &mut self.outdir_min,
            ResourceField::OutdirMax => &mut self.outdir_max,
        }
    }

    /// Multiplies every declared field; absent fields stay absent.
    pub fn scaled(&self, factor: u64) -> Self {
        let mut scaled = self.clone();
        for field in ResourceField::ALL {
            let slot = scaled.slot_mut(field);
            *slot = slot.map(|value| value.saturating_mul(factor));
        }
        scaled
    }

    /// Returns true if no field is declared.
    pub fn is_empty(&self) -> bool {
        ResourceField::ALL
            .iter()
            .all(|field| self.get(*field).is_none())
    }
}

fn numeric_field(field: ResourceField, value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => {
            let resolved = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v.ceil() as u64));
            if resolved.is_none() {
                warn!("Ignoring negative {} value: {}", field, n);
            }
            resolved
        }
        Value::String(expression) => {
            warn!(
                "{} is an expression ({}), treating it as unconstrained",
                field, expression
            );
            None
        }
        other => {
            warn!("Ignoring non-numeric {} value: {:?}", field, other);
            None
        }
    }
}

/// Anything that can carry `requirements` and `hints` lists.
pub trait HasRequirements {
    fn requirements(&self) -> &[Requirement];
    fn hints(&self) -> &[Requirement];
}

impl HasRequirements for Process {
    fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    fn hints(&self) -> &[Requirement] {
        &self.hints
    }
}

impl HasRequirements for Step {
    fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    fn hints(&self) -> &[Requirement] {
        &self.hints
    }
}

/// Looks up a `ResourceRequirement` in `requirements` first, `hints` second.
///
/// A hard requirement always wins over a hint declared on the same object.
pub fn resolve_resource_requirement<P>(process: &P) -> Option<ResourceRequirement>
where
    P: HasRequirements + ?Sized,
{
    process
        .requirements()
        .iter()
        .chain(process.hints())
        .find(|entry| entry.class == RESOURCE_REQUIREMENT)
        .map(ResourceRequirement::from_requirement)
}

/// Per-field contributions collected across a workflow.
///
/// Each bag holds one value per requirement that declared the field, in
/// step order. Whether to sum or take the maximum is the caller's call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBags {
    pub cores_min: Vec<u64>,
    pub cores_max: Vec<u64>,
    pub ram_min: Vec<u64>,
    pub ram_max: Vec<u64>,
    pub tmpdir_min: Vec<u64>,
    pub tmpdir_max: Vec<u64>,
    pub outdir_min: Vec<u64>,
    pub outdir_max: Vec<u64>,
}

impl ResourceBags {
    /// Appends every declared field of a requirement to its bag.
    pub fn push(&mut self, requirement: &ResourceRequirement) {
        for field in ResourceField::ALL {
            if let Some(value) = requirement.get(field) {
                self.bag_mut(field).push(value);
            }
        }
    }

    /// Returns the bag for a field.
    pub fn get(&self, field: ResourceField) -> &[u64] {
        match field {
            ResourceField::CoresMin => &self.cores_min,
            ResourceField::CoresMax => &self.cores_max,
            ResourceField::RamMin => &self.ram_min,
            ResourceField::RamMax => &self.ram_max,
            ResourceField::TmpdirMin => &self.tmpdir_min,
            ResourceField::TmpdirMax => &self.tmpdir_max,
            ResourceField::OutdirMin => &self.outdir_min,
            ResourceField::OutdirMax => &self.outdir_max,
        }
    }

    fn bag_mut(&mut self, field: ResourceField) -> &mut Vec<u64> {
        match field {
            ResourceField::CoresMin => &mut self.cores_min,
            ResourceField::CoresMax => &mut self.cores_max,
            ResourceField::RamMin => &mut self.ram_min,
            ResourceField::RamMax => &mut self.ram_max,
            ResourceField::TmpdirMin => &mut self.tmpdir_min,
            ResourceField::TmpdirMax => &mut self.tmpdir_max,
            ResourceField::OutdirMin => &mut self.outdir_min,
            ResourceField::OutdirMax => &mut self.outdir_max,
        }
    }

    /// Returns true if every bag is empty.
    pub fn is_empty(&self) -> bool {
        ResourceField::ALL
            .iter()
            .all(|field| self.get(*field).is_empty())
    }

    /// Sum of a bag (total capacity needed if everything runs at once).
    pub fn total(&self, field: ResourceField) -> Option<u64> {
        let bag = self.get(field);
        if bag.is_empty() {
            return None;
        }
        Some(bag.iter().fold(0u64, |sum, v| sum.saturating_add(*v)))
    }

    /// Largest entry of a bag (ceiling for a single pod).
    pub fn ceiling(&self, field: ResourceField) -> Option<u64> {
        self.get(field).iter().copied().max()
    }

    /// Core limit: largest `coresMax`, else largest `coresMin`, else `default`.
    pub fn max_cores(&self, default: u64) -> u64 {
        self.ceiling(ResourceField::CoresMax)
            .or_else(|| self.ceiling(ResourceField::CoresMin))
            .unwrap_or(default)
    }

    /// RAM limit in MiB: largest `ramMax`, else largest `ramMin`, else `default`.
    pub fn max_ram(&self, default: u64) -> u64 {
        self.ceiling(ResourceField::RamMax)
            .or_else(|| self.ceiling(ResourceField::RamMin))
            .unwrap_or(default)
    }
}
