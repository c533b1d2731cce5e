//! Host Capacity
//!
//! Compares the resources a workflow asks for with what the local
//! machine offers, so an operator can see early that a run will not
//! fit on a single node.

use sysinfo::System;

use crate::workflow::{ResourceBags, ResourceField};

/// CPU and memory available on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapacity {
    pub cores: u64,
    pub memory_mib: u64,
}

impl HostCapacity {
    pub fn new(cores: u64, memory_mib: u64) -> Self {
        Self { cores, memory_mib }
    }

    /// Reads the logical core count and total memory of this machine.
    pub fn detect() -> Self {
        let mut system = System::new();
        system.refresh_memory();

        Self {
            cores: num_cpus::get() as u64,
            memory_mib: system.total_memory() / (1024 * 1024),
        }
    }

    /// Returns one warning per limit the workflow's largest request exceeds.
    pub fn check(&self, bags: &ResourceBags) -> Vec<String> {
        let mut warnings = Vec::new();

        for field in [ResourceField::CoresMin, ResourceField::CoresMax] {
            if let Some(ceiling) = bags.ceiling(field).filter(|c| *c > self.cores) {
                warnings.push(format!(
                    "{} of {} exceeds the {} cores of this host",
                    field, ceiling, self.cores
                ));
            }
        }

        for field in [ResourceField::RamMin, ResourceField::RamMax] {
            if let Some(ceiling) = bags.ceiling(field).filter(|c| *c > self.memory_mib) {
                warnings.push(format!(
                    "{} of {} MiB exceeds the {} MiB of memory of this host",
                    field, ceiling, self.memory_mib
                ));
            }
        }

        warnings
    }

    /// Human-readable one-liner.
    pub fn summary(&self) -> String {
        format!(
            "Host capacity: {} cores, {} MiB memory",
            self.cores, self.memory_mib
        )
    }
}
