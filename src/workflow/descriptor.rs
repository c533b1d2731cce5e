//! Workflow Descriptor
//!
//! Wraps a parsed CWL document around one selected workflow and answers
//! the questions a runner asks before execution: metadata, declared
//! inputs and outputs, and how much CPU/RAM/disk the graph asks for.

use std::path::Path;

use log::{debug, info, warn};
use serde::Serialize;
use serde_yaml::Value;

use super::model::{fragment, CwlDocument, InputParameter, Process, RunTarget, Step};
use super::parser::load_document;
use super::resources::{self, HasRequirements, ResourceBags, ResourceRequirement};
use crate::error::{Result, RunnerError};

/// Default scatter fan-out assumed when estimating resources.
pub const DEFAULT_SCATTER_MULTIPLIER: u64 = 2;

/// Descriptive metadata of a workflow. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowMetadata {
    pub version: Option<String>,
    pub label: Option<String>,
    pub doc: Option<String>,
}

/// A CWL document with one workflow selected by identifier.
///
/// # Example
///
/// ```rust,no_run
/// use cwlrunner::workflow::CwlWorkflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = CwlWorkflow::load("app-package.cwl", "main")?;
///     println!("Inputs: {:?}", workflow.list_inputs(true));
///
///     let bags = workflow.evaluate_resources(2);
///     println!("Peak cores: {}", bags.max_cores(1));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CwlWorkflow {
    document: CwlDocument,
    index: usize,
}

impl CwlWorkflow {
    /// Selects the process with the given identifier.
    pub fn new(document: CwlDocument, workflow_id: &str) -> Result<Self> {
        let id = fragment(workflow_id);
        let index = document
            .processes
            .iter()
            .position(|process| process.id == id)
            .ok_or_else(|| RunnerError::WorkflowNotFound(workflow_id.to_string()))?;

        info!("Selected workflow '{}' from CWL document", id);
        Ok(Self { document, index })
    }

    /// Loads a document from disk and selects a workflow in it.
    pub fn load(path: impl AsRef<Path>, workflow_id: &str) -> Result<Self> {
        Self::new(load_document(path)?, workflow_id)
    }

    /// The selected process object.
    pub fn workflow(&self) -> &Process {
        &self.document.processes[self.index]
    }

    pub fn id(&self) -> &str {
        &self.workflow().id
    }

    pub fn document(&self) -> &CwlDocument {
        &self.document
    }

    /// The document exactly as it was read.
    pub fn raw_document(&self) -> &Value {
        &self.document.raw
    }

    pub fn cwl_version(&self) -> Option<&str> {
        self.document.cwl_version.as_deref()
    }

    /// Software version of the workflow, falling back to the document level.
    pub fn version(&self) -> Option<&str> {
        self.workflow()
            .software_version
            .as_deref()
            .or(self.document.software_version.as_deref())
    }

    pub fn label(&self) -> Option<&str> {
        self.workflow().label.as_deref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.workflow().doc.as_deref()
    }

    /// Returns version, label and doc. Never fails.
    pub fn metadata(&self) -> WorkflowMetadata {
        WorkflowMetadata {
            version: self.version().map(str::to_string),
            label: self.label().map(str::to_string),
            doc: self.doc().map(str::to_string),
        }
    }

    /// Names of the declared inputs, in declaration order.
    ///
    /// With `mandatory_only`, inputs that have a default, accept `null`
    /// or allow zero occurrences are left out.
    pub fn list_inputs(&self, mandatory_only: bool) -> Vec<String> {
        self.workflow()
            .inputs
            .iter()
            .filter(|input| !mandatory_only || input.is_mandatory())
            .map(|input| input.name().to_string())
            .collect()
    }

    /// Names of the declared outputs, in declaration order.
    pub fn list_outputs(&self) -> Vec<String> {
        self.workflow()
            .outputs
            .iter()
            .map(|output| output.name().to_string())
            .collect()
    }

    /// Looks up a declared input by short name.
    pub fn input(&self, name: &str) -> Option<&InputParameter> {
        self.workflow()
            .inputs
            .iter()
            .find(|input| input.name() == name)
    }

    /// Resolves the `ResourceRequirement` of any process-like object.
    ///
    /// `requirements` are searched before `hints`; `None` means nothing
    /// is declared on this object.
    pub fn resolve_resource_requirement<P>(process: &P) -> Option<ResourceRequirement>
    where
        P: HasRequirements + ?Sized,
    {
        resources::resolve_resource_requirement(process)
    }

    /// Collects the resource contributions of the whole workflow.
    ///
    /// The workflow's own requirement comes first, then every step in
    /// declaration order. A step's requirement is its own, or else the
    /// one of the process it runs. Scattered steps are scaled by
    /// `scatter_multiplier`; nested workflows are folded into the same
    /// bags, inheriting the scaling of the step that runs them.
    pub fn evaluate_resources(&self, scatter_multiplier: u64) -> ResourceBags {
        let workflow = self.workflow();
        let mut bags = ResourceBags::default();

        if let Some(requirement) = Self::resolve_resource_requirement(workflow) {
            debug!("Workflow '{}' requirement: {:?}", workflow.id, requirement);
            bags.push(&requirement);
        }

        let mut stack = vec![workflow.id.clone()];
        self.fold_steps(workflow, 1, scatter_multiplier, &mut stack, &mut bags);

        bags
    }

    fn fold_steps(
        &self,
        process: &Process,
        factor: u64,
        scatter_multiplier: u64,
        stack: &mut Vec<String>,
        bags: &mut ResourceBags,
    ) {
        for step in &process.steps {
            let target = self.run_target(step);

            let step_factor = if step.is_scattered() {
                debug!(
                    "Step '{}' scatters over {:?}, multiplying by {}",
                    step.name(),
                    step.scatter,
                    scatter_multiplier
                );
                factor.saturating_mul(scatter_multiplier)
            } else {
                factor
            };

            let requirement = Self::resolve_resource_requirement(step)
                .or_else(|| target.and_then(|t| Self::resolve_resource_requirement(t)));

            if let Some(requirement) = requirement {
                let requirement = requirement.scaled(step_factor);
                debug!("Step '{}' requirement: {:?}", step.name(), requirement);
                bags.push(&requirement);
            }

            let Some(target) = target.filter(|t| t.is_workflow()) else {
                continue;
            };

            if !target.id.is_empty() && stack.contains(&target.id) {
                warn!(
                    "Step '{}' runs '{}' which is already being expanded, skipping",
                    step.name(),
                    target.id
                );
                continue;
            }

            stack.push(target.id.clone());
            self.fold_steps(target, step_factor, scatter_multiplier, stack, bags);
            stack.pop();
        }
    }

    /// Resolves the process a step runs, if it is inline or in this document.
    fn run_target<'a>(&'a self, step: &'a Step) -> Option<&'a Process> {
        match &step.run {
            RunTarget::Inline(process) => Some(process.as_ref()),
            RunTarget::Reference(reference) => {
                let found = self.document.find_process(reference);
                if found.is_none() {
                    warn!(
                        "Step '{}' runs '{}' which is not in this document",
                        step.name(),
                        reference
                    );
                }
                found
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::parser::parse_document;
    use crate::workflow::resources::ResourceField;

    const TWO_PROCESSES: &str = r##"
cwlVersion: v1.2
s:softwareVersion: 1.0.0
$graph:
  - class: Workflow
    id: main
    label: Water bodies detection
    doc: Detects water bodies using NDWI and Otsu thresholding
    inputs:
      aoi:
        type: string
      bands:
        type: string[]
      epsg:
        type: string
        default: EPSG:4326
      stac_items:
        type: string[]?
      threshold:
        type: float
        minOccurs: 0
    outputs:
      stac_catalog:
        type: Directory
        outputSource: detect/results
    steps:
      detect:
        run: "#detect-tool"
  - class: CommandLineTool
    id: detect-tool
    requirements:
      ResourceRequirement:
        coresMin: 2
        ramMin: 2048
"##;

    fn workflow(yaml: &str, id: &str) -> CwlWorkflow {
        CwlWorkflow::new(parse_document(yaml).unwrap(), id).unwrap()
    }

    #[test]
    fn test_selects_workflow_in_graph() {
        let wf = workflow(TWO_PROCESSES, "main");
        assert_eq!(wf.id(), "main");
        assert!(wf.workflow().is_workflow());

        let wf = workflow(TWO_PROCESSES, "#main");
        assert_eq!(wf.id(), "main");
    }

    #[test]
    fn test_missing_workflow_is_not_found() {
        let document = parse_document(TWO_PROCESSES).unwrap();
        let result = CwlWorkflow::new(document, "not-main");

        match result {
            Err(RunnerError::WorkflowNotFound(id)) => assert_eq!(id, "not-main"),
            other => panic!("Expected WorkflowNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata() {
        let wf = workflow(TWO_PROCESSES, "main");
        let metadata = wf.metadata();

        assert_eq!(metadata.version.as_deref(), Some("1.0.0"));
        assert_eq!(metadata.label.as_deref(), Some("Water bodies detection"));
        assert!(metadata.doc.unwrap().contains("NDWI"));
        assert_eq!(wf.cwl_version(), Some("v1.2"));
    }

    #[test]
    fn test_metadata_absent_fields() {
        let wf = workflow(
            "$graph:\n  - class: Workflow\n    id: bare\n    steps: []\n",
            "bare",
        );
        assert_eq!(wf.metadata(), WorkflowMetadata::default());
    }

    #[test]
    fn test_workflow_version_overrides_document_version() {
        let wf = workflow(
            r#"
s:softwareVersion: 1.0.0
$graph:
  - class: Workflow
    id: main
    s:softwareVersion: 2.1.0
"#,
            "main",
        );
        assert_eq!(wf.version(), Some("2.1.0"));
    }

    #[test]
    fn test_list_inputs() {
        let wf = workflow(TWO_PROCESSES, "main");

        let all = wf.list_inputs(false);
        assert_eq!(all, vec!["aoi", "bands", "epsg", "stac_items", "threshold"]);

        let mandatory = wf.list_inputs(true);
        assert_eq!(mandatory, vec!["aoi", "bands"]);
    }

    #[test]
    fn test_mandatory_inputs_are_ordered_subset() {
        let wf = workflow(TWO_PROCESSES, "main");
        let all = wf.list_inputs(false);
        let mandatory = wf.list_inputs(true);

        let positions: Vec<usize> = mandatory
            .iter()
            .map(|name| all.iter().position(|n| n == name).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_list_outputs_and_input_lookup() {
        let wf = workflow(TWO_PROCESSES, "main");
        assert_eq!(wf.list_outputs(), vec!["stac_catalog"]);
        assert!(wf.input("aoi").is_some());
        assert!(wf.input("missing").is_none());
    }

    #[test]
    fn test_resources_single_step() {
        let wf = workflow(TWO_PROCESSES, "main");
        let bags = wf.evaluate_resources(DEFAULT_SCATTER_MULTIPLIER);

        assert_eq!(bags.cores_min, vec![2]);
        assert_eq!(bags.ram_min, vec![2048]);
        for field in [
            ResourceField::CoresMax,
            ResourceField::RamMax,
            ResourceField::TmpdirMin,
            ResourceField::TmpdirMax,
            ResourceField::OutdirMin,
            ResourceField::OutdirMax,
        ] {
            assert!(bags.get(field).is_empty(), "{} should be empty", field);
        }
    }

    #[test]
    fn test_resources_scattered_step() {
        let scattered = TWO_PROCESSES.replace(
            "        run: \"#detect-tool\"",
            "        run: \"#detect-tool\"\n        scatter: bands",
        );
        let wf = workflow(&scattered, "main");
        let bags = wf.evaluate_resources(3);

        assert_eq!(bags.cores_min, vec![6]);
        assert_eq!(bags.ram_min, vec![6144]);
        assert!(bags.cores_max.is_empty());
    }

    #[test]
    fn test_resources_none_declared() {
        let wf = workflow(
            r##"
$graph:
  - class: Workflow
    id: main
    steps:
      a:
        run: "#tool"
      b:
        run:
          class: CommandLineTool
  - class: CommandLineTool
    id: tool
"##,
            "main",
        );

        let bags = wf.evaluate_resources(2);
        assert!(bags.is_empty());
        assert_eq!(bags, ResourceBags::default());
    }

    #[test]
    fn test_resources_step_overrides_tool_and_workflow_first() {
        let wf = workflow(
            r##"
$graph:
  - class: Workflow
    id: main
    hints:
      ResourceRequirement:
        coresMax: 16
    steps:
      first:
        run: "#tool"
        requirements:
          ResourceRequirement:
            coresMin: 1
      second:
        run: "#tool"
  - class: CommandLineTool
    id: tool
    requirements:
      ResourceRequirement:
        coresMin: 4
"##,
            "main",
        );

        let bags = wf.evaluate_resources(2);
        assert_eq!(bags.cores_max, vec![16]);
        assert_eq!(bags.cores_min, vec![1, 4]);
    }

    #[test]
    fn test_resources_nested_workflow_flattened() {
        let wf = workflow(
            r##"
$graph:
  - class: Workflow
    id: main
    steps:
      stage:
        run: "#stage-tool"
      process:
        run: "#sub"
        scatter: item
  - class: CommandLineTool
    id: stage-tool
    requirements:
      ResourceRequirement:
        ramMin: 512
  - class: Workflow
    id: sub
    requirements:
      ResourceRequirement:
        coresMin: 1
    steps:
      inner:
        run:
          class: CommandLineTool
          hints:
            ResourceRequirement:
              coresMin: 2
              outdirMin: 100
        scatter: tile
"##,
            "main",
        );

        let bags = wf.evaluate_resources(2);
        // sub's own requirement scaled by the outer scatter, inner by both
        assert_eq!(bags.ram_min, vec![512]);
        assert_eq!(bags.cores_min, vec![2, 8]);
        assert_eq!(bags.outdir_min, vec![400]);
    }

    #[test]
    fn test_resources_reference_cycle_terminates() {
        let wf = workflow(
            r##"
$graph:
  - class: Workflow
    id: main
    steps:
      loop:
        run: "#main"
        requirements:
          ResourceRequirement:
            coresMin: 1
"##,
            "main",
        );

        let bags = wf.evaluate_resources(2);
        assert_eq!(bags.cores_min, vec![1]);
    }

    #[test]
    fn test_uri_identifiers_resolve() {
        let yaml = r##"
$graph:
  - class: Workflow
    id: "file:///tmp/app.cwl#main"
    inputs:
      - id: "file:///tmp/app.cwl#main/aoi"
        type: string
    steps:
      - id: "file:///tmp/app.cwl#main/detect"
        run: "file:///tmp/app.cwl#detect-tool"
        scatter: "file:///tmp/app.cwl#main/detect/aoi"
  - class: CommandLineTool
    id: "file:///tmp/app.cwl#detect-tool"
    requirements:
      ResourceRequirement:
        coresMin: 2
"##;
        let wf = workflow(yaml, "main");
        assert_eq!(wf.id(), "main");
        assert_eq!(wf.list_inputs(false), vec!["aoi"]);

        let wf = workflow(yaml, "file:///tmp/app.cwl#main");
        assert_eq!(wf.evaluate_resources(3).cores_min, vec![6]);
    }

    #[test]
    fn test_resources_unknown_reference_is_skipped() {
        let yaml = r#"
$graph:
  - class: Workflow
    id: main
    steps:
      a:
        run: other.cwl
"#;
        let wf = workflow(yaml, "main");
        assert!(wf.evaluate_resources(2).is_empty());
    }

    #[test]
    fn test_resolve_is_usable_on_steps() {
        let wf = workflow(TWO_PROCESSES, "main");
        let step = &wf.workflow().steps[0];
        assert!(CwlWorkflow::resolve_resource_requirement(step).is_none());

        let tool = wf.document().find_process("detect-tool").unwrap();
        let requirement = CwlWorkflow::resolve_resource_requirement(tool).unwrap();
        assert_eq!(requirement.cores_min, Some(2));
    }
}
