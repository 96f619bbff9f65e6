//! Stage 2: integration
//!
//! The integration role merges every specialist proposal into one design.
//! Its answer is checked before it is accepted: the dependency tree must
//! cover exactly the files of the merged folder tree, and the graph is
//! normalized so synthesis can walk it in order.

use super::extractor::extract_json;
use super::graph::{canonical_key, normalize_graph};
use super::model::{file_name, DependencyFile, FolderNode, IntegratedDesign, SpecialistVision};
use super::prompts::PromptTemplates;
use super::roles::INTEGRATION_ROLE;
use super::{PipelineError, Result, Stage};
use crate::config::StageSettings;
use crate::llm::LLMProvider;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Integrator {
    provider: Arc<dyn LLMProvider>,
    settings: StageSettings,
}

impl Integrator {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: StageSettings) -> Self {
        Self { provider, settings }
    }

    /// Merge `visions` into one integrated design
    pub async fn integrate(&self, requirements: &[String], visions: &[SpecialistVision]) -> Result<IntegratedDesign> {
        if visions.is_empty() {
            return Err(PipelineError::InvalidInput("integration needs at least one specialist vision".to_string()));
        }

        info!("Integrating {} specialist visions", visions.len());

        let request = self.settings.request(
            PromptTemplates::integration_system(&INTEGRATION_ROLE),
            PromptTemplates::integration_user(requirements, visions),
        );
        debug!("Integration prompt is {} chars", request.prompt_chars());

        let raw = self.provider.complete(request).await?;
        let value = extract_json(&raw)?;

        let design = parse_integration(&value, visions)?;
        info!(
            "Integrated design has {} files and {} resolution notes",
            design.dependency_tree.len(),
            design.resolution_notes.len()
        );
        Ok(design)
    }
}

/// Validate and normalize an integration response
pub fn parse_integration(value: &Value, visions: &[SpecialistVision]) -> Result<IntegratedDesign> {
    let object = value.as_object().ok_or_else(|| invalid("response is not a JSON object"))?;

    let integrated_vision = object
        .get("integratedVision")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| invalid("missing integratedVision"))?
        .to_string();

    let mut resolution_notes = match object.get("resolutionNotes") {
        Some(Value::Array(items)) => items.iter().filter_map(render_note).collect(),
        Some(Value::String(note)) if !note.trim().is_empty() => vec![note.trim().to_string()],
        _ => Vec::new(),
    };

    let root = object.get("rootFolder").ok_or_else(|| invalid("missing rootFolder"))?;
    let root_folder: FolderNode =
        serde_json::from_value(root.clone()).map_err(|e| invalid(&format!("rootFolder is malformed: {}", e)))?;

    let tree = object.get("dependencyTree").ok_or_else(|| invalid("missing dependencyTree"))?;
    let dependency_tree: Vec<DependencyFile> =
        serde_json::from_value(tree.clone()).map_err(|e| invalid(&format!("dependencyTree is malformed: {}", e)))?;
    if dependency_tree.is_empty() {
        return Err(invalid("dependencyTree is empty"));
    }

    let prefix = root_prefix(&root_folder);
    let graph = normalize_graph(dependency_tree, prefix.as_deref());
    resolution_notes.extend(graph.notes);

    check_completeness(&root_folder, &graph.files, prefix.as_deref())?;
    resolution_notes.extend(coverage_notes(visions, &root_folder));

    Ok(IntegratedDesign { integrated_vision, resolution_notes, root_folder, dependency_tree: graph.files })
}

/// The root name is stripped from paths unless it is also a real top-level folder
fn root_prefix(root: &FolderNode) -> Option<String> {
    let name = root.name.trim();
    if name.is_empty() || root.subfolders.iter().any(|f| f.name.trim() == name) {
        None
    } else {
        Some(name.to_string())
    }
}

/// Every tree file must be in the graph and every graph file in the tree
fn check_completeness(root: &FolderNode, files: &[DependencyFile], prefix: Option<&str>) -> Result<()> {
    let tree_keys: BTreeSet<String> =
        root.file_paths().iter().map(|p| canonical_key(p, prefix)).collect();
    let graph_keys: BTreeSet<String> = files.iter().map(|f| f.path.clone()).collect();

    let missing_from_graph: Vec<String> = tree_keys.difference(&graph_keys).cloned().collect();
    let missing_from_tree: Vec<String> = graph_keys.difference(&tree_keys).cloned().collect();

    if missing_from_graph.is_empty() && missing_from_tree.is_empty() {
        return Ok(());
    }

    warn!(
        "Dependency graph mismatch: {} files missing from graph, {} missing from tree",
        missing_from_graph.len(),
        missing_from_tree.len()
    );
    Err(PipelineError::IncompleteGraph { missing_from_graph, missing_from_tree })
}

/// Notes for specialist files the merged tree moved or dropped
///
/// A file is carried over only when its full path is in the merged tree. A
/// file whose name appears elsewhere in the merged tree is reported as moved.
fn coverage_notes(visions: &[SpecialistVision], root: &FolderNode) -> Vec<String> {
    let merged: BTreeSet<String> = root.file_paths().into_iter().collect();
    let mut notes = Vec::new();

    for vision in visions {
        let mut moved = Vec::new();
        let mut dropped = Vec::new();

        for path in vision.proposed_tree.file_paths() {
            if merged.contains(&path) {
                continue;
            }
            let name = file_name(&path);
            let elsewhere: Vec<&str> =
                merged.iter().filter(|m| file_name(m) == name).map(String::as_str).collect();
            if elsewhere.is_empty() {
                dropped.push(path);
            } else {
                moved.push(format!("{} (merged as {})", path, elsewhere.join(" or ")));
            }
        }

        if !moved.is_empty() {
            debug!("{} had {} files placed elsewhere in the merged tree", vision.role, moved.len());
            notes.push(format!("Moved from {}: {}", vision.role, moved.join(", ")));
        }
        if !dropped.is_empty() {
            warn!("{} proposed {} files not in the merged tree", vision.role, dropped.len());
            notes.push(format!("Not carried over from {}: {}", vision.role, dropped.join(", ")));
        }
    }

    notes
}

fn render_note(note: &Value) -> Option<String> {
    match note {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(key, value)| match value {
                    Value::String(text) => format!("{}: {}", key, text),
                    other => format!("{}: {}", key, other),
                })
                .collect();
            Some(parts.join("; ")).filter(|t| !t.is_empty())
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn invalid(message: &str) -> PipelineError {
    PipelineError::InvalidResponse { stage: Stage::Integration, message: message.to_string() }
}
