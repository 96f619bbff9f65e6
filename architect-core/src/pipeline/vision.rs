//! Stage 1: specialist visions

use super::extractor::extract_json;
use super::model::{FolderNode, SpecialistVision};
use super::prompts::PromptTemplates;
use super::roles::{role_by_name, SpecialistRole};
use super::{PipelineError, Result, Stage};
use crate::config::StageSettings;
use crate::llm::LLMProvider;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Fields a proposed tree root must carry
const REQUIRED_TREE_FIELDS: [&str; 3] = ["name", "description", "purpose"];

/// Produces one vision per specialist role
pub struct VisionGenerator {
    provider: Arc<dyn LLMProvider>,
    settings: StageSettings,
}

impl VisionGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: StageSettings) -> Self {
        Self { provider, settings }
    }

    /// Ask `role` for its vision of the project
    ///
    /// Exactly one provider call. Provider, extraction and parse errors are
    /// returned unchanged; a response without a usable tree is an
    /// `InvalidResponse`, never replaced by a default tree.
    pub async fn generate_vision(
        &self,
        requirements: &[String],
        role: &str,
        role_index: usize,
        total_roles: usize,
    ) -> Result<SpecialistVision> {
        if requirements.is_empty() {
            return Err(PipelineError::InvalidInput("requirements must not be empty".to_string()));
        }
        let role = role_by_name(role)
            .ok_or_else(|| PipelineError::InvalidInput(format!("unknown specialist role '{}'", role)))?;

        info!("Generating vision {}/{} for {}", role_index + 1, total_roles, role.name);

        let request = self.settings.request(
            PromptTemplates::vision_system(role),
            PromptTemplates::vision_user(requirements, role, role_index, total_roles),
        );
        debug!("Vision prompt for {} is {} chars", role.name, request.prompt_chars());

        let raw = self.provider.complete(request).await?;
        let value = extract_json(&raw)?;

        parse_vision(role, &value)
    }
}

/// Validate and decode a vision response for `role`
pub fn parse_vision(role: &SpecialistRole, value: &Value) -> Result<SpecialistVision> {
    let object = value.as_object().ok_or_else(|| invalid("response is not a JSON object"))?;

    let vision_text = object
        .get("visionText")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| invalid("missing visionText"))?
        .to_string();

    let tree = object.get("proposedTree").ok_or_else(|| invalid("missing proposedTree"))?;
    let tree_object = tree.as_object().ok_or_else(|| invalid("proposedTree is not an object"))?;

    let missing: Vec<&str> = REQUIRED_TREE_FIELDS
        .iter()
        .copied()
        .filter(|field| !tree_object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(invalid(&format!("proposedTree is missing {}", missing.join(", "))));
    }

    let proposed_tree: FolderNode = serde_json::from_value(tree.clone())
        .map_err(|e| invalid(&format!("proposedTree is malformed: {}", e)))?;

    let expertise = object
        .get("expertise")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(role.expertise)
        .to_string();

    Ok(SpecialistVision { role: role.name.to_string(), expertise, vision_text, proposed_tree })
}

fn invalid(message: &str) -> PipelineError {
    PipelineError::InvalidResponse { stage: Stage::Specialists, message: message.to_string() }
}
