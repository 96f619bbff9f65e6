//! Prompt templates for the three stages
//!
//! Every template asks for a single JSON object so the response extractor
//! has one shape to look for.

use super::model::{DependencyFile, FileImplementation, SpecialistVision};
use super::roles::SpecialistRole;

/// Header that introduces each dependency artifact in a synthesis prompt
pub const DEPENDENCY_HEADER: &str = "### Dependency:";

/// Prompt templates for vision, integration and synthesis
pub struct PromptTemplates;

impl PromptTemplates {
    /// System prompt for one Stage 1 specialist
    pub fn vision_system(role: &SpecialistRole) -> String {
        format!(
            "You are a {} on a software architecture panel.\n\
             Your expertise: {}\n\n\
             Describe how you would architect the project from your point of view and \
             propose a complete folder structure for it. Respond with a single JSON object \
             and nothing else.",
            role.name, role.expertise
        )
    }

    /// User message for one Stage 1 specialist
    pub fn vision_user(requirements: &[String], role: &SpecialistRole, index: usize, total: usize) -> String {
        format!(
            "Project requirements:\n{}\n\n\
             You are specialist {} of {} ({}).\n\n\
             Respond with JSON of this shape:\n\
             {{\n\
             \x20 \"visionText\": \"your architectural vision\",\n\
             \x20 \"expertise\": \"one line describing your focus\",\n\
             \x20 \"proposedTree\": {{\n\
             \x20   \"name\": \"project-root\",\n\
             \x20   \"description\": \"...\",\n\
             \x20   \"purpose\": \"...\",\n\
             \x20   \"files\": [{{\"name\": \"...\", \"description\": \"...\", \"purpose\": \"...\"}}],\n\
             \x20   \"subfolders\": [ /* same shape, recursively */ ]\n\
             \x20 }}\n\
             }}",
            bullet_list(requirements),
            index + 1,
            total,
            role.name
        )
    }

    /// System prompt for the integration role
    pub fn integration_system(role: &SpecialistRole) -> String {
        format!(
            "You are the {}. {}\n\n\
             You receive the proposals of several specialists. Merge them into one design, \
             record every disagreement you resolved, and produce a dependency graph that \
             covers every file in the merged tree. Respond with a single JSON object and \
             nothing else.",
            role.name, role.expertise
        )
    }

    /// User message for the integration role
    pub fn integration_user(requirements: &[String], visions: &[SpecialistVision]) -> String {
        let mut proposals = String::new();
        for vision in visions {
            let tree = serde_json::to_string_pretty(&vision.proposed_tree).unwrap_or_default();
            proposals.push_str(&format!(
                "## {}\nExpertise: {}\nVision:\n{}\nProposed tree:\n{}\n\n",
                vision.role, vision.expertise, vision.vision_text, tree
            ));
        }

        format!(
            "Project requirements:\n{}\n\n\
             Specialist proposals:\n\n{}\
             Rules:\n\
             - The root folder's name is the project name, not a path segment.\n\
             - Every file in rootFolder must appear exactly once in dependencyTree, and nothing else may.\n\
             - \"path\" is the project-relative file path, for example \"src/index.js\".\n\
             - \"dependencies\" lists paths of files in dependencyTree this file needs.\n\
             - implementationOrder starts at 1; a file's dependencies must have a smaller order.\n\n\
             Respond with JSON of this shape:\n\
             {{\n\
             \x20 \"integratedVision\": \"the unified vision\",\n\
             \x20 \"resolutionNotes\": [\"how each conflict was resolved\"],\n\
             \x20 \"rootFolder\": {{ \"name\": \"...\", \"description\": \"...\", \"purpose\": \"...\", \"files\": [], \"subfolders\": [] }},\n\
             \x20 \"dependencyTree\": [\n\
             \x20   {{\"name\": \"index.js\", \"path\": \"src/index.js\", \"description\": \"...\", \"purpose\": \"...\", \
             \"type\": \"...\", \"dependencies\": [], \"implementationOrder\": 1}}\n\
             \x20 ]\n\
             }}",
            bullet_list(requirements),
            proposals
        )
    }

    pub fn synthesis_system(include_tests: bool) -> String {
        let tests = if include_tests {
            " Also write focused unit tests for the file in \"testCode\"."
        } else {
            ""
        };
        format!(
            "You are a senior software engineer implementing one file of a larger project. \
             Write complete, working code that fits the architecture and uses the already \
             implemented dependencies exactly as they are written.{} Respond with a single \
             JSON object and nothing else.",
            tests
        )
    }

    /// User message for one Stage 3 file
    ///
    /// `dependencies` are rendered in the given order, one section per artifact.
    pub fn synthesis_user(
        requirements: &[String],
        integrated_vision: &str,
        file: &DependencyFile,
        dependencies: &[&FileImplementation],
        include_tests: bool,
    ) -> String {
        let mut context = String::new();
        if dependencies.is_empty() {
            context.push_str("This file has no implemented dependencies.\n");
        }
        for dep in dependencies {
            context.push_str(&format!(
                "{} {} ({})\n```{}\n{}\n```\n\n",
                DEPENDENCY_HEADER, dep.path, dep.language, dep.language, dep.code
            ));
        }

        let test_field = if include_tests { ",\n  \"testCode\": \"unit tests for this file\"" } else { "" };

        format!(
            "Project requirements:\n{}\n\n\
             Architecture:\n{}\n\n\
             File to implement: {}\n\
             Type: {}\n\
             Description: {}\n\
             Purpose: {}\n\
             Implementation order: {}\n\n\
             Implemented dependencies:\n{}\n\
             Respond with JSON of this shape:\n\
             {{\n\
             \x20 \"language\": \"...\",\n\
             \x20 \"code\": \"the complete file contents\"{}\n\
             }}",
            bullet_list(requirements),
            integrated_vision,
            file.key(),
            file.file_type,
            file.description,
            file.purpose,
            file.implementation_order,
            context,
            test_field
        )
    }
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("- {}", item)).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::roles::{BACKEND_DEVELOPER, INTEGRATION_ROLE};

    fn artifact(path: &str, code: &str) -> FileImplementation {
        FileImplementation {
            name: path.to_string(),
            path: path.to_string(),
            file_type: "module".to_string(),
            description: String::new(),
            purpose: String::new(),
            dependencies: Vec::new(),
            language: "javascript".to_string(),
            code: code.to_string(),
            test_code: None,
            implementation_order: 1,
        }
    }

    #[test]
    fn test_vision_prompts_mention_role_and_requirements() {
        let reqs = vec!["Build a chat service".to_string()];
        let system = PromptTemplates::vision_system(&BACKEND_DEVELOPER);
        let user = PromptTemplates::vision_user(&reqs, &BACKEND_DEVELOPER, 0, 3);

        assert!(system.contains("Backend Developer"));
        assert!(user.contains("- Build a chat service"));
        assert!(user.contains("specialist 1 of 3"));
        assert!(user.contains("\"proposedTree\""));
    }

    #[test]
    fn test_integration_prompt_lists_every_proposal() {
        let visions = vec![
            SpecialistVision {
                role: "Backend Developer".to_string(),
                expertise: "apis".to_string(),
                vision_text: "REST first".to_string(),
                proposed_tree: crate::pipeline::FolderNode::new("app"),
            },
            SpecialistVision {
                role: "Frontend Developer".to_string(),
                expertise: "ui".to_string(),
                vision_text: "SPA".to_string(),
                proposed_tree: crate::pipeline::FolderNode::new("app"),
            },
        ];
        let user = PromptTemplates::integration_user(&["x".to_string()], &visions);
        assert!(user.contains("## Backend Developer"));
        assert!(user.contains("## Frontend Developer"));
        assert!(user.contains("SPA"));
        assert!(PromptTemplates::integration_system(&INTEGRATION_ROLE).contains("Chief Technology Officer"));
    }

    #[test]
    fn test_synthesis_prompt_renders_each_dependency_once() {
        let file = DependencyFile::new("src/app.js", 2).with_dependencies(["src/db.js"]);
        let db = artifact("src/db.js", "export const db = {};");
        let user = PromptTemplates::synthesis_user(&["x".to_string()], "vision", &file, &[&db], false);

        assert_eq!(user.matches(DEPENDENCY_HEADER).count(), 1);
        assert!(user.contains("export const db = {};"));
        assert!(user.contains("File to implement: src/app.js"));
        assert!(!user.contains("testCode"));
    }

    #[test]
    fn test_synthesis_prompt_without_dependencies() {
        let file = DependencyFile::new("src/db.js", 1);
        let user = PromptTemplates::synthesis_user(&["x".to_string()], "vision", &file, &[], true);
        assert_eq!(user.matches(DEPENDENCY_HEADER).count(), 0);
        assert!(user.contains("no implemented dependencies"));
        assert!(user.contains("testCode"));
        assert!(PromptTemplates::synthesis_system(true).contains("testCode"));
    }
}
