//! Stage 3: file synthesis
//!
//! Files are produced one at a time in implementation order. Each prompt
//! carries the finished artifacts of exactly the files it depends on, so a
//! file can only be written once its dependencies exist.

use super::extractor::extract_json_as;
use super::graph::synthesis_order;
use super::model::{language_from_path, DependencyFile, FileImplementation, IntegratedDesign};
use super::orchestrator::CancelHandle;
use super::prompts::PromptTemplates;
use super::{PipelineError, Progress, Result, Stage};
use crate::config::StageSettings;
use crate::llm::LLMProvider;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Stage 3 failure with everything finished before the failing file
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SynthesisFailure {
    pub partial: Vec<FileImplementation>,
    #[source]
    pub error: PipelineError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisResponse {
    #[serde(default, alias = "content")]
    code: Option<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default, alias = "tests")]
    test_code: Option<String>,
}

pub struct FileSynthesizer {
    provider: Arc<dyn LLMProvider>,
    settings: StageSettings,
    include_tests: bool,
}

impl FileSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: StageSettings, include_tests: bool) -> Self {
        Self { provider, settings, include_tests }
    }

    /// Synthesize every file of `design`, failing fast
    ///
    /// `on_file` runs after each file with the artifact and the progress so
    /// far. Cancellation is checked before each file, never mid-call.
    pub async fn synthesize_all<F>(
        &self,
        requirements: &[String],
        design: &IntegratedDesign,
        cancel: &CancelHandle,
        mut on_file: F,
    ) -> std::result::Result<Vec<FileImplementation>, SynthesisFailure>
    where
        F: FnMut(&FileImplementation, Progress),
    {
        let ordered = synthesis_order(&design.dependency_tree);
        let total = ordered.len();
        let mut done: Vec<FileImplementation> = Vec::with_capacity(total);

        info!("Synthesizing {} files", total);

        for file in ordered {
            if cancel.is_cancelled() {
                info!("Synthesis cancelled after {}/{} files", done.len(), total);
                return Err(SynthesisFailure {
                    partial: done,
                    error: PipelineError::Cancelled { stage: Stage::Synthesis },
                });
            }

            info!("[{}/{}] Synthesizing {}", done.len() + 1, total, file.key());
            match self.synthesize_file(requirements, &design.integrated_vision, file, &done).await {
                Ok(artifact) => {
                    done.push(artifact);
                    if let Some(last) = done.last() {
                        on_file(last, Progress::new(done.len(), total));
                    }
                }
                Err(error) => {
                    error!("Synthesis of {} failed: {}", file.key(), error);
                    return Err(SynthesisFailure { partial: done, error });
                }
            }
        }

        Ok(done)
    }

    /// Synthesize one file given the artifacts finished so far
    pub async fn synthesize_file(
        &self,
        requirements: &[String],
        integrated_vision: &str,
        file: &DependencyFile,
        done: &[FileImplementation],
    ) -> Result<FileImplementation> {
        let context = dependency_context(file, done);
        debug!("{} gets {} dependency artifacts as context", file.key(), context.len());

        let request = self.settings.request(
            PromptTemplates::synthesis_system(self.include_tests),
            PromptTemplates::synthesis_user(requirements, integrated_vision, file, &context, self.include_tests),
        );

        let raw = self.provider.complete(request).await?;
        let response: SynthesisResponse = extract_json_as(&raw, Stage::Synthesis)?;

        let code = response
            .code
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| PipelineError::InvalidResponse {
                stage: Stage::Synthesis,
                message: format!("no code returned for {}", file.key()),
            })?;

        let key = file.key();
        let language = response
            .language
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| language_from_path(&key));
        let test_code = response.test_code.filter(|t| self.include_tests && !t.trim().is_empty());

        Ok(FileImplementation {
            name: file.name.clone(),
            path: key,
            file_type: file.file_type.clone(),
            description: file.description.clone(),
            purpose: file.purpose.clone(),
            dependencies: file.dependencies.clone(),
            language,
            code,
            test_code,
            implementation_order: file.implementation_order,
        })
    }
}

/// Finished artifacts for exactly the files `file` depends on
pub fn dependency_context<'a>(file: &DependencyFile, done: &'a [FileImplementation]) -> Vec<&'a FileImplementation> {
    file.dependencies
        .iter()
        .filter_map(|dep| done.iter().find(|artifact| artifact.key() == dep))
        .collect()
}
