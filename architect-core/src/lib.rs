//! Core functionality for architect
//!
//! Turns free-text project requirements into a set of generated source files
//! in three LLM-driven stages: specialist visions, an integrated design with
//! a dependency graph, and dependency-ordered file synthesis.

pub mod config;
pub mod export;
pub mod llm;
pub mod pipeline;

pub use config::ArchitectConfig;
pub use export::{ExportReport, ProjectExporter};
pub use pipeline::{Orchestrator, PipelineError, PipelineEvent, PipelineRun, RunPhase, RunStore};

use llm::{ClaudeProvider, LLMError, LLMProvider};
use std::sync::Arc;

/// Wires configuration to the provider, run store and orchestrator
#[derive(Debug, Clone)]
pub struct Architect {
    config: ArchitectConfig,
}

impl Architect {
    pub fn new(config: ArchitectConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArchitectConfig {
        &self.config
    }

    pub fn store(&self) -> RunStore {
        RunStore::new(&self.config.pipeline.state_dir)
    }

    pub fn exporter(&self) -> ProjectExporter {
        ProjectExporter::new(&self.config.export)
    }

    /// Claude provider from the `[llm]` section
    pub fn provider(&self) -> Result<Arc<dyn LLMProvider>, LLMError> {
        Ok(Arc::new(ClaudeProvider::new(self.config.llm.clone())?))
    }

    /// Orchestrator continuing `run`, persisting when configured to
    pub fn orchestrator(&self, provider: Arc<dyn LLMProvider>, run: PipelineRun) -> Orchestrator {
        let orchestrator = Orchestrator::new(provider, &self.config).with_run(run);
        if self.config.pipeline.persist {
            orchestrator.with_store(self.store())
        } else {
            orchestrator
        }
    }
}
