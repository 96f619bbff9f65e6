//! Multi-stage architecture generation pipeline
//!
//! Stage 1 asks one specialist per selected role for a vision and a proposed
//! folder tree, Stage 2 merges those into one design with a dependency graph,
//! and Stage 3 walks that graph in implementation order producing one code
//! artifact per file. The orchestrator sequences the stages and owns the run.

pub mod extractor;
pub mod graph;
pub mod integration;
pub mod model;
pub mod orchestrator;
pub mod prompts;
pub mod roles;
pub mod state;
pub mod synthesis;
pub mod vision;

pub use extractor::{extract_json, extract_json_as};
pub use integration::Integrator;
pub use model::{
    DependencyFile, FileDescriptor, FileImplementation, FolderNode, IntegratedDesign,
    SpecialistVision,
};
pub use orchestrator::{CancelHandle, Orchestrator, PipelineEvent};
pub use roles::{select_roles, SpecialistRole, INTEGRATION_ROLE};
pub use state::{PipelineRun, RunPhase, RunStore, StageFailure};
pub use synthesis::{FileSynthesizer, SynthesisFailure};
pub use vision::VisionGenerator;

use crate::llm::LLMError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The three sequential phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Specialists,
    Integration,
    Synthesis,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::Specialists => 1,
            Stage::Integration => 2,
            Stage::Synthesis => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Specialists => "specialist visions",
            Stage::Integration => "integration",
            Stage::Synthesis => "file synthesis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage{}", self.number())
    }
}

/// `(completed, total)` counter for stages with several units of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LLMError),

    #[error("No JSON object found in model output: {message}")]
    Extraction { message: String, raw: String },

    #[error("Model output is not valid JSON after repair: {message}")]
    Parse { message: String, original: String, repaired: String },

    #[error("{stage} response is missing required structure: {message}")]
    InvalidResponse { stage: Stage, message: String },

    #[error(
        "Dependency graph does not match the file tree (missing from dependency tree: {missing_from_graph:?}, missing from folder tree: {missing_from_tree:?})"
    )]
    IncompleteGraph { missing_from_graph: Vec<String>, missing_from_tree: Vec<String> },

    #[error("Cannot run {stage}: missing {}", .missing.join(", "))]
    Precondition { stage: Stage, missing: Vec<String> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cannot {action} while the run is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("{stage} was cancelled")]
    Cancelled { stage: Stage },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Taxonomy name shown next to the message
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Llm(_) => "LlmError",
            PipelineError::Extraction { .. } => "ExtractionError",
            PipelineError::Parse { .. } => "ParseError",
            PipelineError::InvalidResponse { .. } => "InvalidResponseError",
            PipelineError::IncompleteGraph { .. } => "IncompleteGraphError",
            PipelineError::Precondition { .. } => "PreconditionError",
            PipelineError::InvalidInput(_) => "InvalidInputError",
            PipelineError::InvalidTransition { .. } => "InvalidTransitionError",
            PipelineError::Cancelled { .. } => "CancelledError",
            PipelineError::Io(_) => "IoError",
            PipelineError::Serialization(_) => "SerializationError",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
