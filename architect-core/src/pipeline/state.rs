//! Pipeline run state and persistence

use super::model::{FileImplementation, IntegratedDesign, SpecialistVision};
use super::{PipelineError, Progress, Result, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const RUN_FILE: &str = "run.json";

/// Where a run is in its lifecycle
///
/// A failed stage does not get its own phase: the run goes back to the last
/// completed phase and the failure is kept in `PipelineRun::last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum RunPhase {
    #[default]
    Idle,
    SpecialistsInFlight { progress: Progress },
    SpecialistsDone,
    IntegrationInFlight,
    IntegrationDone,
    SynthesisInFlight { progress: Progress },
    SynthesisDone,
}

impl RunPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            RunPhase::SpecialistsInFlight { .. } | RunPhase::IntegrationInFlight | RunPhase::SynthesisInFlight { .. }
        )
    }

    /// Stage that runs next from this phase, if any
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            RunPhase::Idle => Some(Stage::Specialists),
            RunPhase::SpecialistsDone => Some(Stage::Integration),
            RunPhase::IntegrationDone => Some(Stage::Synthesis),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<Progress> {
        match self {
            RunPhase::SpecialistsInFlight { progress } | RunPhase::SynthesisInFlight { progress } => Some(*progress),
            _ => None,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::SpecialistsInFlight { progress } => write!(f, "Stage1 in flight ({})", progress),
            RunPhase::SpecialistsDone => write!(f, "Stage1 complete"),
            RunPhase::IntegrationInFlight => write!(f, "Stage2 in flight"),
            RunPhase::IntegrationDone => write!(f, "Stage2 complete"),
            RunPhase::SynthesisInFlight { progress } => write!(f, "Stage3 in flight ({})", progress),
            RunPhase::SynthesisDone => write!(f, "Stage3 complete"),
        }
    }
}

/// The last failure, kept for display until the next transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl StageFailure {
    pub fn new(stage: Stage, error: &PipelineError) -> Self {
        Self { stage, kind: error.kind().to_string(), message: error.to_string(), at: Utc::now() }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.kind, self.message)
    }
}

/// One pipeline run: inputs, stage outputs and lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: Uuid,
    pub requirements: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub specialist_visions: Option<Vec<SpecialistVision>>,
    #[serde(default)]
    pub integrated_design: Option<IntegratedDesign>,
    #[serde(default)]
    pub files: Option<Vec<FileImplementation>>,
    /// Stage 3 artifacts finished before the last synthesis failure
    #[serde(default)]
    pub partial_files: Vec<FileImplementation>,
    #[serde(default)]
    pub phase: RunPhase,
    #[serde(default)]
    pub last_error: Option<StageFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requirements: Vec::new(),
            roles: Vec::new(),
            specialist_visions: None,
            integrated_design: None,
            files: None,
            partial_files: Vec::new(),
            phase: RunPhase::Idle,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// The furthest phase whose output is present
    pub fn completed_phase(&self) -> RunPhase {
        if self.files.is_some() {
            RunPhase::SynthesisDone
        } else if self.integrated_design.is_some() {
            RunPhase::IntegrationDone
        } else if self.specialist_visions.is_some() {
            RunPhase::SpecialistsDone
        } else {
            RunPhase::Idle
        }
    }

    /// Inputs `stage` needs that this run does not have
    pub fn missing_inputs(&self, stage: Stage) -> Vec<String> {
        let mut missing = Vec::new();
        if self.requirements.is_empty() {
            missing.push("requirements".to_string());
        }
        match stage {
            Stage::Specialists => {}
            Stage::Integration => {
                if self.specialist_visions.as_ref().is_none_or(Vec::is_empty) {
                    missing.push("specialistVisions".to_string());
                }
            }
            Stage::Synthesis => {
                if self.integrated_design.is_none() {
                    missing.push("integratedDesign".to_string());
                }
            }
        }
        missing
    }

    pub fn progress(&self) -> Option<Progress> {
        self.phase.progress()
    }

    /// Undo an in-flight phase left behind by an interrupted process
    pub fn normalize_after_load(&mut self) {
        if self.phase.is_in_flight() {
            debug!("Run {} was saved in flight at {}; rolling back", self.id, self.phase);
            self.phase = self.completed_phase();
        }
    }
}

/// Persists a run as pretty JSON under a state directory
#[derive(Debug, Clone)]
pub struct RunStore {
    state_dir: PathBuf,
}

impl RunStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { state_dir: state_dir.into() }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn path(&self) -> PathBuf {
        self.state_dir.join(RUN_FILE)
    }

    /// Save state to disk
    pub fn save(&self, run: &PipelineRun) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        let content = serde_json::to_string_pretty(run)?;

        let tmp = self.state_dir.join(format!("{}.tmp", RUN_FILE));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, self.path())?;

        debug!("Saved run {} ({}) to {}", run.id, run.phase, self.path().display());
        Ok(())
    }

    /// Load the saved run, if there is one
    pub fn load(&self) -> Result<Option<PipelineRun>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let mut run: PipelineRun = serde_json::from_str(&content)?;
        run.normalize_after_load();
        Ok(Some(run))
    }

    /// Load state from disk or create new
    pub fn load_or_new(&self) -> Result<PipelineRun> {
        Ok(self.load()?.unwrap_or_default())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
