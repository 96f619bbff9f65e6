//! Pipeline orchestrator
//!
//! Owns one `PipelineRun` and moves it through the three stages. Stages only
//! run when asked: `start` runs Stage 1, each `advance` runs the next stage.
//! A failed stage rolls the run back to its last completed phase, keeping
//! that phase's output so the caller can retry forward.

use super::integration::Integrator;
use super::roles::{select_roles, specialist_roles};
use super::state::{PipelineRun, RunPhase, RunStore, StageFailure};
use super::synthesis::FileSynthesizer;
use super::vision::VisionGenerator;
use super::{PipelineError, Progress, Result, Stage};
use crate::config::{ArchitectConfig, StagesConfig};
use crate::llm::LLMProvider;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// Coarse cancellation flag, checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Progress notifications for a presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted { stage: Stage, total: usize },
    SpecialistCompleted { role: String, progress: Progress },
    FileSynthesized { path: String, progress: Progress },
    StageCompleted { stage: Stage },
    StageFailed { failure: StageFailure },
}

pub struct Orchestrator {
    provider: Arc<dyn LLMProvider>,
    stages: StagesConfig,
    include_tests: bool,
    run: PipelineRun,
    store: Option<RunStore>,
    events: Option<UnboundedSender<PipelineEvent>>,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ArchitectConfig) -> Self {
        Self {
            provider,
            stages: config.stages.clone(),
            include_tests: config.pipeline.include_tests,
            run: PipelineRun::new(),
            store: None,
            events: None,
            cancel: CancelHandle::new(),
        }
    }

    /// Continue an existing run
    pub fn with_run(mut self, run: PipelineRun) -> Self {
        self.run = run;
        self
    }

    /// Persist the run after every transition
    pub fn with_store(mut self, store: RunStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Read-only view of the current run
    pub fn snapshot(&self) -> &PipelineRun {
        &self.run
    }

    pub fn into_run(self) -> PipelineRun {
        self.run
    }

    /// Accept requirements and run Stage 1
    ///
    /// Blank requirements are dropped; if none remain the call fails without
    /// touching the run.
    pub async fn start(&mut self, requirements: Vec<String>) -> Result<()> {
        if self.run.phase != RunPhase::Idle {
            return Err(self.invalid_transition("start"));
        }

        let requirements: Vec<String> = requirements
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if requirements.is_empty() {
            return Err(PipelineError::InvalidInput("at least one requirement is needed".to_string()));
        }

        self.run.roles = select_roles(&requirements);
        self.run.requirements = requirements;
        info!("Starting run {} with roles: {}", self.run.id, self.run.roles.join(", "));

        self.run_specialists().await
    }

    /// Run the stage after the last completed one
    pub async fn advance(&mut self) -> Result<()> {
        match self.run.phase {
            RunPhase::Idle | RunPhase::SpecialistsDone => {
                self.check_inputs(Stage::Integration)?;
                self.run_integration().await
            }
            RunPhase::IntegrationDone => {
                self.check_inputs(Stage::Synthesis)?;
                self.run_synthesis().await
            }
            _ => Err(self.invalid_transition("advance")),
        }
    }

    /// Re-run the stage that failed last
    ///
    /// From idle this repeats Stage 1 with the stored requirements.
    pub async fn retry(&mut self) -> Result<()> {
        if self.run.phase == RunPhase::Idle {
            self.check_inputs(Stage::Specialists)?;
            info!("Retrying Stage1 for run {}", self.run.id);
            return self.run_specialists().await;
        }
        self.advance().await
    }

    /// Start and advance until Stage 3 completes
    pub async fn run_to_completion(&mut self, requirements: Vec<String>) -> Result<()> {
        self.start(requirements).await?;
        self.advance().await?;
        self.advance().await
    }

    /// Discard the run and everything it produced
    pub fn reset(&mut self) -> Result<()> {
        info!("Resetting run {}", self.run.id);
        self.run = PipelineRun::new();
        self.cancel.reset();
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(())
    }

    async fn run_specialists(&mut self) -> Result<()> {
        let requirements = self.run.requirements.clone();
        let roles = specialist_roles(&self.run.roles);
        let total = roles.len();

        self.begin(Stage::Specialists, RunPhase::SpecialistsInFlight { progress: Progress::new(0, total) }, total);

        let generator = VisionGenerator::new(Arc::clone(&self.provider), self.stages.vision);
        let mut visions = Vec::with_capacity(total);

        for (index, role) in roles.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.fail(Stage::Specialists, PipelineError::Cancelled { stage: Stage::Specialists }));
            }

            match generator.generate_vision(&requirements, role, index, total).await {
                Ok(vision) => {
                    visions.push(vision);
                    let progress = Progress::new(visions.len(), total);
                    self.run.phase = RunPhase::SpecialistsInFlight { progress };
                    self.emit(PipelineEvent::SpecialistCompleted { role: role.clone(), progress });
                }
                Err(e) => return Err(self.fail(Stage::Specialists, e)),
            }
        }

        self.run.specialist_visions = Some(visions);
        self.run.integrated_design = None;
        self.run.files = None;
        self.run.partial_files.clear();
        self.complete(Stage::Specialists, RunPhase::SpecialistsDone);
        Ok(())
    }

    async fn run_integration(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(Stage::Integration, PipelineError::Cancelled { stage: Stage::Integration }));
        }

        let requirements = self.run.requirements.clone();
        let visions = self.run.specialist_visions.clone().unwrap_or_default();

        self.begin(Stage::Integration, RunPhase::IntegrationInFlight, 1);

        let integrator = Integrator::new(Arc::clone(&self.provider), self.stages.integration);
        match integrator.integrate(&requirements, &visions).await {
            Ok(design) => {
                self.run.integrated_design = Some(design);
                self.run.files = None;
                self.run.partial_files.clear();
                self.complete(Stage::Integration, RunPhase::IntegrationDone);
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::Integration, e)),
        }
    }

    async fn run_synthesis(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(Stage::Synthesis, PipelineError::Cancelled { stage: Stage::Synthesis }));
        }

        let requirements = self.run.requirements.clone();
        let Some(design) = self.run.integrated_design.clone() else {
            return Err(PipelineError::Precondition {
                stage: Stage::Synthesis,
                missing: vec!["integratedDesign".to_string()],
            });
        };
        let total = design.dependency_tree.len();

        self.run.partial_files.clear();
        self.begin(Stage::Synthesis, RunPhase::SynthesisInFlight { progress: Progress::new(0, total) }, total);

        let synthesizer =
            FileSynthesizer::new(Arc::clone(&self.provider), self.stages.synthesis, self.include_tests);
        let events = &self.events;
        let phase = &mut self.run.phase;
        let result = synthesizer
            .synthesize_all(&requirements, &design, &self.cancel, |artifact, progress| {
                *phase = RunPhase::SynthesisInFlight { progress };
                send_event(events, PipelineEvent::FileSynthesized { path: artifact.path.clone(), progress });
            })
            .await;

        match result {
            Ok(files) => {
                self.run.files = Some(files);
                self.complete(Stage::Synthesis, RunPhase::SynthesisDone);
                Ok(())
            }
            Err(failure) => {
                self.run.partial_files = failure.partial;
                Err(self.fail(Stage::Synthesis, failure.error))
            }
        }
    }

    fn begin(&mut self, stage: Stage, phase: RunPhase, total: usize) {
        info!("{} started: {}", stage, stage.description());
        self.run.phase = phase;
        self.run.last_error = None;
        self.run.touch();
        self.emit(PipelineEvent::StageStarted { stage, total });
        self.persist();
    }

    fn complete(&mut self, stage: Stage, phase: RunPhase) {
        info!("{} completed", stage);
        self.run.phase = phase;
        self.run.touch();
        self.emit(PipelineEvent::StageCompleted { stage });
        self.persist();
    }

    /// Roll back to the last completed phase and record the failure
    fn fail(&mut self, stage: Stage, error: PipelineError) -> PipelineError {
        error!("{} failed: {}", stage, error);

        let failure = StageFailure::new(stage, &error);
        self.run.phase = self.run.completed_phase();
        self.run.last_error = Some(failure.clone());
        self.run.touch();

        // A cancellation is consumed by the stage it stopped
        if matches!(error, PipelineError::Cancelled { .. }) {
            self.cancel.reset();
        }

        self.emit(PipelineEvent::StageFailed { failure });
        self.persist();
        error
    }

    fn check_inputs(&self, stage: Stage) -> Result<()> {
        let missing = self.run.missing_inputs(stage);
        if missing.is_empty() { Ok(()) } else { Err(PipelineError::Precondition { stage, missing }) }
    }

    fn invalid_transition(&self, action: &str) -> PipelineError {
        PipelineError::InvalidTransition { from: self.run.phase.to_string(), action: action.to_string() }
    }

    fn emit(&self, event: PipelineEvent) {
        send_event(&self.events, event);
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.run) {
                warn!("Failed to persist run {}: {}", self.run.id, e);
            }
        }
    }
}

fn send_event(events: &Option<UnboundedSender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is watching
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLLMProvider;
    use crate::llm::LLMError;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    // No trigger keywords: Backend and Frontend specialists only
    const REQUIREMENT: &str = "A small REST service";

    fn vision_response(role: &str) -> String {
        json!({
            "visionText": format!("{} vision", role),
            "proposedTree": {
                "name": "svc",
                "description": "root",
                "purpose": "service",
                "files": [{"name": "db.js"}, {"name": "api.js"}]
            }
        })
        .to_string()
    }

    fn integration_response() -> String {
        json!({
            "integratedVision": "Two-module service",
            "resolutionNotes": [],
            "rootFolder": {
                "name": "svc",
                "description": "root",
                "purpose": "service",
                "files": [{"name": "db.js"}, {"name": "api.js"}]
            },
            "dependencyTree": [
                {"name": "api.js", "path": "api.js", "dependencies": ["db.js"], "implementationOrder": 2},
                {"name": "db.js", "path": "db.js", "implementationOrder": 1}
            ]
        })
        .to_string()
    }

    fn code_response(code: &str) -> String {
        json!({ "code": code }).to_string()
    }

    fn orchestrator(provider: &MockLLMProvider) -> Orchestrator {
        Orchestrator::new(Arc::new(provider.clone()), &ArchitectConfig::default())
    }

    fn script_stage1(provider: &MockLLMProvider) {
        provider.push_response(vision_response("Backend Developer"));
        provider.push_response(vision_response("Frontend Developer"));
    }

    #[tokio::test]
    async fn test_full_run_with_events() {
        let provider = MockLLMProvider::new();
        script_stage1(&provider);
        provider.push_response(integration_response());
        provider.push_response(code_response("export const db = {};"));
        provider.push_response(code_response("import { db } from './db.js';"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut orch = orchestrator(&provider).with_events(tx);

        orch.start(vec![REQUIREMENT.to_string()]).await.unwrap();
        assert_eq!(orch.snapshot().phase, RunPhase::SpecialistsDone);
        assert_eq!(orch.snapshot().specialist_visions.as_ref().unwrap().len(), 2);

        orch.advance().await.unwrap();
        assert_eq!(orch.snapshot().phase, RunPhase::IntegrationDone);

        orch.advance().await.unwrap();
        let run = orch.snapshot();
        assert_eq!(run.phase, RunPhase::SynthesisDone);
        let files = run.files.as_ref().unwrap();
        assert_eq!(files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(), vec!["db.js", "api.js"]);
        assert!(provider.calls()[4].user_message.contains("export const db = {};"));

        drop(orch);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.first(), Some(&PipelineEvent::StageStarted { stage: Stage::Specialists, total: 2 }));
        assert!(events.contains(&PipelineEvent::SpecialistCompleted {
            role: "Frontend Developer".to_string(),
            progress: Progress::new(2, 2)
        }));
        assert!(events.contains(&PipelineEvent::FileSynthesized {
            path: "api.js".to_string(),
            progress: Progress::new(2, 2)
        }));
        assert_eq!(events.last(), Some(&PipelineEvent::StageCompleted { stage: Stage::Synthesis }));
    }

    #[tokio::test]
    async fn test_integration_failure_keeps_stage1_output() {
        let provider = MockLLMProvider::new();
        script_stage1(&provider);
        provider.push_error(LLMError::api(500, "internal error"));

        let mut orch = orchestrator(&provider);
        orch.start(vec![REQUIREMENT.to_string()]).await.unwrap();

        let err = orch.advance().await.unwrap_err();
        assert_eq!(err.kind(), "LlmError");

        let run = orch.snapshot();
        assert_eq!(run.phase, RunPhase::SpecialistsDone);
        assert_eq!(run.specialist_visions.as_ref().unwrap().len(), 2);
        let failure = run.last_error.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::Integration);
        assert!(failure.to_string().starts_with("Stage2"));
        assert!(failure.message.contains("internal error"));

        // Retry moves forward from the preserved output
        provider.push_response(integration_response());
        orch.retry().await.unwrap();
        assert_eq!(orch.snapshot().phase, RunPhase::IntegrationDone);
        assert!(orch.snapshot().last_error.is_none());
    }

    #[tokio::test]
    async fn test_synthesis_failure_keeps_partial_files() {
        let provider = MockLLMProvider::new();
        script_stage1(&provider);
        provider.push_response(integration_response());
        provider.push_response(code_response("db"));
        provider.push_response("no json here");

        let mut orch = orchestrator(&provider);
        orch.start(vec![REQUIREMENT.to_string()]).await.unwrap();
        orch.advance().await.unwrap();
        let err = orch.advance().await.unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");

        let run = orch.snapshot();
        assert_eq!(run.phase, RunPhase::IntegrationDone);
        assert!(run.files.is_none());
        assert_eq!(run.partial_files.len(), 1);
        assert_eq!(run.last_error.as_ref().unwrap().stage, Stage::Synthesis);

        provider.push_response(code_response("db"));
        provider.push_response(code_response("api"));
        orch.retry().await.unwrap();
        assert_eq!(orch.snapshot().phase, RunPhase::SynthesisDone);
        assert!(orch.snapshot().partial_files.is_empty());
    }

    #[tokio::test]
    async fn test_stage1_failure_returns_to_idle() {
        let provider = MockLLMProvider::new();
        provider.push_response(vision_response("Backend Developer"));
        provider.push_response(r#"{"visionText": "forgot the tree"}"#);

        let mut orch = orchestrator(&provider);
        let err = orch.start(vec![REQUIREMENT.to_string()]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidResponse { stage: Stage::Specialists, .. }));
        assert_eq!(orch.snapshot().phase, RunPhase::Idle);
        assert!(orch.snapshot().specialist_visions.is_none());

        script_stage1(&provider);
        orch.retry().await.unwrap();
        assert_eq!(orch.snapshot().phase, RunPhase::SpecialistsDone);
    }

    #[tokio::test]
    async fn test_start_rejects_blank_requirements() {
        let provider = MockLLMProvider::new();
        let mut orch = orchestrator(&provider);

        let err = orch.start(vec!["   ".to_string(), String::new()]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(orch.snapshot().phase, RunPhase::Idle);
        assert!(orch.snapshot().requirements.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_transitions_are_checked() {
        let provider = MockLLMProvider::new();
        let mut orch = orchestrator(&provider);

        match orch.advance().await.unwrap_err() {
            PipelineError::Precondition { stage, missing } => {
                assert_eq!(stage, Stage::Integration);
                assert_eq!(missing, vec!["requirements", "specialistVisions"]);
            }
            other => panic!("expected precondition error, got {other:?}"),
        }
        assert!(matches!(orch.retry().await.unwrap_err(), PipelineError::Precondition { .. }));

        script_stage1(&provider);
        orch.start(vec![REQUIREMENT.to_string()]).await.unwrap();
        let err = orch.start(vec![REQUIREMENT.to_string()]).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot start while the run is Stage1 complete");
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let provider = MockLLMProvider::new();
        script_stage1(&provider);
        provider.push_response(integration_response());

        let mut orch = orchestrator(&provider);
        orch.start(vec![REQUIREMENT.to_string()]).await.unwrap();

        orch.cancel_handle().cancel();
        let err = orch.advance().await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { stage: Stage::Integration }));
        assert_eq!(orch.snapshot().phase, RunPhase::SpecialistsDone);
        assert_eq!(provider.call_count(), 2);

        orch.advance().await.unwrap();
        assert_eq!(orch.snapshot().phase, RunPhase::IntegrationDone);
    }

    #[tokio::test]
    async fn test_state_is_persisted_and_reset() {
        let dir = TempDir::new().unwrap();
        let store = RunStore::new(dir.path());
        let provider = MockLLMProvider::new();
        script_stage1(&provider);

        let mut orch = orchestrator(&provider).with_store(store.clone());
        orch.start(vec![REQUIREMENT.to_string()]).await.unwrap();

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.phase, RunPhase::SpecialistsDone);
        assert_eq!(saved.id, orch.snapshot().id);

        // A second orchestrator picks the run up where it stopped
        provider.push_response(integration_response());
        let mut resumed = orchestrator(&provider).with_run(saved).with_store(store.clone());
        resumed.advance().await.unwrap();
        assert_eq!(store.load().unwrap().unwrap().phase, RunPhase::IntegrationDone);

        resumed.reset().unwrap();
        assert_eq!(resumed.snapshot().phase, RunPhase::Idle);
        assert!(resumed.snapshot().specialist_visions.is_none());
        assert!(store.load().unwrap().is_none());
    }
}
