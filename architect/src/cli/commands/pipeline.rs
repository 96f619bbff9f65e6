//! Pipeline commands: start, advance, retry, run, status, reset

use super::{export, read_requirements};
use crate::cli::app::{RequirementArgs, RunArgs};
use anyhow::{bail, Result};
use architect_core::pipeline::{CancelHandle, PipelineEvent, Stage};
use architect_core::{Architect, PipelineRun, RunPhase};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Which orchestrator operation to drive
enum Step {
    Start(Vec<String>),
    Advance,
    Retry,
}

pub async fn start(architect: &Architect, args: RequirementArgs) -> Result<()> {
    require_persistence(architect, "start")?;
    let requirements = read_requirements(&args).await?;
    let run = architect.store().load_or_new()?;
    if run.phase != RunPhase::Idle || !run.requirements.is_empty() {
        bail!("A run already exists ({}). Use 'architect reset' to discard it first.", run.phase);
    }

    let run = drive(architect, run, Step::Start(requirements)).await?;
    print_next_step(&run);
    Ok(())
}

pub async fn advance(architect: &Architect) -> Result<()> {
    require_persistence(architect, "advance")?;
    let run = architect.store().load_or_new()?;
    let run = drive(architect, run, Step::Advance).await?;
    print_next_step(&run);
    Ok(())
}

pub async fn retry(architect: &Architect) -> Result<()> {
    require_persistence(architect, "retry")?;
    let run = architect.store().load_or_new()?;
    if let Some(failure) = &run.last_error {
        println!("🔁 Retrying after: {}", failure);
    }
    let run = drive(architect, run, Step::Retry).await?;
    print_next_step(&run);
    Ok(())
}

/// Start, advance through every stage, then export
pub async fn run(architect: &Architect, args: RunArgs) -> Result<()> {
    let requirements = read_requirements(&args.input).await?;
    let store = architect.store();
    let existing = store.load_or_new()?;
    if existing.phase != RunPhase::Idle || !existing.requirements.is_empty() {
        bail!("A run already exists ({}). Use 'architect reset' to discard it first.", existing.phase);
    }

    let mut run = drive(architect, existing, Step::Start(requirements)).await?;
    while run.phase != RunPhase::SynthesisDone {
        run = drive(architect, run, Step::Advance).await?;
    }

    export::write(architect, &run, args.output, args.force).await
}

pub async fn status(architect: &Architect) -> Result<()> {
    let store = architect.store();
    let Some(run) = store.load()? else {
        println!("No saved run in {}", store.state_dir().display());
        return Ok(());
    };

    println!("📋 Run {}", run.id);
    println!("   Phase: {}", run.phase);
    println!("   Updated: {}", run.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   Requirements: {}", run.requirements.len());
    for requirement in &run.requirements {
        println!("     - {}", requirement);
    }
    if !run.roles.is_empty() {
        println!("   Roles: {}", run.roles.join(", "));
    }
    if let Some(visions) = &run.specialist_visions {
        println!("   Specialist visions: {}", visions.len());
    }
    if let Some(design) = &run.integrated_design {
        println!(
            "   Integrated design: {} files, {} resolution notes",
            design.dependency_tree.len(),
            design.resolution_notes.len()
        );
    }
    if let Some(files) = &run.files {
        println!("   Synthesized files: {}", files.len());
    } else if !run.partial_files.is_empty() {
        println!("   Synthesized before failure: {}", run.partial_files.len());
    }
    if let Some(failure) = &run.last_error {
        println!("   ❌ Last error: {}", failure);
    }

    print_next_step(&run);
    Ok(())
}

pub async fn reset(architect: &Architect) -> Result<()> {
    architect.store().clear()?;
    println!("🗑️  Run discarded");
    Ok(())
}

/// Stepwise commands hand the run from one invocation to the next on disk
fn require_persistence(architect: &Architect, command: &str) -> Result<()> {
    if !architect.config().pipeline.persist {
        bail!(
            "'architect {}' needs run persistence, but [pipeline] persist = false. \
             Enable it or use 'architect run' to do every stage in one invocation.",
            command
        );
    }
    Ok(())
}

/// Run one orchestrator step with progress output and Ctrl-C cancellation
async fn drive(architect: &Architect, run: PipelineRun, step: Step) -> Result<PipelineRun> {
    let provider = architect.provider()?;
    let (tx, rx) = mpsc::unbounded_channel();
    let mut orchestrator = architect.orchestrator(provider, run).with_events(tx);

    let printer = spawn_printer(rx);
    let watcher = spawn_ctrl_c(orchestrator.cancel_handle());

    let result = match step {
        Step::Start(requirements) => orchestrator.start(requirements).await,
        Step::Advance => orchestrator.advance().await,
        Step::Retry => orchestrator.retry().await,
    };

    watcher.abort();
    let run = orchestrator.into_run();
    // The sender went away with the orchestrator, so the printer drains and stops
    let _ = printer.await;

    match result {
        Ok(()) => Ok(run),
        Err(e) => {
            if run.last_error.is_some() {
                println!("   Completed output was kept. Fix the cause and run 'architect retry'.");
            }
            Err(e.into())
        }
    }
}

fn spawn_printer(mut rx: mpsc::UnboundedReceiver<PipelineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    })
}

fn spawn_ctrl_c(cancel: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested");
            println!("\n⏹️  Stopping after the current request finishes...");
            cancel.cancel();
        }
    })
}

fn print_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StageStarted { stage, total } => match stage {
            Stage::Specialists => println!("🧠 {}: consulting {} specialists", stage, total),
            Stage::Integration => println!("🔗 {}: integrating specialist visions", stage),
            Stage::Synthesis => println!("🛠️  {}: synthesizing {} files", stage, total),
        },
        PipelineEvent::SpecialistCompleted { role, progress } => {
            println!("  ✓ [{}] {}", progress, role);
        }
        PipelineEvent::FileSynthesized { path, progress } => {
            println!("  ✓ [{}] {}", progress, path);
        }
        PipelineEvent::StageCompleted { stage } => println!("✅ {} complete", stage),
        PipelineEvent::StageFailed { failure } => println!("❌ {}", failure),
    }
}

fn print_next_step(run: &PipelineRun) {
    match run.phase {
        RunPhase::Idle if run.requirements.is_empty() => {
            println!("\n📝 Next: architect start \"<requirement>\"")
        }
        RunPhase::Idle => println!("\n📝 Next: architect retry"),
        RunPhase::SpecialistsDone | RunPhase::IntegrationDone => {
            println!("\n📝 Next: architect advance")
        }
        RunPhase::SynthesisDone => println!("\n📝 Next: architect export"),
        _ => {}
    }
}
