//! Export synthesized files

use crate::cli::app::ExportArgs;
use anyhow::{Context, Result};
use architect_core::{Architect, PipelineRun};
use std::path::PathBuf;

pub async fn execute(architect: &Architect, args: ExportArgs) -> Result<()> {
    let run = architect.store().load_or_new()?;
    write(architect, &run, args.output, args.force).await
}

/// Write the run's Stage 3 output to `output` (or the configured directory)
pub async fn write(architect: &Architect, run: &PipelineRun, output: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(files) = &run.files else {
        anyhow::bail!(
            "Nothing to export: the run is at '{}'. Use 'architect advance' until Stage3 completes.",
            run.phase
        );
    };

    let output_dir = output.unwrap_or_else(|| architect.config().export.output_dir.clone());
    let overwrite = force || architect.config().export.overwrite;

    let report = architect
        .exporter()
        .with_overwrite(overwrite)
        .export(files, &output_dir)
        .await
        .with_context(|| format!("Failed to export to {}", output_dir.display()))?;

    println!("📦 Exported {} files to {}", report.written.len(), report.output_dir.display());
    for path in &report.written {
        println!("  + {}", path.display());
    }
    if let Some(manifest) = &report.manifest {
        println!("  📄 Manifest: {}", manifest.display());
    }

    Ok(())
}
