//! Run the response extractor on a saved model response

use crate::cli::app::ExtractArgs;
use anyhow::{Context, Result};
use architect_core::pipeline::extract_json;
use architect_core::PipelineError;

pub async fn execute(args: ExtractArgs) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    match extract_json(&raw) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(PipelineError::Parse { message, original, repaired }) => {
            eprintln!("❌ ParseError: {}", message);
            eprintln!("\nOriginal:\n{}", original);
            eprintln!("\nRepaired:\n{}", repaired);
            anyhow::bail!("{} is not valid JSON after repair", args.file.display())
        }
        Err(e) => Err(anyhow::anyhow!(e).context(format!("No JSON found in {}", args.file.display()))),
    }
}
