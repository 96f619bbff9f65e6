//! Command handlers

pub mod export;
pub mod extract;
pub mod pipeline;
pub mod roles;

use crate::cli::app::{Cli, RequirementArgs};
use anyhow::{Context, Result};
use architect_core::{Architect, ArchitectConfig};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_STATE_DIR: &str = ".architect";
const CONFIG_FILE: &str = "config.toml";

/// Resolve configuration from the global flags
///
/// `--config` wins; otherwise `<state-dir>/config.toml` is used when it
/// exists. `--state-dir` and `--model` override what the file says.
pub fn load_architect(cli: &Cli) -> Result<Architect> {
    let state_dir = cli.state_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));

    let mut config = match &cli.config {
        Some(path) => ArchitectConfig::from_file(path)?,
        None => ArchitectConfig::load_or_default(&state_dir.join(CONFIG_FILE))?,
    };

    if let Some(dir) = &cli.state_dir {
        config.pipeline.state_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }

    debug!("Using state directory {}", config.pipeline.state_dir.display());
    Ok(Architect::new(config))
}

/// Requirements from arguments, then from `--file`
pub async fn read_requirements(args: &RequirementArgs) -> Result<Vec<String>> {
    let mut requirements = args.requirements.clone();

    if let Some(path) = &args.file {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read requirements file {}", path.display()))?;
        requirements.extend(parse_requirement_lines(&content));
    }

    Ok(requirements)
}

/// One requirement per non-empty line; list markers are dropped
fn parse_requirement_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .map(|line| line.trim_start_matches(['-', '*']).trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_requirement_lines() {
        let content = "# Requirements\n- Build a todo app\n\n* Use Postgres\nSupport login\n";
        assert_eq!(
            parse_requirement_lines(content),
            vec!["Build a todo app", "Use Postgres", "Support login"]
        );
    }

    #[test]
    fn test_overrides_apply_over_config_file() {
        let dir = TempDir::new().unwrap();
        let mut config = ArchitectConfig::default();
        config.llm.model = "from-file".to_string();
        config.export.overwrite = true;
        config.save(&dir.path().join(CONFIG_FILE)).unwrap();

        let state = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["architect", "--state-dir", &state, "status"]).unwrap();
        let architect = load_architect(&cli).unwrap();
        assert_eq!(architect.config().llm.model, "from-file");
        assert!(architect.config().export.overwrite);

        let cli = Cli::try_parse_from(["architect", "--state-dir", &state, "--model", "cli-model", "status"]).unwrap();
        assert_eq!(load_architect(&cli).unwrap().config().llm.model, "cli-model");
    }

    #[tokio::test]
    async fn test_read_requirements_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reqs.md");
        std::fs::write(&path, "- Mobile app\n- Offline sync\n").unwrap();

        let args = RequirementArgs { requirements: vec!["Chat".to_string()], file: Some(path) };
        assert_eq!(read_requirements(&args).await.unwrap(), vec!["Chat", "Mobile app", "Offline sync"]);
    }
}
