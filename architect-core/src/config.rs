//! Configuration for the architect pipeline
//!
//! Loaded from TOML. Every section falls back to its defaults, so a config
//! file only has to name what it changes.

use crate::llm::{ClaudeConfig, CompletionRequest};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectConfig {
    /// Claude provider settings
    pub llm: ClaudeConfig,

    /// Per-stage request settings
    pub stages: StagesConfig,

    /// Run persistence and synthesis options
    pub pipeline: PipelineConfig,

    /// Project export options
    pub export: ExportConfig,
}

impl ArchitectConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Write the config as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Load `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub vision: StageSettings,
    pub integration: StageSettings,
    pub synthesis: StageSettings,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            vision: StageSettings { max_tokens: 4096, temperature: 0.7 },
            integration: StageSettings { max_tokens: 8192, temperature: 0.4 },
            synthesis: StageSettings { max_tokens: 8192, temperature: 0.2 },
        }
    }
}

/// Token budget and sampling temperature for one stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self { max_tokens: 4096, temperature: 0.7 }
    }
}

impl StageSettings {
    /// Build a provider request with this stage's budget
    pub fn request(&self, system_prompt: String, user_message: String) -> CompletionRequest {
        CompletionRequest::new(system_prompt, user_message)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where run state lives
    pub state_dir: PathBuf,

    /// Ask Stage 3 for unit tests alongside each file
    pub include_tests: bool,

    /// Write run state after every transition
    pub persist: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { state_dir: PathBuf::from(".architect"), include_tests: false, persist: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub write_manifest: bool,
    pub overwrite: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { output_dir: PathBuf::from("generated"), write_manifest: true, overwrite: false }
    }
}

/// Example configuration file
pub const EXAMPLE_CONFIG: &str = r#"
[llm]
model = "claude-3-5-sonnet-20241022"
timeout_secs = 120
max_retries = 2

[stages.integration]
max_tokens = 16000
temperature = 0.3

[pipeline]
state_dir = ".architect"
include_tests = true

[export]
output_dir = "out"
overwrite = true
"#;
