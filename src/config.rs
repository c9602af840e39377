//! Configuration for frontsmith.
//!
//! Settings live in `.frontsmith/frontsmith.toml` and are layered
//! file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! backend = "claude-cli"          # or "openai"
//! command = "claude"
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [model.stages]
//! router = "claude-haiku-4-5"
//! generator = "claude-sonnet-4-5"
//!
//! [workflow]
//! max_steps = 25
//!
//! [server]
//! port = 9999
//!
//! [export]
//! directory = "project"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflow::Stage;

pub const CONFIG_DIR: &str = ".frontsmith";
pub const CONFIG_FILE: &str = "frontsmith.toml";

/// Which [`LanguageModel`](crate::model::LanguageModel) implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelBackend {
    /// `claude --print` subprocess
    #[default]
    #[serde(rename = "claude-cli")]
    ClaudeCli,
    /// OpenAI-compatible `/chat/completions` endpoint
    #[serde(rename = "openai")]
    OpenAi,
}

impl std::fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelBackend::ClaudeCli => write!(f, "claude-cli"),
            ModelBackend::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ModelBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude-cli" | "claude" => Ok(ModelBackend::ClaudeCli),
            "openai" => Ok(ModelBackend::OpenAi),
            _ => anyhow::bail!(
                "Invalid model backend '{}'. Valid values: claude-cli, openai",
                s
            ),
        }
    }
}

/// Optional per-stage model names. Unset stages use the backend default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageModels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refiner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checker: Option<String>,
}

impl StageModels {
    pub fn for_stage(&self, stage: Stage) -> Option<String> {
        match stage {
            Stage::Router => self.router.clone(),
            Stage::Refiner => self.refiner.clone(),
            Stage::Generator => self.generator.clone(),
            Stage::Checker => self.checker.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: ModelBackend,
    /// Claude CLI command (default: `$CLAUDE_CMD`, then "claude")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Base URL for the openai backend
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub stages: StageModels,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            command: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            stages: StageModels::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Stage invocations allowed per run before giving up
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

fn default_max_steps() -> usize {
    25
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    9999
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output directory, relative to the project directory
    #[serde(default = "default_export_dir")]
    pub directory: String,
}

fn default_export_dir() -> String {
    "project".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
        }
    }
}

/// Contents of `frontsmith.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontsmithToml {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl FrontsmithToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse frontsmith.toml")
    }

    /// Load `frontsmith.toml` from `config_dir`, or defaults if it is absent.
    pub fn load_or_default(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize frontsmith.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Claude command: file, then `CLAUDE_CMD`, then "claude".
    pub fn claude_cmd(&self) -> String {
        self.model
            .command
            .clone()
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Check the configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.workflow.max_steps == 0 {
            warnings.push("workflow.max_steps is 0: no stage will ever run".to_string());
        }
        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if self.export.directory.trim().is_empty() {
            warnings.push("export.directory is empty".to_string());
        }
        if self.model.backend == ModelBackend::OpenAi {
            if !(self.model.base_url.starts_with("http://")
                || self.model.base_url.starts_with("https://"))
            {
                warnings.push(format!(
                    "model.base_url '{}' is not an http(s) URL",
                    self.model.base_url
                ));
            }
            if self.model.api_key_env.trim().is_empty() {
                warnings.push("model.api_key_env is empty".to_string());
            }
        }

        warnings
    }
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct FrontsmithConfig {
    pub project_dir: PathBuf,
    /// `<project>/.frontsmith`
    pub config_dir: PathBuf,
    pub toml: FrontsmithToml,
    pub verbose: bool,
    /// `--port` override
    pub cli_port: Option<u16>,
}

impl FrontsmithConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(CONFIG_DIR);
        let toml = FrontsmithToml::load_or_default(&config_dir)?;

        Ok(Self {
            project_dir,
            config_dir,
            toml,
            verbose: false,
            cli_port: None,
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        Ok(config)
    }

    pub fn model_backend(&self) -> ModelBackend {
        self.toml.model.backend
    }

    pub fn model_command(&self) -> String {
        self.toml.claude_cmd()
    }

    pub fn stage_models(&self) -> &StageModels {
        &self.toml.model.stages
    }

    pub fn max_steps(&self) -> usize {
        self.toml.workflow.max_steps
    }

    /// Server port (CLI → file → default).
    pub fn server_port(&self) -> u16 {
        self.cli_port.unwrap_or(self.toml.server.port)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn store_path(&self) -> PathBuf {
        self.config_dir.join("threads.db")
    }

    /// Default export directory, resolved against the project directory.
    pub fn export_dir(&self) -> PathBuf {
        self.project_dir.join(&self.toml.export.directory)
    }
}
