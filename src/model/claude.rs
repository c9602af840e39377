//! Claude CLI backend: one `claude --print` process per completion.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CompletionRequest, LanguageModel};
use crate::errors::ModelError;

pub struct ClaudeCli {
    command: String,
}

impl ClaudeCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn build_command(&self, request: &CompletionRequest) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("--print");
        if let Some(model) = &request.model {
            cmd.arg("--model").arg(model);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl LanguageModel for ClaudeCli {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelError> {
        let start = Instant::now();
        let prompt = request.to_transcript();

        let mut child = self
            .build_command(&request)
            .spawn()
            .map_err(|source| ModelError::SpawnFailed {
                command: self.command.clone(),
                source,
            })?;

        tracing::debug!(
            command = %self.command,
            pid = child.id().unwrap_or(0),
            prompt_chars = prompt.len(),
            "spawned model process"
        );

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let status = output.status;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = status.code().unwrap_or(-1);
        tracing::debug!(
            exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model process finished"
        );

        if !status.success() {
            return Err(ModelError::NonZeroExit {
                exit_code,
                stderr: stderr.trim().to_string(),
            });
        }

        let text = stdout.trim();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "claude-cli"
    }
}
