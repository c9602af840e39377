//! Workflow engine: drives a thread through its stages.
//!
//! The engine holds no per-thread state. Each run loads the thread from the
//! store, runs stages until the checker suspends or terminates, and commits
//! every stage's turns with the following checkpoint before moving on.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::{Stage, Transition, run_stage};
use crate::config::{FrontsmithConfig, StageModels};
use crate::conversation::{Checkpoint, ConversationLog, Origin, Thread, ThreadId, ThreadSummary, Turn};
use crate::errors::{StoreError, WorkflowError};
use crate::extract::CodeArtifact;
use crate::model::LanguageModel;
use crate::store::ThreadStore;

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub max_steps: usize,
    pub models: StageModels,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            models: StageModels::default(),
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &FrontsmithConfig) -> Self {
        Self {
            max_steps: config.max_steps(),
            models: config.stage_models().clone(),
        }
    }
}

/// How a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The checker is waiting for feedback or approval.
    AwaitingHuman,
    /// The code was approved.
    Done,
}

/// One completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub stage: Stage,
    pub next: Transition,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub thread: Thread,
    pub outcome: RunOutcome,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread.id
    }

    /// Turns appended during this run.
    pub fn appended(&self) -> impl Iterator<Item = &Turn> {
        self.steps.iter().flat_map(|s| s.turns.iter())
    }

    /// Text to show the human: the newest non-user turn.
    pub fn response(&self) -> &str {
        self.thread
            .log
            .turns()
            .iter()
            .rev()
            .find(|t| t.origin != Origin::User)
            .map(|t| t.content.as_str())
            .unwrap_or("")
    }

    pub fn artifact(&self) -> CodeArtifact {
        latest_artifact(&self.thread.log)
    }
}

/// Code of a thread: the approval payload if present, else the newest generator turn.
pub fn latest_artifact(log: &ConversationLog) -> CodeArtifact {
    log.latest(Origin::Final)
        .or_else(|| log.latest(Origin::Generator))
        .map(|t| CodeArtifact::extract(&t.content))
        .unwrap_or_default()
}

pub struct Workflow {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn ThreadStore>,
    settings: WorkflowSettings,
}

impl Workflow {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn ThreadStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            model,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        &self.store
    }

    /// Create a thread named after `request` and run it.
    pub async fn start(&self, request: &str) -> Result<RunReport, WorkflowError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(WorkflowError::EmptyInput);
        }
        let id = ThreadId::for_request(request, Utc::now());
        self.start_with_id(id, request).await
    }

    /// Create a thread with a caller-chosen id and run it.
    pub async fn start_with_id(
        &self,
        id: ThreadId,
        request: &str,
    ) -> Result<RunReport, WorkflowError> {
        let request = request.trim();
        if request.is_empty() {
            return Err(WorkflowError::EmptyInput);
        }

        let turn = Turn::user(request);
        let log = ConversationLog::new(turn.clone())?;
        let checkpoint = Checkpoint::default();
        match self.store.create(&id, &turn, checkpoint).await {
            Ok(()) => {}
            Err(StoreError::ThreadExists(_)) => return Err(WorkflowError::ThreadExists(id)),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(thread = %id, "thread created");

        self.drive(Thread {
            id,
            log,
            checkpoint,
        })
        .await
    }

    /// Add human input to a thread and continue it.
    pub async fn submit(&self, id: &ThreadId, input: &str) -> Result<RunReport, WorkflowError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(WorkflowError::EmptyInput);
        }
        let mut thread = self.load(id).await?;

        let turn = Turn::user(input);
        let checkpoint = Checkpoint::at(thread.checkpoint.after_user_input());
        self.store
            .append(id, std::slice::from_ref(&turn), checkpoint)
            .await?;
        thread.log.append([turn]);
        thread.checkpoint = checkpoint;
        tracing::info!(thread = %id, next = %checkpoint.next, "human input recorded");

        self.drive(thread).await
    }

    /// Continue a run interrupted by a failure. Suspended and finished
    /// threads are returned unchanged.
    pub async fn resume(&self, id: &ThreadId) -> Result<RunReport, WorkflowError> {
        let thread = self.load(id).await?;
        self.drive(thread).await
    }

    pub async fn load(&self, id: &ThreadId) -> Result<Thread, WorkflowError> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| WorkflowError::UnknownThread(id.clone()))
    }

    pub async fn threads(&self) -> Result<Vec<ThreadSummary>, WorkflowError> {
        Ok(self.store.list().await?)
    }

    async fn drive(&self, mut thread: Thread) -> Result<RunReport, WorkflowError> {
        let mut steps: Vec<StepRecord> = Vec::new();

        loop {
            let stage = match thread.checkpoint.next.stage() {
                Some(stage) if !thread.checkpoint.awaiting_human => stage,
                _ => {
                    let outcome = if thread.checkpoint.is_done() {
                        RunOutcome::Done
                    } else {
                        RunOutcome::AwaitingHuman
                    };
                    tracing::info!(thread = %thread.id, ?outcome, steps = steps.len(), "run stopped");
                    return Ok(RunReport {
                        thread,
                        outcome,
                        steps,
                    });
                }
            };

            if steps.len() >= self.settings.max_steps {
                tracing::warn!(thread = %thread.id, limit = self.settings.max_steps, "step limit reached");
                return Err(WorkflowError::StepLimitExceeded {
                    limit: self.settings.max_steps,
                });
            }

            let outcome = run_stage(stage, self.model.as_ref(), &self.settings.models, &thread.log)
                .await
                .inspect_err(|e| tracing::error!(thread = %thread.id, %stage, error = %e, "stage failed"))?;

            if !stage.permits(outcome.next) {
                return Err(WorkflowError::IllegalTransition {
                    from: stage,
                    to: outcome.next.to_string(),
                });
            }

            let checkpoint = outcome.next.checkpoint();
            self.store
                .append(&thread.id, &outcome.turns, checkpoint)
                .await?;
            thread.log.append(outcome.turns.iter().cloned());
            thread.checkpoint = checkpoint;

            tracing::info!(
                thread = %thread.id,
                from = %stage,
                to = %outcome.next,
                turns = thread.log.len(),
                "stage complete"
            );
            steps.push(StepRecord {
                stage,
                next: outcome.next,
                turns: outcome.turns,
            });
        }
    }
}
