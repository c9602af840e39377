//! The route → refine → generate → check workflow.
//!
//! Stages are a closed enum with an explicit transition table. Each stage
//! reads an immutable [`ConversationLog`](crate::conversation::ConversationLog)
//! snapshot and returns a [`StageOutcome`]: the turns to append and where
//! control goes next. The [`Workflow`] engine persists each outcome before
//! running the next stage.
//!
//! ```text
//! ROUTING --(ambiguous)--> REFINING --> ROUTING
//! ROUTING --(ready)------> GENERATING --> CHECKING
//! CHECKING --(irrelevant or change request)--> ROUTING
//! CHECKING --(no fresh feedback)--> CHECKING (suspended)
//! CHECKING --(approval token)--> DONE
//! ```

pub mod decision;
pub mod engine;
pub mod prompts;
pub mod stages;

pub use decision::{RouteTarget, RoutingDecision, ValidationDecision, Verdict};
pub use engine::{RunOutcome, RunReport, StepRecord, Workflow, WorkflowSettings};
pub use stages::run_stage;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::conversation::{Checkpoint, Turn};

/// The four workflow stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Router,
    Refiner,
    Generator,
    Checker,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Router => "router",
            Stage::Refiner => "refiner",
            Stage::Generator => "generator",
            Stage::Checker => "checker",
        }
    }

    /// Transitions this stage may hand back to the engine.
    pub fn successors(&self) -> &'static [Transition] {
        match self {
            Stage::Router => &[
                Transition::Goto(Stage::Refiner),
                Transition::Goto(Stage::Generator),
            ],
            Stage::Refiner => &[Transition::Goto(Stage::Router)],
            Stage::Generator => &[Transition::Goto(Stage::Checker)],
            Stage::Checker => &[
                Transition::Goto(Stage::Router),
                Transition::AwaitHuman,
                Transition::Terminate,
            ],
        }
    }

    pub fn permits(&self, transition: Transition) -> bool {
        self.successors().contains(&transition)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where control goes after a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "stage")]
pub enum Transition {
    Goto(Stage),
    /// Suspend until a human replies on the thread.
    AwaitHuman,
    Terminate,
}

impl Transition {
    /// Cursor to persist after taking this transition.
    pub fn checkpoint(&self) -> Checkpoint {
        match self {
            Transition::Goto(stage) => Checkpoint::at(WorkflowState::from(*stage)),
            Transition::AwaitHuman => Checkpoint::awaiting_human(),
            Transition::Terminate => Checkpoint::at(WorkflowState::Done),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Goto(stage) => write!(f, "{}", stage),
            Transition::AwaitHuman => write!(f, "awaiting human"),
            Transition::Terminate => write!(f, "end"),
        }
    }
}

/// Position of a thread in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    Routing,
    Refining,
    Generating,
    Checking,
    Done,
}

impl WorkflowState {
    /// Stage that runs in this state; `None` for the terminal state.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkflowState::Routing => Some(Stage::Router),
            WorkflowState::Refining => Some(Stage::Refiner),
            WorkflowState::Generating => Some(Stage::Generator),
            WorkflowState::Checking => Some(Stage::Checker),
            WorkflowState::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Routing => "routing",
            WorkflowState::Refining => "refining",
            WorkflowState::Generating => "generating",
            WorkflowState::Checking => "checking",
            WorkflowState::Done => "done",
        }
    }
}

impl From<Stage> for WorkflowState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Router => WorkflowState::Routing,
            Stage::Refiner => WorkflowState::Refining,
            Stage::Generator => WorkflowState::Generating,
            Stage::Checker => WorkflowState::Checking,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routing" => Ok(WorkflowState::Routing),
            "refining" => Ok(WorkflowState::Refining),
            "generating" => Ok(WorkflowState::Generating),
            "checking" => Ok(WorkflowState::Checking),
            "done" => Ok(WorkflowState::Done),
            _ => anyhow::bail!("Unknown workflow state '{}'", s),
        }
    }
}

/// Delta returned by one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub turns: Vec<Turn>,
    pub next: Transition,
}

impl StageOutcome {
    pub fn new(turn: Turn, next: Transition) -> Self {
        Self {
            turns: vec![turn],
            next,
        }
    }
}
