//! Structured decisions returned by the router and the relevance judge.
//!
//! Both judges answer `{"next": ..., "reason": ...}`. The `next` value must
//! be exactly one of the closed set for that stage; anything else is a
//! [`WorkflowError::ClassificationFailure`], never a silent default.

use serde::{Deserialize, Serialize};

use super::Stage;
use crate::errors::WorkflowError;
use crate::util::extract_json;

/// Router choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteTarget {
    /// The request is too vague; rewrite it first.
    Refiner,
    /// The request is specific enough to build.
    Generator,
}

impl RouteTarget {
    pub fn stage(&self) -> Stage {
        match self {
            RouteTarget::Refiner => Stage::Refiner,
            RouteTarget::Generator => Stage::Generator,
        }
    }
}

/// Relevance judge verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Output does not address the request; go around again.
    Loop,
    /// Output is relevant.
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub next: RouteTarget,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDecision {
    pub next: Verdict,
    pub reason: String,
}

#[derive(Deserialize)]
struct RawDecision {
    next: String,
    reason: String,
}

fn parse_raw(stage: Stage, response: &str) -> Result<RawDecision, WorkflowError> {
    let failure = |reason: String| WorkflowError::ClassificationFailure { stage, reason };

    let json = extract_json(response)
        .ok_or_else(|| failure(format!("no JSON object in response: {}", preview(response))))?;
    let raw: RawDecision =
        serde_json::from_str(&json).map_err(|e| failure(format!("malformed decision: {}", e)))?;

    if raw.reason.trim().is_empty() {
        return Err(failure("decision has an empty reason".to_string()));
    }
    Ok(raw)
}

impl RoutingDecision {
    pub fn parse(response: &str) -> Result<Self, WorkflowError> {
        let raw = parse_raw(Stage::Router, response)?;
        let next = match raw.next.trim().to_lowercase().as_str() {
            "refiner" => RouteTarget::Refiner,
            "generator" => RouteTarget::Generator,
            other => {
                return Err(WorkflowError::ClassificationFailure {
                    stage: Stage::Router,
                    reason: format!("'{}' is not one of: refiner, generator", other),
                });
            }
        };
        Ok(Self {
            next,
            reason: raw.reason.trim().to_string(),
        })
    }
}

impl ValidationDecision {
    pub fn parse(response: &str) -> Result<Self, WorkflowError> {
        let raw = parse_raw(Stage::Checker, response)?;
        let next = match raw.next.trim().to_lowercase().as_str() {
            "loop" => Verdict::Loop,
            "terminate" => Verdict::Terminate,
            other => {
                return Err(WorkflowError::ClassificationFailure {
                    stage: Stage::Checker,
                    reason: format!("'{}' is not one of: loop, terminate", other),
                });
            }
        };
        Ok(Self {
            next,
            reason: raw.reason.trim().to_string(),
        })
    }
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 80 {
        format!("{}...", trimmed.chars().take(80).collect::<String>())
    } else {
        trimmed.to_string()
    }
}
