//! The four stage functions.
//!
//! Each takes the model handle and an immutable log snapshot and returns a
//! [`StageOutcome`]. None of them touch the store.

use super::decision::{RoutingDecision, ValidationDecision, Verdict};
use super::prompts::{GENERATOR_PROMPT, REFINER_PROMPT, ROUTER_PROMPT, checker_prompt};
use super::{Stage, StageOutcome, Transition};
use crate::approval::{is_approval, render_final_payload};
use crate::config::StageModels;
use crate::conversation::{ConversationLog, Origin, Turn};
use crate::errors::WorkflowError;
use crate::extract::CodeArtifact;
use crate::model::{ChatMessage, CompletionRequest, LanguageModel};

/// Run one stage against `log`.
pub async fn run_stage(
    stage: Stage,
    model: &dyn LanguageModel,
    models: &StageModels,
    log: &ConversationLog,
) -> Result<StageOutcome, WorkflowError> {
    let model_name = models.for_stage(stage);
    match stage {
        Stage::Router => route(model, model_name, log).await,
        Stage::Refiner => refine(model, model_name, log).await,
        Stage::Generator => generate(model, model_name, log).await,
        Stage::Checker => check(model, model_name, log).await,
    }
}

async fn call(
    stage: Stage,
    model: &dyn LanguageModel,
    request: CompletionRequest,
) -> Result<String, WorkflowError> {
    tracing::debug!(%stage, backend = model.name(), model = ?request.model, "calling model");
    model
        .complete(request)
        .await
        .map_err(|source| WorkflowError::ExternalCallFailure { stage, source })
}

async fn route(
    model: &dyn LanguageModel,
    model_name: Option<String>,
    log: &ConversationLog,
) -> Result<StageOutcome, WorkflowError> {
    let request = CompletionRequest::new(ROUTER_PROMPT)
        .with_model(model_name)
        .with_log(log);
    let response = call(Stage::Router, model, request).await?;
    let decision = RoutingDecision::parse(&response)?;

    Ok(StageOutcome::new(
        Turn::new(Origin::Router, decision.reason),
        Transition::Goto(decision.next.stage()),
    ))
}

async fn refine(
    model: &dyn LanguageModel,
    model_name: Option<String>,
    log: &ConversationLog,
) -> Result<StageOutcome, WorkflowError> {
    let request = CompletionRequest::new(REFINER_PROMPT)
        .with_model(model_name)
        .with_log(log);
    let refined = call(Stage::Refiner, model, request).await?;

    Ok(StageOutcome::new(
        Turn::new(Origin::Refiner, refined),
        Transition::Goto(Stage::Router),
    ))
}

async fn generate(
    model: &dyn LanguageModel,
    model_name: Option<String>,
    log: &ConversationLog,
) -> Result<StageOutcome, WorkflowError> {
    let request = CompletionRequest::new(GENERATOR_PROMPT)
        .with_model(model_name)
        .with_log(log);
    let code = call(Stage::Generator, model, request).await?;

    Ok(StageOutcome::new(
        Turn::new(Origin::Generator, code),
        Transition::Goto(Stage::Checker),
    ))
}

async fn check(
    model: &dyn LanguageModel,
    model_name: Option<String>,
    log: &ConversationLog,
) -> Result<StageOutcome, WorkflowError> {
    let original = log.first().content.as_str();
    let generated = log
        .latest(Origin::Generator)
        .map(|t| t.content.as_str())
        .unwrap_or("");

    let request = CompletionRequest::new(checker_prompt(original, generated))
        .with_model(model_name)
        .with_message(ChatMessage::new(
            "user",
            "Judge the generated output against the original request.",
        ));
    let response = call(Stage::Checker, model, request).await?;
    let verdict = ValidationDecision::parse(&response)?;

    if verdict.next == Verdict::Loop {
        return Ok(StageOutcome::new(
            Turn::new(
                Origin::Checker,
                format!("LLM validation failed: {}", verdict.reason),
            ),
            Transition::Goto(Stage::Router),
        ));
    }

    let outcome = match fresh_feedback(log) {
        Some(feedback) if is_approval(feedback) => StageOutcome::new(
            Turn::new(
                Origin::Final,
                render_final_payload(&CodeArtifact::extract(generated)),
            ),
            Transition::Terminate,
        ),
        Some(feedback) => StageOutcome::new(
            Turn::new(
                Origin::Checker,
                format!(
                    "The user provided the following feedback: '{}'. The code needs to be updated to address this.",
                    feedback.trim()
                ),
            ),
            Transition::Goto(Stage::Router),
        ),
        None => StageOutcome::new(
            Turn::new(
                Origin::Checker,
                format!(
                    "The code addresses the request ({}). Review it and reply with ok, yes or looks good to approve, or describe the changes you want.",
                    verdict.reason
                ),
            ),
            Transition::AwaitHuman,
        ),
    };
    Ok(outcome)
}

/// The latest user turn, if it has not been acted on yet.
///
/// A user turn is fresh when it comes after the newest generator turn, or,
/// with no generator turn, when it is not the originating request. A user
/// turn already answered by an approval payload is never fresh again.
pub fn fresh_feedback(log: &ConversationLog) -> Option<&str> {
    let user_idx = log.latest_index(Origin::User)?;
    let after_code = match log.latest_index(Origin::Generator) {
        Some(gen_idx) => user_idx > gen_idx,
        None => user_idx > 0,
    };
    let consumed = log
        .latest_index(Origin::Final)
        .is_some_and(|final_idx| final_idx > user_idx);

    (after_code && !consumed).then(|| log.turns()[user_idx].content.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::APPROVAL_BANNER;
    use crate::model::ScriptedModel;

    const PAGE: &str = "```html\n<button>Hi</button>\n```\n```css\nbutton { color: red; }\n```\n```javascript\nconsole.log(1);\n```";

    fn log_of(turns: Vec<Turn>) -> ConversationLog {
        ConversationLog::from_turns(turns).unwrap()
    }

    async fn run(stage: Stage, model: &ScriptedModel, log: &ConversationLog) -> Result<StageOutcome, WorkflowError> {
        run_stage(stage, model, &StageModels::default(), log).await
    }

    #[tokio::test]
    async fn test_router_routes_to_refiner() {
        let model = ScriptedModel::with_responses([r#"{"next": "refiner", "reason": "too vague"}"#]);
        let log = log_of(vec![Turn::user("a website")]);

        let outcome = run(Stage::Router, &model, &log).await.unwrap();
        assert_eq!(outcome.next, Transition::Goto(Stage::Refiner));
        assert_eq!(outcome.turns.len(), 1);
        assert_eq!(outcome.turns[0].origin, Origin::Router);
        assert_eq!(outcome.turns[0].content, "too vague");

        let sent = &model.requests()[0];
        assert_eq!(sent.system, ROUTER_PROMPT);
        assert_eq!(sent.messages[0].content, "a website");
    }

    #[tokio::test]
    async fn test_router_does_not_require_user_last() {
        let model = ScriptedModel::with_responses([r#"{"next": "generator", "reason": "refined"}"#]);
        let log = log_of(vec![
            Turn::user("a website"),
            Turn::new(Origin::Router, "too vague"),
            Turn::new(Origin::Refiner, "A landing page with a hero and a contact form."),
        ]);
        let outcome = run(Stage::Router, &model, &log).await.unwrap();
        assert_eq!(outcome.next, Transition::Goto(Stage::Generator));
    }

    #[tokio::test]
    async fn test_router_invalid_answer_is_classification_failure() {
        let model = ScriptedModel::with_responses([r#"{"next": "checker", "reason": "?"}"#]);
        let log = log_of(vec![Turn::user("a clock")]);
        let err = run(Stage::Router, &model, &log).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ClassificationFailure { stage: Stage::Router, .. }
        ));
    }

    #[tokio::test]
    async fn test_model_failure_is_external_call_failure() {
        let model = ScriptedModel::new();
        model.push_failure("connection reset");
        let log = log_of(vec![Turn::user("a clock")]);
        let err = run(Stage::Generator, &model, &log).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ExternalCallFailure { stage: Stage::Generator, .. }
        ));
    }

    #[tokio::test]
    async fn test_refiner_and_generator_hand_off() {
        let model = ScriptedModel::with_responses(["A red button labelled Hi.", PAGE]);
        let log = log_of(vec![Turn::user("a button")]);

        let refined = run(Stage::Refiner, &model, &log).await.unwrap();
        assert_eq!(refined.next, Transition::Goto(Stage::Router));
        assert_eq!(refined.turns[0].origin, Origin::Refiner);

        let generated = run(Stage::Generator, &model, &log).await.unwrap();
        assert_eq!(generated.next, Transition::Goto(Stage::Checker));
        assert_eq!(generated.turns[0].content, PAGE);
    }

    #[tokio::test]
    async fn test_checker_irrelevant_loops_to_router() {
        let model = ScriptedModel::with_responses([r#"{"next": "loop", "reason": "this is a clock"}"#]);
        let log = log_of(vec![
            Turn::user("a todo app"),
            Turn::new(Origin::Generator, PAGE),
            Turn::user("ok"),
        ]);
        let outcome = run(Stage::Checker, &model, &log).await.unwrap();
        assert_eq!(outcome.next, Transition::Goto(Stage::Router));
        assert_eq!(outcome.turns[0].content, "LLM validation failed: this is a clock");
    }

    #[tokio::test]
    async fn test_checker_approval_terminates_with_payload() {
        let model = ScriptedModel::with_responses([r#"{"next": "terminate", "reason": "fine"}"#]);
        let log = log_of(vec![
            Turn::user("a button"),
            Turn::new(Origin::Generator, PAGE),
            Turn::user("  Looks Good "),
        ]);
        let outcome = run(Stage::Checker, &model, &log).await.unwrap();
        assert_eq!(outcome.next, Transition::Terminate);
        let payload = &outcome.turns[0];
        assert_eq!(payload.origin, Origin::Final);
        assert!(payload.content.starts_with(APPROVAL_BANNER));
        assert!(payload.content.contains("<button>Hi</button>"));
        assert!(payload.content.contains("console.log(1);"));
    }

    #[tokio::test]
    async fn test_checker_feedback_becomes_change_request() {
        let model = ScriptedModel::with_responses([r#"{"next": "terminate", "reason": "fine"}"#]);
        let log = log_of(vec![
            Turn::user("a button"),
            Turn::new(Origin::Generator, PAGE),
            Turn::user("make it blue"),
        ]);
        let outcome = run(Stage::Checker, &model, &log).await.unwrap();
        assert_eq!(outcome.next, Transition::Goto(Stage::Router));
        assert_eq!(
            outcome.turns[0].content,
            "The user provided the following feedback: 'make it blue'. The code needs to be updated to address this."
        );
    }

    #[tokio::test]
    async fn test_checker_suspends_without_fresh_feedback() {
        let model = ScriptedModel::with_responses([r#"{"next": "terminate", "reason": "fine"}"#]);
        let log = log_of(vec![Turn::user("ok"), Turn::new(Origin::Generator, PAGE)]);
        let outcome = run(Stage::Checker, &model, &log).await.unwrap();
        assert_eq!(outcome.next, Transition::AwaitHuman);
        assert_eq!(outcome.turns[0].origin, Origin::Checker);
    }

    #[test]
    fn test_fresh_feedback_rules() {
        // originating request is never feedback
        assert_eq!(fresh_feedback(&log_of(vec![Turn::user("ok")])), None);

        let log = log_of(vec![
            Turn::user("hi"),
            Turn::new(Origin::Checker, "review"),
            Turn::user("ok"),
        ]);
        assert_eq!(fresh_feedback(&log), Some("ok"));

        let log = log_of(vec![
            Turn::user("hi"),
            Turn::user("more"),
            Turn::new(Origin::Generator, PAGE),
        ]);
        assert_eq!(fresh_feedback(&log), None);

        let log = log_of(vec![
            Turn::user("hi"),
            Turn::new(Origin::Generator, PAGE),
            Turn::user("ok"),
            Turn::new(Origin::Final, "Final Code Approved!"),
        ]);
        assert_eq!(fresh_feedback(&log), None);
    }
}
