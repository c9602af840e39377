//! Running threads from the terminal: `new`, `reply`, `resume`, `chat`.

use anyhow::Result;
use chrono::Utc;
use console::style;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::path::PathBuf;

use frontsmith::conversation::{Origin, ThreadId, Turn};
use frontsmith::extract::{CodeArtifact, Language};
use frontsmith::workflow::{RunOutcome, RunReport, Transition};

use super::{load_config, open_workflow};
use crate::Cli;

pub async fn cmd_new(cli: &Cli, project_dir: PathBuf, request: &str) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let workflow = open_workflow(&config)?;
    let report = workflow.start(request).await?;
    print_report(&report);
    Ok(())
}

pub async fn cmd_reply(cli: &Cli, project_dir: PathBuf, thread: &str, input: &str) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let workflow = open_workflow(&config)?;
    let report = workflow.submit(&ThreadId::from(thread), input).await?;
    print_report(&report);
    Ok(())
}

pub async fn cmd_resume(cli: &Cli, project_dir: PathBuf, thread: &str) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let workflow = open_workflow(&config)?;
    let report = workflow.resume(&ThreadId::from(thread)).await?;
    if report.steps.is_empty() {
        println!(
            "Nothing to resume: thread {} is {}.",
            report.thread_id(),
            outcome_label(report.outcome)
        );
        return Ok(());
    }
    print_report(&report);
    Ok(())
}

pub async fn cmd_chat(cli: &Cli, project_dir: PathBuf, thread: Option<&str>) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let workflow = open_workflow(&config)?;
    let theme = ColorfulTheme::default();

    println!();
    println!("{}", style("frontsmith chat").bold());
    println!("Describe a page. Reply 'ok', 'yes' or 'looks good' to approve; leave empty to quit.");
    println!();

    let mut current: Option<ThreadId> = match thread {
        Some(id) => {
            let id = ThreadId::from(id);
            let existing = workflow.load(&id).await?;
            for turn in existing.log.turns() {
                print_turn(turn);
            }
            Some(id)
        }
        None => None,
    };

    loop {
        let prompt = match &current {
            None => "What should I build?",
            Some(_) => "Feedback",
        };
        let input: String = Input::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        if input.trim().is_empty() {
            break;
        }

        // New threads get their id up front so a retry targets the same thread.
        let (id, mut result) = match &current {
            None => {
                let id = ThreadId::for_request(input.trim(), Utc::now());
                (id.clone(), workflow.start_with_id(id, &input).await)
            }
            Some(id) => (id.clone(), workflow.submit(id, &input).await),
        };

        // Offer to retry interrupted runs from where they stopped.
        loop {
            match result {
                Ok(report) => {
                    print_report(&report);
                    current = Some(id);
                    break;
                }
                Err(e) => {
                    println!("{} {}", style("Run failed:").red().bold(), e);
                    if !e.is_model_failure() {
                        break;
                    }
                    // The thread was stored before the failing stage ran.
                    current = Some(id.clone());
                    let retry = Confirm::with_theme(&theme)
                        .with_prompt("Retry from the failed stage?")
                        .default(true)
                        .interact()?;
                    if !retry {
                        break;
                    }
                    result = workflow.resume(&id).await;
                }
            }
        }
    }

    if let Some(id) = current {
        println!();
        println!("Thread: {}", style(&id).cyan());
        println!("Export with: frontsmith export {}", id);
    }
    Ok(())
}

fn outcome_label(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::AwaitingHuman => "waiting for your review",
        RunOutcome::Done => "approved",
    }
}

pub(crate) fn print_turn(turn: &Turn) {
    let label = match turn.origin {
        Origin::User => style("you").green().bold(),
        Origin::Final => style("approved").green().bold(),
        Origin::Generator => style("generator").cyan().bold(),
        other => style(other.as_str()).dim(),
    };
    println!("{} {}", label, turn.content.trim());
    println!();
}

fn print_report(report: &RunReport) {
    println!();
    for step in &report.steps {
        let arrow = match step.next {
            Transition::Goto(stage) => format!("{} -> {}", step.stage, stage),
            Transition::AwaitHuman => format!("{} -> waiting for you", step.stage),
            Transition::Terminate => format!("{} -> done", step.stage),
        };
        println!("  {}", style(arrow).dim());
        for turn in &step.turns {
            if turn.origin != Origin::Generator && turn.origin != Origin::Final {
                println!("    {}", turn.content.trim());
            }
        }
    }
    println!();

    match report.outcome {
        RunOutcome::Done => {
            println!("{}", style(report.response().lines().next().unwrap_or("")).green().bold());
            print_artifact(&report.artifact());
        }
        RunOutcome::AwaitingHuman => {
            print_artifact(&report.artifact());
            println!("{}", report.response().trim());
        }
    }
    println!();
    println!("Thread: {}", style(report.thread_id()).cyan());
}

fn print_artifact(artifact: &CodeArtifact) {
    if artifact.is_empty() {
        println!("{}", style("(no code yet)").dim());
        return;
    }
    for language in Language::ALL {
        let code = artifact.get(language);
        if code.is_empty() {
            continue;
        }
        println!("{}", style(format!("── {} ──", language.tag())).bold());
        println!("{}", code);
        println!();
    }
}
