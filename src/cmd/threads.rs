//! Thread listing and history: `frontsmith threads`, `frontsmith show`.

use anyhow::Result;
use console::style;
use std::path::PathBuf;

use frontsmith::conversation::ThreadId;

use super::chat::print_turn;
use super::{load_config, open_store};
use crate::Cli;

pub async fn cmd_threads(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    let config = load_config(cli, project_dir)?;

    if !config.store_path().exists() {
        println!();
        println!("No threads yet. Start one with 'frontsmith new <request>'.");
        println!();
        return Ok(());
    }

    let threads = open_store(&config)?.list().await?;
    if threads.is_empty() {
        println!();
        println!("No threads yet. Start one with 'frontsmith new <request>'.");
        println!();
        return Ok(());
    }

    println!();
    println!("{:<45} {:<15} {:<6} Updated", "Thread", "Status", "Turns");
    println!(
        "{:<45} {:<15} {:<6} -------",
        "---------------------------------------------", "---------------", "-----"
    );
    for summary in threads {
        println!(
            "{:<45} {:<15} {:<6} {}",
            summary.id.as_str(),
            summary.checkpoint.status_label(),
            summary.turns,
            summary.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    Ok(())
}

pub async fn cmd_show(cli: &Cli, project_dir: PathBuf, thread: &str) -> Result<()> {
    let config = load_config(cli, project_dir)?;
    let id = ThreadId::from(thread);

    let loaded = if config.store_path().exists() {
        open_store(&config)?.load(&id).await?
    } else {
        None
    };
    let Some(thread) = loaded else {
        anyhow::bail!("Thread {} not found", id);
    };

    println!();
    println!(
        "{} {} ({})",
        style("Thread").bold(),
        style(&thread.id).cyan(),
        thread.checkpoint.status_label()
    );
    println!();
    for turn in thread.log.turns() {
        print_turn(turn);
    }
    Ok(())
}
