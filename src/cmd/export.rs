//! `frontsmith export`: write a thread's latest code to disk.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use frontsmith::conversation::ThreadId;
use frontsmith::export::write_project;
use frontsmith::workflow::engine::latest_artifact;

use super::{load_config, open_store};
use crate::Cli;

pub async fn cmd_export(
    cli: &Cli,
    project_dir: PathBuf,
    thread: &str,
    out: Option<&Path>,
) -> Result<()> {
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

    if !thread.is_approved() {
        println!("Thread {} is not approved yet; exporting the newest draft.", id);
    }

    let dir = out.map(Path::to_path_buf).unwrap_or_else(|| config.export_dir());
    let written = write_project(&latest_artifact(&thread.log), &dir)
        .with_context(|| format!("Failed to export thread {}", id))?;

    println!();
    for path in written {
        println!("  wrote {}", path.display());
    }
    println!();
    Ok(())
}
