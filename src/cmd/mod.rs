//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                   |
//! |------------|------------------------------------|
//! | `chat`     | `New`, `Reply`, `Resume`, `Chat`   |
//! | `threads`  | `Threads`, `Show`                  |
//! | `export`   | `Export`                           |
//! | `serve`    | `Serve`                            |
//! | `config`   | `Config`                           |

pub mod chat;
pub mod config;
pub mod export;
pub mod serve;
pub mod threads;

pub use chat::{cmd_chat, cmd_new, cmd_reply, cmd_resume};
pub use config::cmd_config;
pub use export::cmd_export;
pub use serve::cmd_serve;
pub use threads::{cmd_show, cmd_threads};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use frontsmith::config::FrontsmithConfig;
use frontsmith::model;
use frontsmith::store::{SqliteStore, ThreadStore};
use frontsmith::workflow::{Workflow, WorkflowSettings};

use crate::Cli;

pub(crate) fn load_config(cli: &Cli, project_dir: PathBuf) -> Result<FrontsmithConfig> {
    FrontsmithConfig::with_cli_args(project_dir, cli.verbose)
}

pub(crate) fn open_store(config: &FrontsmithConfig) -> Result<Arc<dyn ThreadStore>> {
    let path = config.store_path();
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open thread store at {}", path.display()))?;
    Ok(Arc::new(store))
}

pub(crate) fn open_workflow(config: &FrontsmithConfig) -> Result<Workflow> {
    let store = open_store(config)?;
    let model = model::from_config(config);
    tracing::debug!(backend = model.name(), store = %config.store_path().display(), "workflow ready");
    Ok(Workflow::new(model, store, WorkflowSettings::from_config(config)))
}
