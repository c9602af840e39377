//! `frontsmith serve`: HTTP backend.

use anyhow::Result;
use std::path::PathBuf;

use frontsmith::server::{ServerConfig, start_server};

use super::{load_config, open_workflow};
use crate::Cli;

pub async fn cmd_serve(cli: &Cli, project_dir: PathBuf, port: Option<u16>, dev: bool) -> Result<()> {
    let mut config = load_config(cli, project_dir)?;
    config.cli_port = port;

    let workflow = open_workflow(&config)?;
    let server = ServerConfig {
        port: config.server_port(),
        dev_mode: dev,
    };
    start_server(server, workflow).await
}
