use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "frontsmith")]
#[command(version, about = "Turn page requests into reviewed HTML/CSS/JS")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new thread from a page request
    New {
        /// What to build, e.g. "a todo list with a dark theme"
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },
    /// Send feedback or an approval ("ok", "yes", "looks good") to a thread
    Reply {
        thread: String,
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },
    /// Retry a run that stopped on an error
    Resume { thread: String },
    /// Interactive session: request, review, refine, approve
    Chat {
        /// Continue an existing thread
        #[arg(long)]
        thread: Option<String>,
    },
    /// List threads, most recent first
    Threads,
    /// Print the history of a thread
    Show { thread: String },
    /// Write the latest code of a thread as index.html, style.css and script.js
    Export {
        thread: String,
        /// Output directory (defaults to [export] directory in frontsmith.toml)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run the HTTP backend
    Serve {
        /// Port to serve on (defaults to [server] port in frontsmith.toml)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (bind 0.0.0.0, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default frontsmith.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::New { request } => cmd::cmd_new(&cli, project_dir, &request.join(" ")).await?,
        Commands::Reply { thread, input } => {
            cmd::cmd_reply(&cli, project_dir, thread, &input.join(" ")).await?
        }
        Commands::Resume { thread } => cmd::cmd_resume(&cli, project_dir, thread).await?,
        Commands::Chat { thread } => cmd::cmd_chat(&cli, project_dir, thread.as_deref()).await?,
        Commands::Threads => cmd::cmd_threads(&cli, project_dir).await?,
        Commands::Show { thread } => cmd::cmd_show(&cli, project_dir, thread).await?,
        Commands::Export { thread, out } => {
            cmd::cmd_export(&cli, project_dir, thread, out.as_deref()).await?
        }
        Commands::Serve { port, dev } => cmd::cmd_serve(&cli, project_dir, *port, *dev).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
