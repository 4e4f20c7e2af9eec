//! CLI entry point for clickpanel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clickpanel_app::{FileSessionStore, Panel, PanelConfig, SessionStore};
use clickpanel_http::HttpBackend;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

/// Browse a work-management hierarchy from the terminal.
#[derive(Parser, Debug)]
#[command(
    name = "clickpanel",
    version,
    about = "clickpanel: browse spaces, folders, lists and tasks behind a one-shot OAuth sign-in"
)]
struct Cli {
    /// Configuration file (defaults to <config_dir>/clickpanel/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the authorization link to open in a browser.
    Login,

    /// Complete sign-in from the redirect URL the browser landed on.
    Callback {
        #[arg(long)]
        url: String,
    },

    /// Show the persisted session.
    Status,

    /// Sign out and forget the persisted token.
    Logout,

    /// List spaces of the signed-in workspace.
    Spaces,

    /// List folders of a space.
    Folders {
        #[arg(long)]
        space: String,
    },

    /// List lists of a space (all folders merged) or of a folder.
    Lists {
        #[arg(long, conflicts_with = "folder", required_unless_present = "folder")]
        space: Option<String>,
        #[arg(long)]
        folder: Option<String>,
    },

    /// Print the whole space → folder → list tree.
    Tree,

    /// List tasks of a list, grouped by status.
    Tasks {
        #[arg(long)]
        list: String,
    },

    /// Show one task in detail.
    Show {
        #[arg(long)]
        task: String,
        /// List the task belongs to, used to colour its status.
        #[arg(long)]
        list: Option<String>,
    },

    /// Print the status catalog of a list.
    Statuses {
        #[arg(long)]
        list: String,
    },
}

fn main() -> Result<()> {
    let Cli { config, cmd } = Cli::parse();
    install_tracing();

    let config = PanelConfig::load(config.as_deref())?;
    tokio::runtime::Runtime::new()?.block_on(execute_command(&config, cmd))
}

async fn execute_command(config: &PanelConfig, command: Command) -> Result<()> {
    if let Command::Login = command {
        println!("{}", config.authorize_link()?);
        return Ok(());
    }

    let backend = HttpBackend::new(&config.backend_url)
        .with_context(|| format!("cannot use backend {}", config.backend_url))?;
    let durable: Arc<dyn SessionStore> =
        Arc::new(FileSessionStore::new(config.durable_session_path()?));
    let scoped: Arc<dyn SessionStore> =
        Arc::new(FileSessionStore::new(config.scoped_session_path()));
    let panel = Panel::new(backend.clone(), Arc::new(backend), durable, scoped);
    commands::run(command, &panel).await
}

fn install_tracing() {
    // RUST_LOG is honoured; INFO by default.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
