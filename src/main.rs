mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recollect::app::App;
use recollect::config::RecollectConfig;

#[derive(Parser)]
#[command(name = "recollect", version, about = "Personal memory assistant: remember facts, recall them, and set reminders")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio unless configured or overridden)
    Serve {
        /// Transport: "stdio" or "http"
        #[arg(long)]
        transport: Option<String>,
    },
    /// Reconcile reminders, then deliver alarms until ctrl-c
    Run,
    /// Say anything: a fact, a question, a reminder, or a cancel
    Ask {
        #[arg(required = true)]
        text: Vec<String>,
        /// Print the structured reply as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remember a fact
    Save {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Search saved facts
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete one memory by ID
    Forget { id: String },
    /// Delete every memory of the default owner
    ForgetAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Embed memories saved while the embedding provider was unavailable
    Backfill,
    /// Schedule a reminder from free text, e.g. "drink water every 30 minutes"
    Remind {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List reminders
    Reminders {
        /// Include fired one-time reminders
        #[arg(long)]
        all: bool,
    },
    /// Cancel a reminder by ID
    Cancel { id: String },
    /// Push a reminder's next alarm later
    Snooze {
        id: String,
        /// Minutes from now (default from config)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Turn a one-time reminder into a recurring one
    Promote {
        id: String,
        /// Repeat interval in minutes
        #[arg(long)]
        every: Option<u32>,
    },
    /// Repair reminders and cached alarms after a crash or restart
    Reconcile,
    /// Run database diagnostics
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the ONNX embedding model to the configured cache directory
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = RecollectConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "http" | "sse" => server::serve_http(config).await?,
                "stdio" => server::serve_stdio(config).await?,
                other => anyhow::bail!("unknown transport '{other}' (expected stdio or http)"),
            }
        }
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Run => {
            let (app, alarms) = App::open(config)?;
            cli::reminders::run(&app, alarms).await?;
        }
        Command::Ask { text, json } => cli::ask::ask(&open(config)?, &text.join(" "), json).await?,
        Command::Save { text } => cli::memory::save(&open(config)?, &text.join(" ")).await?,
        Command::Search { query, json } => {
            cli::memory::search(&open(config)?, &query.join(" "), json).await?
        }
        Command::Forget { id } => cli::memory::forget(&open(config)?, &id)?,
        Command::ForgetAll { yes } => cli::memory::forget_all(&open(config)?, yes)?,
        Command::Backfill => cli::memory::backfill(&open(config)?).await?,
        Command::Remind { text } => cli::reminders::remind(&open(config)?, &text.join(" "))?,
        Command::Reminders { all } => cli::reminders::list(&open(config)?, all)?,
        Command::Cancel { id } => cli::reminders::cancel(&open(config)?, &id)?,
        Command::Snooze { id, minutes } => cli::reminders::snooze(&open(config)?, &id, minutes)?,
        Command::Promote { id, every } => cli::reminders::promote(&open(config)?, &id, every)?,
        Command::Reconcile => cli::reminders::reconcile(&open(config)?).await?,
    }

    Ok(())
}

/// Services for a one-shot command. Alarms armed here only fire while the
/// process lives; `recollect run` re-arms them from the cache.
fn open(config: RecollectConfig) -> Result<App> {
    let (app, _alarms) = App::open(config)?;
    Ok(app)
}
