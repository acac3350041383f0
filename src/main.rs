use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use taskboard::config::API_URL_ENV;
use taskboard::logging::{self, LogConfig, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Kanban task board with optimistic sync")]
pub struct Cli {
    /// Base URL of the task service (e.g. http://127.0.0.1:3141/api/tasks)
    #[arg(long, global = true, env = API_URL_ENV)]
    pub api_url: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format: text or json
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the three columns
    Board,
    /// Add a task to the To Do column
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },
    /// Move a task to another column (TODO, IN_PROGRESS, DONE)
    Move { id: String, column: String },
    /// Delete one or more tasks
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Run the reference task service
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "3141")]
        port: u16,

        /// Database path
        #[arg(long, default_value = ".taskboard/tasks.db")]
        db_path: PathBuf,

        /// Keep tasks in memory only
        #[arg(long)]
        in_memory: bool,

        /// Enable dev mode (permissive CORS, bind on all interfaces)
        #[arg(long)]
        dev: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&LogConfig::new(cli.verbose, cli.log_format))?;
    let api_url = cli.api_url.as_deref();

    match &cli.command {
        Commands::Board => cmd::cmd_board(api_url).await?,
        Commands::Add { title, description } => {
            cmd::cmd_add(api_url, title, description).await?
        }
        Commands::Move { id, column } => cmd::cmd_move(api_url, id, column).await?,
        Commands::Rm { ids } => cmd::cmd_rm(api_url, ids).await?,
        Commands::Serve {
            port,
            db_path,
            in_memory,
            dev,
        } => {
            cmd::cmd_serve(*port, db_path.clone(), *in_memory, *dev).await?;
        }
    }

    Ok(())
}
