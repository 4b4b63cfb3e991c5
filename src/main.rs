mod cli;
mod error;
mod qa_client;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::{Result, WrapErr};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::ChatContext;
use crate::qa_client::{DEFAULT_BASE_URL, HttpQaClient};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    options: ChatOptions,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatOptions),
}

#[derive(Args)]
struct ChatOptions {
    /// Ask a single question and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Base URL of the question-answering service
    #[arg(long, env = "HEALTHCHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Write diagnostics to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(log_level);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open log file {}", path.display()))?;
            let subscriber = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = builder.with_writer(io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let options = match cli.command {
        Some(Commands::Chat(options)) => options,
        None => cli.options,
    };

    init_tracing(options.verbose, options.log_file.as_deref())?;

    let client = HttpQaClient::new(&options.base_url)
        .wrap_err_with(|| format!("Invalid --base-url {:?}", options.base_url))?;
    info!("Starting healthcare chat against {}", client.base_url());

    let interactive = options.input.is_none();
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        options.input,
        interactive,
        Arc::new(client),
    );
    chat_context.run().await
}
