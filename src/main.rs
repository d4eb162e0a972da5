use clap::{Parser, Subcommand};
use matbot::Result;
use matbot::commands::{
    AskOptions, ask_question, ingest_documents, list_documents, list_sessions, resolve_base_dir,
    run_chat, show_status,
};
use matbot::config::{Config, run_interactive_config, show_config};
use matbot::database::DocumentStatus;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "matbot")]
#[command(about = "A MATLAB help assistant answering from your documentation")]
#[command(version)]
struct Cli {
    /// Directory holding the configuration, index and chat history
    #[arg(long, global = true, env = "MATBOT_HOME")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, generation and web search settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index the PDF, text, Markdown and MATLAB files of a directory
    Ingest {
        /// Directory containing the documents
        dir: PathBuf,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Add web and Wikipedia results to the context
        #[arg(long, conflicts_with = "no_web")]
        web: bool,
        /// Answer from the local documentation only
        #[arg(long)]
        no_web: bool,
        /// Image or MATLAB file to include with the question
        #[arg(long)]
        attach: Option<PathBuf>,
        /// Save the exchange in this user's history
        #[arg(long)]
        user: Option<String>,
        /// Chat session to save the exchange in
        #[arg(long, requires = "user")]
        session: Option<String>,
    },
    /// Start an interactive chat
    Chat {
        /// Load and save this user's chat history
        #[arg(long)]
        user: Option<String>,
        /// Start with web search turned off
        #[arg(long)]
        no_web: bool,
    },
    /// List a user's chat sessions
    Sessions { user: String },
    /// List ingested documents
    Documents {
        /// Only show documents with this status (indexed, skipped or failed)
        #[arg(long)]
        status: Option<DocumentStatus>,
    },
    /// Show the health of Ollama, the vector store and the catalog
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { dir } => {
            ingest_documents(Config::load(&base_dir)?, &dir).await?;
        }
        Commands::Ask {
            question,
            web,
            no_web,
            attach,
            user,
            session,
        } => {
            let use_web = match (web, no_web) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let options = AskOptions {
                use_web,
                attachment: attach,
                user,
                session,
            };
            ask_question(Config::load(&base_dir)?, &question, options).await?;
        }
        Commands::Chat { user, no_web } => {
            run_chat(Config::load(&base_dir)?, user, no_web).await?;
        }
        Commands::Sessions { user } => {
            list_sessions(&Config::load(&base_dir)?, &user)?;
        }
        Commands::Documents { status } => {
            list_documents(&Config::load(&base_dir)?, status).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&base_dir)?).await?;
        }
    }

    Ok(())
}
