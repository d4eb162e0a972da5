#[cfg(test)]
mod tests;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Input;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::attachments::{Attachment, combine_with_query, process_attachment};
use crate::config::{Config, get_config_dir};
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::{Database, Document, DocumentStatus};
use crate::embeddings::chunking::ChunkMetadata;
use crate::embeddings::ollama::OllamaClient;
use crate::ingest::{IngestionReport, Ingestor};
use crate::llm::GenerationClient;
use crate::sessions::{Assistant, Conversation, UserStore, process_user_input};

/// Base directory from the command line, or `~/.matbot`
#[inline]
pub fn resolve_base_dir(base_dir: Option<PathBuf>) -> Result<PathBuf> {
    match base_dir {
        Some(dir) => Ok(dir),
        None => get_config_dir().context("Failed to determine the MatBot home directory"),
    }
}

/// One line typed into the chat loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    NewChat,
    Clear,
    Web(bool),
    Attach(PathBuf),
    Sessions,
    Question(String),
}

impl ChatCommand {
    /// Parse a chat line; the error is a usage hint to show the user
    #[inline]
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();

        match line {
            "q" | "quit" | "exit" => return Ok(Self::Quit),
            "/new" => return Ok(Self::NewChat),
            "/clear" => return Ok(Self::Clear),
            "/sessions" => return Ok(Self::Sessions),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("/web") {
            return match rest.trim() {
                "on" => Ok(Self::Web(true)),
                "off" => Ok(Self::Web(false)),
                _ => Err("Usage: /web on|off".to_string()),
            };
        }

        if let Some(rest) = line.strip_prefix("/attach") {
            let path = rest.trim();
            if path.is_empty() {
                return Err("Usage: /attach <file>".to_string());
            }
            return Ok(Self::Attach(PathBuf::from(path)));
        }

        if line.starts_with('/') {
            return Err(format!(
                "Unknown command {}. Commands: /new, /clear, /web on|off, /attach <file>, /sessions",
                line
            ));
        }

        Ok(Self::Question(line.to_string()))
    }
}

/// Citations as shown under an answer, one per line
#[inline]
pub fn format_citations(citations: &[ChunkMetadata]) -> Vec<String> {
    citations
        .iter()
        .enumerate()
        .map(|(i, citation)| match citation.page {
            Some(page) => format!("[{}] {} (page {})", i + 1, citation.source, page),
            None => format!("[{}] {}", i + 1, citation.source),
        })
        .collect()
}

/// Rebuild the index from `dir`
#[inline]
pub async fn ingest_documents(config: Config, dir: &Path) -> Result<IngestionReport> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let mut ingestor = Ingestor::new(config).await?;
    let report = ingestor.ingest_directory(dir).await?;

    println!("{}", style("Ingestion complete").bold().green());
    println!("  Files seen: {}", report.files_seen);
    println!("  Files indexed: {}", report.files_indexed);
    println!("  Files skipped: {}", report.files_skipped);
    println!("  Units loaded: {}", report.units_loaded);
    println!("  Chunks created: {}", report.chunks_created);

    Ok(report)
}

/// Options for a one-shot question
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Overrides the user's (or the configured) web search setting
    pub use_web: Option<bool>,
    pub attachment: Option<PathBuf>,
    pub user: Option<String>,
    pub session: Option<String>,
}

/// Answer one question and print the answer with its sources
#[inline]
pub async fn ask_question(config: Config, question: &str, options: AskOptions) -> Result<String> {
    let mut store = UserStore::load(config.user_store_path())?;
    let mut conversation = match &options.user {
        Some(user) => Conversation::for_user(&mut store, user, config.web.enabled),
        None => Conversation::guest(config.web.enabled),
    };
    if let Some(session) = &options.session {
        conversation.select(session);
    }
    if let Some(use_web) = options.use_web {
        conversation.set_web_search(use_web);
    }

    let input = match &options.attachment {
        Some(path) => attach_to(&config, question, path),
        None => question.to_string(),
    };

    let assistant = Assistant::new(config).await;
    let reply = process_user_input(&mut conversation, &mut store, &assistant, &input).await?;

    print_reply(&reply, conversation.messages().last().and_then(|m| m.metadata.as_deref()));
    Ok(reply)
}

/// Interactive chat until the user quits
#[inline]
pub async fn run_chat(config: Config, user: Option<String>, no_web: bool) -> Result<()> {
    let mut store = UserStore::load(config.user_store_path())?;
    let mut conversation = match &user {
        Some(user) => Conversation::for_user(&mut store, user, config.web.enabled),
        None => Conversation::guest(config.web.enabled),
    };
    if no_web {
        conversation.set_web_search(false);
    }

    eprintln!("{}", style("Loading models...").dim());
    let assistant = Assistant::new(config.clone()).await;
    if !assistant.is_ready() {
        eprintln!(
            "{}",
            style("Models failed to load; answers will report the error.").yellow()
        );
    }

    eprintln!(
        "{} {} (web search {}). Type q to quit.",
        style("MatBot chat").bold().cyan(),
        style(conversation.current_session()).cyan(),
        if conversation.web_search() { "on" } else { "off" }
    );

    let mut pending_attachment: Option<String> = None;

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;

        let command = match ChatCommand::parse(&line) {
            Ok(command) => command,
            Err(hint) => {
                eprintln!("{}", style(hint).yellow());
                continue;
            }
        };

        match command {
            ChatCommand::Quit => break,
            ChatCommand::NewChat => {
                let name = conversation.new_chat().to_string();
                conversation.save_to(&mut store)?;
                eprintln!("Started {}", style(name).cyan());
            }
            ChatCommand::Clear => {
                conversation.clear();
                conversation.save_to(&mut store)?;
                eprintln!("Cleared {}", style(conversation.current_session()).cyan());
            }
            ChatCommand::Web(enabled) => {
                conversation.set_web_search(enabled);
                conversation.save_to(&mut store)?;
                eprintln!("Web search {}", if enabled { "on" } else { "off" });
            }
            ChatCommand::Attach(path) => match attachment_context(&config, &path) {
                Ok(None) => {}
                Ok(Some(context)) => {
                    eprintln!(
                        "Attached {}; it will be sent with your next question",
                        path.display()
                    );
                    pending_attachment = Some(context);
                }
                Err(e) => {
                    error!("Failed to process attachment: {:#}", e);
                    eprintln!("{} {:#}", style("Could not read attachment:").red(), e);
                }
            },
            ChatCommand::Sessions => {
                for (name, count) in conversation.sessions() {
                    let marker = if name == conversation.current_session() {
                        "*"
                    } else {
                        " "
                    };
                    eprintln!("{} {} ({} messages)", marker, name, count);
                }
            }
            ChatCommand::Question(question) => {
                let input = match pending_attachment.take() {
                    Some(context) => combine_with_query(&question, &context),
                    None => question,
                };

                let reply =
                    process_user_input(&mut conversation, &mut store, &assistant, &input).await?;
                print_reply(
                    &reply,
                    conversation.messages().last().and_then(|m| m.metadata.as_deref()),
                );
            }
        }
    }

    Ok(())
}

/// Print a user's sessions and their message counts
#[inline]
pub fn list_sessions(config: &Config, user: &str) -> Result<()> {
    let store = UserStore::load(config.user_store_path())?;

    let Some(record) = store.user(user) else {
        println!("No user named '{}'.", user);
        return Ok(());
    };

    if record.sessions.is_empty() {
        println!("{} has no chat sessions yet.", user);
        return Ok(());
    }

    println!("Chat sessions for {} ({} total):", user, record.sessions.len());
    for (name, messages) in &record.sessions {
        let last = messages
            .last()
            .map(|m| format!(", last at {}", m.timestamp))
            .unwrap_or_default();
        println!("  {} ({} messages{})", name, messages.len(), last);
    }
    Ok(())
}

/// Print the catalog of ingested files, optionally only those with one status
#[inline]
pub async fn list_documents(
    config: &Config,
    status: Option<DocumentStatus>,
) -> Result<Vec<Document>> {
    let database = Database::initialize(config)
        .await
        .context("Failed to open catalog")?;
    let documents = match status {
        Some(status) => database.list_documents_with_status(status).await?,
        None => database.list_documents().await?,
    };

    if documents.is_empty() {
        match status {
            Some(status) => println!("No documents with status {status}."),
            None => {
                println!("No documents have been ingested yet.");
                println!("Use 'matbot ingest <dir>' to build the index.");
            }
        }
        return Ok(documents);
    }

    println!("Documents ({} total):", documents.len());
    println!();
    for document in &documents {
        println!("📄 {} [{}]", document.source, document.file_type);
        println!("   Status: {}", document.status);
        println!(
            "   Units: {}  Chunks: {}",
            document.unit_count, document.chunk_count
        );
        if let Some(message) = &document.error_message {
            println!("   Error: {}", message);
        }
        println!("   Ingested: {}", document.ingested_date);
    }
    Ok(documents)
}

/// Check Ollama, the vector store and the catalog
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 MatBot Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(config) {
        Ok(client) => match client.ping() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                for (label, model) in [
                    ("Embedding model", config.ollama.model.as_str()),
                    ("Generation model", config.generation.model.as_str()),
                    ("Vision model", config.generation.vision_model.as_str()),
                ] {
                    match client.ensure_model_available(model) {
                        Ok(()) => println!("   ✅ {}: {}", label, model),
                        Err(_) => println!("   ⚠️  {}: {} (not pulled)", label, model),
                    }
                }
            }
            Err(e) => println!("   ❌ Ollama: Unreachable - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Invalid configuration - {:#}", e),
    }

    println!();
    println!("🔍 Vector Database Status:");
    match VectorStore::new(config).await {
        Ok(store) => {
            let healthy = store.validate_integrity().await.unwrap_or(false);
            if healthy {
                println!("   ✅ LanceDB: Connected");
            } else {
                println!("   ⚠️  LanceDB: Connected but failed integrity check");
            }
            match store.count_embeddings().await {
                Ok(count) => println!("   📊 Stored chunks: {}", count),
                Err(e) => println!("   ⚠️  Stored chunks: unknown - {}", e),
            }
            println!("   🔢 Vector dimension: {}", store.vector_dimension());
        }
        Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
    }

    println!();
    println!("🗄️  Catalog Status:");
    match Database::initialize(config).await {
        Ok(database) => {
            println!("   ✅ SQLite: Connected");
            match database.totals().await {
                Ok(totals) => {
                    println!(
                        "   📚 Documents: {} ({} indexed, {} skipped, {} failed)",
                        totals.documents, totals.indexed, totals.skipped, totals.failed
                    );
                    println!("   🧩 Chunks: {}", totals.chunks);
                }
                Err(e) => println!("   ⚠️  Totals unavailable - {:#}", e),
            }
            match database.latest_run().await {
                Ok(Some(run)) => println!(
                    "   🕒 Last ingestion: {} from {} ({} chunks)",
                    run.finished_date, run.directory, run.chunks_created
                ),
                Ok(None) => println!("   📭 No ingestion has run yet"),
                Err(e) => println!("   ⚠️  Last ingestion unknown - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ SQLite: Failed to connect - {:#}", e),
    }

    println!();
    println!("🌐 Web Search:");
    println!(
        "   Enabled by default: {}",
        if config.web.enabled { "yes" } else { "no" }
    );
    if config.web.api_key().is_some() {
        println!("   ✅ Tavily API key configured");
    } else {
        println!("   ⚠️  No Tavily API key; only Wikipedia will be searched");
    }

    info!("Status report finished");
    Ok(())
}

fn attachment_context(config: &Config, path: &Path) -> Result<Option<String>> {
    let reader = GenerationClient::new(config)?;
    let attachment = process_attachment(path, &reader)?;
    Ok(question_context(&attachment))
}

/// Context sent along with a question; an unsupported file is only reported to the user
fn question_context(attachment: &Attachment) -> Option<String> {
    if *attachment == Attachment::Unsupported {
        eprintln!("{}", style(attachment.to_context()).yellow());
        return None;
    }
    Some(attachment.to_context())
}

fn attach_to(config: &Config, question: &str, path: &Path) -> String {
    match attachment_context(config, path) {
        Ok(Some(context)) => combine_with_query(question, &context),
        Ok(None) => question.to_string(),
        Err(e) => {
            warn!("Ignoring attachment {}: {:#}", path.display(), e);
            eprintln!("{} {:#}", style("Could not read attachment:").red(), e);
            question.to_string()
        }
    }
}

fn print_reply(reply: &str, citations: Option<&[ChunkMetadata]>) {
    println!();
    println!("{}", reply);

    let lines = format_citations(citations.unwrap_or_default());
    if !lines.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for line in lines {
            println!("  {}", line);
        }
    }
    println!();
}
