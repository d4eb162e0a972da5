
use anyhow::Result;
use tracing::{error, info};

use super::conversation::Conversation;
use super::store::{ChatMessage, UserStore};
use crate::attachments::display_text;
use crate::config::Config;
use crate::embeddings::chunking::ChunkMetadata;
use crate::llm::GenerationClient;
use crate::rag::RagPipeline;

pub const EMPTY_INPUT_REPLY: &str = "Please provide a question or input.";

/// Answers chat input, or explains why it cannot
pub struct Assistant {
    pipeline: std::result::Result<RagPipeline, String>,
}

impl Assistant {
    /// Load the pipeline once. A failure is kept and reported on every reply instead of
    /// being returned.
    #[inline]
    pub async fn new(config: Config) -> Self {
        let pipeline = RagPipeline::new(config).await.map_err(|e| {
            error!("Failed to initialize RAG pipeline: {:#}", e);
            format!("{:#}", e)
        });
        Self { pipeline }
    }

    #[inline]
    pub fn from_pipeline(pipeline: RagPipeline) -> Self {
        Self {
            pipeline: Ok(pipeline),
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.pipeline.is_ok()
    }

    /// Generation client, for reading image attachments
    #[inline]
    pub fn generator(&self) -> Option<&GenerationClient> {
        self.pipeline.as_ref().ok().map(RagPipeline::generator)
    }

    /// The reply text and its citations. Failures become the reply text.
    #[inline]
    pub async fn respond(&self, input: &str, use_web: bool) -> (String, Vec<ChunkMetadata>) {
        if input.trim().is_empty() {
            return (EMPTY_INPUT_REPLY.to_string(), Vec::new());
        }

        let pipeline = match &self.pipeline {
            Ok(pipeline) => pipeline,
            Err(e) => return (format!("Models failed to load: {}", e), Vec::new()),
        };

        match pipeline.answer(input, use_web).await {
            Ok(response) => (response.answer, response.citations),
            Err(e) => {
                error!("Failed to generate response: {:#}", e);
                (format!("I encountered an error: {:#}", e), Vec::new())
            }
        }
    }
}

/// Answer `input` in the current session of `conversation` and return the reply.
///
/// The stored user message omits any attachment context. Named conversations are saved
/// to `store` afterwards.
#[inline]
pub async fn process_user_input(
    conversation: &mut Conversation,
    store: &mut UserStore,
    assistant: &Assistant,
    input: &str,
) -> Result<String> {
    if input.trim().is_empty() {
        return Ok(EMPTY_INPUT_REPLY.to_string());
    }

    info!(
        "Processing input in session {}",
        conversation.current_session()
    );
    conversation.push(ChatMessage::user(display_text(input)));

    let (reply, citations) = assistant.respond(input, conversation.web_search()).await;
    conversation.push(ChatMessage::assistant(reply.clone(), citations));

    conversation.save_to(store)?;
    Ok(reply)
}
