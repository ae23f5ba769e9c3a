use crate::conversation::ConversationMessage;
use futures_core::stream::BoxStream;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,

    /// Instruction sent ahead of the conversation.
    pub system: String,
    pub messages: Vec<ConversationMessage>,

    /// Ask the provider to constrain its output to a JSON object.
    pub json_output: bool,
}

#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub text: String,
}

pub type ChatStream = BoxStream<'static, anyhow::Result<ChatChunk>>;

pub type StartFuture = Pin<Box<dyn Future<Output = anyhow::Result<ChatStream>> + Send>>;

/// Completion provider interface.
///
/// The returned future fails when the request itself is rejected; errors
/// after that arrive as `Err` items on the stream, which then ends.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start streaming a response.
    fn stream_chat(&self, req: ChatRequest) -> StartFuture;
}
