use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::chat::ChatMessage;
use crate::error::ProviderError;

/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Token budget applied to every completion.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Options controlling completion generation.
#[derive(Clone, Debug)]
pub struct CompletionOptions {
    pub model: String,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Incremental output of one completion. `Ok` items are content fragments; an
/// `Err` item reports a mid-stream failure and nothing follows it; the end of
/// the stream without an error is the normal close.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Trait implemented by each upstream completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Open an incremental response stream for `conversation`. An error here
    /// is a refusal: the upstream never started streaming.
    async fn stream(
        &self,
        conversation: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionStream, ProviderError>;
}
