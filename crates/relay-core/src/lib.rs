//! Shared types for the relay: session identifiers, delivery-channel events,
//! the conversation envelope, and the upstream provider seam.

pub mod chat;
pub mod error;
pub mod event;
pub mod ids;
pub mod provider;

pub use chat::ChatMessage;
pub use error::ProviderError;
pub use event::SessionEvent;
pub use ids::SessionId;
pub use provider::{CompletionOptions, CompletionProvider, CompletionStream};
