//! Upstream completion clients: the OpenAI-compatible provider and a
//! deterministic mock for tests.

pub mod mock;
pub mod provider;
pub mod sse;

pub use mock::{MockProvider, MockResponse};
pub use provider::{OpenAiProvider, DEFAULT_BASE_URL};
