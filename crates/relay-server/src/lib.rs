//! Session registry, streaming bridge, and the HTTP surface that bridges
//! one-shot completion submissions onto long-lived SSE connections.

pub mod audit;
pub mod bridge;
pub mod publisher;
pub mod registry;
pub mod render;
pub mod server;

pub use bridge::{StreamBridge, SubmitError};
pub use registry::{RegistryError, SessionRegistry};
pub use render::RenderPolicy;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
