use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use secrecy::SecretString;

use relay_core::provider::{CompletionOptions, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use relay_llm::{OpenAiProvider, DEFAULT_BASE_URL};
use relay_server::{RenderPolicy, ServerConfig};

/// Relay streaming chat completions onto per-session SSE connections.
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8088)]
    port: u16,

    /// Base URL of the completion API.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Model requested for every completion.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Token budget per completion.
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Payload rendering on the SSE wire: html or json.
    #[arg(long, default_value_t = RenderPolicy::default())]
    render: RenderPolicy,

    /// Page served at /.
    #[arg(long, default_value = "index.html")]
    static_page: PathBuf,

    /// Directory for raw submission copies; auditing is off when unset.
    #[arg(long)]
    audit_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => SecretString::from(key),
        _ => {
            tracing::warn!("OPENAI_API_KEY is not set; every submission will be refused upstream");
            SecretString::from(String::new())
        }
    };

    if let Some(dir) = &args.audit_dir {
        std::fs::create_dir_all(dir).expect("Failed to create audit directory");
    }

    let provider = Arc::new(OpenAiProvider::with_base_url(api_key, args.base_url));
    let options = CompletionOptions {
        model: args.model,
        max_tokens: args.max_tokens,
    };
    let config = ServerConfig {
        port: args.port,
        static_page: args.static_page,
        audit_dir: args.audit_dir,
        render: args.render,
    };

    let handle = relay_server::start(config, provider, options)
        .await
        .expect("Failed to start server");

    tracing::info!(port = handle.port, "Relay server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
