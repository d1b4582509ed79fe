//! LLM runtime service.
//!
//! # Environment Variables
//!
//! - `NATS_URL`: broker address (required)
//! - `OPENAI_API_KEY`: provider credential (required)
//! - `OPENAI_BASE_URL`: API base override (optional)
//! - `OPENAI_MODEL`: model override (optional)

use colony_bus::{EventBus, NatsBus};
use colony_llm_runtime::{LlmRuntime, OpenAiProvider};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colony_llm_runtime=info,colony_bus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let nats_url = require_env("NATS_URL");

    let provider = OpenAiProvider::from_env().unwrap_or_else(|err| fatal("provider", err));
    let bus: Arc<dyn EventBus> = Arc::new(
        NatsBus::connect(&nats_url)
            .await
            .unwrap_or_else(|err| fatal("event bus", err)),
    );

    let runtime = Arc::new(LlmRuntime::new(bus.clone(), Arc::new(provider)));
    runtime
        .subscribe()
        .await
        .unwrap_or_else(|err| fatal("subscriptions", err));

    tracing::info!("llm runtime started");

    shutdown_signal().await;
    tracing::info!("shutting down llm runtime");
    if let Err(err) = bus.close().await {
        tracing::warn!(%err, "bus close failed");
    }
}

fn require_env(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            eprintln!("{name} environment variable is required");
            std::process::exit(1);
        }
    }
}

fn fatal(what: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("failed to initialize {what}: {err}");
    std::process::exit(1);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
