//! Agent runtime service.
//!
//! # Environment Variables
//!
//! - `NATS_URL`: broker address (required)
//! - `REDIS_URL`: key-value store address (required)

use colony_agent_runtime::AgentRuntime;
use colony_bus::{EventBus, NatsBus};
use colony_store::{AgentStore, RedisKv};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colony_agent_runtime=info,colony_bus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let nats_url = require_env("NATS_URL");
    let redis_url = require_env("REDIS_URL");

    let bus: Arc<dyn EventBus> = Arc::new(
        NatsBus::connect(&nats_url)
            .await
            .unwrap_or_else(|err| fatal("event bus", err)),
    );
    let kv = RedisKv::connect(&redis_url)
        .await
        .unwrap_or_else(|err| fatal("key-value store", err));

    let runtime = Arc::new(AgentRuntime::new(bus.clone(), AgentStore::new(Arc::new(kv))));
    runtime
        .subscribe()
        .await
        .unwrap_or_else(|err| fatal("subscriptions", err));

    tracing::info!("agent runtime started");

    shutdown_signal().await;
    tracing::info!("shutting down agent runtime");
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
