//! Launcher service.
//!
//! # Environment Variables
//!
//! - `NATS_URL`: broker address (required)
//! - `REDIS_URL`: key-value store address (required)
//! - `TOOL_RUNTIME_URL`: base URL of the tool runtime (required)
//! - `PORT`: HTTP port (required)

use colony_bus::{EventBus, NatsBus};
use colony_launcher::{router, Launcher};
use colony_store::{RedisKv, TaskStore};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colony_launcher=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let nats_url = require_env("NATS_URL");
    let redis_url = require_env("REDIS_URL");
    let tool_runtime_url = require_env("TOOL_RUNTIME_URL");
    let port: u16 = require_env("PORT")
        .parse()
        .unwrap_or_else(|err| fatal("PORT", err));

    let bus: Arc<dyn EventBus> = Arc::new(
        NatsBus::connect(&nats_url)
            .await
            .unwrap_or_else(|err| fatal("event bus", err)),
    );
    let kv = RedisKv::connect(&redis_url)
        .await
        .unwrap_or_else(|err| fatal("key-value store", err));

    let launcher = Arc::new(Launcher::new(
        bus.clone(),
        TaskStore::new(Arc::new(kv)),
        tool_runtime_url,
    ));
    launcher
        .subscribe()
        .await
        .unwrap_or_else(|err| fatal("subscriptions", err));

    let app = router(launcher)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| fatal("listener", err));
    tracing::info!(%addr, "launcher started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|err| fatal("server", err));

    tracing::info!("shutting down launcher");
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
