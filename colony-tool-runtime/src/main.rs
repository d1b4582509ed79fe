//! Tool runtime service.
//!
//! # Environment Variables
//!
//! - `NATS_URL`: broker address (required)
//! - `PORT`: HTTP port for `/schemas` and `/health` (required)

use colony_bus::{EventBus, NatsBus};
use colony_tool_runtime::{
    create_agent_tool, register_builtins, router, ToolRegistry, ToolRuntime,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colony_tool_runtime=info,colony_bus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let nats_url = require_env("NATS_URL");
    let port: u16 = require_env("PORT")
        .parse()
        .unwrap_or_else(|err| fatal("PORT", err));

    let bus: Arc<dyn EventBus> = Arc::new(
        NatsBus::connect(&nats_url)
            .await
            .unwrap_or_else(|err| fatal("event bus", err)),
    );

    let registry = Arc::new(ToolRegistry::new());
    register_builtins(&registry).unwrap_or_else(|err| fatal("built-in tools", err));

    let runtime = Arc::new(ToolRuntime::new(bus.clone(), registry.clone()));
    registry
        .register(create_agent_tool(
            bus.clone(),
            registry.clone(),
            runtime.waiters(),
        ))
        .unwrap_or_else(|err| fatal("create_agent tool", err));

    runtime
        .subscribe()
        .await
        .unwrap_or_else(|err| fatal("subscriptions", err));

    let app = router(registry).layer(TraceLayer::new_for_http());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| fatal("listener", err));
    tracing::info!(%addr, "tool runtime started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|err| fatal("server", err));

    tracing::info!("shutting down tool runtime");
    runtime.shutdown();
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
