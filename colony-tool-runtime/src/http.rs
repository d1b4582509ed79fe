//! HTTP surface: schema resolution for the launcher, and liveness.

use crate::ToolRegistry;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use colony_core::ToolSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `POST /schemas` request body. A missing `tools` field means "all".
#[derive(Debug, Deserialize)]
pub struct SchemasRequest {
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

/// `POST /schemas` response body.
#[derive(Debug, Serialize)]
pub struct SchemasResponse {
    pub schemas: Vec<ToolSchema>,
}

/// Build the tool runtime's HTTP router.
pub fn router(registry: Arc<ToolRegistry>) -> Router {
    Router::new()
        .route("/schemas", post(get_schemas))
        .route("/health", get(health))
        .with_state(registry)
}

async fn get_schemas(
    State(registry): State<Arc<ToolRegistry>>,
    Json(request): Json<SchemasRequest>,
) -> Json<SchemasResponse> {
    Json(SchemasResponse {
        schemas: registry.schemas(request.tools.as_deref()),
    })
}

async fn health() -> &'static str {
    "OK"
}
