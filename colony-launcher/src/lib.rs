//! The launcher: HTTP front door for tasks.
//!
//! `POST /tasks` creates a pending task row, resolves the requested tool
//! names to schemas against the tool runtime, and publishes `task-create`;
//! everything after that is event choreography. `GET /results` reads the
//! task row; `GET /health` reports only when the tool runtime, the KV store
//! and the bus are all reachable. The launcher also consumes the task
//! terminal events and overwrites the row with its final state.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use colony_bus::{emit, subscribe, BusError, EventBus};
use colony_core::subject::queue;
use colony_core::{AgentId, Message, TaskCreateEvent, TaskErrorEvent, TaskFinishEvent, ToolSchema};
use colony_store::{TaskStatus, TaskStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// `POST /tasks` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub task: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub conversation: Vec<Message>,
    /// Tool names to resolve. Absent means "all registered tools"; an empty
    /// list means none.
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

/// `POST /tasks` response body.
#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub agent_id: AgentId,
    pub status: &'static str,
}

/// `GET /results` response body.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub agent_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// API errors, mapped onto status codes.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

/// Launcher state shared across handlers.
pub struct Launcher {
    bus: Arc<dyn EventBus>,
    tasks: TaskStore,
    tool_runtime_url: String,
    http: reqwest::Client,
}

impl Launcher {
    pub fn new(bus: Arc<dyn EventBus>, tasks: TaskStore, tool_runtime_url: String) -> Self {
        Self {
            bus,
            tasks,
            tool_runtime_url,
            http: reqwest::Client::new(),
        }
    }

    /// Consume the task terminal events; both handlers overwrite the row.
    pub async fn subscribe(self: &Arc<Self>) -> Result<(), BusError> {
        let this = self.clone();
        subscribe::<TaskFinishEvent, _, _>(self.bus.as_ref(), queue::LAUNCHER, move |event| {
            let this = this.clone();
            async move {
                info!(agent_id = %event.agent_id, "task finished");
                if let Err(err) = this.tasks.mark_success(&event.agent_id, &event.result).await {
                    error!(agent_id = %event.agent_id, %err, "failed to record task success");
                }
            }
        })
        .await?;

        let this = self.clone();
        subscribe::<TaskErrorEvent, _, _>(self.bus.as_ref(), queue::LAUNCHER, move |event| {
            let this = this.clone();
            async move {
                warn!(agent_id = %event.agent_id, error = %event.error, "task failed");
                if let Err(err) = this.tasks.mark_failed(&event.agent_id, &event.error).await {
                    error!(agent_id = %event.agent_id, %err, "failed to record task failure");
                }
            }
        })
        .await
    }

    /// Accept a task: pending row, schema resolution, `task-create`. The
    /// row is rolled back if either later step fails.
    pub async fn create_task(
        &self,
        request: CreateTaskRequest,
    ) -> Result<CreateTaskResponse, ApiError> {
        let agent_id = AgentId::primary();

        self.tasks
            .create_pending(&agent_id, &request.task)
            .await
            .map_err(|err| ApiError::Internal(format!("failed to create task: {err}")))?;

        let schemas = match self.fetch_schemas(request.tools.as_deref()).await {
            Ok(schemas) => schemas,
            Err(err) => {
                self.rollback(&agent_id).await;
                return Err(ApiError::Internal(format!(
                    "failed to resolve tool schemas: {err}"
                )));
            }
        };

        let event = TaskCreateEvent::new(
            agent_id.clone(),
            request.task,
            request.system_prompt,
            schemas,
            request.conversation,
        );
        if let Err(err) = emit(self.bus.as_ref(), &event).await {
            self.rollback(&agent_id).await;
            return Err(ApiError::Internal(format!("failed to publish task: {err}")));
        }

        info!(agent_id = %agent_id, "task created");
        Ok(CreateTaskResponse {
            agent_id,
            status: "pending",
        })
    }

    /// Read the task row; always answers, even for unknown ids.
    pub async fn lookup_result(&self, agent_id: &str) -> ResultResponse {
        let not_found = || ResultResponse {
            agent_id: agent_id.to_string(),
            status: "failed",
            result: None,
            message: Some("Task not found".into()),
        };

        let Ok(parsed) = AgentId::parse(agent_id) else {
            return not_found();
        };
        let record = match self.tasks.get(&parsed).await {
            Ok(Some(record)) => record,
            Ok(None) => return not_found(),
            Err(err) => {
                error!(agent_id = %parsed, %err, "failed to load task row");
                return not_found();
            }
        };

        match record.status {
            TaskStatus::Pending => ResultResponse {
                agent_id: agent_id.to_string(),
                status: "pending",
                result: None,
                message: Some("Task still in progress".into()),
            },
            TaskStatus::Success => ResultResponse {
                agent_id: agent_id.to_string(),
                status: "completed",
                result: Some(record.result),
                message: None,
            },
            TaskStatus::Failed => ResultResponse {
                agent_id: agent_id.to_string(),
                status: "failed",
                result: None,
                message: Some(record.result),
            },
        }
    }

    /// Probe every collaborator this service depends on.
    pub async fn health(&self) -> Result<(), ApiError> {
        let tool_health = self
            .http
            .get(format!("{}/health", self.tool_runtime_url))
            .send()
            .await;
        match tool_health {
            Ok(response) if response.status().is_success() => {}
            _ => return Err(ApiError::Unavailable("tool runtime not ready".into())),
        }

        if self.tasks.health_check().await.is_err() {
            return Err(ApiError::Unavailable("key-value store not ready".into()));
        }
        if !self.bus.is_connected() {
            return Err(ApiError::Unavailable("event bus not connected".into()));
        }
        Ok(())
    }

    async fn fetch_schemas(&self, tools: Option<&[String]>) -> Result<Vec<ToolSchema>, String> {
        #[derive(Serialize)]
        struct SchemasRequest<'a> {
            tools: Option<&'a [String]>,
        }
        #[derive(Deserialize)]
        struct SchemasResponse {
            #[serde(default)]
            schemas: Vec<ToolSchema>,
        }

        let response = self
            .http
            .post(format!("{}/schemas", self.tool_runtime_url))
            .json(&SchemasRequest { tools })
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("tool runtime returned status {}", response.status()));
        }
        let body: SchemasResponse = response.json().await.map_err(|err| err.to_string())?;
        Ok(body.schemas)
    }

    async fn rollback(&self, agent_id: &AgentId) {
        if let Err(err) = self.tasks.delete(agent_id).await {
            error!(agent_id = %agent_id, %err, "failed to roll back task row");
        }
    }
}

/// Build the launcher's HTTP router.
pub fn router(launcher: Arc<Launcher>) -> Router {
    Router::new()
        .route("/tasks", post(create_task))
        .route("/results", get(get_result))
        .route("/health", get(health))
        .with_state(launcher)
}

async fn create_task(
    State(launcher): State<Arc<Launcher>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    launcher.create_task(request).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct ResultQuery {
    agent_id: String,
}

async fn get_result(
    State(launcher): State<Arc<Launcher>>,
    Query(query): Query<ResultQuery>,
) -> Json<ResultResponse> {
    Json(launcher.lookup_result(&query.agent_id).await)
}

async fn health(State(launcher): State<Arc<Launcher>>) -> Result<&'static str, ApiError> {
    launcher.health().await.map(|()| "OK")
}
