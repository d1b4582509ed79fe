//! Typed client for the launcher HTTP API.
//!
//! Submits tasks, polls for results, and checks health. Task execution is
//! asynchronous on the server side, so [`Client::wait_for_result`] is the
//! usual way to run a task to completion.

use colony_core::{AgentId, Message};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("task {agent_id} failed: {message}")]
    TaskFailed { agent_id: AgentId, message: String },

    #[error("timed out waiting for task {0}")]
    WaitTimeout(AgentId),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// `POST /tasks` request body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskRequest {
    pub task: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conversation: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// `POST /tasks` response body.
#[derive(Debug, Deserialize)]
pub struct TaskResponse {
    pub agent_id: AgentId,
    pub status: String,
}

/// `GET /results` response body.
#[derive(Debug, Deserialize)]
pub struct TaskResult {
    pub agent_id: String,
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Launcher API client.
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Submit a task; returns immediately with the pending agent id.
    pub async fn create_task(&self, request: &TaskRequest) -> Result<TaskResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/tasks", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Fetch the current state of a task.
    pub async fn get_result(&self, agent_id: &AgentId) -> Result<TaskResult, ClientError> {
        let response = self
            .http
            .get(format!("{}/results", self.base_url))
            .query(&[("agent_id", agent_id.as_str())])
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Poll until the task reaches a terminal state or `timeout` elapses.
    pub async fn wait_for_result(
        &self,
        agent_id: &AgentId,
        timeout: Duration,
    ) -> Result<String, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            let result = self.get_result(agent_id).await?;
            match result.status.as_str() {
                "completed" => return Ok(result.result.unwrap_or_default()),
                "failed" => {
                    return Err(ClientError::TaskFailed {
                        agent_id: agent_id.clone(),
                        message: result.message.unwrap_or_default(),
                    });
                }
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(ClientError::WaitTimeout(agent_id.clone()));
            }
            sleep(POLL_INTERVAL.min(deadline - Instant::now())).await;
        }
    }

    /// Whether the launcher reports itself healthy.
    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Api {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        response
            .json()
            .await
            .map_err(|err| ClientError::Http(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn request_omits_empty_optionals() {
        let body = serde_json::to_value(TaskRequest::new("say hi")).unwrap();
        assert_eq!(body, json!({"task": "say hi"}));

        let body = serde_json::to_value(
            TaskRequest::new("2+2").with_tools(vec!["calculator".into()]),
        )
        .unwrap();
        assert_eq!(body["tools"], json!(["calculator"]));
    }

    #[tokio::test]
    async fn create_and_poll_round_trip() {
        let agent_id = AgentId::primary();
        let id_for_tasks = agent_id.clone();
        let id_for_results = agent_id.clone();
        let app = Router::new()
            .route(
                "/tasks",
                post(move || {
                    let agent_id = id_for_tasks.clone();
                    async move { Json(json!({"agent_id": agent_id, "status": "pending"})) }
                }),
            )
            .route(
                "/results",
                get(move || {
                    let agent_id = id_for_results.clone();
                    async move {
                        Json(json!({
                            "agent_id": agent_id,
                            "status": "completed",
                            "result": "hi",
                        }))
                    }
                }),
            );
        let client = Client::new(serve(app).await);

        let created = client.create_task(&TaskRequest::new("say hi")).await.unwrap();
        assert_eq!(created.status, "pending");
        assert_eq!(created.agent_id, agent_id);

        let result = client
            .wait_for_result(&created.agent_id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, "hi");
    }

    #[tokio::test]
    async fn failed_task_surfaces_its_message() {
        let app = Router::new().route(
            "/results",
            get(|| async {
                Json(json!({
                    "agent_id": "agent:x",
                    "status": "failed",
                    "message": "boom",
                }))
            }),
        );
        let client = Client::new(serve(app).await);

        let agent_id = AgentId::primary();
        let outcome = client
            .wait_for_result(&agent_id, Duration::from_secs(5))
            .await;
        match outcome {
            Err(ClientError::TaskFailed { message, .. }) => assert_eq!(message, "boom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_errors_carry_status() {
        let app = Router::new().route(
            "/tasks",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "broker down"})),
                )
            }),
        );
        let client = Client::new(serve(app).await);

        let outcome = client.create_task(&TaskRequest::new("t")).await;
        match outcome {
            Err(ClientError::Api { status, .. }) => assert_eq!(status, 500),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
