use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::models::{StatusPatch, Task, TaskId, TaskStatus};
use crate::config::ClientConfig;
use crate::errors::RemoteError;

/// The four persistence operations. Each is a single round trip with no
/// retry and no idempotency key.
/// Real implementation: `HttpTaskApi`. Test double: `mock::ScriptedApi`.
#[async_trait]
pub trait TaskApi: Send + Sync + 'static {
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError>;

    /// Persist a new task. The returned record is the server's version.
    async fn create_task(&self, task: &Task) -> Result<Task, RemoteError>;

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, RemoteError>;

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError>;
}

/// Which call a response belongs to; decides how error statuses map.
#[derive(Debug, Clone, Copy)]
enum Call<'a> {
    List,
    Create,
    Update(&'a TaskId),
    Delete(&'a TaskId),
}

fn error_for(call: Call<'_>, status: StatusCode, message: String) -> RemoteError {
    match (call, status) {
        (Call::Update(id) | Call::Delete(id), StatusCode::NOT_FOUND) => {
            RemoteError::NotFound(id.clone())
        }
        (
            Call::Create,
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY,
        ) => RemoteError::Validation(message),
        _ if message.is_empty() => RemoteError::Network(format!("HTTP {}", status)),
        _ => RemoteError::Network(format!("HTTP {}: {}", status, message)),
    }
}

/// Pull the message out of a `{"error": "..."}` body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// `TaskApi` over the REST surface below `/api/tasks`.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTaskApi {
    pub fn new(config: ClientConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send(
        &self,
        call: Call<'_>,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for(call, status, error_message(&body)))
    }

    fn task_url(&self, action: &str, id: &TaskId) -> Result<reqwest::Url, RemoteError> {
        self.config
            .task_endpoint(action, id.as_str())
            .map_err(|e| RemoteError::Network(format!("{:#}", e)))
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Network(format!("Malformed response: {}", e)))
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Task>, RemoteError> {
        let request = self.client.get(self.config.endpoint("gettasks"));
        let response = self.send(Call::List, request).await?;
        Self::decode(response).await
    }

    async fn create_task(&self, task: &Task) -> Result<Task, RemoteError> {
        let request = self.client.post(self.config.endpoint("addtasks")).json(task);
        let response = self.send(Call::Create, request).await?;
        Self::decode(response).await
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, RemoteError> {
        let request = self
            .client
            .patch(self.task_url("updatetask", id)?)
            .json(&StatusPatch { status });
        let response = self.send(Call::Update(id), request).await?;
        Self::decode(response).await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        let request = self.client.delete(self.task_url("deletetask", id)?);
        self.send(Call::Delete(id), request).await?;
        Ok(())
    }
}
