/// HTTP implementation of the remote store.
///
/// Thin request layer over the board REST API. Every request carries the
/// bearer token; 401 maps to `StoreError::Unauthorized`, any other non-2xx to
/// `RequestFailed` with the server's `detail` message when it sent one.
use async_trait::async_trait;
use kanbanai_core::error::StoreError;
use kanbanai_core::store::RemoteStore;
use kanbanai_core::types::{Column, Task, TaskDraft};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::ClientConfig;

pub struct HttpStore {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl HttpStore {
    pub fn new(base: &str, token: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::request(None, format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig, token: &str) -> Result<Self, StoreError> {
        Self::new(&config.api_base, token, config.request_timeout())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(&self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::request(None, e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(StoreError::Unauthorized);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StoreError::request(Some(status.as_u16()), failure_message(status, &text)));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        response
            .json()
            .await
            .map_err(|e| StoreError::request(Some(status), format!("Parse response: {}", e)))
    }
}

/// Characters escaped in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn encode(id: &str) -> String {
    utf8_percent_encode(id, SEGMENT).to_string()
}

/// The API reports errors as `{"detail": "..."}`; fall back to the status.
fn failure_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn list_columns(&self) -> Result<Vec<Column>, StoreError> {
        self.send_json(self.request(Method::GET, "/columns/")).await
    }

    async fn create_column(&self, name: &str) -> Result<Column, StoreError> {
        let body = serde_json::json!({ "name": name });
        self.send_json(self.request(Method::POST, "/columns/").json(&body))
            .await
    }

    async fn delete_column(&self, id: &str) -> Result<(), StoreError> {
        let path = format!("/columns/{}", encode(id));
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn reorder_columns(&self, ids_in_order: &[String]) -> Result<(), StoreError> {
        let body = serde_json::json!({ "ordered_ids": ids_in_order });
        self.send(self.request(Method::PUT, "/columns/reorder").json(&body))
            .await?;
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.send_json(self.request(Method::GET, "/tasks/")).await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, StoreError> {
        self.send_json(self.request(Method::POST, "/tasks/").json(draft))
            .await
    }

    async fn update_task(&self, id: &str, draft: &TaskDraft) -> Result<(), StoreError> {
        let path = format!("/tasks/{}", encode(id));
        self.send(self.request(Method::PUT, &path).json(draft)).await?;
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), StoreError> {
        let path = format!("/tasks/{}", encode(id));
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }
}
