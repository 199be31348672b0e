// src/gateway/tasks.rs
// Table-level operations outside the SQL endpoint: background task listing
// and bulk row replacement.

use super::http::HttpSqlGateway;
use super::GatewayError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

#[async_trait]
pub trait TableAdmin: Send + Sync {
    /// Number of outstanding background tasks (deletions, schema changes).
    async fn pending_tasks(&self, table: &str) -> Result<usize, GatewayError>;

    /// Replace every row of the table with the CSV payload.
    async fn replace_rows(
        &self,
        table: &str,
        csv: String,
        is_strict: bool,
        start_line: usize,
    ) -> Result<(), GatewayError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskList {
    #[serde(default)]
    total_items: usize,
}

pub struct HttpTableAdmin {
    gateway: Arc<HttpSqlGateway>,
    api_base: String,
}

impl HttpTableAdmin {
    pub fn new(gateway: Arc<HttpSqlGateway>, api_base: impl Into<String>) -> Self {
        Self {
            gateway,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn authorize(
        &self,
        request: RequestBuilder,
        refresh: bool,
    ) -> Result<RequestBuilder, GatewayError> {
        let request = match self.gateway.api_key() {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        };
        match self.gateway.bearer_token(refresh).await {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(GatewayError::AuthFailure("No token available".to_string())),
        }
    }

    /// Send a request built by `build`, rebuilding it once with a fresh
    /// token when the first attempt is rejected with 401.
    async fn send_authorized<F>(&self, what: &str, build: F) -> Result<Response, GatewayError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let response = Self::send(self.authorize(build(), false).await?).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(what, response).await;
        }

        info!("Token rejected during {}, acquiring a fresh one", what);
        let retried = Self::send(self.authorize(build(), true).await?).await?;
        Self::check(what, retried).await
    }

    async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
        request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn check(what: &str, response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthFailure(body));
        }
        Err(super::classify_error(what, &format!("{} {}", status, body)))
    }
}

#[async_trait]
impl TableAdmin for HttpTableAdmin {
    async fn pending_tasks(&self, table: &str) -> Result<usize, GatewayError> {
        let url = format!("{}/fusiontables/v2/tables/{}/tasks", self.api_base, table);
        let response = self
            .send_authorized("task list", || self.gateway.client().get(&url))
            .await?;
        let tasks: TaskList = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(tasks.total_items)
    }

    async fn replace_rows(
        &self,
        table: &str,
        csv: String,
        is_strict: bool,
        start_line: usize,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/upload/fusiontables/v2/tables/{}/replace",
            self.api_base, table
        );
        debug!("Uploading {} bytes of CSV to {}", csv.len(), url);
        let params = [
            ("uploadType", "media".to_string()),
            ("isStrict", is_strict.to_string()),
            ("startLine", start_line.to_string()),
        ];
        self.send_authorized("replace rows", || {
            self.gateway
                .client()
                .post(&url)
                .query(&params)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(csv.clone())
        })
        .await?;
        Ok(())
    }
}
