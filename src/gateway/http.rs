// src/gateway/http.rs
//! HTTP transport for the table service query endpoint.
//!
//! Reads (`select`/`show`/`describe`) go out as GET with the statement in the
//! query string, mutations as a form-encoded POST. A 401 triggers exactly one
//! token refresh before the statement is given up as an auth failure.

use super::{classify_error, is_read_statement, GatewayError, SqlGateway, TableResponse};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_QUERY_ENDPOINT: &str = "https://www.googleapis.com/fusiontables/v2/query";

/// Source of bearer tokens. Acquisition itself is outside this crate.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token; `refresh` asks for a fresh one instead of a cached one.
    async fn token(&self, refresh: bool) -> Option<String>;
}

/// Reads the token from an environment variable on every request, so a
/// refresh picks up a value rotated by an external process.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn token(&self, refresh: bool) -> Option<String> {
        if refresh {
            // Pick up a rewritten .env as well.
            let _ = dotenvy::dotenv_override();
        }
        std::env::var(&self.var).ok().filter(|t| !t.trim().is_empty())
    }
}

pub struct StaticTokenProvider(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _refresh: bool) -> Option<String> {
        self.0.clone()
    }
}

pub struct HttpSqlGateway {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    tokens: Arc<dyn TokenProvider>,
    cached_token: Mutex<Option<String>>,
}

impl HttpSqlGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
            tokens,
            cached_token: Mutex::new(None),
        }
    }

    /// Use a preconfigured client (proxy, timeouts) instead of the default.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Current bearer token, fetching one when nothing is cached.
    pub async fn bearer_token(&self, refresh: bool) -> Option<String> {
        let mut cached = self.cached_token.lock().await;
        if refresh || cached.is_none() {
            *cached = self.tokens.token(refresh).await;
        }
        cached.clone()
    }

    async fn send(&self, sql: &str, token: Option<&str>) -> Result<Response, GatewayError> {
        let mut params: Vec<(&str, &str)> = vec![("sql", sql), ("hdrs", "false")];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }

        let request = if is_read_statement(sql) {
            self.client.get(&self.endpoint).query(&params)
        } else {
            self.client.post(&self.endpoint).form(&params)
        };
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn into_result(sql: &str, response: Response) -> Result<TableResponse, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<TableResponse>()
                .await
                .map_err(|e| GatewayError::Transport(format!("Failed to parse response: {}", e)));
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        warn!("The failing query: {}", sql);
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthFailure(body));
        }
        Err(classify_error(sql, &format!("{} {}", status, body)))
    }
}

#[async_trait]
impl SqlGateway for HttpSqlGateway {
    async fn execute(&self, sql: &str) -> Result<TableResponse, GatewayError> {
        debug!("Running SQL: {}", sql);
        let token = self.bearer_token(false).await;
        let response = self.send(sql, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::into_result(sql, response).await;
        }

        info!("Token rejected, acquiring a fresh one");
        let Some(fresh) = self.bearer_token(true).await else {
            return Err(GatewayError::AuthFailure(
                "No token available after refresh".to_string(),
            ));
        };
        let retried = self.send(sql, Some(&fresh)).await?;
        Self::into_result(sql, retried).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider(Some("abc".to_string()));
        assert_eq!(provider.token(true).await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_env_token_provider_ignores_blank() {
        std::env::set_var("TABLESYNC_TEST_BLANK_TOKEN", "  ");
        let provider = EnvTokenProvider::new("TABLESYNC_TEST_BLANK_TOKEN");
        assert_eq!(provider.token(false).await, None);
    }

    #[tokio::test]
    async fn test_bearer_token_is_cached_until_refresh() {
        let gateway = HttpSqlGateway::new(
            DEFAULT_QUERY_ENDPOINT,
            None,
            Arc::new(StaticTokenProvider(Some("t1".to_string()))),
        );
        assert_eq!(gateway.bearer_token(false).await.as_deref(), Some("t1"));
        assert_eq!(gateway.bearer_token(true).await.as_deref(), Some("t1"));
    }
}
