// Bitbucket API Client - authenticated HTTP access shared by both dialects
use super::types::Dialect;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Clone)]
pub enum Credentials {
    /// Cloud: account name plus app password
    Basic { username: String, password: String },
    /// Server: HTTP access token
    Bearer { token: String },
}

impl Credentials {
    pub fn dialect(&self) -> Dialect {
        match self {
            Credentials::Basic { .. } => Dialect::Cloud,
            Credentials::Bearer { .. } => Dialect::Server,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bitbucket returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request to Bitbucket failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Transport(e) => e.to_string(),
        }
    }

    /// User-facing explanation; `context` describes what was being attempted.
    pub fn describe(&self, context: &str, dialect: Dialect) -> String {
        match self.status() {
            Some(404) => format!("Not found: {context}"),
            Some(401) => format!(
                "Authentication failed. Please check your {}",
                dialect.credential_hint()
            ),
            Some(403) => format!(
                "Permission denied: {context}. Ensure your credentials have the necessary permissions."
            ),
            _ => format!("Bitbucket API error: {}", self.message()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bitbucket-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.credentials.dialect()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Basic { username, password } => request.basic_auth(username, Some(password)),
            Credentials::Bearer { token } => request.bearer_auth(token),
        }
    }

    /// GET a plain-text body (diffs).
    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");

        let response = self
            .authorize(self.http.get(&url))
            .query(query)
            .header(ACCEPT, "text/plain")
            .send()
            .await?;

        Ok(check_status(response).await?.text().await?)
    }

    /// POST a JSON body and decode a JSON reply.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");

        let response = self
            .authorize(self.http.post(&url))
            .json(body)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| error_message(&value))
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    debug!(status = status.as_u16(), %message, "Bitbucket request returned an error status");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Error text from either dialect's error body.
///
/// Server: `{"errors":[{"message":..}]}`; Cloud: `{"error":{"message":..}}`; some proxies: `{"message":..}`.
pub fn error_message(body: &Value) -> Option<String> {
    body.pointer("/errors/0/message")
        .or_else(|| body.pointer("/error/message"))
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
