//! Backend endpoints: token issuance and session results.

use async_trait::async_trait;
use liveness_core::{ActionKind, OperationMode, ReferenceImage, SessionAuthorization, SessionResult};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid endpoint URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response body: {0}")]
    Decode(String),
}

/// Parameters of one token request.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    pub mode: OperationMode,
    /// Correlates the attempt across client and backend logs.
    pub device_correlation_id: &'a str,
    /// Reference image for identity verification.
    pub reference: Option<&'a ReferenceImage>,
}

/// The two backend calls a liveness attempt needs.
#[async_trait]
pub trait LivenessApi: Send + Sync {
    async fn request_token(
        &self,
        request: TokenRequest<'_>,
    ) -> Result<SessionAuthorization, ApiError>;

    async fn session_result(
        &self,
        action: ActionKind,
        session_id: &str,
    ) -> Result<SessionResult, ApiError>;
}

/// HTTP implementation against the demo backend routes.
pub struct HttpApi {
    client: Client,
    token_url: Url,
    result_url: Url,
}

impl HttpApi {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        Self::with_endpoints(&config.api_base_url, &config.token_path, &config.result_path)
    }

    pub fn with_endpoints(
        base_url: &str,
        token_path: &str,
        result_path: &str,
    ) -> Result<Self, ApiError> {
        // No request timeout: the backend bounds its own latency.
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            token_url: join_url(base_url, token_path)?,
            result_url: join_url(base_url, result_path)?,
        })
    }
}

#[async_trait]
impl LivenessApi for HttpApi {
    async fn request_token(
        &self,
        request: TokenRequest<'_>,
    ) -> Result<SessionAuthorization, ApiError> {
        let mut form = Form::new()
            .text("livenessOperationMode", request.mode.as_str())
            .text("deviceCorrelationId", request.device_correlation_id.to_string());

        if let Some(reference) = request.reference {
            let part = Part::bytes(reference.bytes.clone())
                .file_name(reference.file_name.clone())
                .mime_str(&reference.mime_type)?;
            form = form.part("file", part);
        }

        tracing::debug!(url = %self.token_url, mode = %request.mode, "POST token");
        let response = self
            .client
            .post(self.token_url.clone())
            .multipart(form)
            .send()
            .await?;

        decode(response).await
    }

    async fn session_result(
        &self,
        action: ActionKind,
        session_id: &str,
    ) -> Result<SessionResult, ApiError> {
        let body = serde_json::json!({
            "action": action,
            "sessionId": session_id,
        });

        tracing::debug!(url = %self.result_url, action = action.as_str(), session_id, "POST session result");
        let response = self
            .client
            .post(self.result_url.clone())
            .json(&body)
            .send()
            .await?;

        decode(response).await
    }
}

/// Error bodies the backend is known to send.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&text, status),
        });
    }

    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

fn error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(msg) = parsed.error.or(parsed.message).filter(|m| !m.is_empty()) {
            return msg;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn join_url(base: &str, path: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidUrl {
        url: format!("{base}{path}"),
        reason,
    };
    let mut base = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| invalid(e.to_string()))
}
