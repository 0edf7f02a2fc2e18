//! Firebase REST client: Firestore for documents, Identity Toolkit for
//! accounts and Cloud Storage for avatars.

mod firestore;
mod identity;
mod storage;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

use super::BackendError;
use crate::config::BackendConfig;

/// Shared HTTP client and endpoints for the three Firebase services
pub struct FirebaseBackend {
    client: Client,
    api_key: String,
    access_token: Option<String>,
    /// `{endpoint}/v1/projects/{project}/databases/(default)/documents`
    firestore_base: String,
    /// `{endpoint}/v1/accounts`
    identity_base: String,
    /// `{endpoint}/v0/b/{bucket}/o`
    storage_base: String,
}

impl FirebaseBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone().filter(|token| !token.is_empty()),
            firestore_base: format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                config.firestore_endpoint.trim_end_matches('/'),
                config.project_id
            ),
            identity_base: format!("{}/v1/accounts", config.identity_endpoint.trim_end_matches('/')),
            storage_base: format!(
                "{}/v0/b/{}/o",
                config.storage_endpoint.trim_end_matches('/'),
                config.storage_bucket
            ),
        })
    }

    /// Attach the API key and, when configured, the service access token
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.query(&[("key", self.api_key.as_str())]);
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode the JSON body, mapping error statuses
    async fn execute(&self, request: RequestBuilder) -> Result<Value, BackendError> {
        let response = self.authorize(request).send().await?;
        read_json(response).await
    }
}

async fn read_json(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()));
    }

    let code = error_code(&body).unwrap_or_else(|| status.as_str().to_string());
    tracing::warn!(status = %status, code = %code, "Backend request failed");

    Err(match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(code),
        StatusCode::TOO_MANY_REQUESTS => BackendError::Unavailable(code),
        status if status.is_server_error() => BackendError::Unavailable(code),
        _ => BackendError::Rejected(code),
    })
}

/// Extract the domain code from a Google API error body. Identity Toolkit puts
/// it at the start of `error.message` (`WEAK_PASSWORD : Password should...`),
/// the other services in `error.status`.
fn error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    let from_message = error
        .get("message")
        .and_then(Value::as_str)
        .and_then(|message| message.split_whitespace().next())
        .filter(|token| {
            !token.is_empty()
                && token
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        })
        .map(str::to_string);

    from_message.or_else(|| error.get("status").and_then(Value::as_str).map(str::to_string))
}
