//! Upstream Credential Client
//!
//! Mints ephemeral realtime session credentials from the provider. This is a
//! plain request/response client: it holds no session state and performs no
//! retries. Callers decide what a failure means for them.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("API key not configured")]
    ConfigurationMissing,
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Provider rejected the request with status {status}")]
    ProviderRejected { status: u16, body: String },
    #[error("Provider returned a malformed payload: {0}")]
    MalformedResponse(String),
}

/// Parameters sent to the provider when minting a session credential.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CredentialRequest {
    pub model: String,
    pub voice: String,
    pub temperature: f32,
    pub instructions: String,
}

/// Defines the contract for anything that can mint a session credential.
///
/// The lifecycle manager only depends on this trait, which lets tests and
/// alternative providers stand in for the real upstream service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialClient: Send + Sync {
    /// Requests a fresh credential. The returned payload is opaque to the
    /// caller and is always a JSON object.
    async fn request_credential(&self, request: &CredentialRequest)
    -> Result<Value, CredentialError>;
}

/// A `CredentialClient` backed by the OpenAI Realtime sessions endpoint.
pub struct OpenAICredentialClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAICredentialClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Provider key. `None` is accepted so the server can start
    ///   unconfigured; every request then fails with `ConfigurationMissing`.
    /// * `base_url` - API root, e.g. [`DEFAULT_BASE_URL`].
    pub fn new(api_key: Option<SecretString>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn sessions_url(&self) -> String {
        format!("{}/realtime/sessions", self.base_url)
    }
}

#[async_trait]
impl CredentialClient for OpenAICredentialClient {
    async fn request_credential(
        &self,
        request: &CredentialRequest,
    ) -> Result<Value, CredentialError> {
        let Some(api_key) = self.api_key.as_ref() else {
            error!("API key not found in configuration");
            return Err(CredentialError::ConfigurationMissing);
        };

        info!(model = %request.model, voice = %request.voice, "Requesting realtime session credential");

        let response = self
            .http
            .post(self.sessions_url())
            .bearer_auth(api_key.expose_secret())
            .header("OpenAI-Beta", "realtime=v1")
            .json(request)
            .send()
            .await
            .map_err(|e| CredentialError::ProviderUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Provider rejected session request");
            return Err(CredentialError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CredentialError::MalformedResponse(e.without_url().to_string()))?;
        if !payload.is_object() {
            return Err(CredentialError::MalformedResponse(
                "expected a JSON object".to_string(),
            ));
        }

        info!("Successfully created provider session");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CredentialRequest {
        CredentialRequest {
            model: "gpt-4o-mini-realtime-preview-2024-12-17".to_string(),
            voice: "verse".to_string(),
            temperature: 0.9,
            instructions: String::new(),
        }
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini-realtime-preview-2024-12-17");
        assert_eq!(json["voice"], "verse");
        assert_eq!(json["instructions"], "");
        assert!((json["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = OpenAICredentialClient::new(None, "http://localhost:9000/v1/");
        assert_eq!(client.sessions_url(), "http://localhost:9000/v1/realtime/sessions");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = OpenAICredentialClient::new(None, DEFAULT_BASE_URL);
        let err = client.request_credential(&request()).await.unwrap_err();
        assert!(matches!(err, CredentialError::ConfigurationMissing));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // Bind then drop to get a port nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OpenAICredentialClient::new(
            Some(SecretString::from("sk-test".to_string())),
            format!("http://{addr}/v1"),
        );
        let err = client.request_credential(&request()).await.unwrap_err();
        assert!(matches!(err, CredentialError::ProviderUnavailable(_)));
        assert!(!err.to_string().contains("sk-test"));
    }

    #[test]
    fn test_error_display_hides_body() {
        let err = CredentialError::ProviderRejected {
            status: 401,
            body: "{\"error\":\"bad key\"}".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Provider rejected the request with status 401"
        );
    }
}
