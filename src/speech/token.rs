//! Speech service auth bootstrap.
//!
//! Cloud speech services hand out short-lived tokens scoped to a region. The
//! backend exposes them at `GET {token_url}/speech/token`; tests and offline
//! runs use [`StaticToken`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, VoiceError};

/// Short-lived credential for the speech service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeechToken {
    pub token: String,
    pub region: String,
}

impl SpeechToken {
    pub fn new(token: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            region: region.into(),
        }
    }
}

/// Source of speech service credentials.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// Fetch a fresh token.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`VoiceError::ProviderInit`].
    async fn acquire(&self) -> Result<SpeechToken>;
}

/// Token fixed at construction time.
#[derive(Debug, Clone)]
pub struct StaticToken(SpeechToken);

impl StaticToken {
    pub fn new(token: impl Into<String>, region: impl Into<String>) -> Self {
        Self(SpeechToken::new(token, region))
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn acquire(&self) -> Result<SpeechToken> {
        Ok(self.0.clone())
    }
}

/// Fetches tokens from the backend's `/speech/token` endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenSource {
    base_url: Option<String>,
    client: reqwest::Client,
}

impl HttpTokenSource {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// `base_url` of `None` yields a source that always fails, which keeps a
    /// misconfigured deployment on the silent-degradation path.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.map(|u| u.trim_end_matches('/').to_owned()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn acquire(&self) -> Result<SpeechToken> {
        let Some(base) = &self.base_url else {
            return Err(VoiceError::ProviderInit(
                "speech token URL is not configured".to_owned(),
            ));
        };

        let url = format!("{base}/speech/token");
        let response = self
            .client
            .get(&url)
            .timeout(Self::REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| VoiceError::ProviderInit(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::ProviderInit(format!(
                "token endpoint HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let token: SpeechToken = response
            .json()
            .await
            .map_err(|e| VoiceError::ProviderInit(format!("malformed token response: {e}")))?;

        if token.token.is_empty() {
            return Err(VoiceError::ProviderInit(
                "token endpoint returned an empty token".to_owned(),
            ));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let source = StaticToken::new("abc", "eastus");
        let token = source.acquire().await.unwrap();
        assert_eq!(token, SpeechToken::new("abc", "eastus"));
    }

    #[tokio::test]
    async fn http_source_parses_token_and_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/speech/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "tok-123", "region": "westeurope"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpTokenSource::new(Some(format!("{}/", server.uri())));
        let token = source.acquire().await.unwrap();
        assert_eq!(token.token, "tok-123");
        assert_eq!(token.region, "westeurope");
    }

    #[tokio::test]
    async fn http_error_maps_to_provider_init() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/speech/token"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Failed to get token"))
            .mount(&server)
            .await;

        let source = HttpTokenSource::new(Some(server.uri()));
        let err = source.acquire().await.unwrap_err();
        match err {
            VoiceError::ProviderInit(msg) => assert!(msg.contains("500"), "got: {msg}"),
            other => panic!("expected ProviderInit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_maps_to_provider_init() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/speech/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let source = HttpTokenSource::new(Some(server.uri()));
        assert!(matches!(
            source.acquire().await,
            Err(VoiceError::ProviderInit(_))
        ));
    }

    #[tokio::test]
    async fn missing_url_fails_without_network() {
        let source = HttpTokenSource::new(None);
        assert!(matches!(
            source.acquire().await,
            Err(VoiceError::ProviderInit(_))
        ));
    }
}
