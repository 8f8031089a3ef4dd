use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::provider::CredentialSource;
use crate::error::LiveError;
use crate::models::ConnectionCredentials;

/// Fetches channel credentials from the companion function's
/// `GET /cricket-scores` endpoint.
pub struct HttpCredentialSource {
    http: Client,
    /// Base URL of the companion function, e.g. `http://localhost:9000/server/cricket-live-score-update`
    base_url: String,
}

/// Response body of `GET /cricket-scores`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialResponse {
    success: bool,
    #[serde(default)]
    websocket: Option<ConnectionCredentials>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpCredentialSource {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpCredentialSource {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    fn name(&self) -> &str {
        "cricket-scores"
    }

    async fn fetch_credentials(&self, channel_id: &str) -> Result<ConnectionCredentials, LiveError> {
        let url = format!("{}/cricket-scores", self.base_url);
        debug!("Fetching connection credentials from {} (channel {})", url, channel_id);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LiveError::CredentialFetch(format!("request failed: {}", e)))?;

        let status = resp.status();
        let body: CredentialResponse = resp.json().await.map_err(|e| {
            LiveError::CredentialFetch(format!("unreadable response ({}): {}", status, e))
        })?;

        parse_credential_response(body)
    }
}

fn parse_credential_response(body: CredentialResponse) -> Result<ConnectionCredentials, LiveError> {
    if !body.success {
        return Err(LiveError::CredentialFetch(
            body.error
                .unwrap_or_else(|| "Failed to get WebSocket configuration".to_string()),
        ));
    }
    if let Some(channel) = &body.channel_id {
        debug!("Credentials issued for broker channel {}", channel);
    }
    body.websocket
        .ok_or_else(|| LiveError::CredentialFetch("response has no websocket section".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ConnectionCredentials, LiveError> {
        parse_credential_response(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn test_parse_success() {
        let creds = parse(
            r#"{"success":true,"websocket":{"url":"wss://ds.example.com/ws","zuid":"778","key":"k1"},"channelId":"11365000000413001"}"#,
        )
        .unwrap();
        assert_eq!(creds.transport_url, "wss://ds.example.com/ws");
        assert_eq!(creds.subject_id, "778");
        assert_eq!(creds.access_key, "k1");
    }

    #[test]
    fn test_parse_failure_carries_server_error() {
        let err = parse(r#"{"success":false,"error":"channel not found"}"#).unwrap_err();
        assert!(err.is_degraded());
        assert!(err.to_string().contains("channel not found"));
    }

    #[test]
    fn test_parse_success_without_websocket_is_error() {
        let err = parse(r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, LiveError::CredentialFetch(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_credential_error() {
        // Grab a free port, then release it so nothing is listening there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source =
            HttpCredentialSource::new(&format!("http://{}", addr), std::time::Duration::from_secs(2))
                .unwrap();
        let err = source.fetch_credentials("0").await.unwrap_err();
        assert!(err.is_degraded());
    }
}
