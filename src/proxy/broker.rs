use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Connection token pair issued by the managed datastream for one client.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub url: String,
    #[serde(rename = "wss-id")]
    pub wss_id: String,
    pub key: String,
}

impl TokenPair {
    /// Subject id: everything after the first `_` of `wss-id`, or the
    /// whole id when it has none.
    pub fn subject_id(&self) -> &str {
        match self.wss_id.find('_') {
            Some(i) => &self.wss_id[i + 1..],
            None => &self.wss_id,
        }
    }
}

/// Publish/subscribe broker behind the companion function.
#[async_trait]
pub trait ChannelBroker: Send + Sync {
    async fn token_pair(&self, channel_id: &str, connection_name: &str) -> Result<TokenPair>;

    async fn publish(&self, channel_id: &str, payload: &Value) -> Result<Value>;

    async fn channel_details(&self, channel_id: &str) -> Result<Value>;

    async fn live_count(&self, channel_id: &str) -> Result<Value>;
}

/// REST client for the managed datastream service.
#[derive(Clone)]
pub struct ManagedDatastream {
    http: Client,
    api_url: String,
    api_token: Option<String>,
}

impl ManagedDatastream {
    pub fn new(api_url: &str, api_token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ManagedDatastream {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn channel_url(&self, channel_id: &str, suffix: &str) -> String {
        format!("{}/channels/{}{}", self.api_url, channel_id, suffix)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send_json(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let resp = self
            .authorize(req)
            .send()
            .await
            .with_context(|| format!("Datastream {} request failed", what))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Datastream {} error {}: {}", what, status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse datastream {} response", what))
    }
}

#[async_trait]
impl ChannelBroker for ManagedDatastream {
    async fn token_pair(&self, channel_id: &str, connection_name: &str) -> Result<TokenPair> {
        let url = self.channel_url(channel_id, "/token-pair");
        debug!("Requesting token pair: {}", url);
        let req = self
            .http
            .post(&url)
            .json(&json!({ "connectionName": connection_name }));
        let raw = self.send_json(req, "token-pair").await?;
        serde_json::from_value(raw).context("Token pair response missing url, wss-id or key")
    }

    async fn publish(&self, channel_id: &str, payload: &Value) -> Result<Value> {
        let url = self.channel_url(channel_id, "/publish");
        let req = self.http.post(&url).json(payload);
        let result = self.send_json(req, "publish").await?;
        info!("Published to channel {}", channel_id);
        Ok(result)
    }

    async fn channel_details(&self, channel_id: &str) -> Result<Value> {
        let url = self.channel_url(channel_id, "");
        self.send_json(self.http.get(&url), "channel").await
    }

    async fn live_count(&self, channel_id: &str) -> Result<Value> {
        let url = self.channel_url(channel_id, "/live-count");
        self.send_json(self.http.get(&url), "live-count").await
    }
}
