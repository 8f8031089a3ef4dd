use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;

use crate::live_scores::{SupervisorConfig, UpdateOrdering};

/// Live cricket scores over a managed datastream
#[derive(Parser, Debug, Clone)]
#[command(name = "cricket-live", version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Follow the live channel and serve the login/home/live views
    Watch(WatchArgs),
    /// Run the companion function that issues credentials and publishes updates
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Base URL of the companion function
    #[arg(
        long,
        env = "FUNCTION_URL",
        default_value = "http://localhost:3000/server/cricket-live-score-update"
    )]
    pub function_url: String,

    /// Channel to subscribe to once connected
    #[arg(long, env = "LIVE_CHANNEL", default_value = "0")]
    pub channel: String,

    /// Delay before reopening a closed live channel, in seconds
    #[arg(long, env = "RECONNECT_DELAY_SECS", default_value = "5")]
    pub reconnect_delay_secs: u64,

    /// Credential fetch timeout in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "10")]
    pub fetch_timeout_secs: u64,

    /// Transport open timeout in seconds
    #[arg(long, env = "OPEN_TIMEOUT_SECS", default_value = "10")]
    pub open_timeout_secs: u64,

    /// Client keep-alive ping interval in seconds
    #[arg(long, env = "PING_INTERVAL_SECS", default_value = "25")]
    pub ping_interval_secs: u64,

    /// Drop updates whose lastUpdate is older than the stored record's
    #[arg(long, env = "REJECT_STALE_UPDATES", default_value = "false")]
    pub reject_stale_updates: bool,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Shared access token for the dashboard (open when unset)
    #[arg(long, env = "DASHBOARD_ACCESS_TOKEN")]
    pub access_token: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Listen address for the companion function
    #[arg(long, env = "FUNCTION_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// Managed datastream REST API base URL
    #[arg(long, env = "DATASTREAM_API_URL")]
    pub datastream_api_url: String,

    /// Managed datastream API token
    #[arg(long, env = "DATASTREAM_API_TOKEN")]
    pub datastream_api_token: Option<String>,

    /// Broker channel carrying the score updates
    #[arg(long, env = "CRICKET_CHANNEL_ID", default_value = "11365000000413001")]
    pub channel_id: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Watch(args) => args.validate(),
            Command::Serve(args) => args.validate(),
        }
    }
}

impl WatchArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.function_url)
            .map_err(|e| anyhow::anyhow!("FUNCTION_URL is not a valid URL: {}", e))?;
        if self.channel.is_empty() {
            anyhow::bail!("channel must not be empty");
        }
        if self.reconnect_delay_secs == 0 {
            anyhow::bail!("reconnect_delay_secs must be positive");
        }
        if self.fetch_timeout_secs == 0 || self.open_timeout_secs == 0 {
            anyhow::bail!("timeouts must be positive");
        }
        if self.ping_interval_secs == 0 {
            anyhow::bail!("ping_interval_secs must be positive");
        }
        self.dashboard_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("DASHBOARD_ADDR is invalid: {}", e))?;
        Ok(())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            channel: self.channel.clone(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            open_timeout: Duration::from_secs(self.open_timeout_secs),
        }
    }

    pub fn ordering(&self) -> UpdateOrdering {
        if self.reject_stale_updates {
            UpdateOrdering::RejectStale
        } else {
            UpdateOrdering::ArrivalOrder
        }
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl ServeArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.datastream_api_url)
            .map_err(|e| anyhow::anyhow!("DATASTREAM_API_URL is not a valid URL: {}", e))?;
        if self.channel_id.is_empty() {
            anyhow::bail!("CRICKET_CHANNEL_ID must not be empty");
        }
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("FUNCTION_ADDR is invalid: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_defaults() {
        let config = Config::try_parse_from(["cricket-live", "watch"]).unwrap();
        config.validate().unwrap();
        let Command::Watch(args) = config.command else {
            panic!("expected watch");
        };
        let sc = args.supervisor_config();
        assert_eq!(sc.channel, "0");
        assert_eq!(sc.reconnect_delay, Duration::from_secs(5));
        assert_eq!(sc.fetch_timeout, Duration::from_secs(10));
        assert_eq!(args.ordering(), UpdateOrdering::ArrivalOrder);
    }

    #[test]
    fn test_watch_rejects_bad_values() {
        let config = Config::try_parse_from([
            "cricket-live",
            "watch",
            "--reconnect-delay-secs",
            "0",
        ])
        .unwrap();
        assert!(config.validate().is_err());

        let config =
            Config::try_parse_from(["cricket-live", "watch", "--function-url", "not a url"])
                .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serve_defaults() {
        let config = Config::try_parse_from([
            "cricket-live",
            "serve",
            "--datastream-api-url",
            "https://api.example.com/datastreams/v1",
        ])
        .unwrap();
        config.validate().unwrap();
        let Command::Serve(args) = config.command else {
            panic!("expected serve");
        };
        assert_eq!(args.channel_id, "11365000000413001");
    }
}
