pub mod board;
pub mod credentials;
pub mod provider;
pub mod reconciler;
pub mod seed;
pub mod supervisor;
pub mod websocket;

pub use board::ScoreBoard;
pub use credentials::HttpCredentialSource;
pub use provider::{Connector, CredentialSource, Transport, TransportEvent};
pub use reconciler::{MergeOutcome, Reconciler, UpdateOrdering};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
pub use websocket::WsConnector;

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Wire up the HTTP credential source and the WebSocket transport, seed the
/// board with static matches, and spawn the supervisor.
pub fn start_live_scores(
    function_url: &str,
    config: SupervisorConfig,
    ordering: UpdateOrdering,
    ping_interval: Duration,
) -> anyhow::Result<(SupervisorHandle, JoinHandle<()>)> {
    let source = HttpCredentialSource::new(function_url, config.fetch_timeout)?;
    let connector = WsConnector::new(ping_interval);
    let board = ScoreBoard::new(seed::seed_matches());

    info!(
        "Live scores starting (credentials: {}, channel={}, reconnect={:?}, ordering={:?})",
        function_url, config.channel, config.reconnect_delay, ordering
    );

    let supervisor = Supervisor::new(source, connector, config, Reconciler::new(ordering), board);
    Ok(SupervisorHandle::spawn(supervisor))
}
