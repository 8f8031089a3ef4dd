//! Connection supervisor: owns the lifecycle of the single live channel.
//!
//! ```text
//!  Disconnected ──initialize──▶ (fetch credentials) ──▶ Connecting ──▶ Connected
//!       ▲                             │ fail                 │ fail        │ error event
//!       │                             ▼                      ▼             ▼
//!       │                       Error + degraded        Error + retry    Error
//!       └──────────── closed event: Disconnected + retry in 5s ──────────┘
//! ```
//!
//! Everything runs inside one task: transport events, user commands and
//! the reconnect timer are multiplexed with `select!`, so the reconciler is
//! never entered concurrently. The automatic retry reuses the credentials
//! it already holds; only an explicit [`SupervisorHandle::reconnect`]
//! fetches fresh ones. Credential failures are not retried: the board falls
//! back to static seed data until the user asks to reconnect.

use chrono::Utc;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{error, info, warn};

use super::board::ScoreBoard;
use super::provider::{Connector, CredentialSource, Transport, TransportEvent};
use super::reconciler::Reconciler;
use super::seed::seed_matches;
use crate::error::LiveError;
use crate::models::{
    ClientFrame, ConnectionCredentials, ConnectionState, ConnectionStatus, MatchCollection,
};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Channel to request credentials for and subscribe to
    pub channel: String,
    /// Fixed delay before reopening after the transport closes
    pub reconnect_delay: Duration,
    pub fetch_timeout: Duration,
    pub open_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            channel: "0".to_string(),
            reconnect_delay: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
            open_timeout: Duration::from_secs(10),
        }
    }
}

enum Command {
    Reconnect(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

pub struct Supervisor<S: CredentialSource, C: Connector> {
    source: S,
    connector: C,
    config: SupervisorConfig,
    reconciler: Reconciler,
    board: ScoreBoard,
    /// Loaded into the board when real-time mode is abandoned
    fallback: MatchCollection,
    status: watch::Sender<ConnectionStatus>,
    credentials: Option<ConnectionCredentials>,
    transport: Option<C::Transport>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl<S, C> Supervisor<S, C>
where
    S: CredentialSource,
    C: Connector,
{
    pub fn new(
        source: S,
        connector: C,
        config: SupervisorConfig,
        reconciler: Reconciler,
        board: ScoreBoard,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Supervisor {
            source,
            connector,
            config,
            reconciler,
            board,
            fallback: seed_matches(),
            status,
            credentials: None,
            transport: None,
            reconnect_timer: None,
        }
    }

    #[cfg(test)]
    fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn update_status(&self, f: impl FnOnce(&mut ConnectionStatus)) {
        self.status.send_modify(f);
    }

    /// Fetch fresh credentials and open the transport.
    ///
    /// Only a credential failure is returned; it leaves the supervisor in
    /// `Error` and marks the status degraded. Transport failures are handled
    /// internally by scheduling a retry.
    pub async fn initialize(&mut self) -> Result<(), LiveError> {
        let fetch = self.source.fetch_credentials(&self.config.channel);
        let result = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(LiveError::CredentialFetch(format!(
                "timed out after {}s",
                self.config.fetch_timeout.as_secs()
            ))),
        };

        match result {
            Ok(credentials) => {
                info!(
                    "[Supervisor] Credentials issued by {} for channel {}",
                    self.source.name(),
                    self.config.channel
                );
                self.update_status(|s| s.degraded = false);
                self.open(credentials).await;
                Ok(())
            }
            Err(e) => {
                error!("[Supervisor] Failed to initialize real-time connection: {}", e);
                let message = e.to_string();
                self.update_status(|s| {
                    s.state = ConnectionState::Error;
                    s.last_error = Some(message);
                    s.degraded = true;
                });
                Err(e)
            }
        }
    }

    /// Open the transport with `credentials` and subscribe to the channel.
    pub async fn open(&mut self, credentials: ConnectionCredentials) {
        self.reconnect_timer = None;
        if let Some(mut stale) = self.transport.take() {
            let _ = stale.close().await;
        }
        self.credentials = Some(credentials.clone());
        self.update_status(|s| {
            s.state = ConnectionState::Connecting;
            s.reconnect_pending = false;
        });

        let opened = match tokio::time::timeout(
            self.config.open_timeout,
            self.connector.connect(&credentials),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LiveError::Timeout {
                operation: "transport open",
                secs: self.config.open_timeout.as_secs(),
            }),
        };

        let mut transport = match opened {
            Ok(t) => t,
            Err(e) => {
                error!("[Supervisor] Failed to connect to real-time updates: {}", e);
                let message = e.to_string();
                self.update_status(|s| {
                    s.state = ConnectionState::Error;
                    s.last_error = Some(message);
                });
                self.schedule_reconnect();
                return;
            }
        };

        info!("[Supervisor] Connected, subscribing to channel {}", self.config.channel);
        let subscribe = ClientFrame::Subscribe {
            channel: self.config.channel.clone(),
        };
        let subscribe_error = match transport.send(subscribe.to_text()).await {
            Ok(()) => None,
            Err(e) => {
                warn!("[Supervisor] Subscribe failed: {}", e);
                Some(format!("subscribe to channel {} failed: {}", self.config.channel, e))
            }
        };
        self.transport = Some(transport);
        self.update_status(|s| {
            s.state = ConnectionState::Connected;
            s.last_error = subscribe_error;
            s.messages_received = 0;
        });
    }

    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.handle_message(&text).await,
            TransportEvent::Error(reason) => {
                let e = LiveError::TransportRuntime(reason);
                error!("[Supervisor] {}", e);
                let message = e.to_string();
                self.update_status(|s| {
                    s.state = ConnectionState::Error;
                    s.last_error = Some(message);
                });
            }
            TransportEvent::Closed => {
                warn!("[Supervisor] Live channel closed");
                self.transport = None;
                self.update_status(|s| s.state = ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    async fn handle_message(&mut self, text: &str) {
        self.update_status(|s| s.messages_received += 1);

        let envelope: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("[Supervisor] Dropping frame: {}", LiveError::from(e));
                return;
            }
        };

        let outcome = self.board.apply(&self.reconciler, &envelope).await;
        if outcome.changed() {
            self.update_status(|s| s.last_updated = Some(Utc::now()));
        }
        if !outcome.is_update() {
            return;
        }

        // At most once: a failed ack is not retried.
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.send(ClientFrame::Ack.to_text()).await {
                warn!("[Supervisor] Ack failed: {}", e);
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.credentials.is_none() {
            return;
        }
        let delay = self.config.reconnect_delay;
        info!("[Supervisor] Reconnecting in {}s...", delay.as_secs());
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
        self.update_status(|s| s.reconnect_pending = true);
    }

    /// Tear down the transport and cancel any pending reconnect. Idempotent.
    pub async fn close(&mut self) {
        self.reconnect_timer = None;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("[Supervisor] Error while closing transport: {}", e);
            }
            info!("[Supervisor] Live channel closed by client");
        }
        self.update_status(|s| {
            s.state = ConnectionState::Disconnected;
            s.reconnect_pending = false;
        });
    }

    /// Close, drop the held credentials and start over with fresh ones.
    pub async fn reconnect(&mut self) -> Result<(), LiveError> {
        self.close().await;
        self.credentials = None;
        self.initialize().await
    }

    /// Load static data when the attempt abandoned real-time mode.
    async fn fall_back_on(&mut self, attempt: Result<(), LiveError>) {
        if let Err(e) = attempt {
            if e.is_degraded() {
                self.board.load(self.fallback.clone()).await;
                warn!(
                    "[Supervisor] Real-time mode unavailable, using static data ({} matches)",
                    self.board.len().await
                );
            }
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let attempt = self.initialize().await;
        self.fall_back_on(attempt).await;

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Reconnect(done)) => {
                        info!("[Supervisor] Reconnect requested");
                        let attempt = self.reconnect().await;
                        self.fall_back_on(attempt).await;
                        let _ = done.send(());
                    }
                    Some(Command::Close(done)) => {
                        self.close().await;
                        let _ = done.send(());
                    }
                    None => {
                        self.close().await;
                        break;
                    }
                },
                event = next_event(&mut self.transport) => {
                    self.handle_event(event).await;
                }
                _ = timer_fired(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    if let Some(credentials) = self.credentials.clone() {
                        self.open(credentials).await;
                    }
                }
            }
        }
        info!("[Supervisor] Stopped");
    }
}

async fn next_event<T: Transport>(transport: &mut Option<T>) -> TransportEvent {
    match transport {
        Some(t) => t.next_event().await,
        None => std::future::pending().await,
    }
}

async fn timer_fired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Cloneable control surface for a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    board: ScoreBoard,
}

impl SupervisorHandle {
    /// Spawn the supervisor task. It initializes immediately and runs until
    /// every handle is dropped.
    pub fn spawn<S, C>(supervisor: Supervisor<S, C>) -> (Self, JoinHandle<()>)
    where
        S: CredentialSource + 'static,
        C: Connector + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let handle = SupervisorHandle {
            commands: tx,
            status: supervisor.watch_status(),
            board: supervisor.board.clone(),
        };
        let task = tokio::spawn(supervisor.run(rx));
        (handle, task)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    /// User-triggered reconnect with fresh credentials. Returns once handled.
    pub async fn reconnect(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Reconnect(tx))
            .await
            .map_err(|_| anyhow::anyhow!("supervisor stopped"))?;
        rx.await.map_err(|_| anyhow::anyhow!("supervisor stopped"))
    }

    /// Close the channel and cancel any pending reconnect. Returns once handled.
    pub async fn close(&self) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Close(tx))
            .await
            .map_err(|_| anyhow::anyhow!("supervisor stopped"))?;
        rx.await.map_err(|_| anyhow::anyhow!("supervisor stopped"))
    }
}
