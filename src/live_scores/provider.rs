use async_trait::async_trait;

use crate::error::LiveError;
use crate::models::ConnectionCredentials;

/// Source of short-lived connection credentials for the live channel.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Issue credentials for one connection attempt on `channel_id`.
    async fn fetch_credentials(&self, channel_id: &str) -> Result<ConnectionCredentials, LiveError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Something that happened on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the channel
    Message(String),
    /// Runtime failure; the transport is not closed by this alone
    Error(String),
    /// The transport is gone and will yield nothing more
    Closed,
}

/// An open live-update connection, consumed by a single owner.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), LiveError>;

    /// Wait for the next event. Must keep returning `Closed` once closed.
    async fn next_event(&mut self) -> TransportEvent;

    async fn close(&mut self) -> Result<(), LiveError>;
}

/// Opens transports from credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport + 'static;

    async fn connect(&self, credentials: &ConnectionCredentials)
        -> Result<Self::Transport, LiveError>;
}
