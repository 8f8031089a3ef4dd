//! WebSocket transport for the managed datastream channel.
//!
//! The connection URL carries the issued credentials as query parameters
//! (`?key=..&zuid=..`). Once open, the transport is a pull-based event
//! source: the supervisor awaits [`Transport::next_event`] and gets text
//! frames, runtime errors and the final close. Keep-alive traffic is
//! handled here and never surfaces:
//!
//! ```text
//!  server ──Ping──▶ WsTransport ──Pong──▶ server
//!  server ──"ping"─▶ WsTransport ──"pong"─▶ server
//!  every N s        WsTransport ──Ping──▶ server
//! ```

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::provider::{Connector, Transport, TransportEvent};
use crate::error::LiveError;
use crate::models::ConnectionCredentials;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens [`WsTransport`]s with tokio-tungstenite.
pub struct WsConnector {
    ping_interval: Duration,
}

impl WsConnector {
    pub fn new(ping_interval: Duration) -> Self {
        WsConnector { ping_interval }
    }
}

/// Build the authenticated transport URL: `{url}?key={key}&zuid={subject}`.
pub fn transport_url(credentials: &ConnectionCredentials) -> Result<Url, LiveError> {
    let mut url = Url::parse(&credentials.transport_url).map_err(|e| {
        LiveError::TransportOpen(format!("invalid transport url {}: {}", credentials.transport_url, e))
    })?;
    url.query_pairs_mut()
        .append_pair("key", &credentials.access_key)
        .append_pair("zuid", &credentials.subject_id);
    Ok(url)
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, credentials: &ConnectionCredentials) -> Result<WsTransport, LiveError> {
        let url = transport_url(credentials)?;
        // The full URL contains the access key; log only the endpoint.
        info!("[WS] Connecting to {}", credentials.transport_url);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| LiveError::TransportOpen(e.to_string()))?;
        info!("[WS] Connected");

        Ok(WsTransport::new(ws_stream, self.ping_interval))
    }
}

/// One open WebSocket connection.
pub struct WsTransport {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
    ping_interval: tokio::time::Interval,
    /// A runtime error was reported; the next event is `Closed`
    failed: bool,
    closed: bool,
}

impl WsTransport {
    fn new(stream: WsStream, ping_every: Duration) -> Self {
        let (write, read) = stream.split();
        let mut ping_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        WsTransport {
            write,
            read,
            ping_interval,
            failed: false,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), LiveError> {
        if self.closed {
            return Err(LiveError::TransportRuntime("transport closed".into()));
        }
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| LiveError::TransportRuntime(e.to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.closed {
            return TransportEvent::Closed;
        }
        if self.failed {
            self.closed = true;
            return TransportEvent::Closed;
        }

        loop {
            tokio::select! {
                msg = self.read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            // Text-level keep-alive used by some brokers
                            if text.trim() == "ping" {
                                let _ = self.write.send(Message::Text("pong".to_string())).await;
                                continue;
                            }
                            return TransportEvent::Message(text);
                        }
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => return TransportEvent::Message(text),
                            Err(_) => warn!("[WS] Dropping non-UTF-8 binary frame"),
                        },
                        Some(Ok(Message::Ping(data))) => {
                            let _ = self.write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("[WS] Close frame received: {:?}", frame);
                            self.closed = true;
                            return TransportEvent::Closed;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            self.failed = true;
                            return TransportEvent::Error(e.to_string());
                        }
                        None => {
                            debug!("[WS] Stream ended");
                            self.closed = true;
                            return TransportEvent::Closed;
                        }
                    }
                }
                _ = self.ping_interval.tick() => {
                    if let Err(e) = self.write.send(Message::Ping(vec![])).await {
                        self.failed = true;
                        return TransportEvent::Error(format!("ping failed: {}", e));
                    }
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write
            .close()
            .await
            .map_err(|e| LiveError::TransportRuntime(e.to_string()))
    }
}
