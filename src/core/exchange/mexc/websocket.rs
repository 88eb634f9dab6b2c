//! MEXC depth stream over WebSocket.
//!
//! MEXC spot streams require a manual `PING`/`PONG` heartbeat; silent
//! connections are dropped server-side. The endpoint list is rotated
//! round-robin on reconnect so a bad host sheds traffic to alternates.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::adapter::VENUE;
use super::messages::{WsDepthFrame, WsRequest};
use crate::core::domain::Symbol;
use crate::core::exchange::{BookEvent, BookStream};
use crate::error::{Error, Result};

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

pub struct MexcBookStream {
    endpoints: Vec<String>,
    cursor: usize,
    ws: Option<WsConnection>,
    subscription: Option<(Symbol, usize)>,
    ping_interval: Duration,
    next_ping: Instant,
}

impl MexcBookStream {
    pub fn new(endpoints: Vec<String>, ping_interval: Duration) -> Self {
        Self {
            endpoints,
            cursor: 0,
            ws: None,
            subscription: None,
            ping_interval,
            next_ping: Instant::now() + ping_interval,
        }
    }

    fn next_endpoint(&mut self) -> Result<String> {
        if self.endpoints.is_empty() {
            return Err(Error::Config("no MEXC WS endpoints configured".into()));
        }
        let url = self.endpoints[self.cursor % self.endpoints.len()].clone();
        self.cursor += 1;
        Ok(url)
    }

    async fn send_request(&mut self, request: &WsRequest) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| Error::Transport("not connected".into()))?;
        let payload = serde_json::to_string(request)?;
        ws.send(Message::Text(payload.into())).await?;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        sleep(RECONNECT_BACKOFF).await;
        self.connect().await?;
        if let Some((symbol, depth)) = self.subscription.clone() {
            self.send_request(&WsRequest::subscribe_depth(&symbol.joined(), depth))
                .await?;
        }
        Ok(())
    }

    /// Decode one text frame; `None` for heartbeats, acks, and frames we
    /// do not understand.
    fn decode_text(&self, text: &str) -> Option<BookEvent> {
        if text.contains("PONG") {
            return None;
        }
        match serde_json::from_str::<WsDepthFrame>(text) {
            Ok(frame) if frame.c.contains("limit.depth") => {
                let symbol = self.subscription.as_ref()?.0.clone();
                match frame.into_snapshot(&symbol) {
                    Ok(snapshot) => Some(BookEvent::Snapshot(snapshot)),
                    Err(e) => {
                        debug!(venue = VENUE, error = %e, "Discarding undecodable depth frame");
                        None
                    }
                }
            }
            _ => {
                debug!(venue = VENUE, "Skipping non-depth frame");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl BookStream for MexcBookStream {
    async fn connect(&mut self) -> Result<()> {
        let url = self.next_endpoint()?;
        info!(venue = VENUE, url = %url, "Connecting book stream");
        let (ws, _) = connect_async(&url).await?;
        self.ws = Some(ws);
        self.next_ping = Instant::now() + self.ping_interval;
        Ok(())
    }

    async fn subscribe(&mut self, symbol: &Symbol, depth: usize) -> Result<()> {
        self.subscription = Some((symbol.clone(), depth));
        self.send_request(&WsRequest::subscribe_depth(&symbol.joined(), depth))
            .await
    }

    async fn next_event(&mut self) -> Option<BookEvent> {
        loop {
            if self.ws.is_none() {
                if let Err(e) = self.reconnect().await {
                    warn!(venue = VENUE, error = %e, "Reconnect failed, rotating endpoint");
                    continue;
                }
                info!(venue = VENUE, "Reconnected");
            }

            if Instant::now() >= self.next_ping {
                self.next_ping = Instant::now() + self.ping_interval;
                if let Err(e) = self.send_request(&WsRequest::ping()).await {
                    warn!(venue = VENUE, error = %e, "Heartbeat send failed");
                    self.ws = None;
                    return Some(BookEvent::Disconnected {
                        reason: e.to_string(),
                    });
                }
            }

            let ws = self.ws.as_mut()?;
            let frame = tokio::select! {
                frame = ws.next() => frame,
                _ = tokio::time::sleep_until(self.next_ping) => continue,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = self.decode_text(&text) {
                        return Some(event);
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    // Aggregate-deal channel; the engine consumes depth only.
                    debug!(venue = VENUE, "Skipping binary frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.ws = None;
                    return Some(BookEvent::Disconnected {
                        reason: "stream closed".into(),
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.ws = None;
                    return Some(BookEvent::Disconnected {
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn venue(&self) -> &'static str {
        VENUE
    }
}
