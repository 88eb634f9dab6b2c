//! BingX depth stream over WebSocket.
//!
//! Every server frame is gzip-compressed, including the text heartbeat:
//! the server sends `Ping` and expects a literal `Pong` back. Transport
//! keepalive is otherwise native; no manual heartbeat schedule.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::messages::{gunzip, WsDepthFrame, WsSubscribe, VENUE};
use crate::core::domain::Symbol;
use crate::core::exchange::{BookEvent, BookStream};
use crate::error::{Error, Result};

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

pub struct BingxBookStream {
    url: String,
    ws: Option<WsConnection>,
    subscription: Option<(Symbol, usize)>,
}

impl BingxBookStream {
    pub fn new(url: String) -> Self {
        Self {
            url,
            ws: None,
            subscription: None,
        }
    }

    async fn send_text(&mut self, payload: String) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| Error::Transport("not connected".into()))?;
        ws.send(Message::Text(payload.into())).await?;
        Ok(())
    }

    async fn resubscribe(&mut self) -> Result<()> {
        if let Some((symbol, depth)) = self.subscription.clone() {
            let request = WsSubscribe::depth(&symbol.to_string(), depth);
            self.send_text(serde_json::to_string(&request)?).await?;
        }
        Ok(())
    }

    /// Decode one decompressed frame. Returns the heartbeat reply to send
    /// (if any) and the decoded event (if any).
    fn decode_frame(&self, text: &str) -> (Option<&'static str>, Option<BookEvent>) {
        if text == "Ping" || text.contains("\"ping\"") {
            return (Some("Pong"), None);
        }
        match serde_json::from_str::<WsDepthFrame>(text) {
            Ok(frame) if frame.data_type.contains("@depth") => {
                let Some((symbol, _)) = self.subscription.as_ref() else {
                    return (None, None);
                };
                match frame.into_snapshot(symbol) {
                    Ok(snapshot) => (None, Some(BookEvent::Snapshot(snapshot))),
                    Err(e) => {
                        debug!(venue = VENUE, error = %e, "Discarding undecodable depth frame");
                        (None, None)
                    }
                }
            }
            _ => {
                debug!(venue = VENUE, "Skipping non-depth frame");
                (None, None)
            }
        }
    }
}

#[async_trait::async_trait]
impl BookStream for BingxBookStream {
    async fn connect(&mut self) -> Result<()> {
        info!(venue = VENUE, url = %self.url, "Connecting book stream");
        let (ws, _) = connect_async(&self.url).await?;
        self.ws = Some(ws);
        Ok(())
    }

    async fn subscribe(&mut self, symbol: &Symbol, depth: usize) -> Result<()> {
        self.subscription = Some((symbol.clone(), depth));
        self.resubscribe().await
    }

    async fn next_event(&mut self) -> Option<BookEvent> {
        loop {
            if self.ws.is_none() {
                sleep(RECONNECT_BACKOFF).await;
                if let Err(e) = self.connect().await {
                    warn!(venue = VENUE, error = %e, "Reconnect failed");
                    continue;
                }
                if let Err(e) = self.resubscribe().await {
                    warn!(venue = VENUE, error = %e, "Resubscribe failed");
                    self.ws = None;
                    continue;
                }
                info!(venue = VENUE, "Reconnected");
            }

            let ws = self.ws.as_mut()?;
            match ws.next().await {
                Some(Ok(Message::Binary(payload))) => {
                    let text = match gunzip(&payload) {
                        Ok(text) => text,
                        Err(e) => {
                            debug!(venue = VENUE, error = %e, "Discarding undecodable frame");
                            continue;
                        }
                    };
                    let (reply, event) = self.decode_frame(&text);
                    if let Some(reply) = reply {
                        if let Err(e) = self.send_text(reply.to_string()).await {
                            warn!(venue = VENUE, error = %e, "Heartbeat reply failed");
                            self.ws = None;
                            return Some(BookEvent::Disconnected {
                                reason: e.to_string(),
                            });
                        }
                        continue;
                    }
                    if let Some(event) = event {
                        return Some(event);
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    let (reply, event) = self.decode_frame(&text);
                    if let Some(reply) = reply {
                        if let Err(e) = self.send_text(reply.to_string()).await {
                            warn!(venue = VENUE, error = %e, "Heartbeat reply failed");
                            self.ws = None;
                            return Some(BookEvent::Disconnected {
                                reason: e.to_string(),
                            });
                        }
                        continue;
                    }
                    if let Some(event) = event {
                        return Some(event);
                    }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> BingxBookStream {
        let mut s = BingxBookStream::new("wss://open-api-ws.bingx.test/market".into());
        s.subscription = Some((Symbol::new("BTC", "USDC"), 20));
        s
    }

    #[test]
    fn test_ping_gets_pong_reply() {
        let (reply, event) = stream().decode_frame("Ping");
        assert_eq!(reply, Some("Pong"));
        assert!(event.is_none());
    }

    #[test]
    fn test_depth_frame_decodes() {
        let (reply, event) = stream().decode_frame(
            r#"{"code":0,"dataType":"BTC-USDC@depth20",
                "data":{"bids":[["40000","1"]],"asks":[["40010","1"]],"lastUpdateId":3},"ts":1}"#,
        );
        assert!(reply.is_none());
        match event {
            Some(BookEvent::Snapshot(snap)) => assert_eq!(snap.update_id, 3),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_subscription_ack_skipped() {
        let (reply, event) =
            stream().decode_frame(r#"{"id":"x","code":0,"msg":"SUBSCRIBED"}"#);
        assert!(reply.is_none());
        assert!(event.is_none());
    }
}
