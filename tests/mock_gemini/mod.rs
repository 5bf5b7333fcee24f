//! Mock Gemini Live server
//!
//! Accepts WebSocket connections the way the Live API does: a `setup` message
//! first, then realtime audio. Every JSON message received is forwarded to the
//! test through a channel so it can assert on the exact wire shape.

#![allow(dead_code)]

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Model audio returned for every completed user turn, split across two parts.
pub const REPLY_PART_A: [u8; 4] = [10, 0, 20, 0];
pub const REPLY_PART_B: [u8; 4] = [30, 0, 40, 0];

/// How the mock reacts once a client connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Acknowledge setup (as a binary frame) and answer each stream end with
    /// model audio followed by `turnComplete`.
    Respond,
    /// Never acknowledge setup.
    SilentSetup,
    /// Acknowledge setup and then close the connection.
    CloseAfterSetup,
}

/// Events observed by the mock, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Received(Value),
    Disconnected,
}

pub struct MockGemini {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<MockEvent>,
    pub connections: Arc<AtomicUsize>,
}

impl MockGemini {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock Gemini server");
        let addr = listener.local_addr().expect("Failed to get address");
        let (events_tx, events) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let events_tx = events_tx.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, behavior, events_tx.clone()).await;
                    let _ = events_tx.send(MockEvent::Disconnected);
                });
            }
        });

        Self {
            addr,
            events,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/live", self.addr)
    }

    /// Next JSON message received from the relay, skipping nothing.
    pub async fn next_event(&mut self) -> MockEvent {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.events.recv())
            .await
            .expect("Timed out waiting for mock event")
            .expect("Mock server stopped")
    }

    pub async fn next_message(&mut self) -> Value {
        match self.next_event().await {
            MockEvent::Received(value) => value,
            MockEvent::Disconnected => panic!("Relay disconnected while a message was expected"),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: Behavior,
    events: mpsc::UnboundedSender<MockEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Close(_) => break,
            _ => continue,
        };
        let value: Value = serde_json::from_str(&text)?;
        let _ = events.send(MockEvent::Received(value.clone()));

        if value.get("setup").is_some() {
            match behavior {
                Behavior::SilentSetup => {}
                Behavior::Respond => {
                    write
                        .send(Message::Binary(
                            br#"{"setupComplete":{}}"#.to_vec().into(),
                        ))
                        .await?;
                }
                Behavior::CloseAfterSetup => {
                    write
                        .send(Message::Text(r#"{"setupComplete":{}}"#.into()))
                        .await?;
                    write.close().await?;
                    return Ok(());
                }
            }
            continue;
        }

        if value.pointer("/realtimeInput/audioStreamEnd") == Some(&Value::Bool(true)) {
            let reply = json!({
                "serverContent": {
                    "modelTurn": {
                        "parts": [
                            {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": BASE64_STANDARD.encode(REPLY_PART_A)}},
                            {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": BASE64_STANDARD.encode(REPLY_PART_B)}}
                        ]
                    }
                }
            });
            write.send(Message::Text(reply.to_string().into())).await?;
            write
                .send(Message::Text(
                    json!({"serverContent": {"turnComplete": true}, "usageMetadata": {"totalTokenCount": 12}})
                        .to_string()
                        .into(),
                ))
                .await?;
        }
    }

    Ok(())
}
