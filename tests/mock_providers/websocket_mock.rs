//! WebSocket mock server for the streaming clients.
//!
//! Simulates the synthesis and transcription endpoints: records every frame
//! the client sends and replies according to a configured behavior.

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// What the mock does with a connection after the handshake.
#[derive(Clone)]
pub enum MockBehavior {
    /// Record inbound frames; never send anything.
    Record,
    /// After the client's initial frame, send these text frames and keep the
    /// connection open.
    Script(Vec<String>),
    /// After the client's initial frame, send these text frames and close.
    ScriptThenClose(Vec<String>),
    /// Synthesis echo: one audio frame per text chunk; on flush, one tail
    /// audio frame, an isFinal frame, then close.
    EchoSynthesis,
    /// Transcription echo: one partial transcript per audio frame; on
    /// end_of_stream, one final transcript, then close.
    EchoTranscription,
    /// Drop the TCP connection without a close handshake right after the
    /// client's initial frame.
    AbruptDrop,
}

/// Handle to a running mock server.
pub struct MockServer {
    /// Endpoint in the form the clients expect (`http://127.0.0.1:port`).
    pub endpoint: String,
    /// Every text frame received from clients, parsed as JSON, in order.
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl MockServer {
    /// Number of recorded frames.
    pub fn frame_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    /// Snapshot of the recorded frames.
    pub fn frames(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Count recorded frames for which the predicate holds.
    pub fn count_matching<F: Fn(&Value) -> bool>(&self, predicate: F) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|frame| predicate(frame))
            .count()
    }
}

/// Start a mock server on an ephemeral port.
pub async fn spawn_mock(behavior: MockBehavior) -> MockServer {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    let state = received.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let state = state.clone();
            let behavior = behavior.clone();
            tokio::spawn(async move {
                let _ = handle_connection(stream, behavior, state).await;
            });
        }
    });

    MockServer {
        endpoint: format!("http://127.0.0.1:{port}"),
        received,
    }
}

type WsResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

async fn handle_connection(
    stream: TcpStream,
    behavior: MockBehavior,
    received: Arc<Mutex<Vec<Value>>>,
) -> WsResult {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let record = |text: &str| {
        let value = serde_json::from_str::<Value>(text)
            .unwrap_or_else(|_| Value::String(text.to_string()));
        received.lock().unwrap().push(value);
    };

    match behavior {
        MockBehavior::Record => {
            drain(&mut read, &record).await;
        }

        MockBehavior::Script(frames) => {
            wait_for_first_frame(&mut read, &record).await;
            for frame in frames {
                write.send(Message::Text(frame.into())).await?;
            }
            drain(&mut read, &record).await;
        }

        MockBehavior::ScriptThenClose(frames) => {
            wait_for_first_frame(&mut read, &record).await;
            for frame in frames {
                write.send(Message::Text(frame.into())).await?;
            }
            write.send(Message::Close(None)).await?;
            drain(&mut read, &record).await;
        }

        MockBehavior::EchoSynthesis => {
            let mut chunk_count = 0u64;
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        record(&text);
                        let frame: Value = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(_) => continue,
                        };

                        if frame.get("close_connection").is_some() {
                            write.send(Message::Close(None)).await?;
                            break;
                        }

                        if frame.get("flush").and_then(Value::as_bool) == Some(true) {
                            chunk_count += 1;
                            let audio = BASE64_STANDARD.encode(format!("audio-{chunk_count}"));
                            write
                                .send(Message::Text(json!({ "audio": audio }).to_string().into()))
                                .await?;
                            write
                                .send(Message::Text(
                                    json!({ "audio": null, "isFinal": true }).to_string().into(),
                                ))
                                .await?;
                            write.send(Message::Close(None)).await?;
                            break;
                        }

                        let text_field =
                            frame.get("text").and_then(Value::as_str).unwrap_or_default();
                        // Initial config and trigger frames carry a lone space.
                        if !text_field.is_empty() && text_field != " " {
                            chunk_count += 1;
                            let audio = BASE64_STANDARD.encode(format!("audio-{chunk_count}"));
                            write
                                .send(Message::Text(json!({ "audio": audio }).to_string().into()))
                                .await?;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        }

        MockBehavior::EchoTranscription => {
            let mut chunk_count = 0u64;
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        record(&text);
                        let frame: Value = match serde_json::from_str(&text) {
                            Ok(frame) => frame,
                            Err(_) => continue,
                        };

                        match frame.get("type").and_then(Value::as_str) {
                            Some("audio") => {
                                chunk_count += 1;
                                let reply = json!({
                                    "type": "partial_transcript",
                                    "text": format!("chunk {chunk_count}"),
                                    "is_final": false,
                                    "confidence": 0.8,
                                });
                                write.send(Message::Text(reply.to_string().into())).await?;
                            }
                            Some("end_of_stream") => {
                                let reply = json!({
                                    "type": "final_transcript",
                                    "text": format!("{chunk_count} chunks transcribed"),
                                    "is_final": true,
                                    "confidence": 0.97,
                                    "words": [
                                        {"word": "chunks", "start": 0.0, "end": 0.4, "confidence": 0.97}
                                    ],
                                });
                                write.send(Message::Text(reply.to_string().into())).await?;
                                write.send(Message::Close(None)).await?;
                                break;
                            }
                            _ => {}
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
        }

        MockBehavior::AbruptDrop => {
            wait_for_first_frame(&mut read, &record).await;
            // Dropping both halves tears down the TCP stream with no
            // WebSocket close handshake.
            drop(write);
            drop(read);
        }
    }

    Ok(())
}

async fn wait_for_first_frame<S>(read: &mut S, record: &impl Fn(&str))
where
    S: StreamExt<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                record(&text);
                return;
            }
            Ok(Message::Close(_)) | Err(_) => return,
            _ => {}
        }
    }
}

async fn drain<S>(read: &mut S, record: &impl Fn(&str))
where
    S: StreamExt<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => record(&text),
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}
