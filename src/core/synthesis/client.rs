//! Streaming synthesis client.
//!
//! [`SynthesisStream`] drives one duplex connection: text chunks go out,
//! audio and alignment frames come back. A single dispatcher task owns the
//! read half of the socket and is the only producer for the typed output
//! channels; writer calls serialize through the session's write lock on
//! caller tasks.
//!
//! # Architecture
//!
//! ```text
//! send_text()/flush() ──▶ Session (write lock) ──▶ socket
//!
//! socket ──▶ Dispatcher Task ──▶ audio channel ─────▶ caller
//!                           ├──▶ alignment channel ─▶ caller
//!                           └──▶ error channel ─────▶ caller
//! ```

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SynthesisConfig;
use super::messages::{Alignment, CloseFrame, FlushFrame, InitFrame, SynthesisEvent, TextFrame, TriggerFrame};
use crate::core::base::{StreamError, StreamResult, StreamState};
use crate::core::session::{Session, WsSource};

/// Encode an outbound frame to its wire representation.
fn encode<T: Serialize>(frame: &T) -> StreamResult<String> {
    serde_json::to_string(frame)
        .map_err(|e| StreamError::Serialization(format!("Failed to encode frame: {e}")))
}

/// Expected closure conditions that end the read loop without an error report.
fn is_expected_close(error: &tungstenite::Error) -> bool {
    matches!(
        error,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

// =============================================================================
// SynthesisStream
// =============================================================================

/// One live streaming synthesis connection.
///
/// Created by [`SynthesisStream::connect`]; the caller owns it exclusively
/// until [`SynthesisStream::close`]. All send operations may be invoked
/// concurrently; frames reach the wire in lock-acquisition order. Output
/// channels are taken at most once each and close exactly once when the
/// connection ends, whatever the trigger.
pub struct SynthesisStream {
    session: Arc<Session>,
    audio_rx: Option<mpsc::Receiver<Bytes>>,
    alignment_rx: Option<mpsc::Receiver<Alignment>>,
    error_rx: Option<mpsc::Receiver<StreamError>>,
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl SynthesisStream {
    /// Open the connection, perform the handshake, and send the initial
    /// voice-configuration frame before any caller data is accepted.
    ///
    /// All failures here are terminal and returned synchronously; once this
    /// returns `Ok`, failures surface through the error channel instead.
    pub async fn connect(config: SynthesisConfig) -> StreamResult<Self> {
        config.validate()?;
        let url = config.build_websocket_url()?;

        let (session, source) = Session::connect(&url, &config.api_key).await?;

        let init = encode(&InitFrame::from_config(&config))?;
        if let Err(e) = session.send_frame(init).await {
            session.close(None).await;
            return Err(e);
        }

        let (audio_tx, audio_rx) = mpsc::channel(config.channel_capacity);
        let (alignment_tx, alignment_rx) = mpsc::channel(config.channel_capacity);
        let (error_tx, error_rx) = mpsc::channel(config.channel_capacity);

        let dispatcher_handle = tokio::spawn(dispatch_loop(
            source,
            session.clone(),
            audio_tx,
            alignment_tx,
            error_tx,
        ));

        info!("Streaming synthesis session established");

        Ok(Self {
            session,
            audio_rx: Some(audio_rx),
            alignment_rx: Some(alignment_rx),
            error_rx: Some(error_rx),
            dispatcher_handle: Some(dispatcher_handle),
        })
    }

    /// Send one text chunk. Empty input is a no-op and never reaches the wire.
    ///
    /// Fails with [`StreamError::ConnectionClosed`] once [`Self::flush`] or
    /// [`Self::close`] has been called.
    pub async fn send_text(&self, text: &str) -> StreamResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.session.is_input_closed() {
            return Err(StreamError::ConnectionClosed);
        }
        let frame = encode(&TextFrame {
            text,
            context_id: None,
        })?;
        self.session.send_frame(frame).await
    }

    /// Send one text chunk tagged with a conversation context.
    ///
    /// Multiple independent contexts may be multiplexed over one socket;
    /// use [`SynthesisStream::new_context`] to mint fresh identifiers.
    pub async fn send_text_in_context(&self, text: &str, context_id: &str) -> StreamResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.session.is_input_closed() {
            return Err(StreamError::ConnectionClosed);
        }
        let frame = encode(&TextFrame {
            text,
            context_id: Some(context_id),
        })?;
        self.session.send_frame(frame).await
    }

    /// Mint a fresh context identifier for multiplexed synthesis.
    pub fn new_context(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Force the server to start generating from buffered text immediately.
    pub async fn trigger_generation(&self) -> StreamResult<()> {
        let frame = encode(&TriggerFrame::default())?;
        self.session.send_frame(frame).await
    }

    /// Signal that no more text is coming and request finalization of any
    /// buffered generation. Text submitted after this fails with
    /// [`StreamError::ConnectionClosed`]; the tail of the generated audio
    /// still arrives on the output channels.
    pub async fn flush(&self) -> StreamResult<()> {
        let frame = encode(&FlushFrame::default())?;
        self.session.send_frame(frame).await?;
        self.session.close_input();
        Ok(())
    }

    /// Close the connection. Idempotent and safe to call from any task.
    ///
    /// The first call best-effort sends the close frame and signals the
    /// dispatcher to shut down; subsequent sends fail with
    /// [`StreamError::ConnectionClosed`].
    pub async fn close(&self) -> StreamResult<()> {
        let frame = encode(&CloseFrame::default())?;
        self.session.close(Some(frame)).await;
        Ok(())
    }

    /// Current lifecycle state of the connection.
    pub fn state(&self) -> StreamState {
        self.session.state()
    }

    /// Whether the connection still accepts sends.
    pub fn is_running(&self) -> bool {
        self.session.state() == StreamState::Running
    }

    /// Take the audio output channel. Yields decoded audio chunks in server
    /// emission order; closes when the connection ends.
    pub fn take_audio(&mut self) -> Option<mpsc::Receiver<Bytes>> {
        self.audio_rx.take()
    }

    /// Take the alignment output channel.
    pub fn take_alignments(&mut self) -> Option<mpsc::Receiver<Alignment>> {
        self.alignment_rx.take()
    }

    /// Take the error channel. Non-fatal session errors and the final fatal
    /// error (if any) are delivered here.
    pub fn take_errors(&mut self) -> Option<mpsc::Receiver<StreamError>> {
        self.error_rx.take()
    }

    /// Wait until the dispatcher has exited and every output channel is closed.
    pub async fn wait_closed(&mut self) {
        if let Some(handle) = self.dispatcher_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SynthesisStream {
    fn drop(&mut self) {
        self.session.begin_drain();
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Read loop: decode, classify, and fan out inbound frames.
///
/// Runs until the socket closes, a fatal read error occurs, or shutdown is
/// signalled. Channel sends race the shutdown token, so a stalled consumer
/// stalls this loop only up to the bounded buffer depth. On exit the senders
/// drop, closing every output channel exactly once.
async fn dispatch_loop(
    mut source: WsSource,
    session: Arc<Session>,
    audio_tx: mpsc::Sender<Bytes>,
    alignment_tx: mpsc::Sender<Alignment>,
    error_tx: mpsc::Sender<StreamError>,
) {
    let shutdown = session.shutdown_token();

    'outer: loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    debug!("Received synthesis frame: {} bytes", text.len());

                    match SynthesisEvent::decode(&text) {
                        Ok(events) => {
                            for event in events {
                                match event {
                                    SynthesisEvent::Audio(bytes) => {
                                        tokio::select! {
                                            result = audio_tx.send(bytes) => {
                                                if result.is_err() {
                                                    debug!("Audio receiver dropped");
                                                }
                                            }
                                            _ = shutdown.cancelled() => break 'outer,
                                        }
                                    }
                                    SynthesisEvent::Alignment(alignment) => {
                                        tokio::select! {
                                            result = alignment_tx.send(alignment) => {
                                                if result.is_err() {
                                                    debug!("Alignment receiver dropped");
                                                }
                                            }
                                            _ = shutdown.cancelled() => break 'outer,
                                        }
                                    }
                                    SynthesisEvent::Final => {
                                        debug!("Generation finalized by server");
                                    }
                                    SynthesisEvent::Error(message) => {
                                        // Best-effort: one delivered error is
                                        // enough to signal trouble.
                                        if error_tx.try_send(StreamError::Server(message)).is_err() {
                                            warn!("Error channel full, dropping server error");
                                        }
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Failed to decode synthesis frame: {}", e);
                            let _ = error_tx.try_send(e);
                        }
                    }
                }

                Some(Ok(Message::Close(frame))) => {
                    info!("Synthesis socket closed by peer: {:?}", frame);
                    break;
                }

                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}

                Some(Ok(other)) => {
                    debug!("Ignoring unexpected message kind: {:?}", other);
                }

                Some(Err(e)) if is_expected_close(&e) => break,

                Some(Err(e)) => {
                    let error = StreamError::Transport(format!("Socket read failed: {e}"));
                    warn!("{}", error);
                    let _ = error_tx.try_send(error);
                    break;
                }

                None => {
                    info!("Synthesis socket stream ended");
                    break;
                }
            }
        }
    }

    session.begin_drain();
    session.mark_closed();
    info!("Synthesis dispatcher closed");
}
