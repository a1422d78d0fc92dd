//! Realtime transcription client.
//!
//! [`TranscriptionStream`] drives one duplex connection: audio chunks go out
//! (base64-encoded per the wire format), partial and final transcripts come
//! back. Same concurrency contract as the synthesis client: one dispatcher
//! task owns the read half and the output channels, writers serialize through
//! the session's write lock.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tracing::{debug, info, warn};

use super::config::TranscriptionConfig;
use super::messages::{
    AudioFrame, ConfigFrame, EndOfStreamFrame, Transcript, TranscriptionEvent,
};
use crate::core::base::{StreamError, StreamResult, StreamState};
use crate::core::session::{Session, WsSource};

fn encode<T: Serialize>(frame: &T) -> StreamResult<String> {
    serde_json::to_string(frame)
        .map_err(|e| StreamError::Serialization(format!("Failed to encode frame: {e}")))
}

fn is_expected_close(error: &tungstenite::Error) -> bool {
    matches!(
        error,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed
    )
}

// =============================================================================
// TranscriptionStream
// =============================================================================

/// One live realtime transcription connection.
pub struct TranscriptionStream {
    session: Arc<Session>,
    transcript_rx: Option<mpsc::Receiver<Transcript>>,
    error_rx: Option<mpsc::Receiver<StreamError>>,
    dispatcher_handle: Option<JoinHandle<()>>,
}

impl TranscriptionStream {
    /// Open the connection, perform the handshake, and send the session
    /// configuration frame before any audio is accepted.
    pub async fn connect(config: TranscriptionConfig) -> StreamResult<Self> {
        config.validate()?;
        let url = config.build_websocket_url()?;

        let (session, source) = Session::connect(&url, &config.api_key).await?;

        let init = encode(&ConfigFrame::from_config(&config))?;
        if let Err(e) = session.send_frame(init).await {
            session.close(None).await;
            return Err(e);
        }

        let (transcript_tx, transcript_rx) = mpsc::channel(config.channel_capacity);
        let (error_tx, error_rx) = mpsc::channel(config.channel_capacity);

        let dispatcher_handle = tokio::spawn(dispatch_loop(
            source,
            session.clone(),
            transcript_tx,
            error_tx,
        ));

        info!("Realtime transcription session established");

        Ok(Self {
            session,
            transcript_rx: Some(transcript_rx),
            error_rx: Some(error_rx),
            dispatcher_handle: Some(dispatcher_handle),
        })
    }

    /// Send one audio chunk. Empty input is a no-op and never reaches the
    /// wire. The payload is base64-encoded into the JSON frame here.
    ///
    /// Fails with [`StreamError::ConnectionClosed`] once
    /// [`Self::end_of_stream`] or [`Self::close`] has been called.
    pub async fn send_audio(&self, audio: &[u8]) -> StreamResult<()> {
        if audio.is_empty() {
            return Ok(());
        }
        if self.session.is_input_closed() {
            return Err(StreamError::ConnectionClosed);
        }
        let frame = encode(&AudioFrame::from_bytes(audio))?;
        self.session.send_frame(frame).await
    }

    /// Signal that no more audio is coming and request finalization of any
    /// pending transcripts. Audio submitted after this fails with
    /// [`StreamError::ConnectionClosed`]; pending transcripts still arrive.
    pub async fn end_of_stream(&self) -> StreamResult<()> {
        let frame = encode(&EndOfStreamFrame::default())?;
        self.session.send_frame(frame).await?;
        self.session.close_input();
        Ok(())
    }

    /// Close the connection. Idempotent and safe to call from any task.
    ///
    /// The first call best-effort sends the end-of-stream frame and signals
    /// shutdown; subsequent sends fail with [`StreamError::ConnectionClosed`].
    pub async fn close(&self) -> StreamResult<()> {
        let frame = encode(&EndOfStreamFrame::default())?;
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

    /// Take the transcript output channel. Partial results (when enabled)
    /// and final results arrive in server emission order.
    pub fn take_transcripts(&mut self) -> Option<mpsc::Receiver<Transcript>> {
        self.transcript_rx.take()
    }

    /// Take the error channel.
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

impl Drop for TranscriptionStream {
    fn drop(&mut self) {
        self.session.begin_drain();
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Read loop: decode, classify, and fan out inbound transcription frames.
async fn dispatch_loop(
    mut source: WsSource,
    session: Arc<Session>,
    transcript_tx: mpsc::Sender<Transcript>,
    error_tx: mpsc::Sender<StreamError>,
) {
    let shutdown = session.shutdown_token();

    'outer: loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    debug!("Received transcription frame: {} bytes", text.len());

                    match TranscriptionEvent::decode(&text) {
                        Ok(TranscriptionEvent::Transcript(transcript)) => {
                            tokio::select! {
                                result = transcript_tx.send(transcript) => {
                                    if result.is_err() {
                                        debug!("Transcript receiver dropped");
                                    }
                                }
                                _ = shutdown.cancelled() => break 'outer,
                            }
                        }
                        Ok(TranscriptionEvent::Error(message)) => {
                            if error_tx.try_send(StreamError::Server(message)).is_err() {
                                warn!("Error channel full, dropping server error");
                            }
                        }
                        Ok(TranscriptionEvent::Ignored) => {}
                        Err(e) => {
                            warn!("Failed to decode transcription frame: {}", e);
                            let _ = error_tx.try_send(e);
                        }
                    }
                }

                Some(Ok(Message::Close(frame))) => {
                    info!("Transcription socket closed by peer: {:?}", frame);
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
                    info!("Transcription socket stream ended");
                    break;
                }
            }
        }
    }

    session.begin_drain();
    session.mark_closed();
    info!("Transcription dispatcher closed");
}
