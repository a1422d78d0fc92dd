//! Stream bridges: adapt caller-owned input channels onto a live connection.
//!
//! Each bridge runs two concurrent loops. A forwarding loop moves dispatcher
//! output into a fresh caller-owned channel until the connection ends or the
//! driving token is cancelled. A driving loop consumes the input channel,
//! writes each chunk, and on input exhaustion issues the finalize signal and
//! then waits for the forwarding loop to finish draining - so the caller
//! observes every output chunk generated from input sent before exhaustion.
//!
//! Cancellation stops both loops and resolves the returned handle to
//! [`StreamError::Cancelled`].

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::base::{DEFAULT_CHANNEL_CAPACITY, StreamError, StreamResult};
use super::synthesis::SynthesisStream;
use super::transcription::{Transcript, TranscriptionStream};

/// Forward every item from `source` into `dest` until the source closes, the
/// destination is dropped, or the token is cancelled.
async fn forward<T: Send + 'static>(
    mut source: mpsc::Receiver<T>,
    dest: mpsc::Sender<T>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = source.recv() => match item {
                Some(item) => {
                    if dest.send(item).await.is_err() {
                        debug!("Bridge output receiver dropped");
                        break;
                    }
                }
                None => break,
            }
        }
    }
}

/// Drive a synthesis connection from a channel of text chunks.
///
/// Returns the fresh audio output channel and a handle resolving to the
/// bridge outcome. When `input` closes, the bridge flushes the connection and
/// drains all remaining audio before the handle resolves.
pub fn synthesize(
    mut stream: SynthesisStream,
    mut input: mpsc::Receiver<String>,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Bytes>, JoinHandle<StreamResult<()>>) {
    let (out_tx, out_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    let audio_rx = stream.take_audio();

    let handle = tokio::spawn(async move {
        let audio_rx = audio_rx.ok_or_else(|| {
            StreamError::InvalidConfiguration(
                "Audio output channel already taken from this stream".to_string(),
            )
        })?;

        let forwarder = tokio::spawn(forward(audio_rx, out_tx, cancel.clone()));

        let result = async {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                    chunk = input.recv() => match chunk {
                        Some(chunk) => stream.send_text(&chunk).await?,
                        None => break,
                    }
                }
            }

            // Input exhausted: finalize pending generation, then wait for the
            // forwarding loop to drain the tail.
            stream.flush().await?;
            info!("Bridge input exhausted, draining synthesis output");
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                let _ = forwarder.await;
                let _ = stream.close().await;
                Ok(())
            }
            Err(e) => {
                let _ = stream.close().await;
                let _ = forwarder.await;
                Err(e)
            }
        }
    });

    (out_rx, handle)
}

/// Drive a transcription connection from a channel of audio chunks.
///
/// Returns the fresh transcript output channel and a handle resolving to the
/// bridge outcome. When `input` closes, the bridge sends the end-of-stream
/// signal and drains all remaining transcripts before the handle resolves.
pub fn transcribe(
    mut stream: TranscriptionStream,
    mut input: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> (mpsc::Receiver<Transcript>, JoinHandle<StreamResult<()>>) {
    let (out_tx, out_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

    let transcript_rx = stream.take_transcripts();

    let handle = tokio::spawn(async move {
        let transcript_rx = transcript_rx.ok_or_else(|| {
            StreamError::InvalidConfiguration(
                "Transcript output channel already taken from this stream".to_string(),
            )
        })?;

        let forwarder = tokio::spawn(forward(transcript_rx, out_tx, cancel.clone()));

        let result = async {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(StreamError::Cancelled),
                    chunk = input.recv() => match chunk {
                        Some(chunk) => stream.send_audio(&chunk).await?,
                        None => break,
                    }
                }
            }

            stream.end_of_stream().await?;
            info!("Bridge input exhausted, draining transcription output");
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                let _ = forwarder.await;
                let _ = stream.close().await;
                Ok(())
            }
            Err(e) => {
                let _ = stream.close().await;
                let _ = forwarder.await;
                Err(e)
            }
        }
    });

    (out_rx, handle)
}
