//! Byte-stream adapters decoupling audio producers and consumers from the
//! wire format.
//!
//! Downstream collaborators (telephony bridges, file writers, playback
//! devices) deal in plain chunked byte streams. [`AudioSource`] and
//! [`AudioSink`] are the seams; the pump functions connect them to the
//! channels used by the stream bridges.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Default chunk size when reading from a byte stream (roughly 100ms of
/// 16kHz mono 16-bit PCM).
pub const DEFAULT_CHUNK_SIZE: usize = 3200;

/// A producer of audio chunks.
#[async_trait]
pub trait AudioSource: Send {
    /// Return the next chunk, or `None` at end of stream.
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>>;
}

/// A consumer of audio chunks.
#[async_trait]
pub trait AudioSink: Send {
    /// Accept one chunk.
    async fn write_chunk(&mut self, chunk: Bytes) -> std::io::Result<()>;
}

// =============================================================================
// Adapters
// =============================================================================

/// Chunking adapter over any `AsyncRead` (a file, a socket, a pipe).
pub struct ReaderSource<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    /// Wrap a reader with the default chunk size.
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Wrap a reader producing chunks of at most `chunk_size` bytes.
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AudioSource for ReaderSource<R> {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self.reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }
}

/// Adapter delivering chunks into any `AsyncWrite`.
pub struct WriterSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> AudioSink for WriterSink<W> {
    async fn write_chunk(&mut self, chunk: Bytes) -> std::io::Result<()> {
        self.writer.write_all(&chunk).await
    }
}

// =============================================================================
// Pumps
// =============================================================================

/// Feed a source into a bridge input channel until end of stream.
///
/// Returns the number of chunks forwarded. Stops early without error if the
/// receiving side has gone away.
pub async fn pump_source<S: AudioSource>(
    mut source: S,
    tx: mpsc::Sender<Bytes>,
) -> std::io::Result<u64> {
    let mut chunks = 0u64;
    while let Some(chunk) = source.next_chunk().await? {
        if tx.send(chunk).await.is_err() {
            debug!("Audio input receiver dropped after {} chunks", chunks);
            break;
        }
        chunks += 1;
    }
    Ok(chunks)
}

/// Drain a bridge output channel into a sink until the channel closes.
///
/// Returns the number of chunks written.
pub async fn drain_sink<K: AudioSink>(
    mut rx: mpsc::Receiver<Bytes>,
    mut sink: K,
) -> std::io::Result<u64> {
    let mut chunks = 0u64;
    while let Some(chunk) = rx.recv().await {
        sink.write_chunk(chunk).await?;
        chunks += 1;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_reader_source_chunks() {
        let data = vec![7u8; 10];
        let mut source = ReaderSource::with_chunk_size(Cursor::new(data), 4);

        let mut sizes = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
        }

        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_pump_source_forwards_everything() {
        let data = vec![1u8; 9];
        let source = ReaderSource::with_chunk_size(Cursor::new(data), 3);
        let (tx, mut rx) = mpsc::channel(16);

        let pumped = pump_source(source, tx).await.unwrap();
        assert_eq!(pumped, 3);

        let mut total = 0;
        while let Some(chunk) = rx.recv().await {
            total += chunk.len();
        }
        assert_eq!(total, 9);
    }

    #[tokio::test]
    async fn test_drain_sink_writes_in_order() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Bytes::from_static(b"ab")).await.unwrap();
        tx.send(Bytes::from_static(b"cd")).await.unwrap();
        drop(tx);

        let mut out = Vec::new();
        let written = drain_sink(rx, WriterSink::new(&mut out)).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(out, b"abcd");
    }
}
