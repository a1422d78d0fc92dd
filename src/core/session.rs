//! Transport session: socket ownership, handshake, serialized writes, and
//! lifecycle control.
//!
//! One [`Session`] owns the write half of one WebSocket connection and the
//! shared lifecycle state. All producers funnel through [`Session::send_frame`],
//! which holds the write lock for the duration of the wire write, so frames
//! are transmitted in lock-acquisition order. The read half is handed to the
//! per-direction dispatcher task at connect time and never touched again by
//! the session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::base::{StreamError, StreamResult, StreamState};

/// Header carrying the static API key during the handshake.
const API_KEY_HEADER: &str = "xi-api-key";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the socket, serialized behind the session's write lock.
pub(crate) type WsSink = SplitSink<WsStream, Message>;

/// Read half of the socket, consumed exclusively by the dispatcher task.
pub(crate) type WsSource = SplitStream<WsStream>;

// =============================================================================
// URL Construction
// =============================================================================

/// Build the WebSocket connection target from an HTTPS origin.
///
/// Swaps the scheme to its WebSocket equivalent, appends the protocol path,
/// and encodes every non-empty parameter as a query pair.
pub(crate) fn build_ws_url(
    endpoint: &str,
    path: &str,
    params: &[(&str, String)],
) -> StreamResult<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| StreamError::InvalidConfiguration(format!("Invalid endpoint: {e}")))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(StreamError::InvalidConfiguration(format!(
                "Unsupported endpoint scheme: {other}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| StreamError::InvalidConfiguration("Failed to set scheme".to_string()))?;

    url.set_path(path);

    let pairs: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}

// =============================================================================
// Session
// =============================================================================

/// Shared state of one live connection.
///
/// Holds the write sink behind a `tokio::sync::Mutex`, the lifecycle state as
/// an atomic, and the shutdown gate watched by the dispatcher and any bridge
/// loops. Cloned via `Arc` into every producer.
pub(crate) struct Session {
    sink: Mutex<WsSink>,
    state: AtomicU8,
    input_closed: AtomicBool,
    shutdown: CancellationToken,
}

impl Session {
    /// Perform the socket upgrade and return the session plus the read half.
    ///
    /// The handshake attaches the API key header; any failure here is
    /// terminal and surfaced synchronously. The caller must send the initial
    /// configuration frame before exposing the connection.
    pub(crate) async fn connect(url: &Url, api_key: &str) -> StreamResult<(Arc<Self>, WsSource)> {
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let request = tungstenite::http::Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("Host", host)
            .header("Upgrade", "websocket")
            .header("Connection", "upgrade")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13")
            .header(API_KEY_HEADER, api_key)
            .body(())
            .map_err(|e| {
                StreamError::ConnectionFailed(format!("Failed to build handshake request: {e}"))
            })?;

        let (ws_stream, _response) = connect_async(request).await.map_err(|e| match &e {
            tungstenite::Error::Http(response)
                if response.status() == tungstenite::http::StatusCode::UNAUTHORIZED
                    || response.status() == tungstenite::http::StatusCode::FORBIDDEN =>
            {
                StreamError::AuthenticationFailed(format!(
                    "Handshake rejected with status {}",
                    response.status()
                ))
            }
            _ => StreamError::ConnectionFailed(format!("WebSocket handshake failed: {e}")),
        })?;

        info!("Connected to {}", url.host_str().unwrap_or_default());

        let (sink, source) = ws_stream.split();

        let session = Arc::new(Self {
            sink: Mutex::new(sink),
            state: AtomicU8::new(StreamState::Running.as_u8()),
            input_closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        });

        Ok((session, source))
    }

    /// Current lifecycle state.
    pub(crate) fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Shutdown gate cancelled exactly once when the session starts draining.
    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Record that the caller signalled end of input. Data units submitted
    /// after this point must be rejected; control frames still go through.
    pub(crate) fn close_input(&self) {
        self.input_closed.store(true, Ordering::Release);
    }

    /// Whether end of input has been signalled.
    pub(crate) fn is_input_closed(&self) -> bool {
        self.input_closed.load(Ordering::Acquire)
    }

    /// Serialize one frame onto the wire.
    ///
    /// Acquires the write lock, fails fast if the session is no longer
    /// running, and performs exactly one write while holding the lock.
    pub(crate) async fn send_frame(&self, json: String) -> StreamResult<()> {
        let mut sink = self.sink.lock().await;
        if self.state.load(Ordering::Acquire) != StreamState::Running.as_u8() {
            return Err(StreamError::ConnectionClosed);
        }

        sink.send(Message::Text(json.into()))
            .await
            .map_err(|e| StreamError::Transport(format!("Failed to send frame: {e}")))
    }

    /// Caller-initiated shutdown. Idempotent and safe to call concurrently.
    ///
    /// The first call moves the state to `Draining` under the write lock,
    /// best-effort sends the finalize frame (the connection is going away, so
    /// send errors are ignored), sends the close frame, and signals the
    /// shutdown gate. Later calls return immediately.
    pub(crate) async fn close(&self, final_frame: Option<String>) {
        let mut sink = self.sink.lock().await;
        if self
            .state
            .compare_exchange(
                StreamState::Running.as_u8(),
                StreamState::Draining.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        if let Some(frame) = final_frame
            && let Err(e) = sink.send(Message::Text(frame.into())).await
        {
            warn!("Failed to send finalize frame during close: {}", e);
        }

        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!("Failed to send close frame: {}", e);
        }
        drop(sink);

        self.shutdown.cancel();
        info!("Session close initiated");
    }

    /// Dispatcher-initiated transition into `Draining`, used when the socket
    /// fails or the peer closes. No frames are sent; the socket is unusable.
    pub(crate) fn begin_drain(&self) {
        let _ = self.state.compare_exchange(
            StreamState::Running.as_u8(),
            StreamState::Draining.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.shutdown.cancel();
    }

    /// Terminal transition, invoked once by the dispatcher's finalize step.
    pub(crate) fn mark_closed(&self) {
        self.state
            .store(StreamState::Closed.as_u8(), Ordering::Release);
    }
}

// =============================================================================
// Tests
// =============================================================================
