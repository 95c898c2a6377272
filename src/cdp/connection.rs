//! CDP WebSocket connection implementation
//!
//! One reader task owns the receive half of the socket and routes responses
//! back to their callers by command id; writers share the send half behind a
//! mutex.

use super::traits::{CdpConnection, CdpError as CdpErrorResponse, CdpResponse};
use super::types::*;
use crate::Error;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, PendingCommand>>>;

/// Per-command timeouts for the CDP transport
#[derive(Debug, Clone)]
pub struct CdpTimeouts {
    /// Default timeout for most commands (seconds)
    pub default_timeout_secs: u64,
    /// Timeout for page navigation commands (seconds)
    pub navigation_timeout_secs: u64,
    /// Timeout for JavaScript execution (seconds)
    pub execution_timeout_secs: u64,
}

impl Default for CdpTimeouts {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            navigation_timeout_secs: 60,
            execution_timeout_secs: 30,
        }
    }
}

impl CdpTimeouts {
    /// Get timeout duration for a specific command method
    pub fn for_method(&self, method: &str) -> Duration {
        let method_lower = method.to_lowercase();

        if method_lower.starts_with("page.navigate") || method_lower.contains("reload") {
            return Duration::from_secs(self.navigation_timeout_secs);
        }

        if method_lower.starts_with("runtime.evaluate") || method_lower.starts_with("runtime.callfunctionon") {
            return Duration::from_secs(self.execution_timeout_secs);
        }

        Duration::from_secs(self.default_timeout_secs)
    }
}

/// Pending command response
#[derive(Debug)]
struct PendingCommand {
    /// Response channel sender
    sender: oneshot::Sender<CdpResponse>,
    /// Command method (for logging)
    method: String,
}

/// CDP WebSocket connection implementation
pub struct CdpWebSocketConnection {
    /// WebSocket URL
    url: String,
    /// Send half of the socket
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    /// Next command ID
    next_id: AtomicU64,
    /// Pending commands (ID -> response sender)
    pending: PendingMap,
    /// Cleared by the reader when the socket goes away
    is_active: Arc<AtomicBool>,
    /// Timeout configuration
    timeouts: CdpTimeouts,
    /// Reader task
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for CdpWebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpWebSocketConnection")
            .field("url", &self.url)
            .field("is_active", &self.is_active.load(Ordering::SeqCst))
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl CdpWebSocketConnection {
    /// Connect with default timeouts
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn new<S: Into<String>>(url: S) -> Result<Arc<Self>, Error> {
        Self::with_timeouts(url, CdpTimeouts::default()).await
    }

    /// Connect with explicit per-command timeouts
    pub async fn with_timeouts<S: Into<String>>(url: S, timeouts: CdpTimeouts) -> Result<Arc<Self>, Error> {
        let url = url.into();
        info!("Connecting to CDP target {}", url);

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;
        let (sink, stream) = ws_stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let is_active = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(Self::read_loop(stream, Arc::clone(&pending), Arc::clone(&is_active)));

        Ok(Arc::new(Self {
            url,
            sink: Mutex::new(Some(sink)),
            next_id: AtomicU64::new(1),
            pending,
            is_active,
            timeouts,
            reader: std::sync::Mutex::new(Some(reader)),
        }))
    }

    /// Receive loop; exits when the socket closes or errors
    async fn read_loop(mut stream: SplitStream<WsStream>, pending: PendingMap, is_active: Arc<AtomicBool>) {
        debug!("CDP reader started");

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => Self::dispatch(&text, &pending).await,
                Ok(Message::Close(frame)) => {
                    info!("CDP target closed the socket: {:?}", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("CDP socket error: {}", e);
                    break;
                }
            }
        }

        is_active.store(false, Ordering::SeqCst);

        // Dropping the senders wakes every waiter with a closed-channel error
        let mut pending = pending.lock().await;
        if !pending.is_empty() {
            warn!("CDP reader exiting with {} commands in flight", pending.len());
        }
        pending.clear();

        debug!("CDP reader exited");
    }

    /// Route one incoming text frame
    async fn dispatch(text: &str, pending: &PendingMap) {
        if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(text) {
            let waiter = pending.lock().await.remove(&response.id);
            match waiter {
                Some(command) => {
                    trace!("Response for command {} ({})", response.id, command.method);
                    let _ = command.sender.send(CdpResponse {
                        id: response.id,
                        result: Some(response.result),
                        error: response.error.map(|e| CdpErrorResponse {
                            code: e.code,
                            message: e.message,
                            data: e.data,
                        }),
                    });
                }
                None => warn!("Received response for unknown command ID: {}", response.id),
            }
            return;
        }

        match serde_json::from_str::<CdpNotification>(text) {
            Ok(event) => trace!("Ignoring CDP event {}", event.method),
            Err(_) => warn!("Unknown message format: {}", text),
        }
    }

    /// Send one text frame
    async fn send_text(&self, text: String) -> Result<(), Error> {
        let mut sink = self.sink.lock().await;
        let sink = sink
            .as_mut()
            .ok_or_else(|| Error::websocket("WebSocket stream not available"))?;

        sink.send(Message::Text(text))
            .await
            .map_err(|e| Error::websocket(format!("Failed to send message: {}", e)))
    }
}

#[async_trait]
impl CdpConnection for CdpWebSocketConnection {
    /// Send a CDP command and wait for response
    async fn send_command(&self, method: &str, params: serde_json::Value) -> Result<CdpResponse, Error> {
        if !self.is_active.load(Ordering::SeqCst) {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
            session_id: None,
        };

        let json = serde_json::to_string(&request)
            .map_err(|e| Error::cdp(format!("Failed to serialize request: {}", e)))?;

        debug!("Sending CDP command {}: {}", id, method);

        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            PendingCommand {
                sender,
                method: method.to_string(),
            },
        );

        if let Err(e) = self.send_text(json).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let timeout = self.timeouts.for_method(method);

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = &response.error {
                    return Err(Error::cdp(format!(
                        "{}: {} (code: {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response)
            }
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Connection closed before command {} ({}) completed",
                id, method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout(format!("Command {} ({}) timed out after {:?}", id, method, timeout)))
            }
        }
    }

    /// Close the connection
    async fn close(&self) -> Result<(), Error> {
        info!("Closing CDP WebSocket connection to {}", self.url);

        self.is_active.store(false, Ordering::SeqCst);

        let sink = self.sink.lock().await.take();
        let result = match sink {
            Some(mut sink) => sink
                .close()
                .await
                .map_err(|e| Error::websocket(format!("Failed to close WebSocket: {}", e))),
            None => Ok(()),
        };

        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(reader) = reader {
            reader.abort();
        }

        result
    }

    /// Check if connection is active
    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
