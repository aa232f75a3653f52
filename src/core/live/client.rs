//! Gemini Live API client implementation.
//!
//! This module provides the Gemini connector and session that implement the
//! `LiveConnector` and `LiveSession` traits using the Gemini Live
//! `BidiGenerateContent` WebSocket API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.<version>.GenerativeService.BidiGenerateContent?key=<api_key>`
//! - Protocol: WebSocket with JSON messages (text or binary frames)
//! - Audio in: PCM 16-bit, 16kHz, mono, base64 encoded
//! - Audio out: PCM 16-bit, 24kHz, mono, base64 encoded
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_live_bridge::core::live::{GeminiLiveConnector, LiveConnector, LiveSessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = GeminiLiveConnector::new("AIza...", "v1alpha").unwrap();
//!     let session = connector
//!         .connect("gemini-2.0-flash-exp", &LiveSessionConfig::default())
//!         .await
//!         .unwrap();
//!
//!     session.send(encode_audio(&samples)).await.unwrap();
//!     let response = session.next_response().await.unwrap();
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use super::base::{
    LiveConnector, LiveError, LiveResponse, LiveResult, LiveSession, LiveSessionConfig,
    SharedLiveSession,
};
use super::config::{
    DEFAULT_API_VERSION, DEFAULT_SETUP_TIMEOUT_SECS, live_endpoint, qualified_model_name,
};
use super::messages::{ClientMessage, ServerMessage};
use crate::core::media::MediaBlob;

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long `close()` waits for the I/O task to flush the close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Connector
// =============================================================================

/// Opens Gemini Live sessions.
///
/// The connector is stateless apart from its credentials, so one instance can
/// be shared by every bridge.
pub struct GeminiLiveConnector {
    api_key: String,
    endpoint: String,
    setup_timeout: Duration,
}

impl GeminiLiveConnector {
    /// Create a connector for the given API version.
    pub fn new(api_key: impl Into<String>, api_version: &str) -> LiveResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LiveError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let api_version = if api_version.is_empty() {
            DEFAULT_API_VERSION
        } else {
            api_version
        };

        Ok(Self {
            api_key,
            endpoint: live_endpoint(api_version),
            setup_timeout: Duration::from_secs(DEFAULT_SETUP_TIMEOUT_SECS),
        })
    }

    /// Override the WebSocket endpoint (without the `key` query parameter).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override how long to wait for the connection and `setupComplete`.
    pub fn with_setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// Endpoint without credentials, for logging.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the WebSocket URL with the API key parameter.
    fn build_ws_url(&self) -> LiveResult<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| LiveError::InvalidConfiguration(format!("Invalid endpoint: {e}")))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

impl Drop for GeminiLiveConnector {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(
        &self,
        model: &str,
        config: &LiveSessionConfig,
    ) -> LiveResult<SharedLiveSession> {
        let url = self.build_ws_url()?;

        let connect = tokio_tungstenite::connect_async(url.as_str());
        let (ws_stream, _response) = tokio::time::timeout(self.setup_timeout, connect)
            .await
            .map_err(|_| {
                LiveError::ConnectionFailed(format!(
                    "Timed out connecting to {} after {:?}",
                    self.endpoint, self.setup_timeout
                ))
            })?
            .map_err(map_connect_error)?;

        tracing::info!(model = %model, "Connected to Gemini Live API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let setup = ClientMessage::setup(
            qualified_model_name(model),
            config.response_modalities.clone(),
        );
        let json = serde_json::to_string(&setup)
            .map_err(|e| LiveError::SerializationError(e.to_string()))?;
        ws_sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| LiveError::ConnectionFailed(format!("Failed to send setup: {e}")))?;

        tokio::time::timeout(self.setup_timeout, wait_for_setup_complete(&mut ws_stream))
            .await
            .map_err(|_| {
                LiveError::ConnectionFailed("Timed out waiting for setupComplete".to_string())
            })??;

        tracing::debug!(model = %model, "Gemini Live setup complete");

        Ok(Arc::new(GeminiLiveSession::spawn(ws_sink, ws_stream)))
    }
}

/// Classify a handshake failure, surfacing rejected credentials separately.
fn map_connect_error(error: tungstenite::Error) -> LiveError {
    match error {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
                LiveError::AuthenticationFailed(format!("Endpoint rejected credentials: {status}"))
            } else {
                LiveError::ConnectionFailed(format!("Handshake rejected: {status}"))
            }
        }
        other => LiveError::ConnectionFailed(other.to_string()),
    }
}

/// Consume messages until the server acknowledges the setup.
async fn wait_for_setup_complete<R>(stream: &mut R) -> LiveResult<()>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        let payload = match msg {
            Ok(Message::Text(text)) => parse_server_message(text.as_bytes()),
            Ok(Message::Binary(data)) => parse_server_message(&data),
            Ok(Message::Close(frame)) => {
                return Err(LiveError::ConnectionFailed(format!(
                    "Connection closed during setup: {}",
                    describe_close(frame.as_ref())
                )));
            }
            Ok(_) => continue,
            Err(e) => return Err(LiveError::ConnectionFailed(e.to_string())),
        };

        match payload {
            Ok(message) if message.is_setup_complete() => return Ok(()),
            Ok(_) => tracing::debug!("Ignoring message received before setupComplete"),
            Err(e) => tracing::warn!("Failed to parse setup response: {}", e),
        }
    }

    Err(LiveError::ConnectionFailed(
        "Connection ended before setup completed".to_string(),
    ))
}

fn parse_server_message(payload: &[u8]) -> LiveResult<ServerMessage> {
    serde_json::from_slice(payload).map_err(|e| LiveError::SerializationError(e.to_string()))
}

fn describe_close(frame: Option<&CloseFrame>) -> String {
    match frame {
        Some(frame) => format!("code {} {}", u16::from(frame.code), frame.reason),
        None => "no close frame".to_string(),
    }
}

/// A close counts as clean when the peer sent no frame or code 1000.
fn is_clean_close(frame: Option<&CloseFrame>) -> bool {
    frame.is_none_or(|f| f.code == CloseCode::Normal)
}

// =============================================================================
// Session
// =============================================================================

enum SessionCommand {
    Send(ClientMessage),
    Close,
}

/// An open Gemini Live session.
///
/// A spawned I/O task owns the socket. Outgoing messages reach it through a
/// bounded channel; decoded responses come back through an unbounded one.
/// When the task ends the response channel closes, which `next_response`
/// reports as [`LiveError::ConnectionClosed`].
pub struct GeminiLiveSession {
    commands: mpsc::Sender<SessionCommand>,
    responses: Mutex<mpsc::UnboundedReceiver<LiveResult<LiveResponse>>>,
    open: Arc<AtomicBool>,
    io_handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl GeminiLiveSession {
    fn spawn<S, R>(mut sink: S, mut stream: R) -> Self
    where
        S: Sink<Message, Error = tungstenite::Error> + Unpin + Send + 'static,
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin + Send + 'static,
    {
        let (command_tx, mut command_rx) = mpsc::channel::<SessionCommand>(WS_CHANNEL_CAPACITY);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let task_open = open.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Handle outgoing messages
                    command = command_rx.recv() => match command {
                        Some(SessionCommand::Send(message)) => {
                            let json = match serde_json::to_string(&message) {
                                Ok(j) => j,
                                Err(e) => {
                                    tracing::error!("Failed to serialize message: {}", e);
                                    continue;
                                }
                            };

                            if let Err(e) = sink.send(Message::Text(json.into())).await {
                                tracing::error!("Failed to send WebSocket message: {}", e);
                                let _ = response_tx.send(Err(LiveError::WebSocketError(e.to_string())));
                                break;
                            }
                        }
                        Some(SessionCommand::Close) | None => {
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: String::from("session closed").into(),
                            };
                            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                                tracing::debug!("Failed to send close frame: {}", e);
                            }
                            break;
                        }
                    },

                    // Handle incoming messages
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_payload(text.as_bytes(), &response_tx);
                        }
                        Some(Ok(Message::Binary(data))) => {
                            Self::handle_payload(&data, &response_tx);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            if is_clean_close(frame.as_ref()) {
                                tracing::info!("Gemini Live session closed by server");
                            } else {
                                let reason = describe_close(frame.as_ref());
                                tracing::warn!("Gemini Live session closed abnormally: {}", reason);
                                let _ = response_tx.send(Err(LiveError::ConnectionLost(reason)));
                            }
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = sink.send(Message::Pong(data)).await {
                                tracing::error!("Failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("WebSocket error: {}", e);
                            let _ = response_tx.send(Err(LiveError::WebSocketError(e.to_string())));
                            break;
                        }
                        None => {
                            tracing::debug!("Gemini Live stream ended");
                            break;
                        }
                    },
                }
            }

            task_open.store(false, Ordering::SeqCst);
            tracing::info!("Gemini Live connection task ended");
        });

        Self {
            commands: command_tx,
            responses: Mutex::new(response_rx),
            open,
            io_handle: parking_lot::Mutex::new(Some(handle)),
        }
    }

    /// Decode one server payload and forward any turn content.
    fn handle_payload(
        payload: &[u8],
        response_tx: &mpsc::UnboundedSender<LiveResult<LiveResponse>>,
    ) {
        let message = match parse_server_message(payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Failed to parse server message: {}", e);
                return;
            }
        };

        if let Some(content) = message.server_content {
            match content.into_response() {
                Ok(response) => {
                    let _ = response_tx.send(Ok(response));
                }
                Err(e) => tracing::warn!("Dropping malformed server content: {}", e),
            }
        } else if let Some(go_away) = message.go_away {
            tracing::warn!(
                time_left = ?go_away.time_left,
                "Gemini Live server requested disconnect"
            );
        } else if message.tool_call.is_some() {
            tracing::debug!("Ignoring tool call request");
        } else {
            tracing::trace!("Unhandled server message");
        }
    }
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send(&self, input: MediaBlob) -> LiveResult<()> {
        if !self.is_open() {
            return Err(LiveError::NotConnected);
        }

        self.commands
            .send(SessionCommand::Send(ClientMessage::media(input)))
            .await
            .map_err(|_| LiveError::NotConnected)
    }

    async fn next_response(&self) -> LiveResult<LiveResponse> {
        match self.responses.lock().await.recv().await {
            Some(result) => result,
            None => Err(LiveError::ConnectionClosed),
        }
    }

    async fn close(&self) -> LiveResult<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            // The task may already be gone if the server closed first
            let _ = self.commands.send(SessionCommand::Close).await;
        }

        let handle = self.io_handle.lock().take();
        if let Some(mut handle) = handle
            && tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await.is_err()
        {
            tracing::warn!("Gemini Live connection task did not stop in time, aborting");
            handle.abort();
        }

        tracing::info!("Closed Gemini Live session");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        if let Some(handle) = self.io_handle.get_mut().take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
