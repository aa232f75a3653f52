//! Peer WebSocket handler
//!
//! Each connection gets its own copy of the template bridge. Inbound
//! messages are fed to `receive` / `video_receive`; two pump tasks poll
//! `emit` and `video_emit` and stream the results back.

use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::bridge::{BridgeError, LiveBridge};
use crate::core::media::{AudioFrame, VideoFrame, decode_audio, encode_audio, encode_image};
use crate::state::{AppState, PeerSlot};

use super::messages::{PeerIncomingMessage, PeerMessageRoute, PeerOutgoingMessage};

/// Channel buffer size for outgoing messages
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Passthrough video cadence
const VIDEO_PUMP_INTERVAL: Duration = Duration::from_millis(1000 / 30);

/// How long the sender task may take to flush after close
const SENDER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Peer WebSocket handler
///
/// Reserves a peer slot before upgrading; responds with 503 when the
/// concurrent peer limit is reached.
pub async fn peer_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let Some(slot) = state.try_acquire_peer() else {
        warn!(
            active_peers = state.active_peers(),
            "Rejecting peer connection, limit reached"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": "Too many concurrent peers, try again later"
            })),
        )
            .into_response();
    };

    let peer_id = Uuid::new_v4().to_string();
    info!(peer_id = %peer_id, "Peer WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_peer_socket(socket, state, slot, peer_id))
}

/// Per-connection state owned by the receive loop
struct PeerSession {
    peer_id: String,
    bridge: Arc<LiveBridge>,
    /// Still image accompanying every `video_receive`
    image: Option<VideoFrame>,
    message_tx: mpsc::Sender<PeerMessageRoute>,
}

impl PeerSession {
    async fn send(&self, message: PeerOutgoingMessage) {
        let _ = self
            .message_tx
            .send(PeerMessageRoute::Outgoing(message))
            .await;
    }

    async fn send_error(&self, code: &str, message: impl Into<String>) {
        self.send(PeerOutgoingMessage::error(code, message)).await;
    }
}

/// Handle the peer WebSocket connection
async fn handle_peer_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    _slot: PeerSlot,
    peer_id: String,
) {
    info!(peer_id = %peer_id, "Peer WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<PeerMessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                PeerMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                PeerMessageRoute::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let bridge = Arc::new(app_state.bridge.copy());
    let mut session = PeerSession {
        peer_id: peer_id.clone(),
        bridge: bridge.clone(),
        image: None,
        message_tx: message_tx.clone(),
    };

    if let Err(e) = bridge.start_up().await {
        error!(peer_id = %peer_id, "Failed to start live session: {}", e);
        session
            .send_error("connection_error", format!("Failed to start live session: {e}"))
            .await;
        finish(message_tx, sender_task).await;
        return;
    }

    let session_ended = bridge.session_ended();
    let config = bridge.config();
    session
        .send(PeerOutgoingMessage::Ready {
            peer_id: peer_id.clone(),
            model: config.model.clone(),
            input_sample_rate: config.input_sample_rate,
            output_sample_rate: config.output_sample_rate,
        })
        .await;

    let cancel = CancellationToken::new();
    let audio_pump = tokio::spawn(run_audio_pump(
        bridge.clone(),
        message_tx.clone(),
        cancel.clone(),
    ));
    let video_pump = tokio::spawn(run_video_pump(
        bridge.clone(),
        message_tx.clone(),
        cancel.clone(),
    ));

    let idle_timeout = app_state.config.idle_timeout();
    let time_limit = app_state.config.session_time_limit();
    let started = Instant::now();
    let mut last_activity = Instant::now();

    let time_limit_reached = async {
        match time_limit {
            Some(limit) => tokio::time::sleep_until(started + limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(time_limit_reached);

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_peer_message(msg, &mut session).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(peer_id = %peer_id, "Peer WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(peer_id = %peer_id, "Peer WebSocket connection closed by client");
                        break;
                    }
                }
            }
            _ = &mut time_limit_reached => {
                info!(peer_id = %peer_id, "Session time limit reached, closing peer");
                session
                    .send(PeerOutgoingMessage::Closing {
                        reason: "time_limit".to_string(),
                    })
                    .await;
                break;
            }
            _ = session_ended.cancelled() => {
                info!(peer_id = %peer_id, "Live session ended by remote, closing peer");
                session
                    .send(PeerOutgoingMessage::Closing {
                        reason: "session_ended".to_string(),
                    })
                    .await;
                break;
            }
            _ = tokio::time::sleep_until(last_activity + idle_timeout) => {
                warn!(
                    peer_id = %peer_id,
                    "Peer idle for {}s, closing stale connection",
                    last_activity.elapsed().as_secs()
                );
                session
                    .send(PeerOutgoingMessage::Closing {
                        reason: "idle_timeout".to_string(),
                    })
                    .await;
                break;
            }
        }
    }

    // Cleanup
    cancel.cancel();
    let _ = audio_pump.await;
    let _ = video_pump.await;
    bridge.shutdown().await;

    drop(session);
    finish(message_tx, sender_task).await;

    info!(peer_id = %peer_id, "Peer WebSocket connection terminated");
}

/// Close the socket and give the sender task a moment to flush.
async fn finish(message_tx: mpsc::Sender<PeerMessageRoute>, mut sender_task: JoinHandle<()>) {
    let _ = message_tx.send(PeerMessageRoute::Close).await;
    drop(message_tx);
    if tokio::time::timeout(SENDER_FLUSH_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }
}

/// Stream model audio back to the peer until cancelled.
async fn run_audio_pump(
    bridge: Arc<LiveBridge>,
    message_tx: mpsc::Sender<PeerMessageRoute>,
    cancel: CancellationToken,
) {
    loop {
        select! {
            _ = cancel.cancelled() => break,
            chunk = bridge.emit() => {
                let Some(chunk) = chunk else {
                    continue;
                };
                let message = PeerOutgoingMessage::Audio {
                    sample_rate: chunk.sample_rate,
                    data: encode_audio(&chunk.samples).data,
                };
                if message_tx.send(PeerMessageRoute::Outgoing(message)).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Stream passthrough frames back to the peer at a fixed cadence.
async fn run_video_pump(
    bridge: Arc<LiveBridge>,
    message_tx: mpsc::Sender<PeerMessageRoute>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(VIDEO_PUMP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let frame = bridge.video_emit().await;
                let blob = match encode_image(&frame) {
                    Ok(blob) => blob,
                    Err(e) => {
                        warn!("Failed to encode passthrough frame: {}", e);
                        continue;
                    }
                };
                let message = PeerOutgoingMessage::Video(blob);
                if message_tx.send(PeerMessageRoute::Outgoing(message)).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Process incoming WebSocket message
///
/// Returns `false` when the connection should close.
async fn process_peer_message(msg: Message, session: &mut PeerSession) -> bool {
    match msg {
        Message::Text(text) => {
            let incoming: PeerIncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(peer_id = %session.peer_id, "Failed to parse peer message: {}", e);
                    session
                        .send_error("parse_error", format!("Invalid message format: {e}"))
                        .await;
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                warn!(peer_id = %session.peer_id, "Message validation failed: {}", e);
                session.send_error("validation_error", e.to_string()).await;
                return true;
            }

            handle_peer_incoming(incoming, session).await;
            true
        }
        Message::Binary(data) => {
            let input_rate = session.bridge.config().input_sample_rate;
            let frame = AudioFrame::mono(input_rate, decode_audio(&data));
            forward_audio(frame, session).await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(peer_id = %session.peer_id, "Peer WebSocket close received");
            false
        }
    }
}

async fn handle_peer_incoming(msg: PeerIncomingMessage, session: &mut PeerSession) {
    match msg {
        PeerIncomingMessage::Audio(payload) => match payload.into_frame() {
            Ok(frame) => forward_audio(frame, session).await,
            Err(e) => session.send_error("invalid_audio", e.to_string()).await,
        },
        PeerIncomingMessage::Video(payload) => {
            let frame = match payload.into_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    session.send_error("invalid_video", e.to_string()).await;
                    return;
                }
            };
            if let Err(e) = session
                .bridge
                .video_receive(frame, session.image.as_ref())
                .await
            {
                report_bridge_error(session, "video_error", e).await;
            }
        }
        PeerIncomingMessage::Image(payload) => match payload.into_frame() {
            Ok(image) => {
                debug!(peer_id = %session.peer_id, "Still image set");
                session.image = Some(image);
            }
            Err(e) => session.send_error("invalid_image", e.to_string()).await,
        },
        PeerIncomingMessage::ClearImage => {
            debug!(peer_id = %session.peer_id, "Still image cleared");
            session.image = None;
        }
    }
}

async fn forward_audio(frame: AudioFrame, session: &PeerSession) {
    let expected = session.bridge.config().input_sample_rate;
    if frame.sample_rate != expected {
        session
            .send_error(
                "sample_rate_mismatch",
                format!(
                    "Expected {expected} Hz audio, got {} Hz",
                    frame.sample_rate
                ),
            )
            .await;
        return;
    }

    if let Err(e) = session.bridge.receive(&frame).await {
        report_bridge_error(session, "audio_error", e).await;
    }
}

async fn report_bridge_error(session: &PeerSession, code: &str, error: BridgeError) {
    warn!(peer_id = %session.peer_id, "Bridge rejected input: {}", error);
    session.send_error(code, error.to_string()).await;
}
