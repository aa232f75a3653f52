//! Mock Gemini Live WebSocket server
//!
//! Answers `setup` with `setupComplete` and echoes every audio chunk back as
//! a model turn, unless a failure behavior is selected.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// How the mock server reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiBehavior {
    /// Complete setup, echo audio input as model audio
    Echo,
    /// Close with a policy violation instead of completing setup
    RejectSetup,
    /// Never answer the setup message
    IgnoreSetup,
    /// Close with an internal error on the first realtime input
    CloseAbnormallyOnInput,
    /// Close normally on the first realtime input
    CloseCleanlyOnInput,
}

#[derive(Default)]
pub struct GeminiMockState {
    /// JSON messages received from the client
    pub received: Mutex<Vec<Value>>,
    /// Request URI of the last handshake
    pub request_uri: Mutex<Option<String>>,
    /// Close codes sent by the client
    pub client_close_codes: Mutex<Vec<u16>>,
}

pub struct MockGeminiServer {
    pub addr: SocketAddr,
    pub state: Arc<GeminiMockState>,
    handle: JoinHandle<()>,
}

impl MockGeminiServer {
    pub async fn start(behavior: GeminiBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(GeminiMockState::default());

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state, behavior).await {
                        eprintln!("mock gemini connection error: {e}");
                    }
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Endpoint to hand to `GeminiLiveConnector::with_endpoint`.
    pub fn endpoint(&self) -> String {
        format!(
            "ws://{}/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent",
            self.addr
        )
    }

    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    pub fn request_uri(&self) -> Option<String> {
        self.state.request_uri.lock().clone()
    }

    pub fn client_close_codes(&self) -> Vec<u16> {
        self.state.client_close_codes.lock().clone()
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn close_frame(code: CloseCode, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }))
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<GeminiMockState>,
    behavior: GeminiBehavior,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let uri_state = state.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *uri_state.request_uri.lock() = Some(req.uri().to_string());
        Ok(resp)
    };
    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text.to_string(),
            Message::Binary(data) => String::from_utf8(data.to_vec())?,
            Message::Close(frame) => {
                if let Some(frame) = frame {
                    state.client_close_codes.lock().push(u16::from(frame.code));
                }
                break;
            }
            _ => continue,
        };

        let value: Value = serde_json::from_str(&text)?;
        state.received.lock().push(value.clone());

        if value.get("setup").is_some() {
            match behavior {
                GeminiBehavior::RejectSetup => {
                    write
                        .send(close_frame(CloseCode::Policy, "API key not valid"))
                        .await?;
                    return Ok(());
                }
                GeminiBehavior::IgnoreSetup => continue,
                _ => {
                    let ack = json!({ "setupComplete": {} }).to_string();
                    write.send(Message::Text(ack.into())).await?;
                }
            }
            continue;
        }

        let Some(chunks) = value
            .pointer("/realtimeInput/mediaChunks")
            .and_then(Value::as_array)
        else {
            continue;
        };

        match behavior {
            GeminiBehavior::CloseAbnormallyOnInput => {
                write
                    .send(close_frame(CloseCode::Error, "internal error"))
                    .await?;
                return Ok(());
            }
            GeminiBehavior::CloseCleanlyOnInput => {
                write.send(close_frame(CloseCode::Normal, "")).await?;
                return Ok(());
            }
            _ => {}
        }

        for chunk in chunks {
            if chunk["mimeType"] != "audio/pcm" {
                continue;
            }
            // Gemini sends server messages as binary JSON frames
            let content = json!({
                "serverContent": {
                    "modelTurn": {
                        "parts": [{
                            "inlineData": {
                                "mimeType": "audio/pcm;rate=24000",
                                "data": chunk["data"],
                            }
                        }]
                    }
                }
            });
            write
                .send(Message::Binary(content.to_string().into()))
                .await?;
            let done = json!({ "serverContent": { "turnComplete": true } });
            write.send(Message::Text(done.to_string().into())).await?;
        }
    }

    Ok(())
}
