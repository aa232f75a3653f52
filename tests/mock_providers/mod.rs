//! Mock live sessions and a mock Gemini Live server
//!
//! - `MockLiveConnector` / `MockLiveSession`: in-process session doubles that
//!   record sent media and replay scripted responses
//! - `gemini_mock`: a local WebSocket server speaking the Gemini Live protocol

// Allow dead code in test infrastructure - not every test binary uses every helper
#![allow(dead_code)]

pub mod gemini_mock;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gemini_live_bridge::core::live::{
    LiveConnector, LiveError, LiveResponse, LiveResult, LiveSession, LiveSessionConfig,
    SharedLiveSession,
};
use gemini_live_bridge::core::media::MediaBlob;

/// A scripted live session.
pub struct MockLiveSession {
    sent: Mutex<Vec<MediaBlob>>,
    responses: tokio::sync::Mutex<mpsc::UnboundedReceiver<LiveResult<LiveResponse>>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
}

/// Feeds responses into a [`MockLiveSession`].
#[derive(Clone)]
pub struct MockResponder {
    tx: mpsc::UnboundedSender<LiveResult<LiveResponse>>,
}

impl MockLiveSession {
    pub fn new() -> (Arc<Self>, MockResponder) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            responses: tokio::sync::Mutex::new(rx),
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
        });
        (session, MockResponder { tx })
    }

    /// Media sent so far, in order.
    pub fn sent(&self) -> Vec<MediaBlob> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent_mime_types(&self) -> Vec<String> {
        self.sent.lock().iter().map(|b| b.mime_type.clone()).collect()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveSession for MockLiveSession {
    async fn send(&self, input: MediaBlob) -> LiveResult<()> {
        if self.closed.is_cancelled() {
            return Err(LiveError::NotConnected);
        }
        self.sent.lock().push(input);
        Ok(())
    }

    async fn next_response(&self) -> LiveResult<LiveResponse> {
        let mut responses = self.responses.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Err(LiveError::ConnectionClosed),
            response = responses.recv() => response.unwrap_or(Err(LiveError::ConnectionClosed)),
        }
    }

    async fn close(&self) -> LiveResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }
}

impl MockResponder {
    /// Chunk carrying raw PCM16LE bytes.
    pub fn audio(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(Ok(LiveResponse::audio(bytes)));
    }

    /// Chunk carrying these samples.
    pub fn samples(&self, samples: &[i16]) {
        let bytes = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.audio(bytes);
    }

    /// Chunk without payload.
    pub fn empty(&self) {
        let _ = self.tx.send(Ok(LiveResponse::default()));
    }

    pub fn turn_complete(&self) {
        let _ = self.tx.send(Ok(LiveResponse::turn_complete()));
    }

    /// The model's turn was cut short by user speech.
    pub fn interrupted(&self) {
        let _ = self.tx.send(Ok(LiveResponse {
            interrupted: true,
            ..Default::default()
        }));
    }

    /// Remote end closes the session cleanly.
    pub fn close_cleanly(&self) {
        let _ = self.tx.send(Err(LiveError::ConnectionClosed));
    }

    pub fn fail(&self, error: LiveError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Hands out queued mock sessions, one per `connect`.
#[derive(Default)]
pub struct MockLiveConnector {
    sessions: Mutex<VecDeque<Arc<MockLiveSession>>>,
    connect_calls: AtomicUsize,
    last_model: Mutex<Option<String>>,
}

impl MockLiveConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Arc<MockLiveSession>) -> Self {
        let connector = Self::new();
        connector.push_session(session);
        connector
    }

    pub fn push_session(&self, session: Arc<MockLiveSession>) {
        self.sessions.lock().push_back(session);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn last_model(&self) -> Option<String> {
        self.last_model.lock().clone()
    }
}

#[async_trait]
impl LiveConnector for MockLiveConnector {
    async fn connect(
        &self,
        model: &str,
        _config: &LiveSessionConfig,
    ) -> LiveResult<SharedLiveSession> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_model.lock() = Some(model.to_string());

        match self.sessions.lock().pop_front() {
            Some(session) => Ok(session),
            None => Err(LiveError::ConnectionFailed(
                "no mock session queued".to_string(),
            )),
        }
    }
}
