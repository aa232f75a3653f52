use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{AudioChunk, BridgeConfig, BridgeError, BridgeResult, BridgeState, WaitQueue};
use crate::core::live::{LiveConnector, LiveError, SharedLiveSession, receive_turn};
use crate::core::media::{AudioFrame, VideoFrame, decode_audio, encode_audio, encode_image};

/// How long `shutdown` waits for the receive loop before aborting it.
const RECEIVE_LOOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

type SessionSlot = Arc<RwLock<Option<SharedLiveSession>>>;

/// Bridges one peer's media to one live session.
///
/// A bridge owns its queues and session exclusively. Use [`LiveBridge::copy`]
/// to get an independent instance for each new peer.
pub struct LiveBridge {
    config: BridgeConfig,
    connector: Arc<dyn LiveConnector>,

    /// Model audio waiting for playback
    audio_queue: Arc<WaitQueue<Vec<i16>>>,
    /// Inbound frames waiting for passthrough display
    video_queue: WaitQueue<VideoFrame>,

    session: SessionSlot,
    state: Arc<RwLock<BridgeState>>,
    /// Set while `shutdown` tears the session down
    quit: Arc<AtomicBool>,
    receive_handle: Mutex<Option<JoinHandle<()>>>,
    /// Cancelled when the remote end finishes the current session
    session_ended: Mutex<CancellationToken>,

    last_frame_time: Mutex<Option<Instant>>,
}

impl LiveBridge {
    pub fn new(config: BridgeConfig, connector: Arc<dyn LiveConnector>) -> Self {
        Self {
            config,
            connector,
            audio_queue: Arc::new(WaitQueue::new()),
            video_queue: WaitQueue::new(),
            session: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(BridgeState::Idle)),
            quit: Arc::new(AtomicBool::new(false)),
            receive_handle: Mutex::new(None),
            session_ended: Mutex::new(CancellationToken::new()),
            last_frame_time: Mutex::new(None),
        }
    }

    /// Fresh instance with the same configuration and connector.
    ///
    /// Queues, session and timers are not shared with `self`.
    pub fn copy(&self) -> Self {
        Self::new(self.config.clone(), self.connector.clone())
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    /// Check whether a session is currently held.
    pub fn is_connected(&self) -> bool {
        self.session.read().is_some()
    }

    /// Token cancelled once the remote end ends the session opened by the
    /// latest `start_up`. Not cancelled by `shutdown`.
    pub fn session_ended(&self) -> CancellationToken {
        self.session_ended.lock().clone()
    }

    fn current_session(&self) -> Option<SharedLiveSession> {
        self.session.read().clone()
    }

    // ===== Lifecycle =====

    /// Open the live session and start draining its responses.
    pub async fn start_up(&self) -> BridgeResult<()> {
        {
            let mut state = self.state.write();
            if *state == BridgeState::Connecting || self.session.read().is_some() {
                return Err(BridgeError::SessionAlreadyOpen);
            }
            *state = BridgeState::Connecting;
        }

        tracing::info!(model = %self.config.model, "Opening live session");

        let session = match self
            .connector
            .connect(&self.config.model, &self.config.session)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(model = %self.config.model, "Failed to open live session: {}", e);
                *self.state.write() = BridgeState::Idle;
                return Err(e.into());
            }
        };

        let ended = CancellationToken::new();
        *self.session_ended.lock() = ended.clone();
        *self.session.write() = Some(session.clone());
        *self.last_frame_time.lock() = None;
        *self.state.write() = BridgeState::Listening;

        let handle = tokio::spawn(receive_loop(
            session,
            self.audio_queue.clone(),
            self.session.clone(),
            self.state.clone(),
            self.quit.clone(),
            ended,
        ));
        *self.receive_handle.lock() = Some(handle);

        tracing::info!(model = %self.config.model, "Live session established");
        Ok(())
    }

    /// Close the session and stop the receive loop.
    ///
    /// A no-op when no session is held.
    pub async fn shutdown(&self) {
        let session = self.session.write().take();
        let handle = self.receive_handle.lock().take();

        let Some(session) = session else {
            // The remote end may have closed first; the loop is already done
            if let Some(handle) = handle {
                join_receive_loop(handle).await;
            }
            return;
        };

        self.quit.store(true, Ordering::SeqCst);

        if let Err(e) = session.close().await {
            tracing::warn!("Error closing live session: {}", e);
        }
        if let Some(handle) = handle {
            join_receive_loop(handle).await;
        }

        self.quit.store(false, Ordering::SeqCst);
        *self.state.write() = BridgeState::Closed;
        tracing::info!(model = %self.config.model, "Live session shut down");
    }

    // ===== Audio =====

    /// Forward one inbound audio frame to the session.
    ///
    /// Silently does nothing while no session is held.
    pub async fn receive(&self, frame: &AudioFrame) -> BridgeResult<()> {
        let samples = frame.squeeze()?;
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        session.send(encode_audio(samples)).await?;
        Ok(())
    }

    /// Next chunk of model audio, or `None` if nothing arrived within
    /// `emit_timeout`.
    pub async fn emit(&self) -> Option<AudioChunk> {
        self.audio_queue
            .wait_for_item(self.config.emit_timeout)
            .await
            .map(|samples| AudioChunk {
                sample_rate: self.config.output_sample_rate,
                samples,
            })
    }

    // ===== Video =====

    /// Queue a frame for passthrough and, at most once per interval, send it
    /// to the session together with the optional still image.
    pub async fn video_receive(
        &self,
        frame: VideoFrame,
        image: Option<&VideoFrame>,
    ) -> BridgeResult<()> {
        self.video_queue.push(frame.clone());

        let Some(session) = self.current_session() else {
            return Ok(());
        };
        if !self.claim_video_slot() {
            return Ok(());
        }

        session.send(encode_image(&frame)?).await?;
        if let Some(image) = image {
            session.send(encode_image(image)?).await?;
        }
        Ok(())
    }

    /// Next passthrough frame, or a blank filler frame if none arrived within
    /// `emit_timeout`.
    pub async fn video_emit(&self) -> VideoFrame {
        match self.video_queue.wait_for_item(self.config.emit_timeout).await {
            Some(frame) => frame,
            None => VideoFrame::blank(self.config.filler_width, self.config.filler_height),
        }
    }

    /// Record a transmission if the interval since the last one has elapsed.
    fn claim_video_slot(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last_frame_time.lock();
        match *last {
            Some(sent) if now.duration_since(sent) <= self.config.video_send_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

impl Drop for LiveBridge {
    fn drop(&mut self) {
        if let Some(handle) = self.receive_handle.get_mut().take() {
            handle.abort();
        }
    }
}

async fn join_receive_loop(mut handle: JoinHandle<()>) {
    if tokio::time::timeout(RECEIVE_LOOP_JOIN_TIMEOUT, &mut handle)
        .await
        .is_err()
    {
        tracing::warn!("Receive loop did not stop in time, aborting");
        handle.abort();
    }
}

/// Drain model turns into the audio queue until the session ends.
async fn receive_loop(
    session: SharedLiveSession,
    audio_queue: Arc<WaitQueue<Vec<i16>>>,
    slot: SessionSlot,
    state: Arc<RwLock<BridgeState>>,
    quit: Arc<AtomicBool>,
    ended: CancellationToken,
) {
    'turns: while !quit.load(Ordering::SeqCst) {
        let mut turn = Box::pin(receive_turn(session.clone()));

        while let Some(item) = turn.next().await {
            match item {
                Ok(response) => {
                    if response.interrupted {
                        let dropped = audio_queue.clear().await;
                        tracing::debug!(dropped, "Model turn interrupted, dropping queued audio");
                    }
                    let Some(data) = response.data else {
                        continue;
                    };
                    let samples = decode_audio(&data);
                    if !samples.is_empty() {
                        audio_queue.push(samples);
                    }
                }
                Err(LiveError::ConnectionClosed) => {
                    tracing::info!("Live session connection closed");
                    break 'turns;
                }
                Err(e) => {
                    if !quit.load(Ordering::SeqCst) {
                        tracing::error!("Live session receive failed: {}", e);
                    }
                    break 'turns;
                }
            }
        }
    }

    if quit.load(Ordering::SeqCst) {
        return;
    }

    // Remote end finished the session; free the slot for a new start_up
    let released = {
        let mut slot = slot.write();
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, &session) => slot.take(),
            _ => None,
        }
    };
    if released.is_some() {
        *state.write() = BridgeState::Idle;
        if let Err(e) = session.close().await {
            tracing::debug!("Error closing finished live session: {}", e);
        }
        ended.cancel();
    }
}
