//! Bridge behaviour tests
//!
//! Drives `LiveBridge` against scripted mock sessions:
//! - Video transmission rate limiting
//! - FIFO ordering and bounded waits of both queues
//! - Session lifecycle (start up, remote close, shutdown)
//! - Instance isolation via `copy()`

mod mock_providers;

use std::sync::Arc;
use std::time::Duration;

use base64::prelude::*;
use tokio::time::Instant;

use gemini_live_bridge::core::bridge::{
    AudioChunk, BridgeConfig, BridgeError, BridgeState, LiveBridge,
};
use gemini_live_bridge::core::live::LiveError;
use gemini_live_bridge::core::media::{AudioFrame, VideoFrame};

use mock_providers::{MockLiveConnector, MockLiveSession, MockResponder};

async fn started_bridge() -> (LiveBridge, Arc<MockLiveSession>, MockResponder) {
    let (session, responder) = MockLiveSession::new();
    let connector = Arc::new(MockLiveConnector::with_session(session.clone()));
    let bridge = LiveBridge::new(BridgeConfig::default(), connector);
    bridge.start_up().await.unwrap();
    (bridge, session, responder)
}

fn frame(width: u32, height: u32, value: u8) -> VideoFrame {
    VideoFrame::new(width, height, vec![value; (width * height * 3) as usize]).unwrap()
}

/// Poll `emit()` until `count` chunks arrived or a second elapsed.
async fn collect_audio(bridge: &LiveBridge, count: usize) -> Vec<AudioChunk> {
    let mut chunks = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(1);
    while chunks.len() < count && Instant::now() < deadline {
        if let Some(chunk) = bridge.emit().await {
            chunks.push(chunk);
        }
    }
    chunks
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while !condition() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Video rate limiting
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_five_frames_within_200ms_send_once() {
    let (bridge, session, _responder) = started_bridge().await;

    for i in 0..5 {
        bridge.video_receive(frame(4, 4, i), None).await.unwrap();
        tokio::time::advance(Duration::from_millis(40)).await;
    }

    assert_eq!(session.sent_count(), 1);
    assert_eq!(session.sent_mime_types(), vec!["image/jpeg"]);

    // Every frame still reaches the passthrough queue
    for i in 0..5 {
        assert_eq!(bridge.video_emit().await, frame(4, 4, i));
    }

    bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_send_per_interval() {
    let (bridge, session, _responder) = started_bridge().await;

    // 30 frames, 100ms apart
    for _ in 0..30 {
        bridge.video_receive(frame(2, 2, 0), None).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
    }

    // Sent at 0ms, 1100ms and 2200ms; exactly 1000ms apart does not qualify
    assert_eq!(session.sent_count(), 3);

    bridge.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_still_image_shares_the_video_gate() {
    let (bridge, session, _responder) = started_bridge().await;
    let image = frame(8, 8, 200);

    bridge
        .video_receive(frame(2, 2, 0), Some(&image))
        .await
        .unwrap();
    bridge
        .video_receive(frame(2, 2, 1), Some(&image))
        .await
        .unwrap();

    assert_eq!(session.sent_mime_types(), vec!["image/jpeg", "image/jpeg"]);

    tokio::time::advance(Duration::from_millis(1001)).await;
    bridge.video_receive(frame(2, 2, 2), None).await.unwrap();
    assert_eq!(session.sent_count(), 3);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_video_without_session_only_queues() {
    let connector = Arc::new(MockLiveConnector::new());
    let bridge = LiveBridge::new(BridgeConfig::default(), connector.clone());

    bridge.video_receive(frame(2, 2, 7), None).await.unwrap();

    assert_eq!(connector.connect_calls(), 0);
    assert_eq!(bridge.video_emit().await, frame(2, 2, 7));
}

// =============================================================================
// Queues
// =============================================================================

#[tokio::test]
async fn test_video_emit_fifo_then_filler() {
    let bridge = LiveBridge::new(BridgeConfig::default(), Arc::new(MockLiveConnector::new()));

    let first = frame(2, 2, 1);
    let second = frame(3, 3, 2);
    bridge.video_receive(first.clone(), None).await.unwrap();
    bridge.video_receive(second.clone(), None).await.unwrap();

    assert_eq!(bridge.video_emit().await, first);
    assert_eq!(bridge.video_emit().await, second);

    let filler = bridge.video_emit().await;
    assert_eq!((filler.width(), filler.height()), (100, 100));
    assert!(filler.is_blank());
}

#[tokio::test(start_paused = true)]
async fn test_video_emit_filler_is_bounded() {
    let bridge = LiveBridge::new(BridgeConfig::default(), Arc::new(MockLiveConnector::new()));

    let start = Instant::now();
    let filler = bridge.video_emit().await;

    assert!(filler.is_blank());
    assert!(start.elapsed() >= Duration::from_millis(10));
    assert!(start.elapsed() < Duration::from_millis(20));
}

#[tokio::test(start_paused = true)]
async fn test_emit_returns_none_when_idle() {
    let bridge = LiveBridge::new(BridgeConfig::default(), Arc::new(MockLiveConnector::new()));

    let start = Instant::now();
    assert!(bridge.emit().await.is_none());
    assert!(start.elapsed() >= Duration::from_millis(10));
    assert!(start.elapsed() < Duration::from_millis(20));
}

#[tokio::test]
async fn test_empty_chunks_are_skipped() {
    let (bridge, _session, responder) = started_bridge().await;

    responder.samples(&[1, 1]);
    responder.samples(&[2, 2]);
    responder.empty();
    responder.audio(Vec::new());
    responder.samples(&[3, 3]);
    responder.turn_complete();

    let chunks = collect_audio(&bridge, 3).await;
    assert_eq!(
        chunks,
        vec![
            AudioChunk {
                sample_rate: 24000,
                samples: vec![1, 1]
            },
            AudioChunk {
                sample_rate: 24000,
                samples: vec![2, 2]
            },
            AudioChunk {
                sample_rate: 24000,
                samples: vec![3, 3]
            },
        ]
    );

    // The empty chunks produced nothing
    assert!(bridge.emit().await.is_none());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_receive_loop_continues_across_turns() {
    let (bridge, _session, responder) = started_bridge().await;

    responder.samples(&[10]);
    responder.turn_complete();
    responder.samples(&[20]);
    responder.turn_complete();

    let samples: Vec<_> = collect_audio(&bridge, 2)
        .await
        .into_iter()
        .map(|c| c.samples)
        .collect();
    assert_eq!(samples, vec![vec![10], vec![20]]);
    assert_eq!(bridge.state(), BridgeState::Listening);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_interruption_drops_stale_audio() {
    let (bridge, _session, responder) = started_bridge().await;

    responder.samples(&[1]);
    responder.interrupted();
    responder.samples(&[2]);

    // Let the receive loop handle all three chunks before playback starts
    tokio::time::sleep(Duration::from_millis(50)).await;

    let chunks = collect_audio(&bridge, 1).await;
    assert_eq!(chunks[0].samples, vec![2]);
    assert!(bridge.emit().await.is_none());

    bridge.shutdown().await;
}

// =============================================================================
// Audio forwarding
// =============================================================================

#[tokio::test]
async fn test_receive_forwards_encoded_audio() {
    let (bridge, session, _responder) = started_bridge().await;

    bridge
        .receive(&AudioFrame::mono(16000, vec![1, -1]))
        .await
        .unwrap();

    let sent = session.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mime_type, "audio/pcm");
    assert_eq!(
        BASE64_STANDARD.decode(&sent[0].data).unwrap(),
        vec![0x01, 0x00, 0xFF, 0xFF]
    );

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_receive_never_queues() {
    let (session, _responder) = MockLiveSession::new();
    let connector = Arc::new(MockLiveConnector::with_session(session.clone()));
    let bridge = LiveBridge::new(BridgeConfig::default(), connector);

    // Before start up the frame is dropped, not buffered
    bridge
        .receive(&AudioFrame::mono(16000, vec![5]))
        .await
        .unwrap();
    bridge.start_up().await.unwrap();

    assert_eq!(session.sent_count(), 0);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_malformed_audio_is_a_codec_error() {
    let (bridge, session, _responder) = started_bridge().await;

    let stereo = AudioFrame {
        sample_rate: 16000,
        channels: 2,
        samples: vec![1, 2, 3, 4],
    };
    assert!(matches!(
        bridge.receive(&stereo).await,
        Err(BridgeError::Codec(_))
    ));
    assert_eq!(session.sent_count(), 0);

    bridge.shutdown().await;
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_start_up_failure_propagates() {
    let connector = Arc::new(MockLiveConnector::new());
    let bridge = LiveBridge::new(BridgeConfig::default(), connector.clone());

    let result = bridge.start_up().await;
    assert!(matches!(
        result,
        Err(BridgeError::Live(LiveError::ConnectionFailed(_)))
    ));
    assert_eq!(connector.connect_calls(), 1);
    assert_eq!(connector.last_model().as_deref(), Some("gemini-2.0-flash-exp"));
    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[tokio::test]
async fn test_shutdown_then_inputs_are_noops() {
    let (bridge, session, responder) = started_bridge().await;

    bridge.shutdown().await;
    assert_eq!(bridge.state(), BridgeState::Closed);
    assert_eq!(session.close_calls(), 1);
    assert!(!bridge.is_connected());

    bridge
        .receive(&AudioFrame::mono(16000, vec![1]))
        .await
        .unwrap();
    bridge.video_receive(frame(2, 2, 0), None).await.unwrap();
    assert_eq!(session.sent_count(), 0);

    // Responses after shutdown are never drained
    responder.samples(&[1]);
    assert!(bridge.emit().await.is_none());
}

#[tokio::test]
async fn test_shutdown_without_session_is_noop() {
    let bridge = LiveBridge::new(BridgeConfig::default(), Arc::new(MockLiveConnector::new()));

    bridge.shutdown().await;
    bridge.shutdown().await;

    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[tokio::test]
async fn test_shutdown_twice_closes_once() {
    let (bridge, session, _responder) = started_bridge().await;

    bridge.shutdown().await;
    bridge.shutdown().await;

    assert_eq!(session.close_calls(), 1);
}

#[tokio::test]
async fn test_remote_close_releases_session() {
    let (first, responder) = MockLiveSession::new();
    let (second, _second_responder) = MockLiveSession::new();
    let connector = Arc::new(MockLiveConnector::with_session(first.clone()));
    connector.push_session(second.clone());

    let bridge = LiveBridge::new(BridgeConfig::default(), connector);
    bridge.start_up().await.unwrap();
    let ended = bridge.session_ended();

    responder.samples(&[7]);
    responder.close_cleanly();

    wait_until(|| ended.is_cancelled()).await;
    assert!(ended.is_cancelled());
    assert!(!bridge.is_connected());
    assert_eq!(bridge.state(), BridgeState::Idle);

    // Audio received before the close is still delivered
    let chunks = collect_audio(&bridge, 1).await;
    assert_eq!(chunks[0].samples, vec![7]);

    // A fresh start up is allowed
    bridge.start_up().await.unwrap();
    bridge
        .receive(&AudioFrame::mono(16000, vec![1]))
        .await
        .unwrap();
    assert_eq!(second.sent_count(), 1);
    assert_eq!(first.sent_count(), 0);
    assert!(!bridge.session_ended().is_cancelled());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_stream_error_ends_receive_loop() {
    let (bridge, _session, responder) = started_bridge().await;

    responder.fail(LiveError::ConnectionLost("code 1011 internal error".to_string()));

    wait_until(|| !bridge.is_connected()).await;
    assert_eq!(bridge.state(), BridgeState::Idle);
}

#[tokio::test]
async fn test_second_start_up_is_rejected() {
    let (bridge, _session, _responder) = started_bridge().await;

    assert!(matches!(
        bridge.start_up().await,
        Err(BridgeError::SessionAlreadyOpen)
    ));

    bridge.shutdown().await;
}

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test]
async fn test_copy_is_independent() {
    let (session, responder) = MockLiveSession::new();
    let connector = Arc::new(MockLiveConnector::with_session(session.clone()));
    let template = LiveBridge::new(BridgeConfig::default(), connector);

    let peer = template.copy();
    peer.start_up().await.unwrap();

    assert!(peer.is_connected());
    assert!(!template.is_connected());
    assert_eq!(template.state(), BridgeState::Idle);

    peer.video_receive(frame(2, 2, 9), None).await.unwrap();
    responder.samples(&[42]);

    // Nothing leaks into the template's queues
    assert!(template.video_emit().await.is_blank());
    assert!(template.emit().await.is_none());

    assert_eq!(peer.video_emit().await, frame(2, 2, 9));
    assert_eq!(collect_audio(&peer, 1).await[0].samples, vec![42]);

    // Shutting down the template leaves the copy's session alone
    template.shutdown().await;
    assert!(peer.is_connected());

    peer.shutdown().await;
    assert_eq!(session.close_calls(), 1);
}

#[tokio::test]
async fn test_copy_keeps_configuration() {
    let config = BridgeConfig {
        model: "custom-model".to_string(),
        video_send_interval: Duration::from_millis(250),
        ..BridgeConfig::default()
    };
    let template = LiveBridge::new(config.clone(), Arc::new(MockLiveConnector::new()));

    assert_eq!(template.copy().config(), &config);
}
