pub mod bridge;
pub mod live;
pub mod media;

// Re-export commonly used types for convenience
pub use bridge::{
    AudioChunk, BridgeConfig, BridgeError, BridgeResult, BridgeState, LiveBridge, WaitQueue,
};

pub use live::{
    GeminiLiveConnector, LiveConnector, LiveError, LiveResponse, LiveResult, LiveSession,
    LiveSessionConfig, SharedLiveSession,
};

pub use media::{AudioFrame, CodecError, MediaBlob, VideoFrame};
