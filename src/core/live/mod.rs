//! Duplex live session module.
//!
//! This module provides the session abstraction the bridge talks to and its
//! Gemini Live implementation.
//!
//! # Architecture
//!
//! - `LiveConnector` opens sessions, `LiveSession` is one open conversation
//! - `receive_turn` adapts a session into a lazy per-turn response stream
//! - `GeminiLiveConnector` speaks the `BidiGenerateContent` WebSocket API
//!
//! # Audio Format
//!
//! Gemini accepts PCM 16-bit mono at 16kHz and answers at 24kHz.

mod base;
mod client;
mod config;
mod messages;

pub use base::{
    LiveConnector, LiveError, LiveResponse, LiveResult, LiveSession, LiveSessionConfig, Modality,
    SharedLiveSession, receive_turn,
};
pub use client::{GeminiLiveConnector, GeminiLiveSession};
pub use config::{
    DEFAULT_API_VERSION, DEFAULT_MODEL, DEFAULT_SETUP_TIMEOUT_SECS, GEMINI_INPUT_SAMPLE_RATE,
    GEMINI_LIVE_HOST, GEMINI_OUTPUT_SAMPLE_RATE, live_endpoint, qualified_model_name,
};
pub use messages::{
    ClientMessage, Content, GenerationConfig, GoAway, Part, RealtimeInput, ServerContent,
    ServerMessage, SetupConfig,
};
