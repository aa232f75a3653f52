//! Gemini Live API configuration constants.

/// Gemini Live API WebSocket host.
pub const GEMINI_LIVE_HOST: &str = "wss://generativelanguage.googleapis.com";

/// API version the bridge speaks by default.
pub const DEFAULT_API_VERSION: &str = "v1alpha";

/// Default model for live conversations.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Sample rate (16kHz) Gemini accepts for input audio.
pub const GEMINI_INPUT_SAMPLE_RATE: u32 = 16000;

/// Sample rate (24kHz) of audio produced by Gemini.
pub const GEMINI_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Default time to wait for `setupComplete` after opening the socket.
pub const DEFAULT_SETUP_TIMEOUT_SECS: u64 = 10;

/// Build the bidirectional streaming endpoint for an API version.
pub fn live_endpoint(api_version: &str) -> String {
    format!(
        "{GEMINI_LIVE_HOST}/ws/google.ai.generativelanguage.{api_version}.GenerativeService.BidiGenerateContent"
    )
}

/// Qualify a bare model id with the `models/` prefix the API expects.
pub fn qualified_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}
