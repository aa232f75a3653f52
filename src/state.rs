//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ServerConfig;
use crate::core::bridge::LiveBridge;
use crate::core::live::{GeminiLiveConnector, LiveConnector, LiveError, LiveResult};

/// State shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Template bridge; each peer gets its own `copy()`
    pub bridge: LiveBridge,
    active_peers: Arc<AtomicUsize>,
}

impl AppState {
    /// Build state with a Gemini connector from the configured credentials.
    pub fn new(config: ServerConfig) -> LiveResult<Arc<Self>> {
        let api_key = config
            .api_key()
            .map_err(|e| LiveError::AuthenticationFailed(e.to_string()))?;
        let connector = GeminiLiveConnector::new(api_key, &config.gemini_api_version)?;

        tracing::info!(
            model = %config.gemini_model,
            endpoint = %connector.endpoint(),
            "Configured Gemini Live connector"
        );

        Ok(Self::with_connector(config, Arc::new(connector)))
    }

    /// Build state around an arbitrary connector.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn LiveConnector>) -> Arc<Self> {
        let bridge = LiveBridge::new(config.bridge_config(), connector);
        Arc::new(Self {
            config,
            bridge,
            active_peers: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of peers currently connected.
    pub fn active_peers(&self) -> usize {
        self.active_peers.load(Ordering::SeqCst)
    }

    /// Reserve a peer slot, or `None` when the peer limit is reached.
    pub fn try_acquire_peer(&self) -> Option<PeerSlot> {
        let limit = self.config.peer_limit();
        self.active_peers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match limit {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            })
            .ok()?;

        Some(PeerSlot {
            counter: self.active_peers.clone(),
        })
    }
}

/// A reserved peer slot, released on drop.
#[derive(Debug)]
pub struct PeerSlot {
    counter: Arc<AtomicUsize>,
}

impl Drop for PeerSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
