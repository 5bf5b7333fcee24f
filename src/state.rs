//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::core::live::{BridgeSettings, GeminiLiveConnector};

/// Error returned when no bridge slot is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeLimitError {
    #[error("maximum number of concurrent bridges reached ({0})")]
    LimitReached(usize),
}

/// Application state shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Settings cloned into every bridge
    pub bridge_settings: Arc<BridgeSettings>,
    pub connector: Arc<GeminiLiveConnector>,
    /// Parent token for all bridges; cancelled on server shutdown
    pub shutdown: CancellationToken,
    active_bridges: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let bridge_settings = Arc::new(config.bridge_settings());
        let connector = Arc::new(config.connector());

        Arc::new(Self {
            config,
            bridge_settings,
            connector,
            shutdown: CancellationToken::new(),
            active_bridges: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of bridges currently holding a slot.
    pub fn active_bridges(&self) -> usize {
        self.active_bridges.load(Ordering::Acquire)
    }

    /// Reserve a bridge slot, respecting `max_bridges` when configured.
    ///
    /// The slot is released when the returned guard is dropped.
    pub fn try_acquire_bridge(&self) -> Result<BridgeSlot, BridgeLimitError> {
        match self.config.max_bridges {
            Some(max) => {
                self.active_bridges
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                        (current < max).then_some(current + 1)
                    })
                    .map_err(|_| BridgeLimitError::LimitReached(max))?;
            }
            None => {
                self.active_bridges.fetch_add(1, Ordering::AcqRel);
            }
        }

        Ok(BridgeSlot {
            counter: self.active_bridges.clone(),
        })
    }
}

/// Guard for one reserved bridge slot.
#[derive(Debug)]
pub struct BridgeSlot {
    counter: Arc<AtomicUsize>,
}

impl Drop for BridgeSlot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
