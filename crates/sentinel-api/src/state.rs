//! Application state.
//!
//! All shared mutable containers live here, each behind its own lock, so
//! handlers receive one explicit context instead of process-wide globals.

use std::sync::{Arc, Mutex, RwLock};

use sentinel_adjudicator::{Adjudicator, LlmClient, Snapshotter};
use sentinel_counting::{CountingEngine, ZoneRegistry};
use sentinel_streams::{SourceConnector, StreamConfig, StreamManager};
use sentinel_vision::{DetectorAdapter, SuspiciousConfig};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub detector: Arc<DetectorAdapter>,
    pub zones: Arc<RwLock<ZoneRegistry>>,
    pub counting: Arc<Mutex<CountingEngine>>,
    pub adjudicator: Arc<Adjudicator>,
    pub snapshots: Arc<Snapshotter>,
    pub streams: StreamManager,
    pub suspicious: SuspiciousConfig,
}

impl AppState {
    /// Create new application state around a loaded detector and a capture
    /// connector.
    pub fn new(
        config: ApiConfig,
        detector: Arc<DetectorAdapter>,
        connector: Box<dyn SourceConnector>,
        stream_config: StreamConfig,
    ) -> ApiResult<Self> {
        let client =
            LlmClient::new(config.llm.clone()).map_err(|e| ApiError::internal(e.to_string()))?;
        let adjudicator = Adjudicator::new(
            client,
            config.llm_cooldown,
            config.llm_track_cooldown,
            config.llm_auto_on_threat,
        );
        let snapshots = Snapshotter::new(config.snapshot_root.clone());
        let streams = StreamManager::new(detector.clone(), connector, stream_config);
        let suspicious = config.suspicious_config();

        Ok(Self {
            config: Arc::new(config),
            detector,
            zones: Arc::new(RwLock::new(ZoneRegistry::new())),
            counting: Arc::new(Mutex::new(CountingEngine::new())),
            adjudicator: Arc::new(adjudicator),
            snapshots: Arc::new(snapshots),
            streams,
            suspicious,
        })
    }
}
