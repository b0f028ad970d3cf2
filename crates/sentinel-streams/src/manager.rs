//! The stream manager: registry, supervised workers, heartbeat reaper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sentinel_vision::image::GenericImageView;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sentinel_vision::DetectorAdapter;

use crate::error::{StreamError, StreamResult};
use crate::record::{StreamRecord, StreamStatus};
use crate::source::SourceConnector;

/// A stream with no heartbeat for this long is reaped.
pub const STALE_STREAM_TIMEOUT: Duration = Duration::from_secs(300);
/// Reaper sweep interval.
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub stale_timeout: Duration,
    pub reap_interval: Duration,
    /// Pause between processed frames.
    pub frame_interval: Duration,
    /// Pause after a failed frame read before retrying.
    pub read_retry_delay: Duration,
    pub target_width: u32,
    pub target_height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stale_timeout: STALE_STREAM_TIMEOUT,
            reap_interval: REAP_INTERVAL,
            frame_interval: Duration::from_millis(100),
            read_retry_delay: Duration::from_secs(1),
            target_width: 1280,
            target_height: 720,
        }
    }
}

/// Result of a start call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The stream already existed; the call acted as a heartbeat.
    AlreadyRunning,
}

struct StreamHandle {
    record: Arc<Mutex<StreamRecord>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct ManagerInner {
    streams: Mutex<HashMap<String, StreamHandle>>,
    connector: Box<dyn SourceConnector>,
    detector: Arc<DetectorAdapter>,
    config: StreamConfig,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

/// Registry of long-running per-stream workers. Cheap to clone; all clones
/// share state.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<ManagerInner>,
}

impl StreamManager {
    pub fn new(
        detector: Arc<DetectorAdapter>,
        connector: Box<dyn SourceConnector>,
        config: StreamConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                streams: Mutex::new(HashMap::new()),
                connector,
                detector,
                config,
                reaper: Mutex::new(None),
            }),
        }
    }

    /// Start a stream worker, or refresh the heartbeat if the stream id is
    /// already registered (no second worker is spawned).
    pub fn start(&self, source: &str, stream_id: &str, confidence: f32) -> StartOutcome {
        let mut streams = self.inner.streams.lock().unwrap();
        if let Some(handle) = streams.get(stream_id) {
            handle.record.lock().unwrap().last_heartbeat = Instant::now();
            debug!(stream_id, "start on existing stream treated as heartbeat");
            return StartOutcome::AlreadyRunning;
        }

        let record = Arc::new(Mutex::new(StreamRecord::new(stream_id, source, confidence)));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_worker(
            self.inner.clone(),
            record.clone(),
            shutdown_rx,
            source.to_string(),
            stream_id.to_string(),
            confidence,
        ));
        streams.insert(
            stream_id.to_string(),
            StreamHandle {
                record,
                shutdown,
                task,
            },
        );
        info!(stream_id, source, confidence, "stream started");
        StartOutcome::Started
    }

    /// Cancel the worker and remove the stream.
    pub fn stop(&self, stream_id: &str) -> StreamResult<()> {
        let handle = self
            .inner
            .streams
            .lock()
            .unwrap()
            .remove(stream_id)
            .ok_or_else(|| StreamError::NotFound(stream_id.to_string()))?;
        cancel_handle(&handle);
        info!(stream_id, "stream stopped");
        Ok(())
    }

    /// Refresh a stream's heartbeat.
    pub fn heartbeat(&self, stream_id: &str) -> StreamResult<()> {
        let streams = self.inner.streams.lock().unwrap();
        let handle = streams
            .get(stream_id)
            .ok_or_else(|| StreamError::NotFound(stream_id.to_string()))?;
        handle.record.lock().unwrap().last_heartbeat = Instant::now();
        Ok(())
    }

    /// Current record snapshot. Polling for status counts as liveness, so
    /// the heartbeat refreshes as a side effect.
    pub fn status(&self, stream_id: &str) -> StreamResult<StreamStatus> {
        let streams = self.inner.streams.lock().unwrap();
        let handle = streams
            .get(stream_id)
            .ok_or_else(|| StreamError::NotFound(stream_id.to_string()))?;
        let mut record = handle.record.lock().unwrap();
        record.last_heartbeat = Instant::now();
        Ok(record.status())
    }

    pub fn list(&self) -> Vec<StreamStatus> {
        let streams = self.inner.streams.lock().unwrap();
        streams
            .values()
            .map(|h| h.record.lock().unwrap().status())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.streams.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the background reaper that removes streams whose heartbeat has
    /// gone stale.
    pub fn spawn_reaper(&self) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.reap_interval);
            loop {
                ticker.tick().await;
                reap_stale(&inner);
            }
        });
        *self.inner.reaper.lock().unwrap() = Some(handle);
    }

    /// Cancel the reaper and every worker, then clear the registry.
    pub fn shutdown(&self) {
        if let Some(reaper) = self.inner.reaper.lock().unwrap().take() {
            reaper.abort();
        }
        let mut streams = self.inner.streams.lock().unwrap();
        for (stream_id, handle) in streams.drain() {
            debug!(%stream_id, "stopping stream on shutdown");
            cancel_handle(&handle);
        }
        info!("stream manager shut down");
    }
}

fn cancel_handle(handle: &StreamHandle) {
    handle.record.lock().unwrap().is_active = false;
    let _ = handle.shutdown.send(true);
    // Aborting drops the worker future, which releases the capture source on
    // every exit path.
    handle.task.abort();
}

fn reap_stale(inner: &ManagerInner) {
    let mut streams = inner.streams.lock().unwrap();
    let stale: Vec<String> = streams
        .iter()
        .filter(|(_, h)| h.record.lock().unwrap().last_heartbeat.elapsed() > inner.config.stale_timeout)
        .map(|(id, _)| id.clone())
        .collect();
    for stream_id in stale {
        if let Some(handle) = streams.remove(&stream_id) {
            warn!(%stream_id, "reaping stale stream (no heartbeat)");
            cancel_handle(&handle);
        }
    }
}

async fn run_worker(
    inner: Arc<ManagerInner>,
    record: Arc<Mutex<StreamRecord>>,
    mut shutdown: watch::Receiver<bool>,
    source: String,
    stream_id: String,
    confidence: f32,
) {
    let mut frames = match inner
        .connector
        .connect(&source, inner.config.target_width, inner.config.target_height)
        .await
    {
        Ok(frames) => frames,
        Err(e) => {
            warn!(%stream_id, error = %e, "failed to open capture source");
            let mut record = record.lock().unwrap();
            record.error = Some(e.to_string());
            record.is_active = false;
            return;
        }
    };

    info!(%stream_id, "stream worker running");
    let mut resolution_logged = false;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            frame = frames.read_frame() => {
                match frame {
                    Err(e) => {
                        debug!(%stream_id, error = %e, "frame read failed; retrying");
                        tokio::time::sleep(inner.config.read_retry_delay).await;
                    }
                    Ok(frame) => {
                        let (width, height) = frame.dimensions();
                        if !resolution_logged {
                            info!(%stream_id, width, height, "capture resolution");
                            resolution_logged = true;
                        }

                        let started = Instant::now();
                        let detector = inner.detector.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            detector.detect_and_track(&frame, confidence)
                        })
                        .await;

                        match result {
                            Ok(Ok((detections, _tracked))) => {
                                let mut record = record.lock().unwrap();
                                record.people_count = detections.len();
                                record.detections = detections;
                                record.processing_time_ms =
                                    started.elapsed().as_secs_f64() * 1000.0;
                                record.last_detection_time = Some(chrono::Utc::now());
                                record.frame_width = width;
                                record.frame_height = height;
                                record.error = None;
                            }
                            Ok(Err(e)) => {
                                warn!(%stream_id, error = %e, "detection failed on stream frame");
                                record.lock().unwrap().error = Some(e.to_string());
                            }
                            Err(e) => {
                                warn!(%stream_id, error = %e, "detection task panicked");
                            }
                        }

                        tokio::time::sleep(inner.config.frame_interval).await;
                    }
                }
            }
        }
    }

    record.lock().unwrap().is_active = false;
    info!(%stream_id, "stream worker stopped");
}
