//! Sentinel detection service entry point.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sentinel_api::{create_router, ApiConfig, AppState};
use sentinel_streams::{MjpegConnector, StreamConfig};
use sentinel_vision::{DetectorAdapter, VisionError, VisionResult};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::from_env();

    // A service without a person model is useless: model load is fatal.
    let detector = match build_detector(&config) {
        Ok(detector) => detector,
        Err(e) => {
            error!(error = %e, "failed to load detection model");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(
        config.clone(),
        detector,
        Box::new(MjpegConnector),
        StreamConfig::default(),
    ) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to initialize application state");
            std::process::exit(1);
        }
    };
    state.streams.spawn_reaper();

    let router = create_router(state.clone());
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %config.bind_addr, "sentinel detection service listening");
    info!("endpoints: GET /health, POST /detect, POST /zones/update, GET /zones, GET /occupancy, POST /stream/start");

    let shutdown_state = state.clone();
    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_state.streams.shutdown();
        })
        .await
    {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    // LOG_LEVEL drives the filter; RUST_LOG-style directives also work.
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

#[cfg(feature = "onnx")]
fn build_detector(config: &ApiConfig) -> VisionResult<Arc<DetectorAdapter>> {
    use std::path::PathBuf;

    use sentinel_vision::{OnnxDetector, COCO_LABELS};
    use tracing::warn;

    // Person model: explicit path wins, then conventional filenames.
    const PERSON_WEIGHTS: [&str; 3] = ["yolo11n.onnx", "yolo11s.onnx", "yolov8n.onnx"];
    let person_candidates: Vec<PathBuf> = config
        .person_model_path
        .iter()
        .map(PathBuf::from)
        .chain(PERSON_WEIGHTS.iter().map(PathBuf::from))
        .collect();
    let person_path = person_candidates
        .iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            VisionError::model_load(format!("no person model weights found; tried {person_candidates:?}"))
        })?;
    let labels = COCO_LABELS.iter().map(|s| s.to_string()).collect();
    let person = OnnxDetector::load(person_path, config.detection_imgsz, labels)?;
    let mut adapter = DetectorAdapter::new(Box::new(person));

    if config.threat_detection_enabled {
        // Threat model labels depend on the training run; these match the
        // shipped weights.
        let threat_labels: Vec<String> = ["weapon", "gun", "knife", "firearm", "suspicious"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let threat_candidates: Vec<PathBuf> = config
            .threat_model_path
            .iter()
            .map(PathBuf::from)
            .chain(
                [
                    "models/threats/weights/best.onnx",
                    "models/suspicious/weights/best.onnx",
                    "models/threats.onnx",
                    "models/suspicious.onnx",
                ]
                .iter()
                .map(PathBuf::from),
            )
            .collect();
        match threat_candidates.iter().find(|p| p.exists()) {
            Some(path) => match OnnxDetector::load(path, config.detection_imgsz, threat_labels) {
                Ok(model) => {
                    adapter = adapter
                        .with_suspicious(Box::new(model), path.display().to_string());
                }
                Err(e) => warn!(error = %e, "failed to load threat model; continuing without it"),
            },
            None => warn!(
                "threat model weights not found; set THREAT_MODEL_PATH to override (checked {})",
                threat_candidates
                    .iter()
                    .map(|p: &PathBuf| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    } else {
        info!("threat detection disabled by env");
    }

    Ok(Arc::new(adapter))
}

#[cfg(not(feature = "onnx"))]
fn build_detector(_config: &ApiConfig) -> VisionResult<Arc<DetectorAdapter>> {
    Err(VisionError::model_load(
        "built without the `onnx` feature; no inference backend is available",
    ))
}
