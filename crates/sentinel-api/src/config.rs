//! Environment-driven service configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sentinel_adjudicator::LlmConfig;
use sentinel_vision::{SuspiciousConfig, DEFAULT_ASSOC_IOU_MIN, DEFAULT_ASSOC_MAX_DIST_FRAC};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8001";
/// Shorter-side inference resolution.
pub const DEFAULT_DETECTION_IMGSZ: u32 = 640;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub llm: LlmConfig,
    /// Auto-run adjudication whenever a threat/suspicious box is displayed.
    pub llm_auto_on_threat: bool,
    pub llm_cooldown: Duration,
    pub llm_track_cooldown: Duration,
    pub detection_imgsz: u32,
    /// Mute threat classification: everything reports as `suspicious`.
    pub suspicious_only: bool,
    pub assoc_iou_min: f32,
    pub assoc_max_dist_frac: f32,
    pub threat_detection_enabled: bool,
    pub threat_model_path: Option<String>,
    pub person_model_path: Option<String>,
    pub snapshot_root: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            llm: LlmConfig::default(),
            llm_auto_on_threat: true,
            llm_cooldown: Duration::from_secs(10),
            llm_track_cooldown: Duration::from_secs(10),
            detection_imgsz: DEFAULT_DETECTION_IMGSZ,
            suspicious_only: false,
            assoc_iou_min: DEFAULT_ASSOC_IOU_MIN,
            assoc_max_dist_frac: DEFAULT_ASSOC_MAX_DIST_FRAC,
            threat_detection_enabled: true,
            threat_model_path: None,
            person_model_path: None,
            snapshot_root: PathBuf::from("snapshots"),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let llm_cooldown = Duration::from_secs(env_parse("LLM_COOLDOWN_SECONDS", 10u64));
        Self {
            bind_addr: env_or("SENTINEL_BIND", DEFAULT_BIND_ADDR),
            llm: LlmConfig::from_env(),
            llm_auto_on_threat: env_flag("LLM_AUTO_ON_THREAT", true),
            llm_track_cooldown: Duration::from_secs(env_parse(
                "LLM_PER_TRACK_COOLDOWN_SECONDS",
                llm_cooldown.as_secs(),
            )),
            llm_cooldown,
            detection_imgsz: env_parse("DETECTION_IMGSZ", DEFAULT_DETECTION_IMGSZ),
            suspicious_only: env_flag("SUSPICIOUS_ONLY", false),
            assoc_iou_min: env_parse("THREAT_ASSOC_IOU_MIN", DEFAULT_ASSOC_IOU_MIN),
            assoc_max_dist_frac: env_parse("THREAT_ASSOC_MAX_DIST_FRAC", DEFAULT_ASSOC_MAX_DIST_FRAC),
            threat_detection_enabled: env_flag("THREAT_DETECTION_ENABLED", true),
            threat_model_path: env_opt("THREAT_MODEL_PATH"),
            person_model_path: env_opt("PERSON_MODEL_PATH"),
            snapshot_root: PathBuf::from(env_or("SNAPSHOT_DIR", "snapshots")),
        }
    }

    pub fn suspicious_config(&self) -> SuspiciousConfig {
        SuspiciousConfig {
            suspicious_only: self.suspicious_only,
            assoc_iou_min: self.assoc_iou_min,
            assoc_max_dist_frac: self.assoc_max_dist_frac,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Truthy: `1`/`true`/`yes`. Falsy: `0`/`false`/`no`. Anything else keeps
/// the default.
fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:8001");
        assert_eq!(config.llm_cooldown, Duration::from_secs(10));
        assert_eq!(config.detection_imgsz, 640);
        assert!(config.llm_auto_on_threat);
        assert!(!config.suspicious_only);
        assert!(config.threat_detection_enabled);
    }

    #[test]
    fn test_env_flag_parsing() {
        std::env::set_var("SENTINEL_TEST_FLAG_A", "no");
        assert!(!env_flag("SENTINEL_TEST_FLAG_A", true));
        std::env::set_var("SENTINEL_TEST_FLAG_A", "1");
        assert!(env_flag("SENTINEL_TEST_FLAG_A", false));
        std::env::set_var("SENTINEL_TEST_FLAG_A", "banana");
        assert!(env_flag("SENTINEL_TEST_FLAG_A", true));
        std::env::remove_var("SENTINEL_TEST_FLAG_A");
        assert!(!env_flag("SENTINEL_TEST_FLAG_A", false));
    }
}
