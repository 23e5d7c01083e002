use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub addr: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub storage_url: String,
    pub bus_url: String,
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            storage_url: "http://127.0.0.1:8080/api/violations".to_string(),
            bus_url: "http://127.0.0.1:8081/publish".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Local detection camera. An empty `frames_dir` means no local camera.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CameraConfig {
    pub frames_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub frames_dir: String,
    pub width: u32,
    pub height: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            frames_dir: String::new(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub capture_interval_ms: u64,
    pub plate_throttle_secs: u64,
    pub max_vehicles: usize,
    pub model_timeout_secs: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.45,
            capture_interval_ms: 500,
            plate_throttle_secs: 30,
            max_vehicles: 6,
            model_timeout_secs: 120,
        }
    }
}

/// Violation zone as fractions of the frame dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            top: 0.60,
            bottom: 0.90,
            left: 0.04,
            right: 0.96,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "redlight_monitor=info".to_string(),
        }
    }
}

impl Config {
    /// Callers fall back to `Config::default()` when this fails; a
    /// missing or broken file must not abort startup.
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path))?;
        Ok(config)
    }
}
