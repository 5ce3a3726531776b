use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 1280;
const DEFAULT_CAMERA_HEIGHT: u32 = 720;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_BROKER_ADDR: &str = "127.0.0.1:1883";
const DEFAULT_TOPIC: &str = "sentry/detections";
const DEFAULT_CLIENT_ID: &str = "sentryd";
const DEFAULT_QOS: u8 = 2;
const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct SentrydConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    mqtt: Option<MqttConfigFile>,
    publish: Option<PublishConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker_addr: Option<String>,
    topic: Option<String>,
    client_id: Option<String>,
    qos: Option<u8>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PublishConfigFile {
    interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SentrydConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub mqtt: MqttSettings,
    pub publish_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub confidence_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker_addr: String,
    pub topic: String,
    pub client_id: String,
    pub qos: u8,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SentrydConfig {
    /// Load configuration: JSON file (explicit path or `SENTRYD_CONFIG`),
    /// then env overrides, then validation.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("SENTRYD_CONFIG").ok().map(PathBuf::from);
        let path = config_path.or(env_path.as_deref());
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentrydConfigFile) -> Self {
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let detector = DetectorSettings {
            backend: file
                .detector
                .as_ref()
                .and_then(|detector| detector.backend.clone())
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            model_path: file
                .detector
                .as_ref()
                .and_then(|detector| detector.model_path.clone()),
            confidence_threshold: file
                .detector
                .as_ref()
                .and_then(|detector| detector.confidence_threshold)
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        };
        let mqtt = MqttSettings {
            broker_addr: file
                .mqtt
                .as_ref()
                .and_then(|mqtt| mqtt.broker_addr.clone())
                .unwrap_or_else(|| DEFAULT_BROKER_ADDR.to_string()),
            topic: file
                .mqtt
                .as_ref()
                .and_then(|mqtt| mqtt.topic.clone())
                .unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            client_id: file
                .mqtt
                .as_ref()
                .and_then(|mqtt| mqtt.client_id.clone())
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            qos: file
                .mqtt
                .as_ref()
                .and_then(|mqtt| mqtt.qos)
                .unwrap_or(DEFAULT_QOS),
            username: file.mqtt.as_ref().and_then(|mqtt| mqtt.username.clone()),
            password: file.mqtt.as_ref().and_then(|mqtt| mqtt.password.clone()),
        };
        let publish_interval = Duration::from_secs(
            file.publish
                .and_then(|publish| publish.interval_secs)
                .unwrap_or(DEFAULT_PUBLISH_INTERVAL_SECS),
        );
        Self {
            camera,
            detector,
            mqtt,
            publish_interval,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SENTRY_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(backend) = std::env::var("SENTRY_DETECTOR_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
        if let Ok(path) = std::env::var("SENTRY_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(addr) = std::env::var("SENTRY_MQTT_BROKER_ADDR") {
            if !addr.trim().is_empty() {
                self.mqtt.broker_addr = addr;
            }
        }
        if let Ok(topic) = std::env::var("SENTRY_MQTT_TOPIC") {
            if !topic.trim().is_empty() {
                self.mqtt.topic = topic;
            }
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            if !username.trim().is_empty() {
                self.mqtt.username = Some(username);
            }
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            if !password.trim().is_empty() {
                self.mqtt.password = Some(password);
            }
        }
        if let Ok(interval) = std::env::var("SENTRY_PUBLISH_INTERVAL_SECS") {
            let seconds: u64 = interval.parse().map_err(|_| {
                anyhow!("SENTRY_PUBLISH_INTERVAL_SECS must be an integer number of seconds")
            })?;
            self.publish_interval = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.url.trim().is_empty() {
            return Err(anyhow!("camera url must not be empty"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        match self.detector.backend.as_str() {
            "stub" => {}
            "tract" => {
                if self.detector.model_path.is_none() {
                    return Err(anyhow!("tract backend requires detector.model_path"));
                }
            }
            other => return Err(anyhow!("unknown detector backend '{}'", other)),
        }
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within 0..=1"));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(anyhow!("mqtt topic must not be empty"));
        }
        if self.mqtt.qos > 2 {
            return Err(anyhow!("mqtt qos must be 0, 1 or 2"));
        }
        if self.publish_interval.as_secs() == 0 {
            return Err(anyhow!("publish interval must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentrydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
