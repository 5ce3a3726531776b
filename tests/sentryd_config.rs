use std::sync::Mutex;

use tempfile::NamedTempFile;

use camera_sentry::config::SentrydConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTRYD_CONFIG",
        "SENTRY_CAMERA_URL",
        "SENTRY_DETECTOR_BACKEND",
        "SENTRY_MODEL_PATH",
        "SENTRY_MQTT_BROKER_ADDR",
        "SENTRY_MQTT_TOPIC",
        "SENTRY_PUBLISH_INTERVAL_SECS",
        "MQTT_USERNAME",
        "MQTT_PASSWORD",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "camera": {
                "url": "rtsp://camera-1/stream",
                "target_fps": 12,
                "width": 800,
                "height": 600
            },
            "detector": {
                "backend": "tract",
                "model_path": "/var/lib/sentry/model.onnx",
                "confidence_threshold": 0.4
            },
            "mqtt": {
                "broker_addr": "mqtts://broker.example:8883",
                "topic": "plant/cam-1/presence",
                "client_id": "sentry-cam-1",
                "qos": 1,
                "username": "sentry"
            },
            "publish": {
                "interval_secs": 30
            }
        }"#,
    );

    std::env::set_var("SENTRYD_CONFIG", file.path());
    std::env::set_var("SENTRY_CAMERA_URL", "rtsp://camera-2/stream");
    std::env::set_var("SENTRY_PUBLISH_INTERVAL_SECS", "10");
    std::env::set_var("MQTT_PASSWORD", "hunter2");

    let cfg = SentrydConfig::load(None).expect("load config");

    assert_eq!(cfg.camera.url, "rtsp://camera-2/stream");
    assert_eq!(cfg.camera.target_fps, 12);
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(
        cfg.detector.model_path.as_deref().unwrap().to_str(),
        Some("/var/lib/sentry/model.onnx")
    );
    assert_eq!(cfg.detector.confidence_threshold, 0.4);
    assert_eq!(cfg.mqtt.broker_addr, "mqtts://broker.example:8883");
    assert_eq!(cfg.mqtt.topic, "plant/cam-1/presence");
    assert_eq!(cfg.mqtt.client_id, "sentry-cam-1");
    assert_eq!(cfg.mqtt.qos, 1);
    assert_eq!(cfg.mqtt.username.as_deref(), Some("sentry"));
    assert_eq!(cfg.mqtt.password.as_deref(), Some("hunter2"));
    assert_eq!(cfg.publish_interval.as_secs(), 10);

    clear_env();
}

#[test]
fn defaults_apply_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentrydConfig::load(None).expect("load config");

    assert_eq!(cfg.camera.url, "stub://camera");
    assert_eq!(cfg.camera.target_fps, 10);
    assert_eq!(cfg.camera.width, 1280);
    assert_eq!(cfg.camera.height, 720);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.mqtt.broker_addr, "127.0.0.1:1883");
    assert_eq!(cfg.mqtt.topic, "sentry/detections");
    assert_eq!(cfg.mqtt.qos, 2);
    assert_eq!(cfg.publish_interval.as_secs(), 5);

    clear_env();
}

#[test]
fn explicit_path_wins_over_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let env_file = write_config(r#"{ "mqtt": { "topic": "from-env-file" } }"#);
    let cli_file = write_config(r#"{ "mqtt": { "topic": "from-cli-file" } }"#);
    std::env::set_var("SENTRYD_CONFIG", env_file.path());

    let cfg = SentrydConfig::load(Some(cli_file.path())).expect("load config");
    assert_eq!(cfg.mqtt.topic, "from-cli-file");

    clear_env();
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let zero_interval = write_config(r#"{ "publish": { "interval_secs": 0 } }"#);
    assert!(SentrydConfig::load(Some(zero_interval.path())).is_err());

    let bad_qos = write_config(r#"{ "mqtt": { "qos": 3 } }"#);
    assert!(SentrydConfig::load(Some(bad_qos.path())).is_err());

    let unknown_backend = write_config(r#"{ "detector": { "backend": "cloud" } }"#);
    assert!(SentrydConfig::load(Some(unknown_backend.path())).is_err());

    let tract_without_model = write_config(r#"{ "detector": { "backend": "tract" } }"#);
    assert!(SentrydConfig::load(Some(tract_without_model.path())).is_err());

    let zero_fps = write_config(r#"{ "camera": { "target_fps": 0 } }"#);
    assert!(SentrydConfig::load(Some(zero_fps.path())).is_err());

    clear_env();
}
