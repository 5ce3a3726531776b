//! sentryd - camera object-presence daemon
//!
//! This daemon:
//! 1. Ingests frames from the configured camera source
//! 2. Runs object detection on each frame
//! 3. Publishes a rate-limited presence summary to an MQTT broker
//!
//! The capture loop and the publisher run as independent threads joined by a
//! latest-value slot; a consumer falling behind never stalls capture, and
//! only the newest detection summary is ever delivered.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use camera_sentry::{
    config::{CameraSettings, DetectorSettings, SentrydConfig},
    mqtt::{self, MqttPublisher},
    CameraConfig, CameraSource, DetectorBackend, Pipeline, StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera object-presence daemon")]
struct Args {
    /// Path to the JSON config file (defaults to $SENTRYD_CONFIG).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Camera/stream URL override.
    #[arg(long, value_name = "URL")]
    camera_url: Option<String>,

    /// MQTT broker address override.
    #[arg(long, value_name = "ADDR")]
    broker: Option<String>,

    /// MQTT topic override.
    #[arg(long, value_name = "TOPIC")]
    topic: Option<String>,

    /// Publish interval override, in seconds.
    #[arg(long, value_name = "SECS")]
    publish_interval: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = SentrydConfig::load(args.config.as_deref())?;
    if let Some(url) = args.camera_url {
        cfg.camera.url = url;
    }
    if let Some(addr) = args.broker {
        cfg.mqtt.broker_addr = addr;
    }
    if let Some(topic) = args.topic {
        cfg.mqtt.topic = topic;
    }
    if let Some(secs) = args.publish_interval {
        if secs == 0 {
            return Err(anyhow!("--publish-interval must be greater than zero"));
        }
        cfg.publish_interval = std::time::Duration::from_secs(secs);
    }

    log::info!(
        "sentryd starting: camera={} detector={} broker={} topic={}",
        cfg.camera.url,
        cfg.detector.backend,
        cfg.mqtt.broker_addr,
        cfg.mqtt.topic
    );

    let endpoint = mqtt::parse_mqtt_endpoint(&cfg.mqtt.broker_addr, false)?;
    let qos = mqtt::qos_from_level(cfg.mqtt.qos)?;
    let runtime = mqtt::connect(
        &endpoint,
        &cfg.mqtt.client_id,
        cfg.mqtt.username.as_deref(),
        cfg.mqtt.password.as_deref(),
    )?;
    let publisher = MqttPublisher::new(runtime.client.clone(), &cfg.mqtt.topic, qos);

    let source = CameraSource::open(CameraConfig {
        url: cfg.camera.url.clone(),
        target_fps: cfg.camera.target_fps,
        width: cfg.camera.width,
        height: cfg.camera.height,
    })?;

    let mut detector = build_detector(&cfg.detector, &cfg.camera)?;
    detector.warm_up()?;

    let pipeline = Pipeline::spawn(source, detector, publisher, cfg.publish_interval)?;

    let shutdown = pipeline.shutdown_handle();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received");
        shutdown.request_stop();
    })
    .expect("error setting Ctrl-C handler");

    log::info!(
        "sentryd running; publishing every {}s",
        cfg.publish_interval.as_secs()
    );

    pipeline.join()?;
    runtime.disconnect()?;
    log::info!("sentryd stopped cleanly");
    Ok(())
}

#[cfg_attr(not(feature = "backend-tract"), allow(unused_variables))]
fn build_detector(
    detector: &DetectorSettings,
    camera: &CameraSettings,
) -> Result<Box<dyn DetectorBackend>> {
    match detector.backend.as_str() {
        "stub" => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = detector
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract backend requires detector.model_path"))?;
            let backend = camera_sentry::TractBackend::new(model_path, camera.width, camera.height)?
                .with_threshold(detector.confidence_threshold);
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => Err(anyhow!(
            "detector backend 'tract' requires the backend-tract feature"
        )),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}
