//! Frame sources.
//!
//! `CameraSource` ingests frames from a camera or stream URL. Backends:
//! - Synthetic (`stub://` URLs): generated pixel patterns, for tests and
//!   development without hardware. `stub://name?frames=N` ends the stream
//!   after N frames.
//! - GStreamer (feature `rtsp-gstreamer`): RTSP/HTTP camera decode via an
//!   appsink pipeline.
//!
//! A source produces `Frame`s until it is exhausted; exhaustion and read
//! failures both terminate the capture loop.

use std::fmt;

#[cfg(feature = "rtsp-gstreamer")]
use std::time::{Duration, Instant};

use crate::frame::Frame;

/// Why a frame source stopped producing.
#[derive(Debug)]
pub enum SourceError {
    /// The source could not be opened at all.
    Unavailable(String),
    /// The stream ended or a read failed; no more frames will arrive.
    Exhausted(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {}", msg),
            SourceError::Exhausted(msg) => write!(f, "source exhausted: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Stream URL (e.g., "rtsp://192.168.1.100:554/stream" or "stub://camera").
    pub url: String,
    /// Target frame rate (frames per second). Bounds the frame-read timeout.
    pub target_fps: u32,
    /// Frame width (synthetic frames; real streams report their own).
    pub width: u32,
    /// Frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 1280,
            height: 720,
        }
    }
}

/// Anything the capture loop can pull frames from.
pub trait FrameSource {
    /// Capture the next frame, blocking until one is available.
    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

/// Camera frame source with backend dispatch.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "rtsp-gstreamer")]
    Gstreamer(GstreamerSource),
}

impl CameraSource {
    /// Open the configured source. Fails with `SourceError::Unavailable` if
    /// the URL is unsupported or the stream cannot be started.
    pub fn open(config: CameraConfig) -> Result<Self, SourceError> {
        if config.url.starts_with("stub://") {
            let source = SyntheticSource::new(config)?;
            log::info!("CameraSource: connected (synthetic)");
            return Ok(Self {
                backend: CameraBackend::Synthetic(source),
            });
        }

        #[cfg(feature = "rtsp-gstreamer")]
        {
            let source = GstreamerSource::open(config)?;
            Ok(Self {
                backend: CameraBackend::Gstreamer(source),
            })
        }
        #[cfg(not(feature = "rtsp-gstreamer"))]
        {
            Err(SourceError::Unavailable(format!(
                "{} requires the rtsp-gstreamer feature",
                config.url
            )))
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.stats(),
        }
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "rtsp-gstreamer")]
            CameraBackend::Gstreamer(source) => source.next_frame(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and development
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: CameraConfig,
    frame_count: u64,
    /// `stub://name?frames=N` ends the stream after N frames.
    frame_budget: Option<u64>,
    /// Simulated scene state so the stub detector sees occasional motion.
    scene_state: u8,
}

impl SyntheticSource {
    fn new(config: CameraConfig) -> Result<Self, SourceError> {
        let frame_budget = parse_frame_budget(&config.url)?;
        Ok(Self {
            config,
            frame_count: 0,
            frame_budget,
            scene_state: 0,
        })
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if let Some(budget) = self.frame_budget {
            if self.frame_count >= budget {
                return Err(SourceError::Exhausted(format!(
                    "synthetic stream ended after {} frames",
                    budget
                )));
            }
        }
        self.frame_count += 1;

        let pixels = self.generate_synthetic_pixels();
        Ok(Frame::new(pixels, self.config.width, self.config.height))
    }

    /// Generate synthetic pixel data.
    ///
    /// Most frames repeat a static pattern; every 50th frame the scene shifts,
    /// simulating an object entering the view.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.config.width * self.config.height * 3) as usize;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn parse_frame_budget(url: &str) -> Result<Option<u64>, SourceError> {
    let Some((_, query)) = url.split_once('?') else {
        return Ok(None);
    };
    let Some(frames) = query.strip_prefix("frames=") else {
        return Err(SourceError::Unavailable(format!(
            "unsupported stub query: {}",
            query
        )));
    };
    let budget = frames
        .parse::<u64>()
        .map_err(|_| SourceError::Unavailable(format!("invalid frame budget: {}", frames)))?;
    Ok(Some(budget))
}

// ----------------------------------------------------------------------------
// Production source using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "rtsp-gstreamer")]
struct GstreamerSource {
    config: CameraConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Instant,
}

#[cfg(feature = "rtsp-gstreamer")]
impl GstreamerSource {
    /// Build and start the decode pipeline:
    /// rtspsrc ! decodebin ! videoconvert ! appsink (RGB, keep newest buffer).
    fn open(config: CameraConfig) -> Result<Self, SourceError> {
        gstreamer::init()
            .map_err(|e| SourceError::Unavailable(format!("gstreamer init: {}", e)))?;

        let pipeline_description = format!(
            "rtspsrc location={} latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            config.url
        );
        let pipeline = gstreamer::parse_launch(&pipeline_description)
            .map_err(|e| SourceError::Unavailable(format!("build pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| SourceError::Unavailable("pipeline is not a Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| SourceError::Unavailable("appsink missing from pipeline".to_string()))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| SourceError::Unavailable("appsink has unexpected type".to_string()))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| SourceError::Unavailable(format!("start pipeline: {}", e)))?;
        log::info!("CameraSource: connected to {}", config.url);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_frame_at: None,
            connected_at: Instant::now(),
        })
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if let Some(reason) = self.poll_bus() {
            return Err(SourceError::Exhausted(reason));
        }

        let timeout = self.frame_timeout();
        let sample = self
            .appsink
            .try_pull_sample(timeout)
            .map_err(|e| SourceError::Exhausted(format!("pull sample: {}", e)))?
            .ok_or_else(|| SourceError::Exhausted("stream stalled".to_string()))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Ok(Frame::new(pixels, width, height))
    }

    fn is_healthy(&self) -> bool {
        let Some(last_frame_at) = self.last_frame_at else {
            return self.connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    /// Drain pending bus messages; an error or EOS ends the stream.
    fn poll_bus(&mut self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        while let Some(message) = bus.timed_pop(Duration::from_millis(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    return Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    return Some("stream reached EOS".to_string());
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(feature = "rtsp-gstreamer")]
impl Drop for GstreamerSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

#[cfg(feature = "rtsp-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32), SourceError> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| SourceError::Exhausted("sample missing buffer".to_string()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| SourceError::Exhausted("sample missing caps".to_string()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| SourceError::Exhausted(format!("parse caps: {}", e)))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer
        .map_readable()
        .map_err(|e| SourceError::Exhausted(format!("map buffer: {}", e)))?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .ok_or_else(|| SourceError::Exhausted("buffer row out of bounds".to_string()))?,
        );
    }

    Ok((pixels, width, height))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
