//! Camera object-presence pipeline.
//!
//! This crate implements a detection pipeline that publishes rate-limited
//! presence summaries over MQTT.
//!
//! # Architecture
//!
//! Three components composed in a straight line:
//!
//! 1. **Capture/inference loop**: pulls frames from a `FrameSource`, runs a
//!    `DetectorBackend`, derives a per-frame `DetectionSignal`.
//! 2. **Latest-value channel**: a single-slot handoff with overwrite-on-write
//!    and block-on-empty semantics. The consumer may fall arbitrarily far
//!    behind the producer; only the newest signal survives.
//! 3. **Rate-limited publisher**: drains the slot, publishes the newest
//!    signal through a `Publisher`, sleeps a fixed interval, repeats.
//!
//! The capture loop never waits on the network, and the publisher never
//! waits on the camera. A publish failure drops that value; the next cycle
//! delivers whatever is newest.
//!
//! # Module Structure
//!
//! - `channel`: the `LatestValue` handoff primitive
//! - `source`: frame sources (synthetic stub, GStreamer)
//! - `detect`: detector backends (frame-hash stub, tract ONNX)
//! - `publish` / `mqtt`: delivery seam and the MQTT implementation
//! - `pipeline`: the two worker loops and shutdown coordination
//! - `config`: daemon configuration (file + env + validation)

pub mod channel;
pub mod config;
pub mod detect;
pub mod frame;
pub mod mqtt;
pub mod pipeline;
pub mod publish;
pub mod source;

pub use channel::LatestValue;
pub use detect::{Detection, DetectionResult, DetectionSignal, DetectorBackend, StubBackend};
pub use frame::Frame;
pub use pipeline::{run_capture, run_publisher, Pipeline, ShutdownHandle};
pub use publish::{DetectionPayload, PublishError, Publisher};
pub use source::{CameraConfig, CameraSource, FrameSource, SourceError, SourceStats};

#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
