//! The capture → latest-value → publish pipeline.
//!
//! Two independently paced loops joined by a single `LatestValue` slot:
//!
//! - `run_capture` reads frames and runs inference as fast as the source
//!   allows; each derived signal overwrites the slot, so the loop is never
//!   throttled by the publisher.
//! - `run_publisher` blocks on the slot, delivers the newest signal once,
//!   then sleeps for the publish interval. Signals produced during the sleep
//!   collapse to the single latest value read at the next take.
//!
//! Shutdown: capture exit (source exhausted or stop request) closes the slot,
//! which wakes a blocked publisher. An external stop request sets the stop
//! flag, checked at the top of each loop iteration, and closes the slot as
//! well, so neither loop can block past one iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::channel::LatestValue;
use crate::detect::{DetectionSignal, DetectorBackend};
use crate::publish::{encode_signal, Publisher};
use crate::source::{FrameSource, SourceError};

/// Requests a pipeline stop from outside (signal handler, supervisor).
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    slot: Arc<LatestValue<DetectionSignal>>,
}

impl ShutdownHandle {
    /// Set the stop flag and close the slot so a blocked reader wakes.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        self.slot.close();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Capture/inference loop. Runs until the source is exhausted or a stop is
/// requested, then closes the slot.
pub fn run_capture<S, D>(
    mut source: S,
    mut detector: D,
    slot: &LatestValue<DetectionSignal>,
    stop: &AtomicBool,
) where
    S: FrameSource,
    D: DetectorBackend,
{
    let mut frames = 0u64;
    let mut last_health_log = std::time::Instant::now();
    loop {
        if stop.load(Ordering::Relaxed) {
            log::info!("capture loop: stop requested");
            break;
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(SourceError::Exhausted(reason)) => {
                log::info!(
                    "capture loop: stream ended after {} frames ({})",
                    frames,
                    reason
                );
                break;
            }
            Err(err) => {
                log::error!("capture loop: {}", err);
                break;
            }
        };
        frames += 1;

        let result = match detector.detect(frame.pixels(), frame.width, frame.height) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("detector failed, skipping frame: {:#}", err);
                continue;
            }
        };

        slot.put(result.signal());

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::info!("capture health: {} frames processed", frames);
            last_health_log = std::time::Instant::now();
        }
    }

    // Close-as-sentinel: a publisher blocked in take() wakes and terminates.
    slot.close();
}

/// Rate-limited publisher loop. Runs until the slot closes or a stop is
/// requested.
///
/// A failed delivery drops that value: the next cycle publishes whatever is
/// newest, never a retry of the stale one.
pub fn run_publisher<P>(
    mut publisher: P,
    slot: &LatestValue<DetectionSignal>,
    interval: Duration,
    stop: &AtomicBool,
) where
    P: Publisher,
{
    loop {
        if stop.load(Ordering::Relaxed) {
            log::info!("publisher loop: stop requested");
            break;
        }

        let Some(signal) = slot.take() else {
            log::info!("publisher loop: channel closed");
            break;
        };

        match encode_signal(&signal) {
            Ok(payload) => {
                if let Err(err) = publisher.publish(&payload) {
                    log::warn!("dropping value after failed delivery: {}", err);
                } else {
                    log::debug!(
                        "published object_present={} count={} confidence={:.2}",
                        signal.object_present,
                        signal.object_count,
                        signal.confidence
                    );
                }
            }
            Err(err) => log::warn!("failed to encode signal: {:#}", err),
        }

        thread::sleep(interval);
    }
}

/// A running pipeline: capture and publisher threads plus a shutdown handle.
pub struct Pipeline {
    capture: JoinHandle<()>,
    publisher: JoinHandle<()>,
    shutdown: ShutdownHandle,
}

impl Pipeline {
    /// Spawn both workers. The slot they share is the only shared state; the
    /// source and publisher handles each move into their own thread.
    pub fn spawn<S, D, P>(
        source: S,
        detector: D,
        publisher: P,
        publish_interval: Duration,
    ) -> Result<Self>
    where
        S: FrameSource + Send + 'static,
        D: DetectorBackend + 'static,
        P: Publisher + 'static,
    {
        let slot = Arc::new(LatestValue::new());
        let stop = Arc::new(AtomicBool::new(false));
        let shutdown = ShutdownHandle {
            stop: Arc::clone(&stop),
            slot: Arc::clone(&slot),
        };

        let capture = {
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || run_capture(source, detector, &slot, &stop))?
        };

        let publisher = {
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("publisher".to_string())
                .spawn(move || run_publisher(publisher, &slot, publish_interval, &stop))?
        };

        Ok(Self {
            capture,
            publisher,
            shutdown,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Wait for both workers to reach their terminal state.
    pub fn join(self) -> Result<()> {
        self.capture
            .join()
            .map_err(|_| anyhow!("capture thread panicked"))?;
        self.publisher
            .join()
            .map_err(|_| anyhow!("publisher thread panicked"))?;
        Ok(())
    }
}
