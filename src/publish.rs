//! Publisher seam and payload encoding.
//!
//! The publisher loop hands an encoded payload to a `Publisher` collaborator.
//! A `PublishError` is non-fatal by design: the value is dropped and the next
//! cycle publishes whatever is newest. Retrying a failed value would mean
//! publishing stale state once a newer signal has arrived.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::Serialize;

use crate::detect::DetectionSignal;

/// A failed delivery attempt. Recoverable; never escalated.
#[derive(Debug)]
pub struct PublishError {
    message: String,
}

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "publish failed: {}", self.message)
    }
}

impl std::error::Error for PublishError {}

/// Delivery collaborator for encoded detection payloads.
pub trait Publisher: Send {
    fn publish(&mut self, payload: &[u8]) -> Result<(), PublishError>;
}

/// Wire payload for one published detection summary.
#[derive(Debug, Serialize)]
pub struct DetectionPayload {
    pub object_present: bool,
    pub object_count: usize,
    pub confidence: f32,
    /// When we published this, seconds since epoch.
    pub timestamp: u64,
}

impl DetectionPayload {
    pub fn from_signal(signal: &DetectionSignal) -> Self {
        Self {
            object_present: signal.object_present,
            object_count: signal.object_count,
            confidence: signal.confidence,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Encode a signal as the JSON payload sent to the broker.
pub fn encode_signal(signal: &DetectionSignal) -> Result<Vec<u8>> {
    let payload = DetectionPayload::from_signal(signal);
    Ok(serde_json::to_vec(&payload)?)
}
