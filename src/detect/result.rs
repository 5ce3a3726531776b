/// Result of running detection on one frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Detected objects (normalized 0..1 coordinates).
    pub objects: Vec<Detection>,
}

impl DetectionResult {
    /// Derive the per-frame summary handed to the publisher.
    pub fn signal(&self) -> DetectionSignal {
        let confidence = self
            .objects
            .iter()
            .map(|d| d.confidence)
            .fold(0.0f32, f32::max);
        DetectionSignal {
            object_present: !self.objects.is_empty(),
            object_count: self.objects.len(),
            confidence,
        }
    }
}

/// One detected object.
#[derive(Clone, Debug)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: f32,
}

/// Per-frame summary written into the latest-value slot.
///
/// Transient: produced by the capture loop, consumed (or overwritten) by the
/// publisher, never retained.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionSignal {
    /// At least one object detected in the frame.
    pub object_present: bool,
    pub object_count: usize,
    /// Confidence of the strongest detection, 0 when nothing was found.
    pub confidence: f32,
}
