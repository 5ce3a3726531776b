use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult};

/// Stub backend for testing. Uses frame hashing to detect scene changes:
/// a frame that differs from its predecessor counts as one detected object.
pub struct StubBackend {
    last_hash: Option<[u8; 32]>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { last_hash: None }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionResult> {
        let current_hash: [u8; 32] = Sha256::digest(pixels).into();

        let changed = self.last_hash.is_some_and(|prev| prev != current_hash);

        self.last_hash = Some(current_hash);

        if changed {
            Ok(DetectionResult {
                objects: vec![Detection {
                    x: 0.0,
                    y: 0.0,
                    w: 1.0,
                    h: 1.0,
                    confidence: 0.85,
                }],
            })
        } else {
            Ok(DetectionResult::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_reports_scene_changes() {
        let mut backend = StubBackend::new();

        // First frame: nothing to compare against.
        let r1 = backend.detect(b"frame1", 10, 10).unwrap();
        assert!(!r1.signal().object_present);

        // Different content counts as an object.
        let r2 = backend.detect(b"frame2", 10, 10).unwrap();
        assert!(r2.signal().object_present);
        assert_eq!(r2.signal().object_count, 1);

        // Identical content is quiet again.
        let r3 = backend.detect(b"frame2", 10, 10).unwrap();
        assert!(!r3.signal().object_present);
    }
}
