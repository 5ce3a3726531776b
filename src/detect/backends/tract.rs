#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend for ONNX object detection.
///
/// Loads a local YOLO-family model (rows of `cx, cy, w, h, objectness,
/// class scores...` in input-pixel coordinates) and decodes its output into
/// normalized detections. No network I/O; disk access only at model load.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    confidence_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        })
    }

    /// Override the default confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_output(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[2] < 6 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }

        let (rows, cols) = (shape[1], shape[2]);
        let data = view
            .as_slice()
            .ok_or_else(|| anyhow!("model output tensor is not contiguous"))?;

        let mut candidates = Vec::new();
        for row in data.chunks_exact(cols).take(rows) {
            let objectness = row[4];
            let class_score = row[5..].iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let confidence = objectness * class_score;
            if !confidence.is_finite() || confidence < self.confidence_threshold {
                continue;
            }

            // Box rows are center/size in model-input pixels; normalize.
            let w = row[2] / self.width as f32;
            let h = row[3] / self.height as f32;
            let x = row[0] / self.width as f32 - w / 2.0;
            let y = row[1] / self.height as f32 - h / 2.0;
            candidates.push(Detection {
                x: x.clamp(0.0, 1.0),
                y: y.clamp(0.0, 1.0),
                w: w.clamp(0.0, 1.0),
                h: h.clamp(0.0, 1.0),
                confidence,
            });
        }

        Ok(suppress_overlaps(candidates))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let objects = self.decode_output(outputs)?;

        Ok(DetectionResult { objects })
    }
}

/// Greedy non-maximum suppression: keep the strongest detection, drop
/// everything overlapping it beyond the IoU threshold, repeat.
fn suppress_overlaps(mut candidates: Vec<Detection>) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| intersection_over_union(k, &candidate) < NMS_IOU_THRESHOLD)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn intersection_over_union(a: &Detection, b: &Detection) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.w).min(b.x + b.w);
    let bottom = (a.y + a.h).min(b.y + b.h);

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let union = a.w * a.h + b.w * b.h - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}
