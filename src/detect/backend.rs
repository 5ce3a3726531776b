use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detector backend trait.
///
/// A backend is an opaque inference collaborator: RGB pixels flow in, a
/// `DetectionResult` flows out. Backends run synchronously on the capture
/// thread and must not retain the pixel slice beyond the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        (**self).detect(pixels, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
