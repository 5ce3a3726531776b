mod backend;
mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
pub use result::{Detection, DetectionResult, DetectionSignal};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
