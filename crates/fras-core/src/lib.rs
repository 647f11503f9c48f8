//! fras-core — Gesture-gated face recognition for attendance checks.
//!
//! Hand landmarks gate face-descriptor extraction: only a raised hand
//! triggers the (far more expensive) face path, and a cooldown keeps a
//! held-up hand from flooding the match service.

pub mod detector;
pub mod face;
pub mod gesture;
pub mod hands;
mod preprocess;
pub mod status;
pub mod trigger;
pub mod types;

pub use detector::{DetectorError, FaceDescriber, HandDetector};
pub use status::{CheckOutcome, LoopStatus};
pub use trigger::{CycleId, TickDecision, TriggerLoop, DEFAULT_COOLDOWN};
pub use types::{BoundingBox, Embedding, EmbeddingError, Landmark, LandmarkSet, MatchResult};

/// Default directory for ONNX model files.
pub fn default_model_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("/usr/share/fras/models")
}
