//! Detector capabilities consumed by the trigger loop.
//!
//! Both detectors take a grayscale frame by reference. "Nothing found" is
//! an empty / `None` result, never an error.

use crate::types::LandmarkSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("model has unexpected layout: {0}")]
    UnexpectedModel(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer too short: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidFrame {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Hand landmark detection.
pub trait HandDetector: Send {
    /// Detect hands in a grayscale frame. Zero hands is `Ok(vec![])`.
    fn detect_hands(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<LandmarkSet>, DetectorError>;
}

/// Face descriptor extraction.
pub trait FaceDescriber: Send {
    /// Extract the raw descriptor of the most prominent face, or `None`.
    ///
    /// The length is not validated here; callers check it before use.
    fn describe_face(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<f32>>, DetectorError>;
}

/// Reject frames whose buffer is shorter than `width * height`.
pub(crate) fn check_frame(gray: &[u8], width: u32, height: u32) -> Result<(), DetectorError> {
    let expected = width as usize * height as usize;
    if width == 0 || height == 0 || gray.len() < expected {
        return Err(DetectorError::InvalidFrame {
            width,
            height,
            expected,
            actual: gray.len(),
        });
    }
    Ok(())
}
