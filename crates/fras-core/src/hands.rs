//! 21-point hand landmark model via ONNX Runtime.
//!
//! Expects a single-hand landmark network (MediaPipe layout) exported with
//! an NHWC `1×224×224×3` float input in [0, 1], producing 63 landmark values
//! in input pixels and a hand-presence score.

use crate::detector::{check_frame, DetectorError, HandDetector};
use crate::preprocess::{self, Letterbox};
use crate::types::{Landmark, LandmarkSet, HAND_LANDMARK_COUNT};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const HAND_INPUT_SIZE: usize = 224;
const HAND_MEAN: f32 = 0.0;
const HAND_STD: f32 = 255.0;
const HAND_LANDMARK_VALUES: usize = HAND_LANDMARK_COUNT * 3;
/// Letterbox padding value (black).
const HAND_PAD: u8 = 0;

/// Single-hand landmark detector.
pub struct HandLandmarker {
    session: Session,
    presence_threshold: f32,
}

impl HandLandmarker {
    /// Load the landmark model. Hands with presence below `presence_threshold` are ignored.
    pub fn load(model_path: &str, presence_threshold: f32) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        let num_outputs = session.outputs().len();
        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded hand landmark model"
        );
        if num_outputs < 2 {
            return Err(DetectorError::UnexpectedModel(format!(
                "hand model needs landmark and presence outputs, got {num_outputs}"
            )));
        }

        Ok(Self {
            session,
            presence_threshold,
        })
    }
}

impl HandDetector for HandLandmarker {
    fn detect_hands(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<LandmarkSet>, DetectorError> {
        check_frame(gray, width, height)?;
        let (img, letterbox) = preprocess::letterbox_square(
            gray,
            width as usize,
            height as usize,
            HAND_INPUT_SIZE,
            HAND_PAD,
        );
        let input = preprocess::to_nhwc(&img, HAND_MEAN, HAND_STD);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, first) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("output 0: {e}")))?;
        let (_, second) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("output 1: {e}")))?;

        // Exports disagree on output order; the landmark tensor is the long one.
        let (raw_landmarks, raw_presence) = if first.len() >= HAND_LANDMARK_VALUES {
            (first, second)
        } else {
            (second, first)
        };

        let presence = raw_presence
            .first()
            .copied()
            .map(presence_probability)
            .ok_or_else(|| DetectorError::InferenceFailed("empty presence output".into()))?;

        if presence < self.presence_threshold {
            tracing::trace!(presence, "no hand");
            return Ok(Vec::new());
        }

        let hand = decode_landmarks(raw_landmarks, &letterbox, width as f32, height as f32)
            .ok_or_else(|| {
                DetectorError::InferenceFailed(format!(
                    "expected {HAND_LANDMARK_VALUES} landmark values, got {}",
                    raw_landmarks.len()
                ))
            })?;

        Ok(vec![hand])
    }
}

/// Some exports emit the raw logit, others the sigmoid. Normalize to [0, 1].
fn presence_probability(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Map landmark output (input pixels) to frame-normalized coordinates.
fn decode_landmarks(
    raw: &[f32],
    letterbox: &Letterbox,
    frame_w: f32,
    frame_h: f32,
) -> Option<LandmarkSet> {
    if raw.len() < HAND_LANDMARK_VALUES {
        return None;
    }
    let mut points = [Landmark::default(); HAND_LANDMARK_COUNT];
    for (i, point) in points.iter_mut().enumerate() {
        let (fx, fy) = letterbox.unmap(raw[i * 3], raw[i * 3 + 1]);
        *point = Landmark {
            x: fx / frame_w,
            y: fy / frame_h,
            z: raw[i * 3 + 2] / letterbox.scale / frame_w,
        };
    }
    Some(LandmarkSet::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture;
    use crate::types::{MIDDLE_TIP, WRIST};

    #[test]
    fn test_presence_probability() {
        assert_eq!(presence_probability(0.7), 0.7);
        assert!((presence_probability(0.0) - 0.0).abs() < 1e-6);
        assert!(presence_probability(5.0) > 0.99);
        assert!(presence_probability(-5.0) < 0.01);
    }

    #[test]
    fn test_decode_landmarks_normalizes_to_frame() {
        // 640x480 frame letterboxed into 224: scale 0.35, pad_y 28
        let letterbox = Letterbox {
            scale: 0.35,
            pad_x: 0.0,
            pad_y: 28.0,
        };
        let mut raw = vec![0.0f32; HAND_LANDMARK_VALUES];
        // wrist at input (112, 196) -> frame (320, 480)
        raw[WRIST * 3] = 112.0;
        raw[WRIST * 3 + 1] = 196.0;
        // middle tip at input (112, 28) -> frame (320, 0)
        raw[MIDDLE_TIP * 3] = 112.0;
        raw[MIDDLE_TIP * 3 + 1] = 28.0;

        let hand = decode_landmarks(&raw, &letterbox, 640.0, 480.0).unwrap();
        assert!((hand.wrist().x - 0.5).abs() < 1e-4);
        assert!((hand.wrist().y - 1.0).abs() < 1e-4);
        assert!(hand.middle_tip().y.abs() < 1e-4);
        assert!(gesture::is_raised(&hand));
    }

    #[test]
    fn test_decode_landmarks_short_output() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        assert!(decode_landmarks(&[0.0; 10], &letterbox, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_load_missing_model() {
        let err = HandLandmarker::load("/nonexistent/hand_landmark.onnx", 0.6)
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }
}
