use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a face descriptor accepted by the match service.
pub const EMBEDDING_DIM: usize = 128;

/// Number of points in one hand landmark set.
pub const HAND_LANDMARK_COUNT: usize = 21;
/// Landmark index of the wrist.
pub const WRIST: usize = 0;
/// Landmark index of the middle fingertip.
pub const MIDDLE_TIP: usize = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("expected {expected} values, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("value at index {index} is not finite")]
    NonFinite { index: usize },
}

/// Face descriptor of exactly [`EMBEDDING_DIM`] finite values.
///
/// Serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Validate a raw descriptor.
    pub fn new(values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::InvalidLength {
                expected: EMBEDDING_DIM,
                actual: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite { index });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(e: Embedding) -> Self {
        e.values
    }
}

/// One hand landmark in frame-normalized coordinates.
///
/// `x` and `y` are in [0, 1] relative to the frame, with `y` growing
/// downwards; `z` is depth relative to the wrist.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// The 21 landmarks of one detected hand, in anatomical order.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; HAND_LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn new(points: [Landmark; HAND_LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Build from a flat `[x0, y0, z0, x1, ...]` slice. Returns `None` unless
    /// the slice holds at least 63 values.
    pub fn from_flat(values: &[f32]) -> Option<Self> {
        if values.len() < HAND_LANDMARK_COUNT * 3 {
            return None;
        }
        let points = std::array::from_fn(|i| Landmark {
            x: values[i * 3],
            y: values[i * 3 + 1],
            z: values[i * 3 + 2],
        });
        Some(Self { points })
    }

    pub fn wrist(&self) -> &Landmark {
        &self.points[WRIST]
    }

    pub fn middle_tip(&self) -> &Landmark {
        &self.points[MIDDLE_TIP]
    }
}

/// Axis-aligned face box in frame pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Decision returned by the match service for one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Identifier of the matched student (present when `matched`).
    pub student_id: Option<String>,
    /// Distance to the closest enrolled descriptor, never negative.
    pub distance: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_accepts_exact_length() {
        let e = Embedding::new(vec![0.1; EMBEDDING_DIM]).unwrap();
        assert_eq!(e.values().len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_embedding_rejects_wrong_length() {
        assert_eq!(
            Embedding::new(vec![0.0; 127]),
            Err(EmbeddingError::InvalidLength { expected: 128, actual: 127 })
        );
        assert!(Embedding::new(vec![0.0; 512]).is_err());
        assert!(Embedding::new(Vec::new()).is_err());
    }

    #[test]
    fn test_embedding_rejects_nan() {
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[7] = f32::NAN;
        assert_eq!(Embedding::new(values), Err(EmbeddingError::NonFinite { index: 7 }));
    }

    #[test]
    fn test_embedding_json_is_bare_array() {
        let e = Embedding::new(vec![0.5; EMBEDDING_DIM]).unwrap();
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json.as_array().map(|a| a.len()), Some(EMBEDDING_DIM));

        let short: Result<Embedding, _> = serde_json::from_str("[1.0, 2.0]");
        assert!(short.is_err());
    }

    #[test]
    fn test_landmarks_from_flat() {
        let flat: Vec<f32> = (0..63).map(|i| i as f32).collect();
        let set = LandmarkSet::from_flat(&flat).unwrap();
        assert_eq!(*set.wrist(), Landmark { x: 0.0, y: 1.0, z: 2.0 });
        assert_eq!(*set.middle_tip(), Landmark { x: 36.0, y: 37.0, z: 38.0 });
        assert!(LandmarkSet::from_flat(&flat[..62]).is_none());
    }
}
