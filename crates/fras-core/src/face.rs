//! Face localization and 128-d descriptor extraction via ONNX Runtime.
//!
//! [`FaceLocator`] runs an RFB-320 style detector whose outputs are already
//! decoded (`scores[N,2]`, `boxes[N,4]` as normalized corners).
//! [`FaceEncoder`] maps a face crop to a 128-value descriptor suitable for
//! euclidean-distance matching. [`OnnxFaceDescriber`] chains the two.

use crate::detector::{check_frame, DetectorError, FaceDescriber};
use crate::preprocess::{self, Gray};
use crate::types::BoundingBox;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const LOCATOR_INPUT_W: usize = 320;
const LOCATOR_INPUT_H: usize = 240;
const LOCATOR_MEAN: f32 = 127.0;
const LOCATOR_STD: f32 = 128.0;
const LOCATOR_NMS_THRESHOLD: f32 = 0.3;

const ENCODER_INPUT_SIZE: usize = 150;
const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 127.5;
/// Fraction of the face box added on every side before cropping.
const CROP_MARGIN: f32 = 0.2;

/// Face detector producing boxes in frame pixels.
pub struct FaceLocator {
    session: Session,
    confidence_threshold: f32,
}

impl FaceLocator {
    pub fn load(model_path: &str, confidence_threshold: f32) -> Result<Self, DetectorError> {
        let session = load_session(model_path, "face locator")?;
        if session.outputs().len() < 2 {
            return Err(DetectorError::UnexpectedModel(format!(
                "face locator needs scores and boxes outputs, got {}",
                session.outputs().len()
            )));
        }
        Ok(Self {
            session,
            confidence_threshold,
        })
    }

    /// Detect faces, sorted by descending confidence.
    pub fn locate(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let (w, h) = (width as usize, height as usize);
        let resized = Gray {
            data: preprocess::resize_bilinear(gray, w, h, LOCATOR_INPUT_W, LOCATOR_INPUT_H),
            width: LOCATOR_INPUT_W,
            height: LOCATOR_INPUT_H,
        };
        let input = preprocess::to_nchw(&resized, LOCATOR_MEAN, LOCATOR_STD);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode_boxes(
            scores,
            boxes,
            width as f32,
            height as f32,
            self.confidence_threshold,
        );
        Ok(nms(candidates, LOCATOR_NMS_THRESHOLD))
    }
}

/// Face crop → descriptor network.
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        Ok(Self {
            session: load_session(model_path, "face encoder")?,
        })
    }

    /// Encode the face inside `face` (frame pixels), padded by a margin.
    pub fn encode(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Option<Vec<f32>>, DetectorError> {
        let mx = face.width * CROP_MARGIN;
        let my = face.height * CROP_MARGIN;
        let Some(crop) = preprocess::crop(
            gray,
            width as usize,
            height as usize,
            face.x - mx,
            face.y - my,
            face.width + 2.0 * mx,
            face.height + 2.0 * my,
        ) else {
            tracing::debug!(?face, "face box outside frame");
            return Ok(None);
        };

        let aligned = Gray {
            data: preprocess::resize_bilinear(
                &crop.data,
                crop.width,
                crop.height,
                ENCODER_INPUT_SIZE,
                ENCODER_INPUT_SIZE,
            ),
            width: ENCODER_INPUT_SIZE,
            height: ENCODER_INPUT_SIZE,
        };
        let input = preprocess::to_nchw(&aligned, ENCODER_MEAN, ENCODER_STD);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("descriptor: {e}")))?;

        Ok(Some(raw.to_vec()))
    }
}

/// Locator + encoder: the descriptor capability used by the trigger loop.
pub struct OnnxFaceDescriber {
    locator: FaceLocator,
    encoder: FaceEncoder,
}

impl OnnxFaceDescriber {
    pub fn new(locator: FaceLocator, encoder: FaceEncoder) -> Self {
        Self { locator, encoder }
    }
}

impl FaceDescriber for OnnxFaceDescriber {
    fn describe_face(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<Vec<f32>>, DetectorError> {
        check_frame(gray, width, height)?;
        let faces = self.locator.locate(gray, width, height)?;
        let Some(best) = faces.first() else {
            return Ok(None);
        };
        tracing::debug!(
            confidence = best.confidence,
            faces = faces.len(),
            "face located"
        );
        self.encoder.encode(gray, width, height, best)
    }
}

fn load_session(model_path: &str, what: &str) -> Result<Session, DetectorError> {
    if !Path::new(model_path).exists() {
        return Err(DetectorError::ModelNotFound(model_path.to_string()));
    }
    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(model_path)?;
    tracing::info!(
        path = model_path,
        outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
        "loaded {what} model"
    );
    Ok(session)
}

/// Turn `scores[N,2]` / `boxes[N,4]` into frame-pixel boxes above `threshold`.
fn decode_boxes(
    scores: &[f32],
    boxes: &[f32],
    frame_w: f32,
    frame_h: f32,
    threshold: f32,
) -> Vec<BoundingBox> {
    let n = (scores.len() / 2).min(boxes.len() / 4);
    (0..n)
        .filter_map(|i| {
            let confidence = scores[i * 2 + 1];
            if confidence <= threshold {
                return None;
            }
            let x1 = boxes[i * 4].clamp(0.0, 1.0) * frame_w;
            let y1 = boxes[i * 4 + 1].clamp(0.0, 1.0) * frame_h;
            let x2 = boxes[i * 4 + 2].clamp(0.0, 1.0) * frame_w;
            let y2 = boxes[i * 4 + 3].clamp(0.0, 1.0) * frame_h;
            if x2 <= x1 || y2 <= y1 {
                return None;
            }
            Some(BoundingBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence,
            })
        })
        .collect()
}

/// Non-maximum suppression; output is sorted by descending confidence.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<BoundingBox> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
