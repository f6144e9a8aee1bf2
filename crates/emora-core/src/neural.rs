//! Anchor-free neural face detector via ONNX Runtime.
//!
//! Runs the bbox-only SCRFD-500M export (two output tensors per stride:
//! scores and box offsets) with letterbox preprocessing and NMS.

use crate::detector::{DetectorError, FaceDetect};
use crate::imaging;
use crate::types::FaceBox;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// Metadata for coordinate de-mapping after letterbox resize.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// A decoded detection in original-frame float coordinates, pre-NMS.
#[derive(Clone)]
struct RawDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputs = (usize, usize);

pub struct NeuralDetector {
    session: Session,
    /// Per-stride output indices [(score, bbox)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_outputs: [StrideOutputs; 3],
}

impl NeuralDetector {
    /// Load the detector ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded neural face detector"
        );

        if output_names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "detector model requires 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = discover_output_indices(&output_names);
        tracing::debug!(?stride_outputs, "detector output tensor mapping");

        Ok(Self {
            session,
            stride_outputs,
        })
    }

    /// Preprocess a grayscale frame into a letterboxed NCHW float tensor.
    fn preprocess(&self, gray: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
        let scale = (INPUT_SIZE as f32 / width as f32).min(INPUT_SIZE as f32 / height as f32);
        let new_w = (width as f32 * scale).round() as usize;
        let new_h = (height as f32 * scale).round() as usize;
        let pad_x = (INPUT_SIZE - new_w) as f32 / 2.0;
        let pad_y = (INPUT_SIZE - new_h) as f32 / 2.0;

        let resized = imaging::resize_gray(gray, width, height, new_w, new_h);

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;

        let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
        for y in 0..INPUT_SIZE {
            for x in 0..INPUT_SIZE {
                let pixel = if y >= pad_y_start
                    && y < pad_y_start + new_h
                    && x >= pad_x_start
                    && x < pad_x_start + new_w
                {
                    resized[(y - pad_y_start) * new_w + (x - pad_x_start)] as f32
                } else {
                    PIXEL_MEAN // pad value normalizes to 0.0
                };

                let normalized = (pixel - PIXEL_MEAN) / PIXEL_STD;
                // Grayscale replicated across the 3 input channels.
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        (tensor, Letterbox { scale, pad_x, pad_y })
    }
}

impl FaceDetect for NeuralDetector {
    fn name(&self) -> &'static str {
        "neural"
    }

    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let (input, letterbox) = self.preprocess(gray, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_outputs[stride_pos];

            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;

            decode_stride(
                scores,
                bboxes,
                stride,
                &letterbox,
                CONFIDENCE_THRESHOLD,
                &mut detections,
            );
        }

        let kept = nms(detections, NMS_THRESHOLD);

        // Clamp into the frame and drop anything degenerate.
        let mut faces: Vec<FaceBox> = kept
            .iter()
            .filter_map(|d| {
                FaceBox::new(
                    d.x1.round() as i64,
                    d.y1.round() as i64,
                    (d.x2 - d.x1).round() as i64,
                    (d.y2 - d.y1).round() as i64,
                    width,
                    height,
                    d.score,
                )
            })
            .collect();
        faces.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(faces)
    }
}

/// Discover output tensor ordering by name.
///
/// Exports may name tensors "score_8"/"bbox_8" etc., or use generic
/// numeric names. Falls back to the standard positional ordering:
/// [0-2] = scores (strides 8, 16, 32), [3-5] = bboxes.
fn discover_output_indices(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = STRIDES
        .iter()
        .all(|&stride| find("score", stride).is_some() && find("bbox", stride).is_some());

    if named {
        tracing::info!("detector: using name-based output tensor mapping");
        std::array::from_fn(|i| {
            let stride = STRIDES[i];
            (find("score", stride).unwrap(), find("bbox", stride).unwrap())
        })
    } else {
        tracing::info!(
            ?names,
            "detector: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode detections for a single stride level into `out`.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
    out: &mut Vec<RawDetection>,
) {
    let grid = INPUT_SIZE / stride;
    let num_anchors = grid * grid * ANCHORS_PER_CELL;

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * stride as f32;
        let anchor_cy = (cell / grid) as f32 * stride as f32;

        // Box offsets are [left, top, right, bottom] distances × stride.
        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        let x1 = anchor_cx - bboxes[off] * stride as f32;
        let y1 = anchor_cy - bboxes[off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[off + 3] * stride as f32;

        // Map from letterboxed space back to original frame space.
        out.push(RawDetection {
            x1: (x1 - letterbox.pad_x) / letterbox.scale,
            y1: (y1 - letterbox.pad_y) / letterbox.scale,
            x2: (x2 - letterbox.pad_x) / letterbox.scale,
            y2: (y2 - letterbox.pad_y) / letterbox.scale,
            score,
        });
    }
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection-over-Union between two raw detections.
fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> RawDetection {
        RawDetection { x1, y1, x2, y2, score }
    }

    #[test]
    fn test_iou_identical() {
        let a = raw(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = raw(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = raw(20.0, 20.0, 30.0, 30.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = raw(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = raw(5.0, 0.0, 15.0, 10.0, 1.0);
        // Overlap 50, union 150.
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let dets = vec![
            raw(0.0, 0.0, 100.0, 100.0, 0.9),
            raw(5.0, 5.0, 105.0, 105.0, 0.8),
            raw(200.0, 200.0, 250.0, 250.0, 0.7),
        ];
        let kept = nms(dets, 0.4);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.9).abs() < 1e-6);
        assert!((kept[1].score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(Vec::new(), 0.4).is_empty());
    }

    #[test]
    fn test_decode_stride_threshold_and_mapping() {
        // One anchor over threshold at cell (1, 0) of a tiny synthetic grid;
        // identity letterbox so frame coordinates come out unscaled.
        let grid = INPUT_SIZE / 32;
        let num = grid * grid * ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; num];
        let mut bboxes = vec![0.0f32; num * 4];

        let idx = ANCHORS_PER_CELL; // first anchor of cell (1, 0)
        scores[idx] = 0.9;
        bboxes[idx * 4] = 0.5; // left
        bboxes[idx * 4 + 1] = 0.5; // top
        bboxes[idx * 4 + 2] = 0.5; // right
        bboxes[idx * 4 + 3] = 0.5; // bottom

        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let mut out = Vec::new();
        decode_stride(&scores, &bboxes, 32, &lb, 0.5, &mut out);

        assert_eq!(out.len(), 1);
        let d = &out[0];
        // Anchor center at (32, 0); offsets of 0.5 × stride = 16 px.
        assert!((d.x1 - 16.0).abs() < 1e-3);
        assert!((d.y1 + 16.0).abs() < 1e-3);
        assert!((d.x2 - 48.0).abs() < 1e-3);
        assert!((d.y2 - 16.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_stride_all_below_threshold() {
        let grid = INPUT_SIZE / 32;
        let num = grid * grid * ANCHORS_PER_CELL;
        let scores = vec![0.1f32; num];
        let bboxes = vec![0.0f32; num * 4];
        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let mut out = Vec::new();
        decode_stride(&scores, &bboxes, 32, &lb, 0.5, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let width = 320.0f32;
        let height = 240.0f32;
        let scale = (640.0 / width).min(640.0 / height);
        let pad_x = (640.0 - (width * scale).round()) / 2.0;
        let pad_y = (640.0 - (height * scale).round()) / 2.0;
        let lb = Letterbox { scale, pad_x, pad_y };

        let orig = (100.0f32, 50.0f32);
        let boxed = (orig.0 * scale + pad_x, orig.1 * scale + pad_y);
        let back = ((boxed.0 - lb.pad_x) / lb.scale, (boxed.1 - lb.pad_y) / lb.scale);

        assert!((back.0 - orig.0).abs() < 0.1);
        assert!((back.1 - orig.1).abs() < 0.1);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = ["score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = ["bbox_8", "score_8", "bbox_16", "score_16", "bbox_32", "score_32"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(1, 0), (3, 2), (5, 4)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..6).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }
}
