//! Classical frontal-face detector via the SeetaFace engine (`rustface`).

use crate::detector::{DetectorError, FaceDetect};
use crate::types::FaceBox;
use rustface::ImageData;
use std::path::Path;

const MIN_FACE_SIZE: u32 = 30;
const SCORE_THRESHOLD: f64 = 2.0;
const PYRAMID_SCALE_FACTOR: f32 = 0.8;
const SLIDE_WINDOW_STEP: u32 = 4;

pub struct CascadeDetector {
    detector: Box<dyn rustface::Detector>,
}

impl CascadeDetector {
    /// Load the SeetaFace frontal-face model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let mut detector = rustface::create_detector(model_path)
            .map_err(|e| DetectorError::InferenceFailed(format!("failed to load cascade model: {e}")))?;

        detector.set_min_face_size(MIN_FACE_SIZE);
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_pyramid_scale_factor(PYRAMID_SCALE_FACTOR);
        detector.set_slide_window_step(SLIDE_WINDOW_STEP, SLIDE_WINDOW_STEP);

        tracing::info!(path = model_path, "loaded cascade face detector");

        Ok(Self { detector })
    }
}

impl FaceDetect for CascadeDetector {
    fn name(&self) -> &'static str {
        "cascade"
    }

    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let expected = (width * height) as usize;
        if gray.len() < expected {
            return Err(DetectorError::InferenceFailed(format!(
                "grayscale buffer too short: expected {expected}, got {}",
                gray.len()
            )));
        }

        let image = ImageData::new(&gray[..expected], width, height);
        let faces = self.detector.detect(&image);

        let mut boxes: Vec<FaceBox> = faces
            .iter()
            .filter_map(|f| {
                let b = f.bbox();
                FaceBox::new(
                    b.x() as i64,
                    b.y() as i64,
                    b.width() as i64,
                    b.height() as i64,
                    width,
                    height,
                    f.score() as f32,
                )
            })
            .collect();
        boxes.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(boxes)
    }
}
