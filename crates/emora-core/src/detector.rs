//! Detector backend trait and dual-backend selection.

use crate::types::FaceBox;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — place the detector model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A face detection backend.
///
/// Backends take an 8-bit grayscale frame and return validated boxes;
/// a backend never emits a degenerate or out-of-bounds box.
pub trait FaceDetect {
    /// Backend identifier used in logs.
    fn name(&self) -> &'static str;

    /// Detect faces, sorted by descending confidence.
    fn detect(&mut self, gray: &[u8], width: u32, height: u32)
        -> Result<Vec<FaceBox>, DetectorError>;
}

/// Which backend's results win when both are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    PreferNeural,
    PreferCascade,
}

/// Holds the configured backends and applies the comparison policy.
///
/// With both backends present every frame is run through both, the counts
/// are logged for comparison, and exactly one result set is chosen: the
/// preferred backend's when non-empty, the other's otherwise. A selection,
/// never a merge.
pub struct DetectorRig {
    neural: Option<Box<dyn FaceDetect>>,
    cascade: Option<Box<dyn FaceDetect>>,
    precedence: Precedence,
}

impl DetectorRig {
    pub fn new(
        neural: Option<Box<dyn FaceDetect>>,
        cascade: Option<Box<dyn FaceDetect>>,
        precedence: Precedence,
    ) -> Self {
        Self {
            neural,
            cascade,
            precedence,
        }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if let Some(b) = &self.neural {
            names.push(b.name());
        }
        if let Some(b) = &self.cascade {
            names.push(b.name());
        }
        names
    }

    /// Run detection on a grayscale frame.
    ///
    /// Backend failures are logged and treated as empty results; detection
    /// itself never fails a capture.
    pub fn detect(&mut self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBox> {
        match (self.neural.as_mut(), self.cascade.as_mut()) {
            (Some(neural), Some(cascade)) => {
                let neural_faces = run_backend(neural.as_mut(), gray, width, height);
                let cascade_faces = run_backend(cascade.as_mut(), gray, width, height);
                tracing::info!(
                    neural = neural_faces.len(),
                    cascade = cascade_faces.len(),
                    "detector comparison"
                );
                let (chosen, source) =
                    select_detections(neural_faces, cascade_faces, self.precedence);
                tracing::debug!(source, faces = chosen.len(), "detection selected");
                chosen
            }
            (Some(neural), None) => run_backend(neural.as_mut(), gray, width, height),
            (None, Some(cascade)) => run_backend(cascade.as_mut(), gray, width, height),
            (None, None) => {
                tracing::warn!("no detector backend configured");
                Vec::new()
            }
        }
    }
}

fn run_backend(
    backend: &mut dyn FaceDetect,
    gray: &[u8],
    width: u32,
    height: u32,
) -> Vec<FaceBox> {
    match backend.detect(gray, width, height) {
        Ok(faces) => faces,
        Err(e) => {
            tracing::warn!(backend = backend.name(), error = %e, "detection failed");
            Vec::new()
        }
    }
}

/// Pick one backend's result set under the configured precedence.
///
/// The preferred backend wins when its result is non-empty; otherwise the
/// other backend's result is used (which may also be empty).
pub fn select_detections(
    neural: Vec<FaceBox>,
    cascade: Vec<FaceBox>,
    precedence: Precedence,
) -> (Vec<FaceBox>, &'static str) {
    match precedence {
        Precedence::PreferNeural => {
            if neural.is_empty() {
                (cascade, "cascade")
            } else {
                (neural, "neural")
            }
        }
        Precedence::PreferCascade => {
            if cascade.is_empty() {
                (neural, "neural")
            } else {
                (cascade, "cascade")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector {
        label: &'static str,
        faces: Vec<FaceBox>,
        fail: bool,
        calls: usize,
    }

    impl FixedDetector {
        fn returning(label: &'static str, faces: Vec<FaceBox>) -> Self {
            Self {
                label,
                faces,
                fail: false,
                calls: 0,
            }
        }

        fn failing(label: &'static str) -> Self {
            Self {
                label,
                faces: Vec::new(),
                fail: true,
                calls: 0,
            }
        }
    }

    impl FaceDetect for FixedDetector {
        fn name(&self) -> &'static str {
            self.label
        }

        fn detect(
            &mut self,
            _gray: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<FaceBox>, DetectorError> {
            self.calls += 1;
            if self.fail {
                return Err(DetectorError::InferenceFailed("stub failure".into()));
            }
            Ok(self.faces.clone())
        }
    }

    fn face(x: i64) -> FaceBox {
        FaceBox::new(x, 10, 20, 20, 640, 480, 0.9).unwrap()
    }

    #[test]
    fn test_select_prefers_neural_when_nonempty() {
        let (chosen, source) =
            select_detections(vec![face(0)], vec![face(100)], Precedence::PreferNeural);
        assert_eq!(source, "neural");
        assert_eq!(chosen[0].x, 0);
    }

    #[test]
    fn test_select_falls_back_to_cascade() {
        let (chosen, source) =
            select_detections(Vec::new(), vec![face(100)], Precedence::PreferNeural);
        assert_eq!(source, "cascade");
        assert_eq!(chosen.len(), 1);
    }

    #[test]
    fn test_select_cascade_precedence() {
        let (chosen, source) =
            select_detections(vec![face(0)], vec![face(100)], Precedence::PreferCascade);
        assert_eq!(source, "cascade");
        assert_eq!(chosen[0].x, 100);
    }

    #[test]
    fn test_select_both_empty() {
        let (chosen, _) = select_detections(Vec::new(), Vec::new(), Precedence::PreferNeural);
        assert!(chosen.is_empty());
    }

    #[test]
    fn test_rig_runs_both_backends() {
        let mut rig = DetectorRig::new(
            Some(Box::new(FixedDetector::returning("n", vec![face(0)]))),
            Some(Box::new(FixedDetector::returning("c", vec![face(50)]))),
            Precedence::PreferNeural,
        );
        let faces = rig.detect(&[0u8; 4], 2, 2);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].x, 0);
    }

    #[test]
    fn test_rig_failed_preferred_backend_falls_back() {
        let mut rig = DetectorRig::new(
            Some(Box::new(FixedDetector::failing("n"))),
            Some(Box::new(FixedDetector::returning("c", vec![face(50)]))),
            Precedence::PreferNeural,
        );
        let faces = rig.detect(&[0u8; 4], 2, 2);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].x, 50);
    }

    #[test]
    fn test_rig_single_backend() {
        let mut rig = DetectorRig::new(
            None,
            Some(Box::new(FixedDetector::returning("c", vec![face(7)]))),
            Precedence::PreferNeural,
        );
        let faces = rig.detect(&[0u8; 4], 2, 2);
        assert_eq!(faces[0].x, 7);
    }

    #[test]
    fn test_rig_no_backends_is_empty() {
        let mut rig = DetectorRig::new(None, None, Precedence::PreferNeural);
        assert!(rig.detect(&[0u8; 4], 2, 2).is_empty());
    }
}
