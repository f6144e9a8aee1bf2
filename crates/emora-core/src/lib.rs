//! emora-core — Face detection and attribute analysis engine.
//!
//! Face detection runs through interchangeable backends (an anchor-free
//! ONNX detector via ONNX Runtime and a SeetaFace cascade via rustface);
//! emotion, age and gender come from pretrained ONNX heads. Annotation
//! draws the review overlay on a captured frame.

pub mod annotate;
pub mod analyzer;
pub mod cascade;
pub mod detector;
pub mod imaging;
pub mod neural;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyze, FaceAnalyzer};
pub use annotate::Annotator;
pub use cascade::CascadeDetector;
pub use detector::{DetectorError, DetectorRig, FaceDetect, Precedence};
pub use neural::NeuralDetector;
pub use types::{Emotion, FaceBox, FaceReading};
