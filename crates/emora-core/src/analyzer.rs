//! Emotion / age / gender analysis via ONNX Runtime.
//!
//! Three pretrained heads run on a cropped face region: a 7-way emotion
//! classifier on a 48×48 grayscale crop, and 101-way age and 2-way gender
//! heads on a 224×224 RGB crop.

use crate::imaging;
use crate::types::{Emotion, FaceBox, FaceReading};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const EMOTION_INPUT_SIZE: usize = 48;
const ATTRIBUTE_INPUT_SIZE: usize = 224;
const AGE_CLASSES: usize = 101;

/// Output order of the emotion head.
const EMOTION_OUTPUTS: [Emotion; 7] = [
    Emotion::Angry,
    Emotion::Disgust,
    Emotion::Fear,
    Emotion::Happy,
    Emotion::Sad,
    Emotion::Surprise,
    Emotion::Neutral,
];

/// Output order of the gender head.
const GENDER_OUTPUTS: [&str; 2] = ["Woman", "Man"];

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("model file not found: {0} — place the attribute models in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Classification of one face region.
///
/// Seam for the capture pipeline; tests substitute a stub.
pub trait FaceAnalyze {
    /// Classify the face region of an RGB24 frame.
    fn analyze(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<FaceReading, AnalyzerError>;
}

pub struct FaceAnalyzer {
    emotion: Session,
    age: Session,
    gender: Session,
}

impl FaceAnalyzer {
    /// Load the three attribute models from the model directory
    /// (`emotion.onnx`, `age.onnx`, `gender.onnx`).
    pub fn load(model_dir: &Path) -> Result<Self, AnalyzerError> {
        let emotion = load_session(model_dir, "emotion.onnx")?;
        let age = load_session(model_dir, "age.onnx")?;
        let gender = load_session(model_dir, "gender.onnx")?;

        Ok(Self {
            emotion,
            age,
            gender,
        })
    }
}

fn load_session(model_dir: &Path, file: &str) -> Result<Session, AnalyzerError> {
    let path = model_dir.join(file);
    if !path.exists() {
        return Err(AnalyzerError::ModelNotFound(path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(&path)?;

    tracing::info!(path = %path.display(), "loaded attribute model");
    Ok(session)
}

impl FaceAnalyze for FaceAnalyzer {
    fn analyze(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<FaceReading, AnalyzerError> {
        let expected = (width * height) as usize * 3;
        if rgb.len() < expected {
            return Err(AnalyzerError::InferenceFailed(format!(
                "frame buffer too short: expected {expected}, got {}",
                rgb.len()
            )));
        }

        let crop = imaging::crop_rgb(rgb, width, face);
        let (fw, fh) = (face.w as usize, face.h as usize);

        // Emotion: 48×48 grayscale.
        let gray = imaging::rgb_to_gray(&crop);
        let gray48 = imaging::resize_gray(&gray, fw, fh, EMOTION_INPUT_SIZE, EMOTION_INPUT_SIZE);
        let emotion_scores = run_head(&mut self.emotion, preprocess_gray(&gray48), "emotion")?;
        if emotion_scores.len() != EMOTION_OUTPUTS.len() {
            return Err(AnalyzerError::InferenceFailed(format!(
                "emotion head returned {} scores, expected {}",
                emotion_scores.len(),
                EMOTION_OUTPUTS.len()
            )));
        }
        let emotion = EMOTION_OUTPUTS[argmax(&emotion_scores)];

        // Age and gender: 224×224 RGB.
        let rgb224 = imaging::resize_rgb(&crop, fw, fh, ATTRIBUTE_INPUT_SIZE, ATTRIBUTE_INPUT_SIZE);
        let attr_input = preprocess_rgb(&rgb224);

        let age_scores = run_head(&mut self.age, attr_input.clone(), "age")?;
        if age_scores.len() != AGE_CLASSES {
            return Err(AnalyzerError::InferenceFailed(format!(
                "age head returned {} scores, expected {AGE_CLASSES}",
                age_scores.len()
            )));
        }
        let age = expected_age(&age_scores);

        let gender_scores = run_head(&mut self.gender, attr_input, "gender")?;
        if gender_scores.len() != GENDER_OUTPUTS.len() {
            return Err(AnalyzerError::InferenceFailed(format!(
                "gender head returned {} scores, expected {}",
                gender_scores.len(),
                GENDER_OUTPUTS.len()
            )));
        }
        let gender = GENDER_OUTPUTS[argmax(&gender_scores)].to_string();

        tracing::debug!(%emotion, age, gender, "face analyzed");

        Ok(FaceReading {
            face: *face,
            emotion,
            age,
            gender,
        })
    }
}

fn run_head(session: &mut Session, input: Array4<f32>, label: &str) -> Result<Vec<f32>, AnalyzerError> {
    let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
    let (_, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| AnalyzerError::InferenceFailed(format!("{label} head: {e}")))?;
    Ok(data.to_vec())
}

/// 48×48 grayscale crop → NCHW float tensor in [0, 1].
fn preprocess_gray(gray: &[u8]) -> Array4<f32> {
    let size = EMOTION_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 1, size, size));
    for y in 0..size {
        for x in 0..size {
            let pixel = gray.get(y * size + x).copied().unwrap_or(0) as f32;
            tensor[[0, 0, y, x]] = pixel / 255.0;
        }
    }
    tensor
}

/// 224×224 RGB crop → NCHW float tensor in [0, 1].
fn preprocess_rgb(rgb: &[u8]) -> Array4<f32> {
    let size = ATTRIBUTE_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            for c in 0..3 {
                let pixel = rgb.get((y * size + x) * 3 + c).copied().unwrap_or(0) as f32;
                tensor[[0, c, y, x]] = pixel / 255.0;
            }
        }
    }
    tensor
}

fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

/// The age head emits a 101-way distribution over years 0..=100; the
/// estimate is its expectation, normalized so unscaled logits still give
/// a finite value.
fn expected_age(scores: &[f32]) -> f32 {
    let total: f32 = scores.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    scores
        .iter()
        .enumerate()
        .map(|(i, &p)| i as f32 * p)
        .sum::<f32>()
        / total
}
