use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bounding box for a detected face, in pixel units.
///
/// Always within frame bounds with `w > 0` and `h > 0`; use
/// [`FaceBox::new`] to construct one — it clamps to the frame and rejects
/// degenerate boxes, so no downstream consumer has to re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub confidence: f32,
}

impl FaceBox {
    /// Build a validated box from raw detector output.
    ///
    /// Coordinates are clamped to the frame; returns `None` when nothing
    /// of the box survives inside it (or the frame itself is degenerate).
    pub fn new(
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        frame_w: u32,
        frame_h: u32,
        confidence: f32,
    ) -> Option<Self> {
        if frame_w == 0 || frame_h == 0 || w <= 0 || h <= 0 {
            return None;
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(frame_w as i64);
        let y1 = (y + h).min(frame_h as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            w: (x1 - x0) as u32,
            h: (y1 - y0) as u32,
            confidence,
        })
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }
}

/// The closed emotion label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Sad,
        Emotion::Surprise,
    ];

    /// Stable lowercase label, identical to the stored database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown emotion label: {0}")]
pub struct ParseEmotionError(String);

impl FromStr for Emotion {
    type Err = ParseEmotionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ParseEmotionError(s.to_string()))
    }
}

/// One classified face: where it is and what the models said about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceReading {
    pub face: FaceBox,
    pub emotion: Emotion,
    /// Estimated age in years.
    pub age: f32,
    /// Dominant gender label as the model reports it (e.g. "Woman", "Man").
    pub gender: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facebox_inside_frame() {
        let b = FaceBox::new(10, 20, 30, 40, 640, 480, 0.9).unwrap();
        assert_eq!((b.x, b.y, b.w, b.h), (10, 20, 30, 40));
    }

    #[test]
    fn test_facebox_clamps_negative_origin() {
        let b = FaceBox::new(-10, -5, 50, 50, 640, 480, 0.9).unwrap();
        assert_eq!((b.x, b.y), (0, 0));
        assert_eq!((b.w, b.h), (40, 45));
    }

    #[test]
    fn test_facebox_clamps_overflow() {
        let b = FaceBox::new(600, 440, 100, 100, 640, 480, 0.9).unwrap();
        assert_eq!((b.right(), b.bottom()), (640, 480));
    }

    #[test]
    fn test_facebox_rejects_degenerate() {
        assert!(FaceBox::new(10, 10, 0, 20, 640, 480, 0.9).is_none());
        assert!(FaceBox::new(10, 10, 20, 0, 640, 480, 0.9).is_none());
        assert!(FaceBox::new(10, 10, -5, 20, 640, 480, 0.9).is_none());
    }

    #[test]
    fn test_facebox_rejects_fully_outside() {
        assert!(FaceBox::new(700, 10, 20, 20, 640, 480, 0.9).is_none());
        assert!(FaceBox::new(-50, 10, 30, 20, 640, 480, 0.9).is_none());
    }

    #[test]
    fn test_facebox_rejects_degenerate_frame() {
        assert!(FaceBox::new(0, 0, 10, 10, 0, 480, 0.9).is_none());
    }

    #[test]
    fn test_emotion_label_roundtrip() {
        for e in Emotion::ALL {
            assert_eq!(e.as_str().parse::<Emotion>().unwrap(), e);
        }
    }

    #[test]
    fn test_emotion_unknown_label() {
        assert!("bored".parse::<Emotion>().is_err());
    }
}
