//! Capture overlay — bounding boxes, attribute labels, emoji, message.
//!
//! Font and emoji sprites are runtime assets. Missing assets degrade the
//! overlay (element skipped, warning logged once at load); annotation
//! itself never fails a capture.

use crate::types::{Emotion, FaceReading};
use ab_glyph::{FontVec, PxScale};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::Path;

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const MESSAGE_COLOR: Rgba<u8> = Rgba([255, 230, 120, 255]);
const LABEL_SCALE: f32 = 16.0;
const EMOJI_SIZE: u32 = 50;
const LINE_STEP: i32 = 18;

/// Supportive one-liners shown next to a face, keyed by its emotion.
const MESSAGES: [(Emotion, &[&str]); 7] = [
    (
        Emotion::Sad,
        &[
            "It's okay to feel sad sometimes. Brighter days are ahead.",
            "Take a deep breath. You're stronger than you think.",
            "Even the darkest clouds have a silver lining.",
        ],
    ),
    (
        Emotion::Angry,
        &[
            "Take a moment to breathe deeply. You've got this.",
            "Anger is natural. Channel it into something positive.",
            "Try to find a calm moment to reflect.",
        ],
    ),
    (
        Emotion::Surprise,
        &[
            "That was unexpected! Embrace the surprise!",
            "Surprises can be exciting. Enjoy the moment!",
            "Life is full of surprises. Stay curious!",
        ],
    ),
    (
        Emotion::Fear,
        &[
            "It's okay to feel scared. You're not alone.",
            "Face your fears one step at a time.",
            "Courage is not the absence of fear.",
        ],
    ),
    (
        Emotion::Happy,
        &[
            "Your smile is contagious! Keep spreading the joy!",
            "Happiness looks great on you. Keep shining!",
            "You're glowing with positivity!",
        ],
    ),
    (
        Emotion::Disgust,
        &[
            "It's natural to feel disgust. Take a moment to breathe.",
            "Find a way to calm your mind.",
            "You have the strength to move past unpleasant feelings.",
        ],
    ),
    (
        Emotion::Neutral,
        &[
            "Feeling neutral is perfectly fine. Enjoy the calm.",
            "A neutral state of mind can be very peaceful.",
            "Balance and calmness are key. Stay centered.",
        ],
    ),
];

pub struct Annotator {
    font: Option<FontVec>,
    emoji: HashMap<Emotion, RgbaImage>,
}

impl Annotator {
    /// Load overlay assets from the asset directory: a `DejaVuSans.ttf`
    /// label font and `emojis/<emotion>.png` sprites.
    pub fn load(assets_dir: &Path) -> Self {
        let font_path = assets_dir.join("DejaVuSans.ttf");
        let font = match std::fs::read(&font_path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!(path = %font_path.display(), error = %e, "label font unusable, skipping text labels");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %font_path.display(), error = %e, "label font missing, skipping text labels");
                None
            }
        };

        let mut emoji = HashMap::new();
        for emotion in Emotion::ALL {
            let path = assets_dir.join("emojis").join(format!("{emotion}.png"));
            match image::open(&path) {
                Ok(img) => {
                    let sprite =
                        image::imageops::resize(&img.to_rgba8(), EMOJI_SIZE, EMOJI_SIZE, FilterType::Triangle);
                    emoji.insert(emotion, sprite);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "emoji sprite missing, skipping");
                }
            }
        }

        tracing::info!(
            font = font.is_some(),
            emoji = emoji.len(),
            "annotator assets loaded"
        );

        Self { font, emoji }
    }

    /// Draw the review overlay for every classified face onto a copy of
    /// the captured RGB24 frame.
    pub fn annotate(&self, rgb: &[u8], width: u32, height: u32, readings: &[FaceReading]) -> RgbImage {
        let mut canvas = rgb_to_canvas(rgb, width, height);
        let mut rng = rand::thread_rng();

        for reading in readings {
            let face = &reading.face;

            // Two nested hollow rects give the 2 px box of the original overlay.
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(face.x as i32, face.y as i32).of_size(face.w, face.h),
                BOX_COLOR,
            );
            if face.w > 2 && face.h > 2 {
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(face.x as i32 + 1, face.y as i32 + 1).of_size(face.w - 2, face.h - 2),
                    BOX_COLOR,
                );
            }

            if let Some(font) = &self.font {
                let x = face.x as i32;
                let mut y = face.bottom() as i32 + 4;
                for line in [
                    format!("Age: {:.0}", reading.age),
                    format!("Emotion: {}", reading.emotion),
                    format!("Gender: {}", reading.gender),
                ] {
                    draw_text_mut(
                        &mut canvas,
                        LABEL_COLOR,
                        x,
                        y,
                        PxScale::from(LABEL_SCALE),
                        font,
                        &line,
                    );
                    y += LINE_STEP;
                }

                if let Some(message) = pick_message(reading.emotion, &mut rng) {
                    draw_text_mut(
                        &mut canvas,
                        MESSAGE_COLOR,
                        x,
                        y,
                        PxScale::from(LABEL_SCALE),
                        font,
                        message,
                    );
                }
            }

            if let Some(sprite) = self.emoji.get(&reading.emotion) {
                let ex = face.x as i64;
                let ey = face.y as i64 - (EMOJI_SIZE as i64 + 6);
                image::imageops::overlay(&mut canvas, sprite, ex, ey.max(0));
            }
        }

        image::DynamicImage::ImageRgba8(canvas).to_rgb8()
    }
}

fn rgb_to_canvas(rgb: &[u8], width: u32, height: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(width, height);
    for (i, px) in canvas.pixels_mut().enumerate() {
        let idx = i * 3;
        if idx + 2 < rgb.len() {
            *px = Rgba([rgb[idx], rgb[idx + 1], rgb[idx + 2], 255]);
        }
    }
    canvas
}

fn pick_message(emotion: Emotion, rng: &mut impl rand::Rng) -> Option<&'static str> {
    MESSAGES
        .iter()
        .find(|(e, _)| *e == emotion)
        .and_then(|(_, lines)| lines.choose(rng).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceBox;

    fn reading(x: i64, y: i64, w: i64, h: i64) -> FaceReading {
        FaceReading {
            face: FaceBox::new(x, y, w, h, 64, 64, 0.9).unwrap(),
            emotion: Emotion::Happy,
            age: 31.0,
            gender: "Woman".to_string(),
        }
    }

    fn bare_annotator() -> Annotator {
        Annotator {
            font: None,
            emoji: HashMap::new(),
        }
    }

    #[test]
    fn test_load_missing_assets_degrades() {
        let annotator = Annotator::load(Path::new("/nonexistent/assets"));
        assert!(annotator.font.is_none());
        assert!(annotator.emoji.is_empty());
    }

    #[test]
    fn test_annotate_preserves_dimensions() {
        let rgb = vec![0u8; 64 * 64 * 3];
        let out = bare_annotator().annotate(&rgb, 64, 64, &[reading(10, 10, 20, 20)]);
        assert_eq!((out.width(), out.height()), (64, 64));
    }

    #[test]
    fn test_annotate_draws_box() {
        let rgb = vec![0u8; 64 * 64 * 3];
        let out = bare_annotator().annotate(&rgb, 64, 64, &[reading(10, 10, 20, 20)]);
        // Top-left corner of the box must be the box color.
        let px = out.get_pixel(10, 10);
        assert_eq!(px.0, [0, 255, 0]);
        // A pixel well inside the box stays untouched.
        let inner = out.get_pixel(20, 20);
        assert_eq!(inner.0, [0, 0, 0]);
    }

    #[test]
    fn test_annotate_no_faces_is_plain_copy() {
        let rgb = vec![7u8; 16 * 16 * 3];
        let out = bare_annotator().annotate(&rgb, 16, 16, &[]);
        assert!(out.pixels().all(|p| p.0 == [7, 7, 7]));
    }

    #[test]
    fn test_annotate_face_at_edge_does_not_panic() {
        let rgb = vec![0u8; 64 * 64 * 3];
        // Box flush with the bottom-right corner: labels fall off-canvas.
        let out = bare_annotator().annotate(&rgb, 64, 64, &[reading(44, 44, 20, 20)]);
        assert_eq!((out.width(), out.height()), (64, 64));
    }

    #[test]
    fn test_pick_message_matches_emotion_table() {
        let mut rng = rand::thread_rng();
        for emotion in Emotion::ALL {
            let msg = pick_message(emotion, &mut rng).unwrap();
            let table = MESSAGES.iter().find(|(e, _)| *e == emotion).unwrap().1;
            assert!(table.contains(&msg));
        }
    }
}
