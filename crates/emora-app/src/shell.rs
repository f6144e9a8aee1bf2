//! The desktop shell — a minifb window showing the preview or the frozen
//! annotated capture, driven entirely by keyboard.
//!
//! Keys: Space captures, Enter accepts, D discards, R retakes/resumes,
//! T prints the trend report, Q or Escape quits.

use crate::session::Session;
use crate::trends;
use anyhow::{Context, Result};
use chrono::Local;
use image::RgbImage;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

const WINDOW_TITLE: &str = "Emora — Space: capture  Enter: accept  D: discard  R: retake  T: trends";

/// Run the shell until the window closes or the user quits.
///
/// One preview frame is pulled per tick while live; a tick that runs long
/// simply delays the next one. Detection and classification happen only
/// inside `capture()`, on the Space key, and block the loop for their
/// duration.
pub fn run(session: &mut Session) -> Result<()> {
    let width = session.frame_width as usize;
    let height = session.frame_height as usize;

    let mut window = Window::new(WINDOW_TITLE, width, height, WindowOptions::default())
        .context("creating preview window")?;
    let fps = (1000 / session.tick.as_millis().max(1)) as usize;
    window.set_target_fps(fps);

    let mut buffer = vec![0u32; width * height];

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if window.is_key_pressed(Key::Q, KeyRepeat::No) {
            break;
        }
        if window.is_key_pressed(Key::Space, KeyRepeat::No) {
            session.controller.capture();
            if !session.controller.is_live() {
                println!(
                    "Captured {} face(s). Enter accepts, D discards, R retakes.",
                    session.controller.pending_faces()
                );
            }
        }
        if window.is_key_pressed(Key::Enter, KeyRepeat::No) {
            let written = session.controller.accept(&mut session.store);
            println!("Recorded {written} detection(s).");
        }
        if window.is_key_pressed(Key::D, KeyRepeat::No) {
            session.controller.discard();
            println!("Capture discarded.");
        }
        if window.is_key_pressed(Key::R, KeyRepeat::No) {
            session.controller.retake();
            println!("Resuming live feed...");
        }
        if window.is_key_pressed(Key::T, KeyRepeat::No) {
            match trends::trend_report(&session.store, Local::now().naive_local()) {
                Ok(report) => println!("{report}"),
                Err(e) => tracing::error!(error = %e, "trend report failed"),
            }
        }

        if session.controller.is_live() {
            if let Some(frame) = session.controller.live_frame() {
                pack_rgb(&frame.data, &mut buffer);
            }
        } else if let Some(annotated) = session.controller.annotated() {
            pack_image(annotated, &mut buffer);
        }

        window
            .update_with_buffer(&buffer, width, height)
            .context("updating preview window")?;
    }

    Ok(())
}

/// Pack RGB24 bytes into the 0RGB u32 layout minifb expects.
fn pack_rgb(rgb: &[u8], buffer: &mut [u32]) {
    for (dst, px) in buffer.iter_mut().zip(rgb.chunks_exact(3)) {
        *dst = ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32;
    }
}

fn pack_image(image: &RgbImage, buffer: &mut [u32]) {
    pack_rgb(image.as_raw(), buffer);
}
