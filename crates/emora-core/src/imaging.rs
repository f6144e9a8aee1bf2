//! Shared pixel helpers — bilinear resize and face-region cropping.
//!
//! Both the neural detector and the attribute analyzer resize 8-bit
//! buffers into fixed model input sizes; the interpolation lives here
//! once instead of in each model wrapper.

use crate::types::FaceBox;

/// Bilinear resize of a single-channel 8-bit image.
pub fn resize_gray(src: &[u8], sw: usize, sh: usize, dw: usize, dh: usize) -> Vec<u8> {
    resize_channels::<1>(src, sw, sh, dw, dh)
}

/// Bilinear resize of packed RGB24.
pub fn resize_rgb(src: &[u8], sw: usize, sh: usize, dw: usize, dh: usize) -> Vec<u8> {
    resize_channels::<3>(src, sw, sh, dw, dh)
}

fn resize_channels<const C: usize>(
    src: &[u8],
    sw: usize,
    sh: usize,
    dw: usize,
    dh: usize,
) -> Vec<u8> {
    if sw == 0 || sh == 0 || dw == 0 || dh == 0 || src.len() < sw * sh * C {
        return vec![0; dw * dh * C];
    }

    let x_ratio = sw as f32 / dw as f32;
    let y_ratio = sh as f32 / dh as f32;

    let mut out = vec![0u8; dw * dh * C];
    for y in 0..dh {
        let src_y = (y as f32 + 0.5) * y_ratio - 0.5;
        let y0 = (src_y.floor() as i64).clamp(0, sh as i64 - 1) as usize;
        let y1 = (y0 + 1).min(sh - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..dw {
            let src_x = (x as f32 + 0.5) * x_ratio - 0.5;
            let x0 = (src_x.floor() as i64).clamp(0, sw as i64 - 1) as usize;
            let x1 = (x0 + 1).min(sw - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for c in 0..C {
                let tl = src[(y0 * sw + x0) * C + c] as f32;
                let tr = src[(y0 * sw + x1) * C + c] as f32;
                let bl = src[(y1 * sw + x0) * C + c] as f32;
                let br = src[(y1 * sw + x1) * C + c] as f32;

                let top = tl * (1.0 - fx) + tr * fx;
                let bot = bl * (1.0 - fx) + br * fx;
                let val = top * (1.0 - fy) + bot * fy;

                out[(y * dw + x) * C + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    out
}

/// Crop a validated face box out of a packed RGB24 frame.
///
/// The box is trusted to be in bounds (see [`FaceBox::new`]); rows are
/// copied verbatim.
pub fn crop_rgb(src: &[u8], width: u32, face: &FaceBox) -> Vec<u8> {
    let w = width as usize;
    let (fx, fy) = (face.x as usize, face.y as usize);
    let (fw, fh) = (face.w as usize, face.h as usize);

    let mut out = Vec::with_capacity(fw * fh * 3);
    for row in fy..fy + fh {
        let start = (row * w + fx) * 3;
        out.extend_from_slice(&src[start..start + fw * 3]);
    }
    out
}

/// Luma conversion for a packed RGB24 buffer (integer BT.601 weights).
pub fn rgb_to_gray(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| {
            let r = px[0] as u32;
            let g = px[1] as u32;
            let b = px[2] as u32;
            ((77 * r + 150 * g + 29 * b) >> 8) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let src = vec![128u8; 100 * 100];
        let out = resize_gray(&src, 100, 100, 200, 200);
        assert_eq!(out.len(), 200 * 200);
        assert!(out.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_resize_identity_size() {
        let src: Vec<u8> = (0..16).collect();
        let out = resize_gray(&src, 4, 4, 4, 4);
        assert_eq!(out, src);
    }

    #[test]
    fn test_resize_rgb_preserves_channels() {
        // Pure red source stays pure red after resize.
        let mut src = Vec::new();
        for _ in 0..8 * 8 {
            src.extend_from_slice(&[200, 0, 0]);
        }
        let out = resize_rgb(&src, 8, 8, 4, 4);
        for px in out.chunks_exact(3) {
            assert_eq!(px, &[200, 0, 0]);
        }
    }

    #[test]
    fn test_resize_degenerate_input() {
        let out = resize_gray(&[], 0, 0, 10, 10);
        assert_eq!(out.len(), 100);
        assert!(out.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_crop_rgb_region() {
        // 4x4 frame with a distinctive 2x2 region at (1,1).
        let mut src = vec![0u8; 4 * 4 * 3];
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            let idx = (y * 4 + x) * 3;
            src[idx] = 9;
        }
        let face = FaceBox::new(1, 1, 2, 2, 4, 4, 1.0).unwrap();
        let crop = crop_rgb(&src, 4, &face);
        assert_eq!(crop.len(), 2 * 2 * 3);
        for px in crop.chunks_exact(3) {
            assert_eq!(px[0], 9);
        }
    }

    #[test]
    fn test_rgb_to_gray_length() {
        let gray = rgb_to_gray(&[255, 255, 255, 0, 0, 0]);
        assert_eq!(gray.len(), 2);
        assert!(gray[0] >= 254);
        assert_eq!(gray[1], 0);
    }
}
