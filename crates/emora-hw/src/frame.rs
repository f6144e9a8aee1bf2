//! Frame type and pixel conversions — YUYV to RGB, RGB to luma.

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB24 pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    /// Average luma brightness (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        let gray = self.grayscale();
        if gray.is_empty() {
            return 0.0;
        }
        gray.iter().map(|&b| b as f32).sum::<f32>() / gray.len() as f32
    }

    /// Convert to 8-bit grayscale using integer BT.601 luma weights.
    pub fn grayscale(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|px| {
                let r = px[0] as u32;
                let g = px[1] as u32;
                let b = px[2] as u32;
                ((77 * r + 150 * g + 29 * b) >> 8) as u8
            })
            .collect()
    }
}

/// Convert packed YUYV (4:2:2) to RGB24 using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]. Both pixels of a
/// pair share the U and V samples.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as i32 - 128;
        let v = quad[3] as i32 - 128;
        for &y in &[quad[0], quad[2]] {
            let c = y as i32 - 16;
            let r = (298 * c + 409 * v + 128) >> 8;
            let g = (298 * c - 100 * u - 208 * v + 128) >> 8;
            let b = (298 * c + 516 * u + 128) >> 8;
            rgb.push(r.clamp(0, 255) as u8);
            rgb.push(g.clamp(0, 255) as u8);
            rgb.push(b.clamp(0, 255) as u8);
        }
    }

    Ok(rgb)
}

/// Expand an 8-bit grayscale buffer to RGB24 by channel replication.
pub fn gray_to_rgb(gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width * height) as usize;
    if gray.len() < pixels {
        return Err(FrameError::InvalidLength {
            expected: pixels,
            actual: gray.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for &y in &gray[..pixels] {
        rgb.push(y);
        rgb.push(y);
        rgb.push(y);
    }
    Ok(rgb)
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from_rgb(data: Vec<u8>, width: u32, height: u32) -> Frame {
        Frame {
            data,
            width,
            height,
            sequence: 0,
        }
    }

    #[test]
    fn test_yuyv_achromatic_maps_to_gray() {
        // U = V = 128 means zero chroma: R, G and B must come out equal.
        let yuyv = vec![120, 128, 180, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6);
        assert_eq!(rgb[0], rgb[1]);
        assert_eq!(rgb[1], rgb[2]);
        assert_eq!(rgb[3], rgb[4]);
        assert_eq!(rgb[4], rgb[5]);
        // The brighter Y sample must stay brighter.
        assert!(rgb[3] > rgb[0]);
    }

    #[test]
    fn test_yuyv_black_and_white_extremes() {
        // Y=16 is video black, Y=235 is video white.
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_gray_to_rgb_replicates() {
        let rgb = gray_to_rgb(&[0, 128, 255], 3, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 128, 128, 128, 255, 255, 255]);
    }

    #[test]
    fn test_gray_to_rgb_too_short() {
        assert!(gray_to_rgb(&[1, 2], 3, 1).is_err());
    }

    #[test]
    fn test_grayscale_of_gray_pixels_is_identity_ish() {
        // r = g = b means luma equals the shared value (within rounding).
        let frame = frame_from_rgb(vec![200, 200, 200, 10, 10, 10], 2, 1);
        let gray = frame.grayscale();
        assert_eq!(gray.len(), 2);
        assert!((gray[0] as i32 - 200).abs() <= 1);
        assert!((gray[1] as i32 - 10).abs() <= 1);
    }

    #[test]
    fn test_grayscale_weights_green_highest() {
        let red = frame_from_rgb(vec![255, 0, 0], 1, 1).grayscale()[0];
        let green = frame_from_rgb(vec![0, 255, 0], 1, 1).grayscale()[0];
        let blue = frame_from_rgb(vec![0, 0, 255], 1, 1).grayscale()[0];
        assert!(green > red);
        assert!(red > blue);
    }

    #[test]
    fn test_avg_brightness_uniform() {
        let frame = frame_from_rgb(vec![128; 4 * 3], 2, 2);
        let avg = frame.avg_brightness();
        assert!((avg - 127.0).abs() < 2.0, "avg = {avg}");
    }

    #[test]
    fn test_avg_brightness_empty() {
        let frame = frame_from_rgb(Vec::new(), 0, 0);
        assert_eq!(frame.avg_brightness(), 0.0);
    }
}
