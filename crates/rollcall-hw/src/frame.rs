//! Frame type and pixel conversion — YUYV decoding, dark detection.

/// A captured RGB24 camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Interleaved RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Average Rec. 601 luma (0.0–255.0).
    pub fn avg_luma(&self) -> f32 {
        let pixels = self.data.chunks_exact(3);
        let count = pixels.len();
        if count == 0 {
            return 0.0;
        }
        let sum: u32 = self.data.chunks_exact(3).map(|px| luma(px[0], px[1], px[2]) as u32).sum();
        sum as f32 / count as f32
    }
}

/// Rec. 601 luma approximation in integer arithmetic.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Convert packed YUYV (4:2:2) to interleaved RGB24 using BT.601 full-range
/// conversion.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; U and V are shared by
/// the pixel pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);

    for quad in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        push_yuv_pixel(&mut rgb, y0, u, v);
        push_yuv_pixel(&mut rgb, y1, u, v);
    }

    Ok(rgb)
}

fn push_yuv_pixel(rgb: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    // BT.601 limited-range coefficients
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    rgb.push(r.clamp(0, 255) as u8);
    rgb.push(g.clamp(0, 255) as u8);
    rgb.push(b.clamp(0, 255) as u8);
}

/// Check if an RGB frame is dark: true when more than `threshold_pct` of
/// pixels have luma below 32 (covered lens, unlit room).
pub fn is_dark_frame(rgb: &[u8], threshold_pct: f32) -> bool {
    let pixels = rgb.chunks_exact(3);
    let total = pixels.len();
    if total == 0 {
        return true;
    }

    let dark_count = rgb
        .chunks_exact(3)
        .filter(|px| luma(px[0], px[1], px[2]) < 32)
        .count();

    (dark_count as f32 / total as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
