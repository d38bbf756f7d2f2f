//! Synthetic frame generators for benchmarking and tests.
//!
//! YUYV patterns stay inside studio range (Y 16..=235, U/V 16..=240).

use crate::traits::Format;

/// Test pattern types for YUYV frame generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPattern {
    /// SMPTE-style 100% color bars.
    ColorBars,
    /// Horizontal luma ramp with drifting chroma, animated by `phase`.
    Gradient,
    /// Solid color with specified Y, U, V values.
    Solid(u8, u8, u8),
}

/// YUYV values for 100% color bars: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black.
pub const COLOR_BARS_YUV: [(u8, u8, u8); 8] = [
    (235, 128, 128), // White
    (210, 16, 146),  // Yellow
    (169, 166, 16),  // Cyan
    (144, 54, 34),   // Green
    (107, 202, 222), // Magenta
    (82, 90, 240),   // Red
    (41, 240, 110),  // Blue
    (16, 128, 128),  // Black
];

/// RGB values matching [`COLOR_BARS_YUV`].
pub const COLOR_BARS_RGB: [(u8, u8, u8); 8] = [
    (255, 255, 255),
    (255, 255, 0),
    (0, 255, 255),
    (0, 255, 0),
    (255, 0, 255),
    (255, 0, 0),
    (0, 0, 255),
    (0, 0, 0),
];

/// Generate one YUYV frame for `format`.
///
/// `phase` shifts animated patterns; static patterns ignore it.
pub fn yuyv_frame(format: &Format, pattern: TestPattern, phase: u8) -> Vec<u8> {
    let size = (format.width as usize) * (format.height as usize) * 2;
    let mut data = vec![0u8; size];

    match pattern {
        TestPattern::ColorBars => fill_color_bars(&mut data, format.width),
        TestPattern::Gradient => fill_gradient(&mut data, format.width, phase),
        TestPattern::Solid(y, u, v) => fill_solid(&mut data, y, u, v),
    }

    data
}

/// Generate an RGBA color-bar frame.
pub fn rgba_color_bars(width: u32, height: u32) -> Vec<u8> {
    let bar_width = (width / 8).max(1);
    let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);

    for _ in 0..height {
        for x in 0..width {
            let bar = ((x / bar_width) as usize).min(7);
            let (r, g, b) = COLOR_BARS_RGB.get(bar).copied().unwrap_or_default();
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }

    data
}

/// Generate an animated RGBA gradient: red ramps across, green ramps down,
/// blue follows `phase`.
#[allow(clippy::cast_possible_truncation)]
pub fn rgba_gradient(width: u32, height: u32, phase: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);

    for y in 0..height {
        let g = (u64::from(y) * 255 / u64::from(height.max(1))) as u8;
        for x in 0..width {
            let r = ((u64::from(x) * 255 / u64::from(width.max(1))) as u8).wrapping_add(phase);
            data.extend_from_slice(&[r, g, phase, 255]);
        }
    }

    data
}

fn fill_color_bars(data: &mut [u8], width: u32) {
    let bar_width = (width / 8).max(1);
    let row_len = (width as usize) * 2;
    if row_len == 0 {
        return;
    }

    for row in data.chunks_exact_mut(row_len) {
        for (pair, px) in row.chunks_exact_mut(4).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let x = (pair * 2) as u32;
            let bar = ((x / bar_width) as usize).min(7);
            let (y, u, v) = COLOR_BARS_YUV.get(bar).copied().unwrap_or((16, 128, 128));
            px.copy_from_slice(&[y, u, y, v]);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn fill_gradient(data: &mut [u8], width: u32, phase: u8) {
    let row_len = (width as usize) * 2;
    if row_len == 0 {
        return;
    }
    let rows = data.len() / row_len;
    let phase = usize::from(phase);
    let luma = |x: usize| 16 + ((x * 219 / width as usize + phase) % 220) as u8;

    for (y, row) in data.chunks_exact_mut(row_len).enumerate() {
        let u = 16 + (y * 224 / rows.max(1)) as u8;
        for (pair, px) in row.chunks_exact_mut(4).enumerate() {
            let x = pair * 2;
            let v = 16 + ((x + y + phase) % 225) as u8;
            px.copy_from_slice(&[luma(x), u, luma(x + 1), v]);
        }
    }
}

fn fill_solid(data: &mut [u8], y: u8, u: u8, v: u8) {
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&[y, u, y, v]);
    }
}
