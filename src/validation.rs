//! Frame validation utilities for output verification.
//!
//! This module provides functions to validate that YUYV frames produced by
//! the converter or the pattern generators honour the studio-range policy
//! and carry the expected image. Useful for integration testing against a
//! loopback device.

use crate::pattern::COLOR_BARS_RGB;
use crate::traits::{CameraError, Frame, PixelFormat, Result};

/// Tolerance for RGB color matching (accounts for YUV->RGB conversion errors).
const COLOR_TOLERANCE: u8 = 15;

const LUMA_RANGE: std::ops::RangeInclusive<u8> = 16..=235;
const CHROMA_RANGE: std::ops::RangeInclusive<u8> = 16..=240;

/// Validates that every sample of a YUYV frame lies in studio range.
///
/// # Errors
///
/// Returns `InvalidFormat` if the frame is not YUYV or any Y sample falls
/// outside 16..=235 or any U/V sample outside 16..=240.
pub fn validate_studio_range(frame: &Frame) -> Result<()> {
    require_yuyv(frame)?;

    for (index, px) in frame.data().chunks_exact(4).enumerate() {
        if let [y0, u, y1, v] = *px {
            if !LUMA_RANGE.contains(&y0) || !LUMA_RANGE.contains(&y1) {
                return Err(CameraError::InvalidFormat(format!(
                    "luma out of studio range at pair {index}: {y0}, {y1}"
                )));
            }
            if !CHROMA_RANGE.contains(&u) || !CHROMA_RANGE.contains(&v) {
                return Err(CameraError::InvalidFormat(format!(
                    "chroma out of studio range at pair {index}: {u}, {v}"
                )));
            }
        }
    }

    Ok(())
}

/// Validates that every pixel pair of a YUYV frame is within `tolerance` of
/// `(y, u, v)`.
///
/// # Errors
///
/// Returns `InvalidFormat` naming the first pair that differs.
pub fn validate_solid(frame: &Frame, expected: (u8, u8, u8), tolerance: u8) -> Result<()> {
    require_yuyv(frame)?;
    let (ey, eu, ev) = expected;

    for (index, px) in frame.data().chunks_exact(4).enumerate() {
        if let [y0, u, y1, v] = *px {
            let within = y0.abs_diff(ey) <= tolerance
                && y1.abs_diff(ey) <= tolerance
                && u.abs_diff(eu) <= tolerance
                && v.abs_diff(ev) <= tolerance;
            if !within {
                return Err(CameraError::InvalidFormat(format!(
                    "pair {index} is [{y0} {u} {y1} {v}], expected Y={ey} U={eu} V={ev}"
                )));
            }
        }
    }

    Ok(())
}

/// Validates that a frame contains the 8-bar color pattern.
///
/// This function checks 8 vertical stripes at their center positions,
/// verifying that each stripe contains the expected color with a tolerance
/// for YUV-to-RGB conversion inaccuracies.
///
/// # Arguments
///
/// * `frame` - The frame to validate
///
/// # Returns
///
/// * `Ok(())` if the color bars are valid
/// * `Err(CameraError::InvalidFormat)` if validation fails
///
/// # Errors
///
/// Returns `InvalidFormat` if:
/// - A sample point falls outside the frame
/// - Any color bar doesn't match the expected color within tolerance
pub fn validate_color_bars(frame: &Frame) -> Result<()> {
    let bar_width = frame.width() / 8;
    let center_y = frame.height() / 2;

    for (bar_idx, expected_rgb) in COLOR_BARS_RGB.iter().enumerate() {
        // Sample the center of each bar
        #[allow(clippy::cast_possible_truncation)]
        let sample_x = (bar_idx as u32 * bar_width) + (bar_width / 2);

        let actual_rgb = frame.pixel_at(sample_x, center_y).ok_or_else(|| {
            CameraError::InvalidFormat(format!("Failed to get pixel at ({sample_x}, {center_y})"))
        })?;

        if !colors_match(actual_rgb, *expected_rgb, COLOR_TOLERANCE) {
            return Err(CameraError::InvalidFormat(format!(
                "Color bar {bar_idx} mismatch at ({sample_x}, {center_y}): \
                 expected RGB{expected_rgb:?}, got RGB{actual_rgb:?}"
            )));
        }
    }

    Ok(())
}

fn require_yuyv(frame: &Frame) -> Result<()> {
    if frame.pixel_format() == PixelFormat::Yuyv422 {
        Ok(())
    } else {
        Err(CameraError::InvalidFormat(format!(
            "expected YUYV frame, got {:?}",
            frame.pixel_format()
        )))
    }
}

/// Helper function to check if two RGB colors match within a tolerance.
fn colors_match(actual: (u8, u8, u8), expected: (u8, u8, u8), tolerance: u8) -> bool {
    let (ar, ag, ab) = actual;
    let (er, eg, eb) = expected;

    ar.abs_diff(er) <= tolerance && ag.abs_diff(eg) <= tolerance && ab.abs_diff(eb) <= tolerance
}
