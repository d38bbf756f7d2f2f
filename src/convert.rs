//! RGBA32 to YUYV 4:2:2 conversion.
//!
//! Uses ITU-R BT.601 studio-range coefficients in 8-bit fixed point:
//! - Y = ((66 R + 129 G + 25 B + 128) >> 8) + 16, clamped to 16..=235
//! - U = ((-38 R - 74 G + 112 B + 128) >> 8) + 128, clamped to 16..=240
//! - V = ((112 R - 94 G - 18 B + 128) >> 8) + 128, clamped to 16..=240
//!
//! Chroma for each pixel pair is computed from the pair's averaged RGB.
//! Alpha is ignored.

use crate::traits::{CameraError, PixelFormat, Result};

const LUMA_MIN: i32 = 16;
const LUMA_MAX: i32 = 235;
const CHROMA_MIN: i32 = 16;
const CHROMA_MAX: i32 = 240;

/// Convert an RGBA32 buffer into a newly allocated YUYV422 buffer.
///
/// # Errors
///
/// Returns `SizeMismatch` if `rgba.len() != width * height * 4`.
pub fn rgba_to_yuyv(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let len = expected_len(PixelFormat::Yuyv422, width, height, rgba.len())?;
    let mut out = vec![0u8; len];
    rgba_to_yuyv_into(rgba, width, height, &mut out)?;
    Ok(out)
}

/// Convert an RGBA32 buffer into a caller-provided YUYV422 buffer.
///
/// Both lengths are checked before `out` is touched, so a failed call
/// leaves `out` unchanged.
///
/// # Errors
///
/// Returns `SizeMismatch` if `rgba.len() != width * height * 4` or
/// `out.len() != width * height * 2`.
pub fn rgba_to_yuyv_into(rgba: &[u8], width: u32, height: u32, out: &mut [u8]) -> Result<()> {
    let rgba_len = expected_len(PixelFormat::Rgba32, width, height, rgba.len())?;
    if rgba.len() != rgba_len {
        return Err(CameraError::SizeMismatch {
            expected: rgba_len,
            actual: rgba.len(),
        });
    }

    let yuyv_len = expected_len(PixelFormat::Yuyv422, width, height, out.len())?;
    if out.len() != yuyv_len {
        return Err(CameraError::SizeMismatch {
            expected: yuyv_len,
            actual: out.len(),
        });
    }

    if rgba.is_empty() {
        return Ok(());
    }

    let width = width as usize;
    let src_rows = rgba.chunks_exact(width * 4);
    let dst_rows = out.chunks_exact_mut(width * 2);

    for (src, dst) in src_rows.zip(dst_rows) {
        convert_row(src, dst);
    }

    Ok(())
}

fn convert_row(src: &[u8], dst: &mut [u8]) {
    let mut pairs = src.chunks_exact(8);
    let mut packed = dst.chunks_exact_mut(4);

    for (pair, yuyv) in pairs.by_ref().zip(packed.by_ref()) {
        let (r0, g0, b0) = rgb(pair);
        let (r1, g1, b1) = rgb(pair.get(4..).unwrap_or_default());

        let (u, v) = chroma((r0 + r1) >> 1, (g0 + g1) >> 1, (b0 + b1) >> 1);
        yuyv.copy_from_slice(&[luma(r0, g0, b0), u, luma(r1, g1, b1), v]);
    }

    // Odd width: the last pixel carries its own luma and U only.
    let tail = pairs.remainder();
    if !tail.is_empty() {
        let (r, g, b) = rgb(tail);
        let (u, _) = chroma(r, g, b);
        let rest = packed.into_remainder();
        if let [y_out, u_out] = rest {
            *y_out = luma(r, g, b);
            *u_out = u;
        }
    }
}

fn rgb(px: &[u8]) -> (i32, i32, i32) {
    match px {
        [r, g, b, ..] => (i32::from(*r), i32::from(*g), i32::from(*b)),
        _ => (0, 0, 0),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    y.clamp(LUMA_MIN, LUMA_MAX) as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn chroma(r: i32, g: i32, b: i32) -> (u8, u8) {
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (
        u.clamp(CHROMA_MIN, CHROMA_MAX) as u8,
        v.clamp(CHROMA_MIN, CHROMA_MAX) as u8,
    )
}

/// Length a `pixel_format` buffer must have, or `SizeMismatch` if the
/// geometry overflows.
fn expected_len(pixel_format: PixelFormat, width: u32, height: u32, actual: usize) -> Result<usize> {
    pixel_format
        .frame_len(width, height)
        .ok_or(CameraError::SizeMismatch {
            expected: usize::MAX,
            actual,
        })
}

/// Convert studio-range YUV values to RGB.
///
/// Uses the ITU-R BT.601 inverse, expanding Y from 16..=235 and U/V from
/// 16..=240 back to full-range RGB.
///
/// # Arguments
///
/// * `y` - Luminance value (16-235 for studio range)
/// * `u` - Blue-difference chroma value (16-240)
/// * `v` - Red-difference chroma value (16-240)
///
/// # Returns
///
/// RGB tuple with values clamped to 0-255 range.
#[must_use]
#[allow(clippy::many_single_char_names)]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y_f = (f32::from(y) - 16.0) * (255.0 / 219.0);
    let u_f = f32::from(u) - 128.0;
    let v_f = f32::from(v) - 128.0;

    let r = 1.596f32.mul_add(v_f, y_f);
    let g = 0.813f32.mul_add(-v_f, 0.392f32.mul_add(-u_f, y_f));
    let b = 2.017f32.mul_add(u_f, y_f);

    let clamp = |val: f32| -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        {
            val.round().clamp(0.0, 255.0) as u8
        }
    };

    (clamp(r), clamp(g), clamp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat((width * height) as usize)
    }

    #[test]
    fn test_output_length() {
        for (width, height) in [(2, 1), (640, 480), (1920, 1080), (3, 3), (1, 1)] {
            let rgba = solid_rgba(width, height, [12, 34, 56, 255]);
            let yuyv = rgba_to_yuyv(&rgba, width, height).expect("conversion should succeed");
            assert_eq!(yuyv.len(), (width * height * 2) as usize);
        }
    }

    #[test]
    fn test_size_mismatch_leaves_output_untouched() {
        let rgba = vec![255u8; 4 * 4 * 4 - 1];
        let mut out = vec![0xAAu8; 4 * 4 * 2];

        let err = rgba_to_yuyv_into(&rgba, 4, 4, &mut out).expect_err("short input must fail");
        assert!(matches!(
            err,
            CameraError::SizeMismatch {
                expected: 64,
                actual: 63
            }
        ));
        assert!(out.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_output_buffer_size_checked() {
        let rgba = solid_rgba(4, 4, [0, 0, 0, 255]);
        let mut out = vec![0u8; 10];
        assert!(matches!(
            rgba_to_yuyv_into(&rgba, 4, 4, &mut out),
            Err(CameraError::SizeMismatch { expected: 32, .. })
        ));
    }

    #[test]
    fn test_white_and_black_hit_studio_limits() {
        let white = rgba_to_yuyv(&solid_rgba(4, 2, [255, 255, 255, 255]), 4, 2).expect("white");
        assert!(white.chunks_exact(4).all(|px| px == [235, 128, 235, 128]));

        let black = rgba_to_yuyv(&solid_rgba(4, 2, [0, 0, 0, 255]), 4, 2).expect("black");
        assert!(black.chunks_exact(4).all(|px| px == [16, 128, 16, 128]));
    }

    #[test]
    fn test_alpha_is_ignored() {
        let opaque = rgba_to_yuyv(&solid_rgba(2, 2, [200, 100, 50, 255]), 2, 2).expect("opaque");
        let clear = rgba_to_yuyv(&solid_rgba(2, 2, [200, 100, 50, 0]), 2, 2).expect("clear");
        assert_eq!(opaque, clear);
    }

    #[test]
    fn test_primary_colours() {
        // Pure red: Y=82, U=90, V=240 in BT.601 studio range
        let red = rgba_to_yuyv(&solid_rgba(2, 1, [255, 0, 0, 255]), 2, 1).expect("red");
        assert_eq!(red, vec![82, 90, 82, 240]);

        // Pure blue: Y=41, U=240, V=110
        let blue = rgba_to_yuyv(&solid_rgba(2, 1, [0, 0, 255, 255]), 2, 1).expect("blue");
        assert_eq!(blue, vec![41, 240, 41, 110]);
    }

    #[test]
    fn test_chroma_is_pair_average() {
        // Black and white pair: luma differs, chroma stays neutral
        let rgba = [0, 0, 0, 255, 255, 255, 255, 255];
        let yuyv = rgba_to_yuyv(&rgba, 2, 1).expect("pair");
        assert_eq!(yuyv, vec![16, 128, 235, 128]);
    }

    #[test]
    fn test_odd_width_rows_stay_aligned() {
        let mut rgba = solid_rgba(3, 2, [255, 255, 255, 255]);
        // Second row black
        for px in rgba.chunks_exact_mut(4).skip(3) {
            px.copy_from_slice(&[0, 0, 0, 255]);
        }

        let yuyv = rgba_to_yuyv(&rgba, 3, 2).expect("odd width");
        assert_eq!(&yuyv[..6], &[235, 128, 235, 128, 235, 128]);
        assert_eq!(&yuyv[6..], &[16, 128, 16, 128, 16, 128]);
    }

    #[test]
    fn test_empty_frame() {
        assert_eq!(rgba_to_yuyv(&[], 0, 0).expect("empty"), Vec::<u8>::new());
    }

    #[test]
    fn test_yuv_to_rgb_inverts_conversion() {
        for rgb in [[255, 0, 0], [0, 255, 0], [0, 0, 255], [128, 128, 128], [30, 200, 90]] {
            let rgba = solid_rgba(2, 1, [rgb[0], rgb[1], rgb[2], 255]);
            let yuyv = rgba_to_yuyv(&rgba, 2, 1).expect("convert");
            let (r, g, b) = yuv_to_rgb(yuyv[0], yuyv[1], yuyv[3]);
            for (actual, expected) in [(r, rgb[0]), (g, rgb[1]), (b, rgb[2])] {
                assert!(
                    actual.abs_diff(expected) <= 4,
                    "round trip of {rgb:?} gave ({r}, {g}, {b})"
                );
            }
        }
    }
}
