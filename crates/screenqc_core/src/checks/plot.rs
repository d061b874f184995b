//! Profile plot rendering.
//!
//! # Responsibility
//! - Render a numeric series as a polyline PNG suitable for attaching to
//!   an image as a file annotation.
//!
//! # Invariants
//! - Non-finite samples are skipped, never drawn.
//! - Rendering never fails; only encoding can.

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([185, 185, 185]);
const LINE: Rgb<u8> = Rgb([46, 88, 158]);
const MARGIN: u32 = 24;

/// Draws `values` as a connected profile line on a white canvas with a
/// plain frame. Gaps (non-finite values) split the line.
pub fn render_profile(values: &[f64], width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    draw_frame(&mut canvas);

    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || width <= 2 * MARGIN || height <= 2 * MARGIN {
        return canvas;
    }

    let low = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let high = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if (high - low).abs() < f64::EPSILON {
        1.0
    } else {
        high - low
    };

    let inner_w = (width - 2 * MARGIN) as f64;
    let inner_h = (height - 2 * MARGIN) as f64;
    let step = if values.len() > 1 {
        inner_w / (values.len() - 1) as f64
    } else {
        0.0
    };

    let mut previous: Option<(f64, f64)> = None;
    for (idx, value) in values.iter().enumerate() {
        if !value.is_finite() {
            previous = None;
            continue;
        }
        let x = MARGIN as f64 + step * idx as f64;
        let y = MARGIN as f64 + inner_h * (1.0 - (value - low) / span);
        if let Some(from) = previous {
            draw_segment(&mut canvas, from, (x, y));
        }
        previous = Some((x, y));
    }

    canvas
}

/// PNG-encodes a rendered canvas.
pub fn encode_png(canvas: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    canvas.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

fn draw_frame(canvas: &mut RgbImage) {
    let (width, height) = canvas.dimensions();
    for x in 0..width {
        canvas.put_pixel(x, 0, FRAME);
        canvas.put_pixel(x, height - 1, FRAME);
    }
    for y in 0..height {
        canvas.put_pixel(0, y, FRAME);
        canvas.put_pixel(width - 1, y, FRAME);
    }
}

fn draw_segment(canvas: &mut RgbImage, from: (f64, f64), to: (f64, f64)) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil() as usize;
    let steps = steps.max(1);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = from.0 + (to.0 - from.0) * t;
        let y = from.1 + (to.1 - from.1) * t;
        let (width, height) = canvas.dimensions();
        let px = (x.round() as i64).clamp(0, width as i64 - 1) as u32;
        let py = (y.round() as i64).clamp(0, height as i64 - 1) as u32;
        canvas.put_pixel(px, py, LINE);
    }
}

#[cfg(test)]
mod tests {
    use super::{encode_png, render_profile, BACKGROUND, LINE};

    #[test]
    fn rendered_canvas_has_requested_dimensions() {
        let canvas = render_profile(&[0.0, 1.0, 0.5], 320, 240);
        assert_eq!(canvas.dimensions(), (320, 240));
    }

    #[test]
    fn profile_line_touches_the_canvas() {
        let canvas = render_profile(&[0.0, 2.0, 1.0, 3.0], 320, 240);
        let line_pixels = canvas.pixels().filter(|p| **p == LINE).count();
        assert!(line_pixels > 0);
    }

    #[test]
    fn empty_or_nan_profile_renders_blank_canvas() {
        for values in [vec![], vec![f64::NAN, f64::INFINITY]] {
            let canvas = render_profile(&values, 64, 64);
            assert!(canvas.pixels().filter(|p| **p == LINE).count() == 0);
            assert!(canvas.pixels().any(|p| *p == BACKGROUND));
        }
    }

    #[test]
    fn encoded_bytes_carry_the_png_magic() {
        let canvas = render_profile(&[1.0, 2.0], 64, 64);
        let bytes = encode_png(&canvas).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
