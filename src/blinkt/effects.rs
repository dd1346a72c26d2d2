//! Frame generators for the animated effects

use rand::Rng;
use smart_leds::hsv::{hsv2rgb, Hsv};
use smart_leds::RGB8;

/// Hue step between neighbouring pixels, in degrees
const RAINBOW_SPACING: f32 = 360.0 / 16.0;

/// Colors for `pixels` at the given wall-clock time.
///
/// The base hue advances one degree per centisecond and wraps at 360.
pub fn rainbow(pixels: impl IntoIterator<Item = usize>, centiseconds: u64) -> Vec<(usize, RGB8)> {
    let hue = (centiseconds % 360) as f32;
    pixels
        .into_iter()
        .map(|x| {
            let degrees = (hue + x as f32 * RAINBOW_SPACING) % 360.0;
            (x, hue_to_rgb(degrees))
        })
        .collect()
}

/// A fresh random color for each pixel
pub fn random_colors(pixels: impl IntoIterator<Item = usize>, rng: &mut impl Rng) -> Vec<(usize, RGB8)> {
    pixels
        .into_iter()
        .map(|x| {
            let color = RGB8 {
                r: rng.gen(),
                g: rng.gen(),
                b: rng.gen(),
            };
            (x, color)
        })
        .collect()
}

/// Centiseconds since the Unix epoch
pub fn now_centiseconds() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis() / 10).unwrap_or(0)
}

fn hue_to_rgb(degrees: f32) -> RGB8 {
    hsv2rgb(Hsv {
        hue: (degrees * 256.0 / 360.0) as u8,
        sat: 255,
        val: 255,
    })
}
