//! Direct-call Blinkt operations
//!
//! Every operation validates its pixel arguments, stages the change on the
//! driver and latches it with a single `show`. Validation failures come back
//! as [`Outcome::Rejected`] and leave the strip untouched.

use smart_leds::RGB8;

use super::{
    effects, pixel_index, pixel_range, AllRgbArgs, ClearArgs, OneRgbArgs, RangeRgbArgs,
    DEFAULT_BRIGHTNESS,
};
use crate::device::{PixelDriver, OFF};
use crate::engine::{Outcome, TargetKey};
use crate::error::DeviceError;

pub struct BlinktStrip<D: PixelDriver> {
    driver: D,
}

impl<D: PixelDriver> BlinktStrip<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn num_pixels(&self) -> usize {
        self.driver.num_pixels()
    }

    /// Set every pixel to a random color
    pub fn random_colors(&mut self) -> Result<Outcome, DeviceError> {
        self.driver.set_brightness(DEFAULT_BRIGHTNESS);
        self.render_random(&self.all_pixels())?;
        Ok(Outcome::applied(self.all_keys(), "Set all pixels to random colors"))
    }

    /// Paint a rainbow across the strip, phased by the wall clock
    pub fn rainbow(&mut self) -> Result<Outcome, DeviceError> {
        self.rainbow_at(effects::now_centiseconds())
    }

    pub fn rainbow_at(&mut self, centiseconds: u64) -> Result<Outcome, DeviceError> {
        self.driver.set_brightness(DEFAULT_BRIGHTNESS);
        self.render_rainbow(&self.all_pixels(), centiseconds)?;
        Ok(Outcome::applied(self.all_keys(), "Set all pixels to a rainbow"))
    }

    pub fn one_rgb(&mut self, args: OneRgbArgs) -> Result<Outcome, DeviceError> {
        let Some(pixel) = pixel_index(args.pixel, self.num_pixels()) else {
            return Ok(Outcome::rejected("Invalid pixel"));
        };

        self.driver
            .set_pixel(pixel, rgb(args.red, args.green, args.blue))?;
        self.driver.show()?;

        Ok(Outcome::applied(
            vec![TargetKey::Pixel(pixel)],
            format!(
                "Set pixel {} to rgb ({},{},{})",
                pixel, args.red, args.green, args.blue
            ),
        ))
    }

    pub fn range_rgb(&mut self, args: RangeRgbArgs) -> Result<Outcome, DeviceError> {
        let pixels = match pixel_range(args.start, args.end, self.num_pixels()) {
            Ok(pixels) => pixels,
            Err(message) => return Ok(Outcome::rejected(message)),
        };

        let color = rgb(args.red, args.green, args.blue);
        for pixel in pixels.clone() {
            self.driver.set_pixel(pixel, color)?;
        }
        self.driver.show()?;

        Ok(Outcome::applied(
            keys(pixels.clone()),
            format!(
                "Set range {}-{} to rgb ({},{},{})",
                pixels.start(),
                pixels.end(),
                args.red,
                args.green,
                args.blue
            ),
        ))
    }

    pub fn all_rgb(&mut self, args: AllRgbArgs) -> Result<Outcome, DeviceError> {
        self.driver.set_all(rgb(args.red, args.green, args.blue))?;
        self.driver.show()?;

        Ok(Outcome::applied(
            self.all_keys(),
            format!(
                "Set all pixels to rgb ({},{},{})",
                args.red, args.green, args.blue
            ),
        ))
    }

    /// Clear one pixel, an inclusive range, or the whole strip
    pub fn clear(&mut self, args: ClearArgs) -> Result<Outcome, DeviceError> {
        match args {
            ClearArgs {
                pixel: Some(pixel), ..
            } => self.clear_one(pixel),
            ClearArgs {
                start: Some(start),
                end: Some(end),
                ..
            } => self.clear_range(start, end),
            _ => self.clear_all(),
        }
    }

    pub fn clear_one(&mut self, pixel: i64) -> Result<Outcome, DeviceError> {
        let Some(pixel) = pixel_index(pixel, self.num_pixels()) else {
            return Ok(Outcome::rejected("Invalid pixel"));
        };

        self.driver.set_pixel(pixel, OFF)?;
        self.driver.show()?;
        Ok(Outcome::cleared(
            vec![TargetKey::Pixel(pixel)],
            format!("Clear pixel {}", pixel),
        ))
    }

    pub fn clear_range(&mut self, start: i64, end: i64) -> Result<Outcome, DeviceError> {
        let pixels = match pixel_range(start, end, self.num_pixels()) {
            Ok(pixels) => pixels,
            Err(message) => return Ok(Outcome::rejected(message)),
        };

        for pixel in pixels.clone() {
            self.driver.set_pixel(pixel, OFF)?;
        }
        self.driver.show()?;
        Ok(Outcome::cleared(
            keys(pixels.clone()),
            format!("Clear pixel range {}-{}", pixels.start(), pixels.end()),
        ))
    }

    pub fn clear_all(&mut self) -> Result<Outcome, DeviceError> {
        self.driver.set_all(OFF)?;
        self.driver.show()?;
        Ok(Outcome::cleared(self.all_keys(), "Clear all pixels"))
    }

    /// Turn off the given pixels with one `show`. Indices outside the strip
    /// are skipped.
    pub fn blank(&mut self, pixels: &[usize]) -> Result<(), DeviceError> {
        let count = self.num_pixels();
        for &pixel in pixels.iter().filter(|p| **p < count) {
            self.driver.set_pixel(pixel, OFF)?;
        }
        self.driver.show()
    }

    /// Re-roll random colors on the given pixels
    pub fn render_random(&mut self, pixels: &[usize]) -> Result<(), DeviceError> {
        let frame = effects::random_colors(pixels.iter().copied(), &mut rand::thread_rng());
        self.paint(frame)
    }

    /// Advance the rainbow on the given pixels
    pub fn render_rainbow(&mut self, pixels: &[usize], centiseconds: u64) -> Result<(), DeviceError> {
        let frame = effects::rainbow(pixels.iter().copied(), centiseconds);
        self.paint(frame)
    }

    fn paint(&mut self, frame: Vec<(usize, RGB8)>) -> Result<(), DeviceError> {
        for (pixel, color) in frame {
            self.driver.set_pixel(pixel, color)?;
        }
        self.driver.show()
    }

    fn all_pixels(&self) -> Vec<usize> {
        (0..self.num_pixels()).collect()
    }

    fn all_keys(&self) -> Vec<TargetKey> {
        keys(0..self.num_pixels())
    }
}

fn rgb(r: u8, g: u8, b: u8) -> RGB8 {
    RGB8 { r, g, b }
}

fn keys(pixels: impl Iterator<Item = usize>) -> Vec<TargetKey> {
    pixels.map(TargetKey::Pixel).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blinkt::NUM_PIXELS;
    use crate::device::{MemoryStrip, StripProbe};
    use minion_events::CallResult;

    const WHITE: RGB8 = RGB8 {
        r: 255,
        g: 255,
        b: 255,
    };

    fn strip() -> (BlinktStrip<MemoryStrip>, StripProbe) {
        let driver = MemoryStrip::new(NUM_PIXELS);
        let probe = driver.probe();
        (BlinktStrip::new(driver), probe)
    }

    fn lit(probe: &StripProbe) -> Vec<usize> {
        probe
            .shown()
            .iter()
            .enumerate()
            .filter(|(_, color)| **color != OFF)
            .map(|(index, _)| index)
            .collect()
    }

    #[test]
    fn test_one_rgb() {
        let (mut strip, probe) = strip();
        let outcome = strip
            .one_rgb(OneRgbArgs {
                pixel: 5,
                red: 255,
                green: 120,
                blue: 10,
            })
            .unwrap();

        assert_eq!(
            outcome.to_result(),
            CallResult::ok("Set pixel 5 to rgb (255,120,10)")
        );
        assert_eq!(probe.pixel(5), Some(rgb(255, 120, 10)));
        assert_eq!(lit(&probe), vec![5]);
    }

    #[test]
    fn test_one_rgb_invalid_pixel_changes_nothing() {
        let (mut strip, probe) = strip();
        strip.all_rgb(AllRgbArgs::default()).unwrap();
        let shows = probe.show_count();

        let count = NUM_PIXELS as i64;
        for pixel in [count, count + 10, -1] {
            let outcome = strip
                .one_rgb(OneRgbArgs {
                    pixel,
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(outcome.to_result(), CallResult::failed("Invalid pixel"));
        }

        assert_eq!(probe.show_count(), shows);
        assert_eq!(probe.shown(), vec![WHITE; NUM_PIXELS]);
    }

    #[test]
    fn test_range_is_inclusive() {
        let (mut strip, probe) = strip();
        let outcome = strip
            .range_rgb(RangeRgbArgs {
                start: 2,
                end: 5,
                red: 0,
                green: 255,
                blue: 0,
            })
            .unwrap();

        assert_eq!(lit(&probe), vec![2, 3, 4, 5]);
        assert_eq!(outcome.comment(), "Set range 2-5 to rgb (0,255,0)");
        assert!(matches!(outcome, Outcome::Applied { ref targets, .. } if targets.len() == 4));
    }

    #[test]
    fn test_range_validation() {
        let (mut strip, _) = strip();
        let count = NUM_PIXELS as i64;
        let cases = [
            (count, count, "Invalid start pixel"),
            (-2, 3, "Invalid start pixel"),
            (0, count, "Invalid end pixel"),
            (5, 2, "Invalid pixel range"),
        ];
        for (start, end, message) in cases {
            let outcome = strip
                .range_rgb(RangeRgbArgs {
                    start,
                    end,
                    ..Default::default()
                })
                .unwrap();
            assert_eq!(outcome, Outcome::rejected(message));
        }
    }

    #[test]
    fn test_clear_variants() {
        let (mut strip, probe) = strip();

        strip.all_rgb(AllRgbArgs::default()).unwrap();
        let outcome = strip.clear(ClearArgs::pixel(5)).unwrap();
        assert_eq!(outcome.comment(), "Clear pixel 5");
        assert_eq!(lit(&probe), vec![0, 1, 2, 3, 4, 6, 7]);

        strip.all_rgb(AllRgbArgs::default()).unwrap();
        let outcome = strip.clear(ClearArgs::range(2, 4)).unwrap();
        assert_eq!(outcome.comment(), "Clear pixel range 2-4");
        assert_eq!(lit(&probe), vec![0, 1, 5, 6, 7]);

        strip.all_rgb(AllRgbArgs::default()).unwrap();
        let outcome = strip.clear(ClearArgs::all()).unwrap();
        assert_eq!(outcome.comment(), "Clear all pixels");
        assert!(lit(&probe).is_empty());
    }

    #[test]
    fn test_clear_rejects_negative_indices() {
        let (mut strip, probe) = strip();
        strip.all_rgb(AllRgbArgs::default()).unwrap();

        let outcome = strip.clear(ClearArgs::pixel(-1)).unwrap();
        assert_eq!(outcome, Outcome::rejected("Invalid pixel"));
        let outcome = strip.clear(ClearArgs::range(-2, 3)).unwrap();
        assert_eq!(outcome, Outcome::rejected("Invalid start pixel"));

        assert_eq!(probe.shown(), vec![WHITE; NUM_PIXELS]);
    }

    #[test]
    fn test_incomplete_range_clears_all() {
        let (mut strip, probe) = strip();
        strip.all_rgb(AllRgbArgs::default()).unwrap();

        let outcome = strip
            .clear(ClearArgs {
                start: Some(3),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(outcome.comment(), "Clear all pixels");
        assert!(lit(&probe).is_empty());
    }

    #[test]
    fn test_animated_effects_dim_the_strip() {
        let (mut strip, probe) = strip();

        strip.rainbow_at(0).unwrap();
        assert_eq!(probe.brightness(), DEFAULT_BRIGHTNESS);
        assert_eq!(lit(&probe).len(), NUM_PIXELS);

        let outcome = strip.random_colors().unwrap();
        assert!(matches!(outcome, Outcome::Applied { ref targets, .. } if targets.len() == NUM_PIXELS));
    }

    #[test]
    fn test_blank_skips_out_of_range() {
        let (mut strip, probe) = strip();
        strip.all_rgb(AllRgbArgs::default()).unwrap();

        strip.blank(&[1, 2, 99]).unwrap();
        assert_eq!(lit(&probe), vec![0, 3, 4, 5, 6, 7]);
    }
}
