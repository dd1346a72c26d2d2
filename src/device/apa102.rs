//! APA102 frame writer
//!
//! Frames are written to any [`Write`] sink, normally a spidev character
//! device such as `/dev/spidev0.0`. Each frame is a 4-byte zero start frame,
//! one `[0xE0 | brightness, b, g, r]` word per pixel and an end frame of at
//! least half a clock per pixel.

use smart_leds::RGB8;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::{check_index, PixelDriver, OFF};
use crate::error::DeviceError;

const START_FRAME: [u8; 4] = [0; 4];
const MAX_BRIGHTNESS: u8 = 0x1F;

pub struct Apa102<W: Write + Send> {
    writer: W,
    pixels: Vec<RGB8>,
    brightness: u8,
    clear_on_exit: bool,
}

impl Apa102<File> {
    /// Open a spidev device for writing
    pub fn open(path: impl AsRef<Path>, num_pixels: usize) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let file = OpenOptions::new().write(true).open(path)?;
        debug!("Opened APA102 device {}", path.display());
        Ok(Self::new(file, num_pixels))
    }
}

impl<W: Write + Send> Apa102<W> {
    pub fn new(writer: W, num_pixels: usize) -> Self {
        Self {
            writer,
            pixels: vec![OFF; num_pixels],
            brightness: MAX_BRIGHTNESS,
            clear_on_exit: false,
        }
    }

    /// Blank the strip when the driver is dropped
    pub fn set_clear_on_exit(&mut self, enabled: bool) {
        self.clear_on_exit = enabled;
    }

    fn encode(&self) -> Vec<u8> {
        let end_len = self.pixels.len().div_ceil(16).max(4);
        let mut frame = Vec::with_capacity(START_FRAME.len() + self.pixels.len() * 4 + end_len);
        frame.extend_from_slice(&START_FRAME);
        for pixel in &self.pixels {
            frame.extend_from_slice(&[0xE0 | self.brightness, pixel.b, pixel.g, pixel.r]);
        }
        frame.resize(frame.len() + end_len, 0);
        frame
    }
}

impl<W: Write + Send> PixelDriver for Apa102<W> {
    fn num_pixels(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), DeviceError> {
        check_index(index, self.pixels.len())?;
        self.pixels[index] = color;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: f32) {
        let scaled = (brightness.clamp(0.0, 1.0) * f32::from(MAX_BRIGHTNESS)) as u8;
        self.brightness = scaled & MAX_BRIGHTNESS;
    }

    fn show(&mut self) -> Result<(), DeviceError> {
        let frame = self.encode();
        self.writer.write_all(&frame)?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Drop for Apa102<W> {
    fn drop(&mut self) {
        if !self.clear_on_exit {
            return;
        }
        self.pixels.fill(OFF);
        if let Err(e) = self.show() {
            warn!("Failed to clear strip on exit: {}", e);
        }
    }
}
