//! Pixel device drivers
//!
//! Drivers are write-only: pixels are staged with [`PixelDriver::set_pixel`]
//! and become visible on [`PixelDriver::show`]. Nothing can be read back from
//! the hardware, so the engines never ask a driver what it is displaying.

pub mod apa102;
pub mod memory;

pub use apa102::Apa102;
pub use memory::{MemoryStrip, StripProbe};

use smart_leds::RGB8;

use crate::error::DeviceError;

/// Pixels on a Pimoroni Blinkt
pub const BLINKT_PIXELS: usize = 8;

/// Fully off
pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Write-only LED strip
pub trait PixelDriver: Send {
    /// Number of addressable pixels
    fn num_pixels(&self) -> usize;

    /// Stage a pixel color
    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), DeviceError>;

    /// Global brightness, 0.0 to 1.0
    fn set_brightness(&mut self, brightness: f32);

    /// Latch staged pixels onto the strip
    fn show(&mut self) -> Result<(), DeviceError>;

    /// Stage every pixel to the same color
    fn set_all(&mut self, color: RGB8) -> Result<(), DeviceError> {
        for index in 0..self.num_pixels() {
            self.set_pixel(index, color)?;
        }
        Ok(())
    }
}

impl<D: PixelDriver + ?Sized> PixelDriver for Box<D> {
    fn num_pixels(&self) -> usize {
        (**self).num_pixels()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), DeviceError> {
        (**self).set_pixel(index, color)
    }

    fn set_brightness(&mut self, brightness: f32) {
        (**self).set_brightness(brightness)
    }

    fn show(&mut self) -> Result<(), DeviceError> {
        (**self).show()
    }

    fn set_all(&mut self, color: RGB8) -> Result<(), DeviceError> {
        (**self).set_all(color)
    }
}

/// Fail with [`DeviceError::OutOfRange`] unless `index` addresses a pixel
pub(crate) fn check_index(index: usize, count: usize) -> Result<(), DeviceError> {
    if index < count {
        Ok(())
    } else {
        Err(DeviceError::OutOfRange { index, count })
    }
}
