//! In-memory strip for simulation and tests

use smart_leds::RGB8;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{check_index, PixelDriver, OFF};
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct StripState {
    shown: Vec<RGB8>,
    brightness: f32,
    shows: usize,
}

/// Strip that keeps its latched frame in memory
pub struct MemoryStrip {
    staged: Vec<RGB8>,
    brightness: f32,
    state: Arc<Mutex<StripState>>,
}

/// Observer for what a [`MemoryStrip`] last showed.
///
/// The driver itself stays write-only; the probe plays the part of someone
/// looking at the LEDs.
#[derive(Clone)]
pub struct StripProbe {
    state: Arc<Mutex<StripState>>,
}

impl MemoryStrip {
    pub fn new(num_pixels: usize) -> Self {
        let state = StripState {
            shown: vec![OFF; num_pixels],
            brightness: 1.0,
            shows: 0,
        };
        Self {
            staged: vec![OFF; num_pixels],
            brightness: 1.0,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn probe(&self) -> StripProbe {
        StripProbe {
            state: self.state.clone(),
        }
    }
}

impl PixelDriver for MemoryStrip {
    fn num_pixels(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), DeviceError> {
        check_index(index, self.staged.len())?;
        self.staged[index] = color;
        Ok(())
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.brightness = brightness.clamp(0.0, 1.0);
    }

    fn show(&mut self) -> Result<(), DeviceError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.shown.clone_from(&self.staged);
        state.brightness = self.brightness;
        state.shows += 1;
        debug!(frame = ?state.shown, "Simulated strip updated");
        Ok(())
    }
}

impl StripProbe {
    /// Colors latched by the most recent `show`
    pub fn shown(&self) -> Vec<RGB8> {
        self.lock().shown.clone()
    }

    pub fn pixel(&self, index: usize) -> Option<RGB8> {
        self.lock().shown.get(index).copied()
    }

    pub fn brightness(&self) -> f32 {
        self.lock().brightness
    }

    /// Number of times `show` was called
    pub fn show_count(&self) -> usize {
        self.lock().shows
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StripState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
