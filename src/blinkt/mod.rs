//! Blinkt LED strip: direct-call operations, the event engine handler and
//! the command sender.

pub mod effects;
pub mod engine;
pub mod module;
pub mod strip;

pub use engine::BlinktHandler;
pub use module::BlinktModule;
pub use strip::BlinktStrip;

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::engine::{Registry, CLEAR_COMMAND};
use crate::error::RegistryError;

pub use crate::device::BLINKT_PIXELS as NUM_PIXELS;

/// Global brightness used by the animated effects
pub const DEFAULT_BRIGHTNESS: f32 = 0.1;

/// Commands understood by the Blinkt engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlinktCommand {
    RandomColors,
    Rainbow,
    OneRgb,
    RangeRgb,
    AllRgb,
    Clear,
}

impl BlinktCommand {
    /// Effects re-rendered on every loop iteration while in effect
    pub fn is_animated(self) -> bool {
        matches!(self, Self::RandomColors | Self::Rainbow)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::RandomColors => "random_colors",
            Self::Rainbow => "rainbow",
            Self::OneRgb => "one_rgb",
            Self::RangeRgb => "range_rgb",
            Self::AllRgb => "all_rgb",
            Self::Clear => CLEAR_COMMAND,
        }
    }
}

/// Build the Blinkt command table
pub fn registry() -> Result<Registry<BlinktCommand>, RegistryError> {
    Registry::builder()
        .register("random_colors", BlinktCommand::RandomColors)
        .register("random_blink_colors", BlinktCommand::RandomColors)
        .register("rainbow", BlinktCommand::Rainbow)
        .register("one_rgb", BlinktCommand::OneRgb)
        .register("range_rgb", BlinktCommand::RangeRgb)
        .register("all_rgb", BlinktCommand::AllRgb)
        .register(CLEAR_COMMAND, BlinktCommand::Clear)
        .build()
}

/// Resolve a pixel argument to an index on a strip of `num_pixels`
pub fn pixel_index(pixel: i64, num_pixels: usize) -> Option<usize> {
    usize::try_from(pixel).ok().filter(|index| *index < num_pixels)
}

/// Resolve an inclusive pixel range, or the message explaining why it is
/// invalid
pub fn pixel_range(
    start: i64,
    end: i64,
    num_pixels: usize,
) -> Result<RangeInclusive<usize>, &'static str> {
    let start = pixel_index(start, num_pixels).ok_or("Invalid start pixel")?;
    let end = pixel_index(end, num_pixels).ok_or("Invalid end pixel")?;
    if start > end {
        return Err("Invalid pixel range");
    }
    Ok(start..=end)
}

/// Arguments of `one_rgb`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneRgbArgs {
    pub pixel: i64,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Arguments of `range_rgb`, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeRgbArgs {
    #[serde(alias = "start_pixel")]
    pub start: i64,
    #[serde(alias = "end_pixel")]
    pub end: i64,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Default for RangeRgbArgs {
    fn default() -> Self {
        Self {
            start: 0,
            end: 1,
            red: 255,
            green: 255,
            blue: 255,
        }
    }
}

/// Arguments of `all_rgb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllRgbArgs {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Default for AllRgbArgs {
    fn default() -> Self {
        Self {
            red: 255,
            green: 255,
            blue: 255,
        }
    }
}

/// Arguments of `clear`.
///
/// `pixel` wins over a range; a range needs both ends, otherwise every
/// pixel is cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel: Option<i64>,
    #[serde(alias = "start_pixel", skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(alias = "end_pixel", skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

impl ClearArgs {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pixel(pixel: i64) -> Self {
        Self {
            pixel: Some(pixel),
            ..Self::default()
        }
    }

    pub fn range(start: i64, end: i64) -> Self {
        Self {
            pixel: None,
            start: Some(start),
            end: Some(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decode_args;
    use serde_json::json;

    #[test]
    fn test_registry() {
        let registry = registry().unwrap();
        assert_eq!(registry.lookup("rainbow"), Some(BlinktCommand::Rainbow));
        assert_eq!(
            registry.lookup("random_blink_colors"),
            Some(BlinktCommand::RandomColors)
        );
        assert_eq!(registry.lookup(CLEAR_COMMAND), Some(BlinktCommand::Clear));
        assert_eq!(registry.lookup("set_pixel"), None);
    }

    #[test]
    fn test_argument_defaults() {
        let args: RangeRgbArgs = decode_args(json!({"timeout": 3}).as_object().unwrap()).unwrap();
        assert_eq!(args, RangeRgbArgs::default());

        let args: OneRgbArgs = decode_args(json!({"pixel": 5, "red": 255}).as_object().unwrap()).unwrap();
        assert_eq!(
            args,
            OneRgbArgs {
                pixel: 5,
                red: 255,
                green: 0,
                blue: 0
            }
        );
    }

    #[test]
    fn test_range_aliases() {
        let args: RangeRgbArgs = decode_args(
            json!({"start_pixel": 2, "end_pixel": 5, "red": 0})
                .as_object()
                .unwrap(),
        )
        .unwrap();
        assert_eq!((args.start, args.end, args.red), (2, 5, 0));
    }

    #[test]
    fn test_negative_indices_decode() {
        let args: OneRgbArgs = decode_args(json!({"pixel": -1}).as_object().unwrap()).unwrap();
        assert_eq!(args.pixel, -1);

        let args: ClearArgs =
            decode_args(json!({"start": -2, "end": 3}).as_object().unwrap()).unwrap();
        assert_eq!((args.start, args.end), (Some(-2), Some(3)));
    }

    #[test]
    fn test_pixel_validation() {
        assert_eq!(pixel_index(0, NUM_PIXELS), Some(0));
        assert_eq!(pixel_index(7, NUM_PIXELS), Some(7));
        assert_eq!(pixel_index(8, NUM_PIXELS), None);
        assert_eq!(pixel_index(-1, NUM_PIXELS), None);

        assert_eq!(pixel_range(2, 5, NUM_PIXELS), Ok(2..=5));
        assert_eq!(pixel_range(-2, 3, NUM_PIXELS), Err("Invalid start pixel"));
        assert_eq!(pixel_range(0, -1, NUM_PIXELS), Err("Invalid end pixel"));
        assert_eq!(pixel_range(0, 8, NUM_PIXELS), Err("Invalid end pixel"));
        assert_eq!(pixel_range(5, 2, NUM_PIXELS), Err("Invalid pixel range"));
    }

    #[test]
    fn test_out_of_range_color_rejected() {
        let result = decode_args::<AllRgbArgs>(json!({"red": 300}).as_object().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_clear_args_serialization() {
        assert_eq!(serde_json::to_value(ClearArgs::all()).unwrap(), json!({}));
        assert_eq!(
            serde_json::to_value(ClearArgs::range(2, 4)).unwrap(),
            json!({"start": 2, "end": 4})
        );
    }
}
