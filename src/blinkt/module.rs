//! Blinkt command sender
//!
//! Builds command payloads, checks pixel bounds and fires them at the Blinkt
//! engine. Firing is one-way: a successful result only means the event left.

use minion_events::{CallResult, CommandPayload, BLINKT_TAG};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    pixel_index, pixel_range, AllRgbArgs, BlinktCommand, ClearArgs, OneRgbArgs, RangeRgbArgs,
    NUM_PIXELS,
};
use crate::bus::{EventSink, NO_EVENT_MODULE};

pub struct BlinktModule<S: EventSink> {
    sink: Option<S>,
    tag: String,
    num_pixels: usize,
}

impl<S: EventSink> BlinktModule<S> {
    pub fn new(sink: Option<S>) -> Self {
        Self {
            sink,
            tag: BLINKT_TAG.to_string(),
            num_pixels: NUM_PIXELS,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_num_pixels(mut self, num_pixels: usize) -> Self {
        self.num_pixels = num_pixels;
        self
    }

    pub async fn random_colors(&self, timeout: Option<f64>) -> CallResult {
        self.fire(BlinktCommand::RandomColors, &(), timeout).await
    }

    pub async fn rainbow(&self, timeout: Option<f64>) -> CallResult {
        self.fire(BlinktCommand::Rainbow, &(), timeout).await
    }

    pub async fn one_rgb(&self, args: OneRgbArgs, timeout: Option<f64>) -> CallResult {
        if pixel_index(args.pixel, self.num_pixels).is_none() {
            return CallResult::failed("Invalid pixel");
        }
        self.fire(BlinktCommand::OneRgb, &args, timeout).await
    }

    pub async fn range_rgb(&self, args: RangeRgbArgs, timeout: Option<f64>) -> CallResult {
        if let Err(message) = pixel_range(args.start, args.end, self.num_pixels) {
            return CallResult::failed(message);
        }
        self.fire(BlinktCommand::RangeRgb, &args, timeout).await
    }

    pub async fn all_rgb(&self, args: AllRgbArgs, timeout: Option<f64>) -> CallResult {
        self.fire(BlinktCommand::AllRgb, &args, timeout).await
    }

    pub async fn clear(&self, args: ClearArgs, timeout: Option<f64>) -> CallResult {
        match args {
            ClearArgs {
                pixel: Some(pixel), ..
            } => {
                if pixel_index(pixel, self.num_pixels).is_none() {
                    return CallResult::failed("Invalid pixel");
                }
            }
            ClearArgs {
                start: Some(start),
                end: Some(end),
                ..
            } => {
                if let Err(message) = pixel_range(start, end, self.num_pixels) {
                    return CallResult::failed(message);
                }
            }
            _ => {}
        }
        self.fire(BlinktCommand::Clear, &args, timeout).await
    }

    async fn fire<A: Serialize>(
        &self,
        command: BlinktCommand,
        args: &A,
        timeout: Option<f64>,
    ) -> CallResult {
        let Some(sink) = &self.sink else {
            return CallResult::ok(NO_EVENT_MODULE);
        };

        let mut payload = CommandPayload::new(command.name());
        if let Ok(Value::Object(kwargs)) = serde_json::to_value(args) {
            payload.kwargs = kwargs;
        }
        let payload = payload.timeout(timeout);

        match sink.fire(payload.into_value(), &self.tag).await {
            Ok(()) => {
                debug!(command = command.name(), tag = %self.tag, "Fired Blinkt command");
                CallResult::ok(format!("Fired {} on {}", command.name(), self.tag))
            }
            Err(e) => {
                warn!(command = command.name(), "Failed to fire Blinkt command: {}", e);
                CallResult::failed(e.to_string())
            }
        }
    }
}
