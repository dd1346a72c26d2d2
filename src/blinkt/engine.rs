//! Blinkt effect handler for the dispatch loop

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{effects, registry, BlinktCommand, BlinktStrip};
use crate::device::PixelDriver;
use crate::engine::{
    decode_args, Arguments, EffectHandler, Outcome, PendingOperation, PendingTable, Registry,
};
use crate::error::{HandlerError, RegistryError};

/// Strip shared between the engine and direct callers
pub type SharedStrip<D> = Arc<Mutex<BlinktStrip<D>>>;

pub struct BlinktHandler<D: PixelDriver> {
    strip: SharedStrip<D>,
    registry: Registry<BlinktCommand>,
}

impl<D: PixelDriver + 'static> BlinktHandler<D> {
    pub fn new(driver: D) -> Result<Self, RegistryError> {
        Self::with_strip(Arc::new(Mutex::new(BlinktStrip::new(driver))))
    }

    pub fn with_strip(strip: SharedStrip<D>) -> Result<Self, RegistryError> {
        Ok(Self {
            strip,
            registry: registry()?,
        })
    }

    pub fn strip(&self) -> SharedStrip<D> {
        self.strip.clone()
    }

    /// Pixels currently showing an animated effect, grouped by effect
    fn animated_pixels(&self, pending: &PendingTable) -> (Vec<usize>, Vec<usize>) {
        let mut random = Vec::new();
        let mut rainbow = Vec::new();
        for op in pending.iter() {
            let animated = self
                .registry
                .lookup(&op.command.name)
                .filter(|kind| kind.is_animated());
            let (Some(kind), Some(pixel)) = (animated, op.key.pixel()) else {
                continue;
            };
            if kind == BlinktCommand::Rainbow {
                rainbow.push(pixel);
            } else {
                random.push(pixel);
            }
        }
        (random, rainbow)
    }
}

#[async_trait]
impl<D: PixelDriver + 'static> EffectHandler for BlinktHandler<D> {
    type Kind = BlinktCommand;

    fn name(&self) -> &'static str {
        "blinkt"
    }

    fn registry(&self) -> &Registry<BlinktCommand> {
        &self.registry
    }

    async fn invoke(
        &self,
        kind: BlinktCommand,
        arguments: &Arguments,
    ) -> Result<Outcome, HandlerError> {
        let mut strip = self.strip.lock().await;
        let outcome = match kind {
            BlinktCommand::RandomColors => strip.random_colors()?,
            BlinktCommand::Rainbow => strip.rainbow()?,
            BlinktCommand::OneRgb => strip.one_rgb(decode_args(arguments)?)?,
            BlinktCommand::RangeRgb => strip.range_rgb(decode_args(arguments)?)?,
            BlinktCommand::AllRgb => strip.all_rgb(decode_args(arguments)?)?,
            BlinktCommand::Clear => strip.clear(decode_args(arguments)?)?,
        };
        Ok(outcome)
    }

    async fn revert(&self, expired: &[PendingOperation]) -> Result<(), HandlerError> {
        let pixels: Vec<usize> = expired.iter().filter_map(|op| op.key.pixel()).collect();
        if pixels.is_empty() {
            return Ok(());
        }
        self.strip.lock().await.blank(&pixels)?;
        Ok(())
    }

    async fn refresh(&self, pending: &PendingTable) -> Result<(), HandlerError> {
        let (random, rainbow) = self.animated_pixels(pending);
        if random.is_empty() && rainbow.is_empty() {
            return Ok(());
        }

        let mut strip = self.strip.lock().await;
        if !random.is_empty() {
            strip.render_random(&random)?;
        }
        if !rainbow.is_empty() {
            strip.render_rainbow(&rainbow, effects::now_centiseconds())?;
        }
        Ok(())
    }
}
