//! Minion Effects daemon
//!
//! Runs the Blinkt and Dashing engines on a shared bus, fed by the MQTT
//! bridge, until Ctrl-C.

use anyhow::Result;
use minion_effects::blinkt::BlinktHandler;
use minion_effects::bus::{create_bus_with_capacity, SharedBus};
use minion_effects::config::{load_config, BlinktConfig, Config, DriverConfig};
use minion_effects::dashing::{DashingClient, DashingHandler};
use minion_effects::device::{Apa102, MemoryStrip, PixelDriver};
use minion_effects::engine::Dispatcher;
use minion_effects::error::DeviceError;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minion_effects=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Minion Effects {}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    info!(
        namespace = %config.namespace,
        blinkt = config.blinkt.enabled,
        dashing = config.dashing.enabled,
        mqtt = config.mqtt.is_some(),
        "Configuration loaded"
    );

    let bus = create_bus_with_capacity(config.bus_capacity);
    let shutdown = CancellationToken::new();
    let mut tasks = JoinSet::new();

    spawn_mqtt_bridge(&mut tasks, &config, &bus, &shutdown);

    if config.blinkt.enabled {
        match open_driver(&config.blinkt) {
            Ok(driver) => {
                let handler = Arc::new(BlinktHandler::new(driver)?);
                let engine = Dispatcher::new(
                    handler,
                    bus.clone(),
                    config.blinkt_tag(),
                    config.blinkt.poll_interval(),
                    shutdown.clone(),
                );
                tasks.spawn(engine.run());
            }
            Err(e) => warn!("Blinkt driver unavailable, engine disabled: {}", e),
        }
    }

    if config.dashing.enabled {
        let client = DashingClient::new(config.dashing.url.clone(), config.dashing.token.clone())?;
        let handler = Arc::new(DashingHandler::new(client)?);
        let engine = Dispatcher::new(
            handler,
            bus.clone(),
            config.dashing_tag(),
            config.dashing.poll_interval(),
            shutdown.clone(),
        );
        tasks.spawn(engine.run());
    }

    if tasks.is_empty() {
        warn!("No engines or bridges enabled, nothing to do");
        return Ok(());
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown.cancel();

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("Task failed during shutdown: {}", e);
        }
    }

    info!("Stopped");
    Ok(())
}

fn open_driver(config: &BlinktConfig) -> Result<Box<dyn PixelDriver>, DeviceError> {
    let mut driver: Box<dyn PixelDriver> = match &config.driver {
        DriverConfig::Apa102 { device } => {
            let mut strip = Apa102::open(device, config.num_pixels)?;
            strip.set_clear_on_exit(config.clear_on_exit);
            info!("Blinkt driver: APA102 on {}", device.display());
            Box::new(strip)
        }
        DriverConfig::Simulated => {
            info!("Blinkt driver: simulated");
            Box::new(MemoryStrip::new(config.num_pixels))
        }
    };
    driver.set_brightness(config.brightness);
    Ok(driver)
}

#[cfg(feature = "mqtt")]
fn spawn_mqtt_bridge(
    tasks: &mut JoinSet<()>,
    config: &Config,
    bus: &SharedBus,
    shutdown: &CancellationToken,
) {
    use minion_effects::mqtt::MqttBridge;

    if let Some(mqtt) = config.mqtt.clone() {
        tasks.spawn(MqttBridge::new(mqtt, bus.clone(), shutdown.clone()).run());
    }
}

#[cfg(not(feature = "mqtt"))]
fn spawn_mqtt_bridge(
    _tasks: &mut JoinSet<()>,
    config: &Config,
    _bus: &SharedBus,
    _shutdown: &CancellationToken,
) {
    if config.mqtt.is_some() {
        warn!("MQTT configured but this build has no mqtt feature");
    }
}
