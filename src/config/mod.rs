//! Configuration management
//!
//! Layered as: built-in defaults, then an optional config file, then
//! `MINION_*` environment variables (`__` separates nested keys, e.g.
//! `MINION_DASHING__URL`). The file is `config.{toml,json,yaml}` in the
//! platform config directory unless `MINION_CONFIG` names one explicitly.

use anyhow::{Context, Result};
use minion_events::{minion_tag, DEFAULT_NAMESPACE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bus::DEFAULT_BUS_CAPACITY;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "MINION_CONFIG";

const ENV_PREFIX: &str = "MINION";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// First segment of the event tags, `/<namespace>/minion/<device>`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub blinkt: BlinktConfig,

    #[serde(default)]
    pub dashing: DashingConfig,

    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_bus_capacity() -> usize {
    DEFAULT_BUS_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            bus_capacity: default_bus_capacity(),
            blinkt: BlinktConfig::default(),
            dashing: DashingConfig::default(),
            mqtt: None,
        }
    }
}

impl Config {
    /// Tag consumed by the Blinkt engine
    pub fn blinkt_tag(&self) -> String {
        self.blinkt
            .tag
            .clone()
            .unwrap_or_else(|| minion_tag(&self.namespace, "blinkt"))
    }

    /// Tag consumed by the Dashing engine
    pub fn dashing_tag(&self) -> String {
        self.dashing
            .tag
            .clone()
            .unwrap_or_else(|| minion_tag(&self.namespace, "dashing"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlinktConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the namespace-derived tag
    pub tag: Option<String>,

    #[serde(default = "default_blinkt_poll_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_num_pixels")]
    pub num_pixels: usize,

    /// Initial global brightness, 0.0 to 1.0
    #[serde(default = "default_brightness")]
    pub brightness: f32,

    #[serde(default)]
    pub driver: DriverConfig,

    /// Blank the strip when the engine stops
    #[serde(default = "default_true")]
    pub clear_on_exit: bool,
}

impl Default for BlinktConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tag: None,
            poll_interval_ms: default_blinkt_poll_ms(),
            num_pixels: default_num_pixels(),
            brightness: default_brightness(),
            driver: DriverConfig::default(),
            clear_on_exit: true,
        }
    }
}

impl BlinktConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_true() -> bool {
    true
}

// Animated effects redraw once per poll
fn default_blinkt_poll_ms() -> u64 {
    100
}

fn default_num_pixels() -> usize {
    crate::device::BLINKT_PIXELS
}

fn default_brightness() -> f32 {
    0.2
}

/// Which pixel driver the Blinkt engine writes to
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverConfig {
    /// APA102 strip behind a spidev device
    Apa102 {
        #[serde(default = "default_spi_device")]
        device: PathBuf,
    },
    /// In-memory strip, frames are only logged
    Simulated,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::Apa102 {
            device: default_spi_device(),
        }
    }
}

fn default_spi_device() -> PathBuf {
    PathBuf::from("/dev/spidev0.0")
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub tag: Option<String>,

    #[serde(default = "default_dashing_poll_ms")]
    pub poll_interval_ms: u64,

    /// Dashboard used when a call does not name one
    pub url: Option<String>,

    /// Auth token used when a call does not carry one
    pub token: Option<String>,
}

impl Default for DashingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tag: None,
            poll_interval_ms: default_dashing_poll_ms(),
            url: None,
            token: None,
        }
    }
}

impl DashingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_dashing_poll_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Topic filters bridged onto the bus
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "minion-effects".to_string()
}

fn default_topics() -> Vec<String> {
    vec![format!("/{}/minion/#", DEFAULT_NAMESPACE)]
}

/// Platform config directory, falling back to the working directory
pub fn get_config_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "minion-effects", "minion-effects")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load configuration from `MINION_CONFIG` or the platform config directory
pub fn load_config() -> Result<Config> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => load_config_from(Some(Path::new(&path))),
        None => load_config_from(None),
    }
}

/// Load configuration from an explicit file (which must exist), or from the
/// optional default file when `path` is `None`
pub fn load_config_from(path: Option<&Path>) -> Result<Config> {
    let file = match path {
        Some(path) => ::config::File::from(path).required(true),
        None => {
            let default = get_config_dir().join("config");
            ::config::File::with_name(&default.to_string_lossy()).required(false)
        }
    };

    let config = ::config::Config::builder()
        .set_default("namespace", DEFAULT_NAMESPACE)?
        .add_source(file)
        // MINION_DASHING__URL, MINION_BLINKT__DRIVER__KIND, MINION_MQTT__TOPICS=a,b
        .add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("mqtt.topics")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?;

    config
        .try_deserialize()
        .context("Invalid configuration")
}
