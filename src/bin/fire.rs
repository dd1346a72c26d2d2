//! minion-fire - send Blinkt and Dashing commands to a minion over MQTT
//!
//! ```text
//! minion-fire blinkt one_rgb pixel=5 red=255 green=120 blue=10 timeout=10
//! minion-fire blinkt clear start=2 end=4
//! minion-fire dashing widget_post widget=karma widget_data='{"current": 42}'
//! minion-fire dashing dashboard_reload
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use minion_effects::blinkt::BlinktModule;
use minion_effects::config::{load_config, Config};
use minion_effects::dashing::{DashingClient, DashingModule};
use minion_effects::mqtt::MqttPublisher;
use minion_effects::CallResult;
use rumqttc::{Event, EventLoop, Packet};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minion-fire")]
#[command(about = "Fire effect commands at a minion over MQTT", long_about = None)]
struct Cli {
    #[command(subcommand)]
    target: Target,

    /// Seconds to wait for the broker to acknowledge the publish
    #[arg(long, global = true, default_value = "10")]
    wait: u64,
}

#[derive(Subcommand)]
enum Target {
    /// Blinkt LED strip (random_colors, rainbow, one_rgb, range_rgb, all_rgb, clear)
    Blinkt {
        function: String,

        /// Keyword arguments as key=value
        #[arg(value_parser = parse_key_value)]
        args: Vec<(String, Value)>,
    },

    /// Dashing dashboard (widget_post, clear, dashboard_reload)
    Dashing {
        function: String,

        /// Keyword arguments as key=value
        #[arg(value_parser = parse_key_value)]
        args: Vec<(String, Value)>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minion_effects=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config()?;
    let wait = Duration::from_secs(cli.wait);

    let result = match cli.target {
        Target::Blinkt { function, args } => fire_blinkt(&config, &function, args, wait).await?,
        Target::Dashing { function, args } => {
            if function == "dashboard_reload" {
                return dashboard_reload(&config, args).await;
            }
            fire_dashing(&config, &function, args, wait).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn fire_blinkt(
    config: &Config,
    function: &str,
    args: Vec<(String, Value)>,
    wait: Duration,
) -> Result<CallResult> {
    let (mut kwargs, timeout) = split_timeout(args)?;
    let (publisher, mut eventloop) = connect(config)?;
    let module = BlinktModule::new(Some(publisher.clone()))
        .with_tag(config.blinkt_tag())
        .with_num_pixels(config.blinkt.num_pixels);

    let result = match function {
        "random_colors" | "random_blink_colors" => module.random_colors(timeout).await,
        "rainbow" => module.rainbow(timeout).await,
        "one_rgb" => module.one_rgb(decode(&mut kwargs)?, timeout).await,
        "range_rgb" => module.range_rgb(decode(&mut kwargs)?, timeout).await,
        "all_rgb" => module.all_rgb(decode(&mut kwargs)?, timeout).await,
        "clear" => module.clear(decode(&mut kwargs)?, timeout).await,
        other => bail!("Unknown blinkt function '{}'", other),
    };

    if result.result {
        flush(&publisher, &mut eventloop, wait).await?;
    }
    Ok(result)
}

async fn fire_dashing(
    config: &Config,
    function: &str,
    args: Vec<(String, Value)>,
    wait: Duration,
) -> Result<CallResult> {
    let (mut kwargs, timeout) = split_timeout(args)?;
    check_dashing_timeout(function, timeout)?;
    let (publisher, mut eventloop) = connect(config)?;
    let module = DashingModule::new(Some(publisher.clone())).with_tag(config.dashing_tag());

    let result = match function {
        "widget_post" => module.widget_post(decode(&mut kwargs)?, timeout).await,
        "clear" => module.clear(decode(&mut kwargs)?).await,
        other => bail!("Unknown dashing function '{}'", other),
    };

    if result.result {
        flush(&publisher, &mut eventloop, wait).await?;
    }
    Ok(result)
}

async fn dashboard_reload(config: &Config, args: Vec<(String, Value)>) -> Result<()> {
    let kwargs: Map<String, Value> = args.into_iter().collect();
    let url = kwargs.get("dashing_url").and_then(Value::as_str);
    let token = kwargs.get("token").and_then(Value::as_str);

    let client = DashingClient::new(config.dashing.url.clone(), config.dashing.token.clone())?;
    let response = client.dashboard_reload(url, token).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn connect(config: &Config) -> Result<(Arc<MqttPublisher>, EventLoop)> {
    let mqtt = config
        .mqtt
        .as_ref()
        .ok_or_else(|| anyhow!("No MQTT broker configured (set MINION_MQTT__HOST)"))?;
    let client_id = format!("{}-fire-{}", mqtt.client_id, std::process::id());
    let (publisher, eventloop) = MqttPublisher::connect(mqtt, &client_id);
    Ok((Arc::new(publisher), eventloop))
}

/// Drive the event loop until the broker acknowledges the publish
async fn flush(publisher: &MqttPublisher, eventloop: &mut EventLoop, wait: Duration) -> Result<()> {
    let acked = tokio::time::timeout(wait, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::PubAck(_))) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(anyhow!("MQTT connection failed: {}", e)),
            }
        }
    })
    .await
    .context("Timed out waiting for the broker to acknowledge")?;
    acked?;

    publisher.disconnect().await;
    // Let the disconnect packet go out
    let _ = tokio::time::timeout(Duration::from_secs(1), eventloop.poll()).await;
    Ok(())
}

/// Pull `timeout` out of the keyword arguments
fn split_timeout(args: Vec<(String, Value)>) -> Result<(Map<String, Value>, Option<f64>)> {
    let mut kwargs: Map<String, Value> = args.into_iter().collect();
    let timeout = match kwargs.remove("timeout") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_f64()
                .ok_or_else(|| anyhow!("timeout must be a number of seconds"))?,
        ),
    };
    Ok((kwargs, timeout))
}

/// `dashing clear` resets a widget immediately and takes no timeout
fn check_dashing_timeout(function: &str, timeout: Option<f64>) -> Result<()> {
    if function == "clear" && timeout.is_some() {
        bail!("dashing clear does not take a timeout");
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(kwargs: &mut Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(std::mem::take(kwargs))).context("Invalid arguments")
}

fn parse_key_value(arg: &str) -> Result<(String, Value), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", arg))?;
    if key.is_empty() {
        return Err(format!("missing key in '{}'", arg));
    }
    Ok((key.to_string(), parse_value(value)))
}

/// Integer, then float, then any JSON, then a plain string
fn parse_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
