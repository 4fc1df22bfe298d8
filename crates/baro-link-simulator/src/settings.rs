//! Simulator settings loaded from a TOML file
//!
//! The file named by `BARO_LINK_CONFIG` holds a `[node]` table with the
//! device configuration and a `[simulation]` table describing the scripted
//! run. Missing tables and keys fall back to their defaults.

use std::path::Path;

use baro_link_core::Config;
use baro_link_core::config::FromTruncated;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the settings file
pub const CONFIG_ENV: &str = "BARO_LINK_CONFIG";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    pub node: Config,
    pub simulation: SimulationConfig,
}

impl Default for SimulatorConfig {
    /// Device defaults plus a command topic, so scripted commands reach the node.
    fn default() -> Self {
        let mut node = Config::default();
        node.delivery.subscribe_topic = Some(FromTruncated::from_truncated("baro/cmd"));
        Self {
            node,
            simulation: SimulationConfig::default(),
        }
    }
}

/// An inclusive range of cycles during which a link is unavailable
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outage {
    pub from: u32,
    pub until: u32,
}

impl Outage {
    pub fn covers(&self, cycle: u32) -> bool {
        (self.from..=self.until).contains(&cycle)
    }
}

/// A command the simulated broker delivers on the subscribed topic
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCommand {
    pub cycle: u32,
    pub payload: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of sampling cycles to run
    pub cycles: u32,
    /// Wall-clock factor applied to every wait; 0 runs without sleeping
    pub time_scale: f64,
    /// Directory standing in for the SD card
    pub volume_dir: String,
    /// Start with no card inserted
    pub card_absent: bool,
    pub network_outages: Vec<Outage>,
    pub broker_outages: Vec<Outage>,
    /// Cycles on which the barometer stops answering
    pub sensor_faults: Vec<Outage>,
    pub commands: Vec<ScriptedCommand>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles: 30,
            time_scale: 0.0,
            volume_dir: String::from("sim-volume"),
            card_absent: false,
            network_outages: vec![Outage { from: 5, until: 9 }],
            broker_outages: vec![Outage {
                from: 15,
                until: 17,
            }],
            sensor_faults: Vec::new(),
            commands: vec![ScriptedCommand {
                cycle: 20,
                payload: String::from("replay"),
            }],
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SimulatorConfig {
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Settings from the file named by [`CONFIG_ENV`], or defaults when unset.
    pub fn from_env() -> Result<Self, SettingsError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
