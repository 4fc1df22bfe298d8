//! Process-wide configuration
//!
//! Set once at startup, before the first connection attempt, and only read
//! afterwards. Every section falls back to its defaults when absent so a
//! partial file (or none at all) still yields a usable configuration.

use heapless::String;
use serde::{Deserialize, Serialize};

/// Capacity of short identifiers (SSID, user names, client id).
pub const SHORT_STR: usize = 32;
/// Capacity of secrets, host names, topics and file names.
pub const LONG_STR: usize = 64;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub internet: InternetConfig,
    pub broker: BrokerConfig,
    pub delivery: DeliveryConfig,
    pub retry: RetryPolicy,
    /// Period of the sampling loop
    pub sample_interval_ms: u32,
}

impl Config {
    /// Maximum log level implied by the `verbose` flag.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.delivery.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct InternetConfig {
    pub ssid: String<SHORT_STR>,
    pub password: String<LONG_STR>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String<LONG_STR>,
    pub port: u16,
    pub client_id: String<SHORT_STR>,
    pub user: String<SHORT_STR>,
    pub password: String<LONG_STR>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::from_truncated("localhost"),
            port: 1883,
            client_id: String::from_truncated("ESP32Client"),
            user: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Topic (or endpoint path, for HTTP transports) readings are published to
    pub topic: String<LONG_STR>,
    /// Backup log file name on the local volume. Kept 8.3 for FAT volumes.
    pub backup_file: String<LONG_STR>,
    /// Gates diagnostic output, see [`Config::log_level`]
    pub verbose: bool,
    /// Drain the backup log once the session comes back. Never done by the core itself.
    pub replay_on_reconnect: bool,
    /// Command topic subscribed to after every successful broker connect
    pub subscribe_topic: Option<String<LONG_STR>>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            topic: String::from_truncated("sensors/barometer"),
            backup_file: String::from_truncated("BACKUP.LOG"),
            verbose: false,
            replay_on_reconnect: false,
            subscribe_topic: None,
        }
    }
}

/// Bounds for the connection establisher
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub network_poll_interval_ms: u32,
    pub network_max_polls: u32,
    pub broker_backoff_ms: u32,
    pub broker_max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            network_poll_interval_ms: 500,
            network_max_polls: 20,
            broker_backoff_ms: 5000,
            broker_max_attempts: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            internet: InternetConfig::default(),
            broker: BrokerConfig::default(),
            delivery: DeliveryConfig::default(),
            retry: RetryPolicy::default(),
            sample_interval_ms: 10_000,
        }
    }
}

/// Builds a bounded string from a slice, dropping whatever does not fit.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<const N: usize> FromTruncated<&str> for String<N> {
    fn from_truncated(value: &str) -> Self {
        let mut out = String::new();
        for c in value.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        out
    }
}
