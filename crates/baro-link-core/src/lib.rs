//! Hardware-independent telemetry delivery core for baro-link
//!
//! This crate contains the platform-agnostic part of the barometric sensor
//! node: the capability traits ("ports") for the network, transport, backup
//! volume and sensor, and the resilient delivery path built on top of them.
//!
//! ```text
//!  TelemetryNode ──► DeliveryCoordinator ──► Session (LinkMonitor, network, transport)
//!                          │        └──────► ConnectionEstablisher
//!                          └───────────────► BackupStore ──► BackupVolume
//! ```
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod backup;
pub mod config;
pub mod delivery;
pub mod error;
pub mod link;
pub mod measurement;
pub mod node;
pub mod ports;

#[cfg(test)]
pub(crate) mod mock;

pub use backup::{BackupRecord, BackupStore};
pub use config::Config;
pub use delivery::{DeliveryCoordinator, DeliveryOutcome, DeliveryStats, ReplayReport};
pub use error::{EncodeError, LinkError, SensorError, StorageError, TransportError};
pub use link::{ConnectionEstablisher, LinkMonitor, LinkState, Session, SharedSession};
pub use measurement::{Measurement, Payload, SensorField};
pub use node::{NodeRunState, TelemetryNode};
