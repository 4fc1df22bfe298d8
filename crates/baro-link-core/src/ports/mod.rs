//! Capability traits the delivery path is written against
//!
//! Each port stands in for one external collaborator. Firmware plugs in
//! drivers for the real radio, MQTT client, SD card and sensor; the simulator
//! and the tests plug in scripted fakes.
//!
//! - **NetworkLink**: link-layer association (Wi-Fi)
//! - **Transport**: broker session used for publish/subscribe
//! - **BackupVolume**: durable storage for the backup log
//! - **Barometer**: the pressure/temperature sensor

pub mod network;
pub mod sensor;
pub mod transport;
pub mod volume;

pub use network::NetworkLink;
pub use sensor::Barometer;
pub use transport::{InboundMessage, Transport};
pub use volume::BackupVolume;
