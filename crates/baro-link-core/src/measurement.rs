//! Measurements and their wire payload
//!
//! A [`Measurement`] is produced once per sampling cycle and encoded into a
//! bounded [`Payload`]. The same text is published live and, when delivery
//! fails, written verbatim as one line of the backup log.
//!
//! Payload format is a flat JSON object with two-decimal values:
//!
//! ```text
//! {"ts":1700000000,"pressure":101325.00,"temperature":21.50}
//! ```

use core::fmt::Write;

use heapless::{String, Vec};

use crate::error::{EncodeError, SensorError};
use crate::ports::Barometer;

/// Maximum number of readings carried by one measurement
pub const MAX_FIELDS: usize = 4;

/// Capacity of an encoded payload in bytes
pub const PAYLOAD_CAPACITY: usize = 128;

pub type Payload = String<PAYLOAD_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorField {
    /// Pascals
    Pressure,
    /// Degrees Celsius
    Temperature,
}

impl SensorField {
    /// Key used in the payload
    pub const fn key(self) -> &'static str {
        match self {
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub field: SensorField,
    pub value: f32,
}

/// One timestamped set of sensor readings
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    timestamp: u32,
    readings: Vec<Reading, MAX_FIELDS>,
}

impl Measurement {
    pub fn new(timestamp: u32) -> Self {
        Self {
            timestamp,
            readings: Vec::new(),
        }
    }

    /// Add a reading. Builder style since measurements are immutable once handed out.
    pub fn with(mut self, field: SensorField, value: f32) -> Result<Self, EncodeError> {
        self.readings
            .push(Reading { field, value })
            .map_err(|_| EncodeError::TooManyFields { max: MAX_FIELDS })?;
        Ok(self)
    }

    /// Sample pressure and temperature from a barometer.
    pub async fn sample<B: Barometer>(sensor: &mut B, timestamp: u32) -> Result<Self, SensorError> {
        let pressure = sensor.read_pressure().await?;
        let temperature = sensor.read_temperature().await?;

        let mut readings = Vec::new();
        // Two readings always fit in MAX_FIELDS.
        let _ = readings.push(Reading {
            field: SensorField::Pressure,
            value: pressure,
        });
        let _ = readings.push(Reading {
            field: SensorField::Temperature,
            value: temperature,
        });

        Ok(Self {
            timestamp,
            readings,
        })
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn get(&self, field: SensorField) -> Option<f32> {
        self.readings
            .iter()
            .find(|r| r.field == field)
            .map(|r| r.value)
    }

    /// Encode into the wire payload.
    pub fn encode(&self) -> Result<Payload, EncodeError> {
        let mut out = Payload::new();
        self.write_json(&mut out)
            .map_err(|_| EncodeError::PayloadTooLarge {
                capacity: PAYLOAD_CAPACITY,
            })?;
        Ok(out)
    }

    fn write_json(&self, out: &mut Payload) -> core::fmt::Result {
        write!(out, "{{\"ts\":{}", self.timestamp)?;
        for reading in &self.readings {
            write!(out, ",\"{}\":", reading.field.key())?;
            if reading.value.is_finite() {
                write!(out, "{:.2}", reading.value)?;
            } else {
                out.write_str("null")?;
            }
        }
        out.write_char('}')
    }
}
