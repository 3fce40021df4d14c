//! # Sample
//!
//! One fully decoded reading of the UPS.

use chrono::{DateTime, Utc};

use crate::registers::decoder::{Temperature, PERCENT_MAX};

/// Decoded reading, immutable once built
///
/// A sample only exists if every field decoded; there is no partial form.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    timestamp: DateTime<Utc>,
    uptime_s: u32,
    voltage_v: f64,
    current_a: f64,
    temperature: Temperature,
    wattage_w: f64,
    percent: u8,
}

impl Sample {
    /// Assemble a sample; `percent` is clamped to 0..=100
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        uptime_s: u32,
        voltage_v: f64,
        current_a: f64,
        temperature: Temperature,
        wattage_w: f64,
        percent: u8,
    ) -> Self {
        Self {
            timestamp,
            uptime_s,
            voltage_v,
            current_a,
            temperature,
            wattage_w,
            percent: percent.min(PERCENT_MAX),
        }
    }

    /// Same reading with a different capture time
    #[must_use]
    pub fn restamped(self, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, ..self }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Seconds since the UPS powered on
    pub fn uptime_s(&self) -> u32 {
        self.uptime_s
    }

    pub fn voltage_v(&self) -> f64 {
        self.voltage_v
    }

    /// Battery current; positive while charging
    pub fn current_a(&self) -> f64 {
        self.current_a
    }

    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn wattage_w(&self) -> f64 {
        self.wattage_w
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }
}

/// Wall-clock source for capture timestamps
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

/// System time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
