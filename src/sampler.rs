//! # Sampler
//!
//! One full read cycle: bus reads for every mapped field, decode, and
//! assembly into a timestamped [`Sample`].
//!
//! A capture either yields a complete sample or fails as a whole; the error
//! names the quantity whose read or decode went wrong. Nothing is carried from
//! one capture to the next.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bus::I2cBus;
use crate::error::{CaptureError, DecodeError};
use crate::registers::decoder::{
    decode_current, decode_percentage, decode_temperature, decode_uptime, decode_voltage,
    decode_wattage,
};
use crate::registers::{Quantity, RegisterField, RegisterMap};
use crate::sample::{Clock, Sample, SystemClock};

/// Reads and decodes one sample per call
pub struct Sampler<B, C = SystemClock> {
    bus: B,
    map: RegisterMap,
    clock: C,
}

impl<B: I2cBus> Sampler<B> {
    /// Sampler stamping samples with system time
    pub fn new(bus: B, map: RegisterMap) -> Self {
        Self::with_clock(bus, map, SystemClock)
    }
}

impl<B: I2cBus, C: Clock> Sampler<B, C> {
    pub fn with_clock(bus: B, map: RegisterMap, clock: C) -> Self {
        Self { bus, map, clock }
    }

    /// Current time on the sampler's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read exactly `field.width` bytes for one field
    fn read_field(&mut self, field: &RegisterField) -> Result<Vec<u8>, CaptureError> {
        let bytes = self
            .bus
            .read(field.address, field.offset, field.width)
            .map_err(|source| CaptureError::Transport {
                field: field.quantity,
                source,
            })?;

        let (expected, actual) = (field.width, bytes.len());
        if actual > expected {
            return Err(decode_error(field.quantity)(DecodeError::OversizedRead {
                expected,
                actual,
            }));
        }
        if actual < expected {
            return Err(decode_error(field.quantity)(DecodeError::TruncatedRead {
                expected,
                actual,
            }));
        }
        Ok(bytes)
    }

    /// Capture one sample
    ///
    /// # Errors
    ///
    /// Returns `CaptureError` if any bus read fails or times out, returns the
    /// wrong number of bytes, or cannot be decoded. No partial sample is
    /// produced.
    pub fn capture(&mut self) -> Result<Sample, CaptureError> {
        let uptime = *self.map.field(Quantity::Uptime);
        let voltage = *self.map.field(Quantity::Voltage);
        let current = *self.map.field(Quantity::Current);
        let temperature = *self.map.field(Quantity::Temperature);
        let percentage = *self.map.field(Quantity::Percentage);

        let raw = self.read_field(&uptime)?;
        let uptime_s = decode_uptime(&uptime, &raw).map_err(decode_error(Quantity::Uptime))?;

        let raw = self.read_field(&voltage)?;
        let voltage_v = decode_voltage(&voltage, &raw).map_err(decode_error(Quantity::Voltage))?;

        let raw = self.read_field(&current)?;
        let current_a = decode_current(&current, &raw).map_err(decode_error(Quantity::Current))?;

        let raw = self.read_field(&temperature)?;
        let temperature_c =
            decode_temperature(&temperature, &raw).map_err(decode_error(Quantity::Temperature))?;

        let raw = self.read_field(&percentage)?;
        let percent =
            decode_percentage(&percentage, &raw).map_err(decode_error(Quantity::Percentage))?;

        let wattage_w = decode_wattage(voltage_v, current_a);

        let sample = Sample::new(
            self.clock.now(),
            uptime_s,
            voltage_v,
            current_a,
            temperature_c,
            wattage_w,
            percent,
        );
        debug!("Captured {:?}", sample);
        Ok(sample)
    }
}

fn decode_error(field: Quantity) -> impl FnOnce(DecodeError) -> CaptureError {
    move |source| CaptureError::Decode { field, source }
}
