//! # Register Decoder
//!
//! Pure functions turning raw register bytes into physical values.
//!
//! Every function takes the field descriptor from the [`RegisterMap`] so byte
//! order, signedness, scale and sentinel are applied per field.
//!
//! [`RegisterMap`]: super::RegisterMap

use super::map::{ByteOrder, Encoding, RegisterField};
use crate::error::DecodeError;

/// Highest percentage a sample may report
pub const PERCENT_MAX: u8 = 100;

/// Integer assembled from a field's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawValue {
    /// Bytes as read, assembled in the field's byte order
    pub bits: u32,

    /// Value after sign extension (equals `bits` for unsigned fields)
    pub value: i64,
}

/// Battery temperature reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temperature {
    Celsius(f64),
    /// The sensor returned its sentinel value
    Unavailable,
}

impl Temperature {
    /// Temperature in °C, or `None` if unavailable
    pub fn celsius(self) -> Option<f64> {
        match self {
            Temperature::Celsius(c) => Some(c),
            Temperature::Unavailable => None,
        }
    }
}

/// Assemble the raw integer of a field
///
/// # Errors
///
/// - `TruncatedRead` if `bytes` holds fewer than `field.width` bytes
/// - `UnsupportedWidth` if the width is not 1, 2 or 4
pub fn decode_raw(field: &RegisterField, bytes: &[u8]) -> Result<RawValue, DecodeError> {
    if bytes.len() < field.width {
        return Err(DecodeError::TruncatedRead {
            expected: field.width,
            actual: bytes.len(),
        });
    }

    let mut buf = [0u8; 4];
    let bits = match (field.width, field.byte_order) {
        (1, _) => u32::from(bytes[0]),
        (2, ByteOrder::Little) => u32::from(u16::from_le_bytes([bytes[0], bytes[1]])),
        (2, ByteOrder::Big) => u32::from(u16::from_be_bytes([bytes[0], bytes[1]])),
        (4, order) => {
            buf.copy_from_slice(&bytes[..4]);
            match order {
                ByteOrder::Little => u32::from_le_bytes(buf),
                ByteOrder::Big => u32::from_be_bytes(buf),
            }
        }
        (width, _) => return Err(DecodeError::UnsupportedWidth(width)),
    };

    let value = match field.encoding {
        Encoding::Unsigned => i64::from(bits),
        Encoding::Signed => match field.width {
            1 => i64::from(bits as u8 as i8),
            2 => i64::from(bits as u16 as i16),
            _ => i64::from(bits as i32),
        },
    };

    Ok(RawValue { bits, value })
}

fn scaled(field: &RegisterField, bytes: &[u8]) -> Result<f64, DecodeError> {
    let raw = decode_raw(field, bytes)?;
    Ok(raw.value as f64 * field.scale)
}

/// Seconds since the UPS powered on
pub fn decode_uptime(field: &RegisterField, bytes: &[u8]) -> Result<u32, DecodeError> {
    Ok(decode_raw(field, bytes)?.bits)
}

/// Battery voltage in volts
pub fn decode_voltage(field: &RegisterField, bytes: &[u8]) -> Result<f64, DecodeError> {
    scaled(field, bytes)
}

/// Battery current in amps; positive while charging
pub fn decode_current(field: &RegisterField, bytes: &[u8]) -> Result<f64, DecodeError> {
    scaled(field, bytes)
}

/// Battery temperature, or [`Temperature::Unavailable`] on the sentinel value
pub fn decode_temperature(field: &RegisterField, bytes: &[u8]) -> Result<Temperature, DecodeError> {
    let raw = decode_raw(field, bytes)?;
    if field.sentinel == Some(raw.bits) {
        return Ok(Temperature::Unavailable);
    }
    Ok(Temperature::Celsius(raw.value as f64 * field.scale))
}

/// Power in watts, derived from voltage and current
///
/// Wattage is never read from a register, so it carries the sign of the current.
pub fn decode_wattage(voltage: f64, current: f64) -> f64 {
    voltage * current
}

/// Remaining capacity, clamped to 0..=100
pub fn decode_percentage(field: &RegisterField, bytes: &[u8]) -> Result<u8, DecodeError> {
    let percent = scaled(field, bytes)?.round();
    Ok(percent.clamp(0.0, f64::from(PERCENT_MAX)) as u8)
}
