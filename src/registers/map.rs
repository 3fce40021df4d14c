//! # Register Map
//!
//! Static description of the UPS Plus v5 register layout.
//!
//! ## Layout
//!
//! The board's MCU (default address `0x17`) exposes a flat byte-addressed
//! register file. Multi-byte values are little-endian:
//!
//! | Register      | Quantity                        | Encoding      |
//! |---------------|---------------------------------|---------------|
//! | `0x05..=0x06` | Battery voltage (mV)            | u16 LE        |
//! | `0x0B..=0x0C` | Battery temperature (°C)        | u16 LE        |
//! | `0x13..=0x14` | Remaining capacity (%)          | u16 LE        |
//! | `0x24..=0x27` | Running time this session (s)   | u32 LE        |
//!
//! Battery current is not exposed by the MCU. It is read from the
//! battery-side monitor (address `0x45`), register `0x01`: signed milliamps,
//! **big-endian**, positive while charging. The mA to A step is the fixed
//! [`MILLI`] factor.
//!
//! Boards whose monitor only exposes the raw INA219 shunt voltage there
//! (10 µV per LSB across 5 mΩ, discharge positive) override the current
//! scale with [`INA219_SHUNT_CURRENT_SCALE`].
//!
//! Byte order is carried per field because both conventions occur on the same
//! bus.

use std::fmt;

use serde::Deserialize;

use crate::config::{BusConfig, FieldOverride, RegistersConfig};
use crate::error::ConfigError;

/// Battery-side INA219 address on the UPS Plus v5
pub const INA219_BATTERY_ADDR: u8 = 0x45;

/// Battery monitor register holding the battery current in signed mA
pub const REG_BATTERY_CURRENT: u8 = 0x01;

/// Amps per raw INA219 shunt-voltage LSB, sign-flipped (10 µV / 5 mΩ)
pub const INA219_SHUNT_CURRENT_SCALE: f64 = -0.002;

/// MCU register holding the battery voltage in mV
pub const REG_BATTERY_VOLTAGE: u8 = 0x05;

/// MCU register holding the battery temperature in °C
pub const REG_BATTERY_TEMPERATURE: u8 = 0x0B;

/// MCU register holding the remaining capacity in percent
pub const REG_BATTERY_REMAINING: u8 = 0x13;

/// MCU register holding the running time of this power-on session
pub const REG_UPTIME: u8 = 0x24;

/// Raw temperature reported when the sensor is absent or unreadable
pub const TEMPERATURE_SENTINEL: u32 = 0xFFFF;

/// Milli-unit to unit (mV to V, mA to A)
pub const MILLI: f64 = 0.001;

/// Lowest and highest non-reserved 7-bit I2C addresses
const I2C_ADDR_MIN: u8 = 0x03;
const I2C_ADDR_MAX: u8 = 0x77;

/// Number of quantities in a sample
const FIELD_COUNT: usize = 5;

/// Logical quantities that make up a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Uptime,
    Voltage,
    Current,
    Temperature,
    Percentage,
}

impl Quantity {
    /// All quantities, in capture order
    pub const ALL: [Quantity; FIELD_COUNT] = [
        Quantity::Uptime,
        Quantity::Voltage,
        Quantity::Current,
        Quantity::Temperature,
        Quantity::Percentage,
    ];

    /// Lower-case name used in logs and config keys
    pub fn name(self) -> &'static str {
        match self {
            Quantity::Uptime => "uptime",
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
            Quantity::Temperature => "temperature",
            Quantity::Percentage => "percentage",
        }
    }

    /// Physical unit after scaling
    pub fn unit(self) -> &'static str {
        match self {
            Quantity::Uptime => "s",
            Quantity::Voltage => "V",
            Quantity::Current => "A",
            Quantity::Temperature => "°C",
            Quantity::Percentage => "%",
        }
    }

    /// Required signedness for this quantity
    fn expected_encoding(self) -> Encoding {
        match self {
            Quantity::Current => Encoding::Signed,
            _ => Encoding::Unsigned,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer interpretation of a register field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Unsigned,
    /// Two's complement
    Signed,
}

/// Byte order of a multi-byte register field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

/// One decodable quantity on the bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterField {
    /// Which quantity this field holds
    pub quantity: Quantity,

    /// 7-bit I2C device address
    pub address: u8,

    /// First register of the field
    pub offset: u8,

    /// Width in bytes (1, 2 or 4)
    pub width: usize,

    pub encoding: Encoding,

    pub byte_order: ByteOrder,

    /// Physical value = raw × scale
    pub scale: f64,

    /// Raw value meaning "no valid reading"
    pub sentinel: Option<u32>,

    /// Physical unit after scaling
    pub unit: &'static str,
}

impl RegisterField {
    /// Unsigned little-endian field with unit scale, the MCU's native layout
    pub const fn mcu(quantity: Quantity, address: u8, offset: u8, width: usize) -> Self {
        Self {
            quantity,
            address,
            offset,
            width,
            encoding: Encoding::Unsigned,
            byte_order: ByteOrder::Little,
            scale: 1.0,
            sentinel: None,
            unit: "",
        }
    }

    /// Default descriptor for `quantity`, with MCU fields at `device_address`
    pub fn default_for(quantity: Quantity, device_address: u8) -> Self {
        let field = match quantity {
            Quantity::Uptime => Self::mcu(quantity, device_address, REG_UPTIME, 4),
            Quantity::Voltage => Self {
                scale: MILLI,
                ..Self::mcu(quantity, device_address, REG_BATTERY_VOLTAGE, 2)
            },
            Quantity::Current => Self {
                quantity,
                address: INA219_BATTERY_ADDR,
                offset: REG_BATTERY_CURRENT,
                width: 2,
                encoding: Encoding::Signed,
                byte_order: ByteOrder::Big,
                scale: MILLI,
                sentinel: None,
                unit: "",
            },
            Quantity::Temperature => Self {
                sentinel: Some(TEMPERATURE_SENTINEL),
                ..Self::mcu(quantity, device_address, REG_BATTERY_TEMPERATURE, 2)
            },
            Quantity::Percentage => {
                Self::mcu(quantity, device_address, REG_BATTERY_REMAINING, 2)
            }
        };
        Self {
            unit: quantity.unit(),
            ..field
        }
    }

    /// Apply the keys present in a config override
    pub fn with_override(self, o: &FieldOverride) -> Self {
        Self {
            address: o.address.unwrap_or(self.address),
            offset: o.offset.unwrap_or(self.offset),
            width: o.width.unwrap_or(self.width),
            encoding: o.encoding.unwrap_or(self.encoding),
            byte_order: o.byte_order.unwrap_or(self.byte_order),
            scale: o.scale.unwrap_or(self.scale),
            sentinel: o.sentinel.or(self.sentinel),
            ..self
        }
    }

    /// Registers covered by the field, end exclusive
    fn span(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.width
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::RegisterMap {
            field: self.quantity,
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(I2C_ADDR_MIN..=I2C_ADDR_MAX).contains(&self.address) {
            return Err(self.invalid(format!(
                "device address 0x{:02X} is outside 0x{:02X}..=0x{:02X}",
                self.address, I2C_ADDR_MIN, I2C_ADDR_MAX
            )));
        }

        if ![1, 2, 4].contains(&self.width) {
            return Err(self.invalid(format!("width {} must be 1, 2 or 4", self.width)));
        }

        if self.span().end > 0x100 {
            return Err(self.invalid(format!(
                "offset 0x{:02X} + width {} runs past the register file",
                self.offset, self.width
            )));
        }

        if self.encoding != self.quantity.expected_encoding() {
            return Err(self.invalid(format!(
                "encoding must be {:?}",
                self.quantity.expected_encoding()
            )));
        }

        if !self.scale.is_finite() || self.scale == 0.0 {
            return Err(self.invalid("scale must be finite and non-zero"));
        }

        if self.quantity == Quantity::Uptime && self.scale != 1.0 {
            return Err(self.invalid("uptime is counted in whole seconds, scale must be 1"));
        }

        if let Some(sentinel) = self.sentinel {
            if self.width < 4 && u64::from(sentinel) >= 1u64 << (8 * self.width) {
                return Err(self.invalid(format!(
                    "sentinel 0x{:X} does not fit in {} bytes",
                    sentinel, self.width
                )));
            }
        }

        Ok(())
    }
}

/// Validated register map, one field per quantity
///
/// Construction is the only fallible step; lookups never fail.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMap {
    fields: [RegisterField; FIELD_COUNT],
}

impl RegisterMap {
    /// Build a map from explicit field descriptors
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::RegisterMap` if:
    /// - A quantity is missing or defined twice
    /// - A field has an invalid width, encoding, scale, sentinel or address
    /// - Two fields on the same device overlap
    pub fn new(fields: impl IntoIterator<Item = RegisterField>) -> Result<Self, ConfigError> {
        let mut slots: [Option<RegisterField>; FIELD_COUNT] = [None; FIELD_COUNT];

        for field in fields {
            field.validate()?;
            let slot = &mut slots[field.quantity.index()];
            if slot.is_some() {
                return Err(field.invalid("defined more than once"));
            }
            *slot = Some(field);
        }

        let mut resolved = Vec::with_capacity(slots.len());
        for (quantity, slot) in Quantity::ALL.iter().zip(slots) {
            match slot {
                Some(field) => resolved.push(field),
                None => {
                    return Err(ConfigError::RegisterMap {
                        field: *quantity,
                        reason: "not defined".to_string(),
                    })
                }
            }
        }

        for (i, a) in resolved.iter().enumerate() {
            for b in &resolved[i + 1..] {
                let (ra, rb) = (a.span(), b.span());
                if a.address == b.address && ra.start < rb.end && rb.start < ra.end {
                    return Err(b.invalid(format!(
                        "overlaps {} at device 0x{:02X}",
                        a.quantity, a.address
                    )));
                }
            }
        }

        let fields = [
            resolved[0],
            resolved[1],
            resolved[2],
            resolved[3],
            resolved[4],
        ];
        Ok(Self { fields })
    }

    /// Build the default map, adjusted by the `[bus]` and `[registers]` config
    pub fn from_config(bus: &BusConfig, registers: &RegistersConfig) -> Result<Self, ConfigError> {
        Self::new(Quantity::ALL.iter().map(|&quantity| {
            let field = RegisterField::default_for(quantity, bus.device_address);
            match registers.get(quantity) {
                Some(o) => field.with_override(o),
                None => field,
            }
        }))
    }

    /// Descriptor for a quantity
    pub fn field(&self, quantity: Quantity) -> &RegisterField {
        &self.fields[quantity.index()]
    }

    /// Fields in capture order
    pub fn iter(&self) -> impl Iterator<Item = &RegisterField> {
        self.fields.iter()
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            fields: Quantity::ALL
                .map(|q| RegisterField::default_for(q, crate::config::UPS_DEVICE_ADDR)),
        }
    }
}
