//! # I2C Bus Module
//!
//! Byte-oriented register reads from devices on a single I2C bus.
//!
//! This module handles:
//! - The [`I2cBus`] trait the sampler reads through
//! - The Linux `/dev/i2c-*` implementation (`rpi` feature)
//! - A scripted in-memory bus for tests

use crate::error::TransportError;

#[cfg(feature = "rpi")]
pub mod linux;

#[cfg(feature = "rpi")]
pub use linux::RppalBus;

/// Synchronous register reads
///
/// Implementations must bound every transaction with a timeout and report it
/// as [`TransportError::Timeout`]; the bus is never accessed concurrently.
pub trait I2cBus: Send {
    /// Read `count` bytes starting at `register` on the device at `address`
    fn read(&mut self, address: u8, register: u8, count: usize) -> Result<Vec<u8>, TransportError>;
}

impl<B: I2cBus + ?Sized> I2cBus for Box<B> {
    fn read(&mut self, address: u8, register: u8, count: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(address, register, count)
    }
}
