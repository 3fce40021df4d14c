//! # Register Module
//!
//! Register layout and decoding for the UPS Plus v5 board.
//!
//! This module handles:
//! - Describing where each quantity lives on the bus (device, offset, width)
//! - Per-field encoding: signedness, byte order, scale and sentinel
//! - Validating the map once at startup
//! - Pure decode functions from raw bytes to physical values

pub mod map;
pub mod decoder;

pub use map::{ByteOrder, Encoding, Quantity, RegisterField, RegisterMap};
