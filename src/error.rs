//! # Error Types
//!
//! Custom error types for the UPS Plus logger using `thiserror`.
//!
//! Transport and decode failures are recoverable: the sampling loop skips the
//! tick and keeps running. Sink, configuration and report failures are fatal
//! and are surfaced to `main`.

use std::path::PathBuf;

use thiserror::Error;

use crate::registers::Quantity;

/// I2C transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The bus device could not be opened or configured
    #[error("failed to open I2C bus {bus}: {message}")]
    Open { bus: u8, message: String },

    /// The device did not answer within the adapter timeout
    #[error("read timed out (device 0x{address:02X}, register 0x{register:02X})")]
    Timeout { address: u8, register: u8 },

    /// Any other failed transaction (NACK, arbitration loss, EIO)
    #[error("bus error (device 0x{address:02X}, register 0x{register:02X}): {message}")]
    Bus {
        address: u8,
        register: u8,
        message: String,
    },
}

/// Errors turning raw register bytes into values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes were read than the field needs
    #[error("truncated read: expected {expected} bytes, got {actual}")]
    TruncatedRead { expected: usize, actual: usize },

    /// More bytes were read than the field holds
    #[error("oversized read: expected {expected} bytes, got {actual}")]
    OversizedRead { expected: usize, actual: usize },

    /// Field width the decoder cannot assemble
    #[error("unsupported field width: {0} bytes")]
    UnsupportedWidth(usize),
}

/// A single capture failed; the tick produces no sample
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("reading {field}: {source}")]
    Transport {
        field: Quantity,
        #[source]
        source: TransportError,
    },

    #[error("decoding {field}: {source}")]
    Decode {
        field: Quantity,
        #[source]
        source: DecodeError,
    },
}

impl CaptureError {
    /// The quantity whose read or decode failed
    pub fn field(&self) -> Quantity {
        match self {
            CaptureError::Transport { field, .. } | CaptureError::Decode { field, .. } => *field,
        }
    }
}

/// Record sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Record files are never overwritten
    #[error("record file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("record file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Register map is incomplete or self-contradictory
    #[error("register map: {field}: {reason}")]
    RegisterMap { field: Quantity, reason: String },
}

/// Offline report errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot open record file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record file: {0}")]
    Csv(#[from] csv::Error),

    #[error("record file contains no samples")]
    Empty,
}
