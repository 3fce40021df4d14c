//! Linux `/dev/i2c-*` bus via `rppal`

use std::io;

use rppal::i2c::{Error as I2cError, I2c};
use tracing::{debug, info};

use super::I2cBus;
use crate::error::TransportError;

/// I2C adapter handle
///
/// Owns the bus file descriptor and re-targets the slave address only when a
/// read goes to a different device than the previous one.
pub struct RppalBus {
    i2c: I2c,
    bus: u8,
    current_address: Option<u8>,
}

impl std::fmt::Debug for RppalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RppalBus")
            .field("bus", &self.bus)
            .field("current_address", &self.current_address)
            .finish_non_exhaustive()
    }
}

impl RppalBus {
    /// Open `/dev/i2c-{bus}` and bound every transaction by `timeout_ms`
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Open` if the device node cannot be opened or
    /// the adapter rejects the timeout.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use upsplus_logger::bus::RppalBus;
    ///
    /// let bus = RppalBus::open(1, 100)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(bus: u8, timeout_ms: u32) -> Result<Self, TransportError> {
        let open_err = |e: I2cError| TransportError::Open {
            bus,
            message: e.to_string(),
        };

        let i2c = I2c::with_bus(bus).map_err(open_err)?;
        i2c.set_timeout(timeout_ms).map_err(open_err)?;

        info!("Opened /dev/i2c-{} (timeout {}ms)", bus, timeout_ms);
        Ok(Self {
            i2c,
            bus,
            current_address: None,
        })
    }

    fn select(&mut self, address: u8, register: u8) -> Result<(), TransportError> {
        if self.current_address != Some(address) {
            self.i2c
                .set_slave_address(u16::from(address))
                .map_err(|e| map_error(e, address, register))?;
            self.current_address = Some(address);
        }
        Ok(())
    }
}

impl I2cBus for RppalBus {
    fn read(&mut self, address: u8, register: u8, count: usize) -> Result<Vec<u8>, TransportError> {
        self.select(address, register)?;

        let mut buf = vec![0u8; count];
        self.i2c
            .write_read(&[register], &mut buf)
            .map_err(|e| map_error(e, address, register))?;

        debug!("Read 0x{:02X}[0x{:02X}..+{}] = {:02X?}", address, register, count, buf);
        Ok(buf)
    }
}

fn map_error(err: I2cError, address: u8, register: u8) -> TransportError {
    match err {
        I2cError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut => {
            TransportError::Timeout { address, register }
        }
        other => TransportError::Bus {
            address,
            register,
            message: other.to_string(),
        },
    }
}
