//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and key is optional; an empty file yields the defaults that
//! match a stock UPS Plus v5 on `/dev/i2c-1`.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::registers::{ByteOrder, Encoding, Quantity};

/// UPS Plus v5 MCU address
pub const UPS_DEVICE_ADDR: u8 = 0x17;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
    pub sampling: SamplingConfig,
    pub output: OutputConfig,
    pub registers: RegistersConfig,
}

/// I2C bus configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    /// Bus number, i.e. `/dev/i2c-N`
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,

    #[serde(default = "default_device_address")]
    pub device_address: u8,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u32,
}

/// Sampling loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Record file configuration
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

/// Per-quantity register overrides
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RegistersConfig {
    pub uptime: Option<FieldOverride>,
    pub voltage: Option<FieldOverride>,
    pub current: Option<FieldOverride>,
    pub temperature: Option<FieldOverride>,
    pub percentage: Option<FieldOverride>,
}

impl RegistersConfig {
    /// Override for a quantity, if configured
    pub fn get(&self, quantity: Quantity) -> Option<&FieldOverride> {
        match quantity {
            Quantity::Uptime => self.uptime.as_ref(),
            Quantity::Voltage => self.voltage.as_ref(),
            Quantity::Current => self.current.as_ref(),
            Quantity::Temperature => self.temperature.as_ref(),
            Quantity::Percentage => self.percentage.as_ref(),
        }
    }
}

/// Register field keys; absent keys keep the built-in layout
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FieldOverride {
    pub address: Option<u8>,
    pub offset: Option<u8>,
    pub width: Option<usize>,
    pub encoding: Option<Encoding>,
    pub byte_order: Option<ByteOrder>,
    pub scale: Option<f64>,
    pub sentinel: Option<u32>,
}

// Default value functions
fn default_i2c_bus() -> u8 { 1 }
fn default_device_address() -> u8 { UPS_DEVICE_ADDR }
fn default_read_timeout_ms() -> u32 { 100 }

fn default_interval_ms() -> u64 { 5000 }

fn default_output_directory() -> String { ".".to_string() }
fn default_file_prefix() -> String { "batt_log_".to_string() }

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            i2c_bus: default_i2c_bus(),
            device_address: default_device_address(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            file_prefix: default_file_prefix(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use upsplus_logger::config::Config;
    ///
    /// let config = Config::load("upsplus-logger.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Register fields are checked separately when the
    /// [`RegisterMap`](crate::registers::RegisterMap) is built.
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0x03..=0x77).contains(&self.bus.device_address) {
            return Err(ConfigError::Invalid(format!(
                "device_address 0x{:02X} must be between 0x03 and 0x77",
                self.bus.device_address
            )));
        }

        if self.bus.read_timeout_ms == 0 || self.bus.read_timeout_ms > 10000 {
            return Err(ConfigError::Invalid(
                "read_timeout_ms must be between 1 and 10000".to_string(),
            ));
        }

        if self.sampling.interval_ms < 100 || self.sampling.interval_ms > 3_600_000 {
            return Err(ConfigError::Invalid(
                "interval_ms must be between 100 and 3600000".to_string(),
            ));
        }

        // A read that may outlast the tick would starve the schedule
        if u64::from(self.bus.read_timeout_ms) >= self.sampling.interval_ms {
            return Err(ConfigError::Invalid(
                "read_timeout_ms must be shorter than interval_ms".to_string(),
            ));
        }

        if self.output.directory.is_empty() {
            return Err(ConfigError::Invalid(
                "output directory cannot be empty".to_string(),
            ));
        }

        if self.output.file_prefix.is_empty() || self.output.file_prefix.contains('/') {
            return Err(ConfigError::Invalid(
                "file_prefix must be a non-empty file name fragment".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn load_str(toml_content: &str) -> Result<Config, ConfigError> {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        Config::load(temp_file.path())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let config = load_str("").unwrap();
        assert_eq!(config.bus.i2c_bus, 1);
        assert_eq!(config.bus.device_address, 0x17);
        assert_eq!(config.sampling.interval_ms, 5000);
        assert_eq!(config.output.file_prefix, "batt_log_");
        assert!(config.registers.get(Quantity::Voltage).is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let toml_content = r#"
[bus]
i2c_bus = 0
device_address = 0x18
read_timeout_ms = 50

[sampling]
interval_ms = 1000

[output]
directory = "/var/log/ups"

[registers.current]
address = 0x40
byte_order = "little"
encoding = "signed"
scale = 0.001
"#;

        let config = load_str(toml_content).unwrap();
        assert_eq!(config.bus.i2c_bus, 0);
        assert_eq!(config.bus.device_address, 0x18);
        assert_eq!(config.bus.read_timeout_ms, 50);
        assert_eq!(config.sampling.interval_ms, 1000);
        assert_eq!(config.output.directory, "/var/log/ups");
        assert_eq!(config.output.file_prefix, "batt_log_");

        let current = config.registers.get(Quantity::Current).unwrap();
        assert_eq!(current.address, Some(0x40));
        assert_eq!(current.byte_order, Some(ByteOrder::Little));
        assert_eq!(current.encoding, Some(Encoding::Signed));
        assert_eq!(current.scale, Some(0.001));
        assert_eq!(current.offset, None);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(config.bus.i2c_bus, defaults.bus.i2c_bus);
        assert_eq!(config.bus.device_address, defaults.bus.device_address);
        assert_eq!(config.bus.read_timeout_ms, defaults.bus.read_timeout_ms);
        assert_eq!(config.sampling.interval_ms, defaults.sampling.interval_ms);
        assert_eq!(config.output.directory, defaults.output.directory);
        assert_eq!(config.output.file_prefix, defaults.output.file_prefix);
    }

    #[test]
    fn test_unknown_register_key_rejected() {
        let result = load_str("[registers.voltage]\nendian = \"big\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_quantity_rejected() {
        let result = load_str("[registers.humidity]\noffset = 1\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_encoding_rejected() {
        let result = load_str("[registers.current]\nencoding = \"bcd\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/upsplus-logger.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let result = load_str("[sampling]\ninterval_ms = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_device_address_out_of_range() {
        let mut config = Config::default();
        config.bus.device_address = 0x80;
        assert!(config.validate().is_err());

        config.bus.device_address = 0x02;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_zero() {
        let mut config = Config::default();
        config.bus.read_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_read_timeout_too_high() {
        let mut config = Config::default();
        config.bus.read_timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_low() {
        let mut config = Config::default();
        config.sampling.interval_ms = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_high() {
        let mut config = Config::default();
        config.sampling.interval_ms = 3_600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_not_shorter_than_interval() {
        let mut config = Config::default();
        config.sampling.interval_ms = 500;
        config.bus.read_timeout_ms = 500;
        assert!(config.validate().is_err());

        config.bus.read_timeout_ms = 499;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_output_directory() {
        let mut config = Config::default();
        config.output.directory = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_prefix() {
        let mut config = Config::default();
        config.output.file_prefix = String::new();
        assert!(config.validate().is_err());

        config.output.file_prefix = "logs/batt_".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_i2c_bus(), 1);
        assert_eq!(default_device_address(), 0x17);
        assert_eq!(default_read_timeout_ms(), 100);
        assert_eq!(default_interval_ms(), 5000);
        assert_eq!(default_output_directory(), ".");
        assert_eq!(default_file_prefix(), "batt_log_");
    }
}
