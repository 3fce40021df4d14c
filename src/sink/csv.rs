//! CSV record file sink
//!
//! One header row, written when the file is created, then one row per sample.
//! Every row is flushed as soon as it is written so a brownout loses at most
//! the sample in flight.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use ::csv::{Writer, WriterBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Session, Sink};
use crate::error::SinkError;
use crate::sample::Sample;

/// Column names, in file order
pub const CSV_HEADER: [&str; 7] = [
    "timestamp",
    "uptime_s",
    "voltage_v",
    "current_a",
    "temperature_c_or_blank",
    "wattage_w",
    "percent",
];

/// One CSV row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: DateTime<Utc>,
    pub uptime_s: u32,
    pub voltage_v: f64,
    pub current_a: f64,
    /// Empty cell when the temperature was unavailable
    pub temperature_c_or_blank: Option<f64>,
    pub wattage_w: f64,
    pub percent: u8,
}

/// Round to the device's milli resolution so rows don't carry float noise
fn milli(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp(),
            uptime_s: sample.uptime_s(),
            voltage_v: milli(sample.voltage_v()),
            current_a: milli(sample.current_a()),
            temperature_c_or_blank: sample.temperature().celsius().map(milli),
            wattage_w: milli(sample.wattage_w()),
            percent: sample.percent(),
        }
    }
}

/// Append-only CSV record file
pub struct CsvSink {
    writer: Writer<File>,
    path: PathBuf,
    records: u64,
}

impl std::fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("path", &self.path)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl CsvSink {
    /// Create the session's record file and write the header row
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the file is already there; it is never overwritten
    /// - `Io` / `Csv` if the file cannot be created or written
    pub fn create(session: &Session) -> Result<Self, SinkError> {
        let path = session.output_path().to_path_buf();

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => SinkError::AlreadyExists(path.clone()),
                _ => SinkError::Io(e),
            })?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(CSV_HEADER)?;
        writer.flush()?;

        info!("Logging to {}", path.display());
        Ok(Self {
            writer,
            path,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for CsvSink {
    fn append(&mut self, sample: Sample) -> Result<(), SinkError> {
        self.writer.serialize(SampleRecord::from(&sample))?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        debug!("Synced {} records to {}", self.records, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::decoder::Temperature;
    use chrono::{Local, TimeZone};
    use std::fs;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        let started = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        Session::new(dir.path(), "batt_log_", started)
    }

    fn sample(second: u32, temperature: Temperature) -> Sample {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, second).unwrap();
        Sample::new(at, 3600 + second, 12.5, -0.05, temperature, -0.625, 85)
    }

    fn read_records(path: &Path) -> Vec<SampleRecord> {
        let mut reader = ::csv::Reader::from_path(path).unwrap();
        reader.deserialize().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_header_written_on_create() {
        let dir = TempDir::new().unwrap();
        let sink = CsvSink::create(&session(&dir)).unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            contents,
            "timestamp,uptime_s,voltage_v,current_a,temperature_c_or_blank,wattage_w,percent\n"
        );
    }

    #[test]
    fn test_file_named_after_session() {
        let dir = TempDir::new().unwrap();
        let sink = CsvSink::create(&session(&dir)).unwrap();
        assert_eq!(sink.path(), dir.path().join("batt_log_2024-05-01_093000.csv"));
    }

    #[test]
    fn test_append_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::create(&session(&dir)).unwrap();

        sink.append(sample(0, Temperature::Celsius(25.0))).unwrap();
        sink.append(sample(5, Temperature::Celsius(26.0))).unwrap();
        sink.flush().unwrap();

        let records = read_records(sink.path());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].uptime_s, 3600);
        assert_eq!(records[1].uptime_s, 3605);
        assert_eq!(records[0].voltage_v, 12.5);
        assert_eq!(records[0].current_a, -0.05);
        assert_eq!(records[0].temperature_c_or_blank, Some(25.0));
        assert_eq!(records[0].wattage_w, -0.625);
        assert_eq!(records[0].percent, 85);
        assert!(records[0].timestamp < records[1].timestamp);
    }

    #[test]
    fn test_rows_visible_without_flush() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::create(&session(&dir)).unwrap();
        sink.append(sample(0, Temperature::Celsius(25.0))).unwrap();

        // Each append reaches the file immediately
        assert_eq!(read_records(sink.path()).len(), 1);
    }

    #[test]
    fn test_unavailable_temperature_is_blank() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvSink::create(&session(&dir)).unwrap();
        sink.append(sample(0, Temperature::Unavailable)).unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        let row = contents.lines().nth(1).unwrap();
        let cells: Vec<&str> = row.split(',').collect();
        assert_eq!(cells.len(), 7);
        assert_eq!(cells[4], "");

        let records = read_records(sink.path());
        assert_eq!(records[0].temperature_c_or_blank, None);
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        fs::write(session.output_path(), "precious").unwrap();

        let result = CsvSink::create(&session);
        assert!(matches!(result, Err(SinkError::AlreadyExists(_))));
        assert_eq!(fs::read_to_string(session.output_path()).unwrap(), "precious");
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let started = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let session = Session::new("/nonexistent/upsplus", "batt_log_", started);
        assert!(matches!(CsvSink::create(&session), Err(SinkError::Io(_))));
    }

    #[test]
    fn test_record_rounds_to_milli() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let sample = Sample::new(at, 1, 12.500000000000002, -0.0500004, Temperature::Unavailable, 0.0, 50);
        let record = SampleRecord::from(&sample);
        assert_eq!(record.voltage_v, 12.5);
        assert_eq!(record.current_a, -0.05);
    }
}
