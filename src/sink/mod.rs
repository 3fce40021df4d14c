//! # Sink Module
//!
//! Append-only destinations for decoded samples.
//!
//! This module handles:
//! - The [`Sink`] trait the sampling loop writes through
//! - The per-session context (start time, output path)
//! - CSV record files, one row per sample

pub mod csv;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::SinkError;
use crate::sample::Sample;

pub use self::csv::{CsvSink, SampleRecord, CSV_HEADER};

/// Timestamp format used in record file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Append-only sample destination
///
/// Records must be persisted in call order. Any error is treated as fatal by
/// the sampling loop.
#[cfg_attr(test, mockall::automock)]
pub trait Sink {
    /// Append one sample
    fn append(&mut self, sample: Sample) -> Result<(), SinkError>;

    /// Push buffered records to stable storage
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// State fixed once when a logging session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    started_at: DateTime<Local>,
    output_path: PathBuf,
}

impl Session {
    /// Session writing to `<directory>/<prefix><started_at>.csv`
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Local, TimeZone};
    /// use upsplus_logger::sink::Session;
    ///
    /// let started = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
    /// let session = Session::new("/tmp", "batt_log_", started);
    /// assert!(session.output_path().ends_with("batt_log_2024-05-01_093000.csv"));
    /// ```
    pub fn new(directory: impl AsRef<Path>, prefix: &str, started_at: DateTime<Local>) -> Self {
        let file_name = format!("{}{}.csv", prefix, started_at.format(FILE_TIMESTAMP_FORMAT));
        Self {
            started_at,
            output_path: directory.as_ref().join(file_name),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}
