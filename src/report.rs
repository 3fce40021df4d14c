//! # Discharge Report
//!
//! Offline summary of a record file written by [`CsvSink`]. Never touches the
//! bus.
//!
//! [`CsvSink`]: crate::sink::CsvSink

use std::fmt;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::ReportError;
use crate::sink::SampleRecord;

/// First/last/min/max of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ColumnStats {
    fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut iter = values.into_iter();
        let first = iter.next()?;
        let mut stats = Self {
            first,
            last: first,
            min: first,
            max: first,
            mean: 0.0,
        };
        let mut sum = first;
        let mut count = 1usize;
        for value in iter {
            stats.last = value;
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
            sum += value;
            count += 1;
        }
        stats.mean = sum / count as f64;
        Some(stats)
    }
}

fn column(
    records: &[SampleRecord],
    value: impl Fn(&SampleRecord) -> f64,
) -> Result<ColumnStats, ReportError> {
    ColumnStats::from_values(records.iter().map(value)).ok_or(ReportError::Empty)
}

/// Summary of one logging session
#[derive(Debug, Clone, PartialEq)]
pub struct DischargeReport {
    pub label: String,
    pub samples: usize,
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
    /// Device uptime at the first and last sample
    pub uptime_span_s: (u32, u32),
    pub voltage_v: ColumnStats,
    pub current_a: ColumnStats,
    pub wattage_w: ColumnStats,
    pub percent: ColumnStats,
    /// `None` if every temperature cell was blank
    pub temperature_c: Option<ColumnStats>,
    pub temperature_missing: usize,
}

impl DischargeReport {
    /// Build a report from parsed rows
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Empty` if there are no rows.
    pub fn from_records(label: &str, records: &[SampleRecord]) -> Result<Self, ReportError> {
        let (first, last) = match (records.first(), records.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ReportError::Empty),
        };

        Ok(Self {
            label: label.to_string(),
            samples: records.len(),
            started: first.timestamp,
            ended: last.timestamp,
            uptime_span_s: (first.uptime_s, last.uptime_s),
            voltage_v: column(records, |r| r.voltage_v)?,
            current_a: column(records, |r| r.current_a)?,
            wattage_w: column(records, |r| r.wattage_w)?,
            percent: column(records, |r| f64::from(r.percent))?,
            temperature_c: ColumnStats::from_values(
                records.iter().filter_map(|r| r.temperature_c_or_blank),
            ),
            temperature_missing: records
                .iter()
                .filter(|r| r.temperature_c_or_blank.is_none())
                .count(),
        })
    }

    /// Read and summarise a record file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, a row is malformed, or the
    /// file holds no samples.
    pub fn from_path(path: impl AsRef<Path>, label: &str) -> Result<Self, ReportError> {
        let file = File::open(path.as_ref())?;
        let mut reader = csv::Reader::from_reader(file);
        let records = reader
            .deserialize()
            .collect::<Result<Vec<SampleRecord>, _>>()?;
        Self::from_records(label, &records)
    }

    /// Wall-clock length of the session
    pub fn duration(&self) -> chrono::Duration {
        self.ended - self.started
    }
}

impl fmt::Display for DischargeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.duration();
        writeln!(f, "Discharge report: {}", self.label)?;
        writeln!(
            f,
            "  {} samples, {} to {} ({}h{:02}m)",
            self.samples,
            self.started.format("%Y-%m-%d %H:%M:%S"),
            self.ended.format("%Y-%m-%d %H:%M:%S"),
            duration.num_hours(),
            duration.num_minutes() % 60
        )?;
        writeln!(
            f,
            "  uptime    {}s -> {}s",
            self.uptime_span_s.0, self.uptime_span_s.1
        )?;
        write_column(f, "voltage", "V", &self.voltage_v)?;
        write_column(f, "current", "A", &self.current_a)?;
        write_column(f, "power", "W", &self.wattage_w)?;
        write_column(f, "remaining", "%", &self.percent)?;
        match &self.temperature_c {
            Some(stats) => write_column(f, "temp", "°C", stats)?,
            None => writeln!(f, "  temp      unavailable")?,
        }
        if self.temperature_missing > 0 && self.temperature_c.is_some() {
            writeln!(f, "            ({} readings unavailable)", self.temperature_missing)?;
        }
        Ok(())
    }
}

fn write_column(f: &mut fmt::Formatter<'_>, name: &str, unit: &str, s: &ColumnStats) -> fmt::Result {
    writeln!(
        f,
        "  {:<9} {:.3}{unit} -> {:.3}{unit} (min {:.3}, max {:.3}, mean {:.3})",
        name,
        s.first,
        s.last,
        s.min,
        s.max,
        s.mean,
        unit = unit
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::decoder::Temperature;
    use crate::sample::Sample;
    use crate::sink::{CsvSink, Session, Sink};
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn record(minute: u32, voltage_v: f64, percent: u8, temp: Option<f64>) -> SampleRecord {
        SampleRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + chrono::Duration::minutes(i64::from(minute)),
            uptime_s: 60 * minute,
            voltage_v,
            current_a: -1.0,
            temperature_c_or_blank: temp,
            wattage_w: -voltage_v,
            percent,
        }
    }

    #[test]
    fn test_from_records() {
        let records = vec![
            record(0, 8.4, 100, Some(25.0)),
            record(30, 7.6, 60, None),
            record(59, 6.8, 5, Some(29.0)),
        ];

        let report = DischargeReport::from_records("18650 x2", &records).unwrap();

        assert_eq!(report.samples, 3);
        assert_eq!(report.uptime_span_s, (0, 3540));
        assert_eq!(report.duration(), chrono::Duration::minutes(59));
        assert_eq!(report.voltage_v.first, 8.4);
        assert_eq!(report.voltage_v.last, 6.8);
        assert_eq!(report.voltage_v.min, 6.8);
        assert_eq!(report.percent.max, 100.0);
        assert!((report.percent.mean - 55.0).abs() < 1e-9);

        let temp = report.temperature_c.unwrap();
        assert_eq!((temp.min, temp.max), (25.0, 29.0));
        assert_eq!(report.temperature_missing, 1);
    }

    #[test]
    fn test_all_temperatures_missing() {
        let records = vec![record(0, 8.4, 100, None), record(1, 8.3, 99, None)];
        let report = DischargeReport::from_records("no sensor", &records).unwrap();
        assert!(report.temperature_c.is_none());
        assert!(report.to_string().contains("temp      unavailable"));
    }

    #[test]
    fn test_empty_records() {
        assert!(matches!(
            DischargeReport::from_records("empty", &[]),
            Err(ReportError::Empty)
        ));
    }

    #[test]
    fn test_display_includes_label() {
        let records = vec![record(0, 8.4, 100, Some(25.0)), record(90, 7.0, 20, Some(27.5))];
        let text = DischargeReport::from_records("Pi 4 idle", &records)
            .unwrap()
            .to_string();

        assert!(text.starts_with("Discharge report: Pi 4 idle\n"));
        assert!(text.contains("(1h30m)"));
        assert!(text.contains("voltage   8.400V -> 7.000V"));
    }

    #[test]
    fn test_from_path_reads_sink_output() {
        let dir = TempDir::new().unwrap();
        let started = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let session = Session::new(dir.path(), "batt_log_", started);
        let mut sink = CsvSink::create(&session).unwrap();

        for (i, temp) in [Temperature::Celsius(25.0), Temperature::Unavailable]
            .into_iter()
            .enumerate()
        {
            let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5 * i as u32).unwrap();
            let sample = Sample::new(at, 100 + 5 * i as u32, 12.5, -0.05, temp, -0.625, 85);
            sink.append(sample).unwrap();
        }
        sink.flush().unwrap();

        let report = DischargeReport::from_path(session.output_path(), "bench").unwrap();
        assert_eq!(report.samples, 2);
        assert_eq!(report.uptime_span_s, (100, 105));
        assert_eq!(report.temperature_missing, 1);
        assert_eq!(report.voltage_v.mean, 12.5);
    }

    #[test]
    fn test_from_path_header_only() {
        let dir = TempDir::new().unwrap();
        let started = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let session = Session::new(dir.path(), "batt_log_", started);
        CsvSink::create(&session).unwrap();

        let result = DischargeReport::from_path(session.output_path(), "none");
        assert!(matches!(result, Err(ReportError::Empty)));
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = DischargeReport::from_path("/nonexistent/batt_log.csv", "missing");
        assert!(matches!(result, Err(ReportError::Io(_))));
    }
}
