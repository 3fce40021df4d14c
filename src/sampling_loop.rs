//! # Sampling Loop
//!
//! Drives the [`Sampler`] at a fixed cadence and hands each sample to a
//! [`Sink`].
//!
//! ## States
//!
//! The loop starts `Running` and only moves to `Stopped` when:
//! - the shutdown future completes (Ctrl+C / SIGTERM), or
//! - the sink rejects a record.
//!
//! A failed capture never stops the loop. As the battery drains the UPS
//! browns out and reads start timing out; those ticks are logged and skipped
//! and the session carries on.
//!
//! ## Scheduling
//!
//! Ticks come from a `tokio` interval and are the only suspension point. A
//! capture runs to completion inside its tick, so shutdown is honoured
//! between ticks and never mid-capture.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::bus::I2cBus;
use crate::error::SinkError;
use crate::registers::decoder::Temperature;
use crate::sample::{Clock, Sample, SystemClock};
use crate::sampler::Sampler;
use crate::sink::Sink;

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A sample reached the sink
    Emitted,
    /// The capture failed; nothing was written
    Skipped,
}

/// Counters for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub emitted: u64,
    pub skipped: u64,
}

/// Fixed-interval capture loop
pub struct SamplingLoop<B, S, C = SystemClock> {
    sampler: Sampler<B, C>,
    sink: S,
    period: Duration,
    state: LoopState,
    summary: LoopSummary,
    consecutive_failures: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl<B: I2cBus, S: Sink, C: Clock> SamplingLoop<B, S, C> {
    pub fn new(sampler: Sampler<B, C>, sink: S, period: Duration) -> Self {
        Self {
            sampler,
            sink,
            period,
            state: LoopState::Running,
            summary: LoopSummary::default(),
            consecutive_failures: 0,
            last_timestamp: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> LoopSummary {
        self.summary
    }

    /// Run one capture and emit its sample
    ///
    /// Capture failures are logged and reported as [`TickOutcome::Skipped`].
    /// A stopped loop does nothing.
    ///
    /// # Errors
    ///
    /// Returns the `SinkError` if the sample could not be appended; the loop
    /// is `Stopped` afterwards.
    pub fn tick(&mut self) -> Result<TickOutcome, SinkError> {
        if self.state == LoopState::Stopped {
            return Ok(TickOutcome::Skipped);
        }

        self.summary.ticks += 1;
        let tick = self.summary.ticks;

        let sample = match self.sampler.capture() {
            Ok(sample) => sample,
            Err(e) => {
                self.summary.skipped += 1;
                self.consecutive_failures += 1;
                warn!(
                    tick,
                    field = %e.field(),
                    consecutive_failures = self.consecutive_failures,
                    "Skipping tick at {}: {}",
                    self.sampler.now().format("%H:%M:%S"),
                    e
                );
                return Ok(TickOutcome::Skipped);
            }
        };

        if self.consecutive_failures > 0 {
            info!(
                "Bus recovered after {} failed tick(s)",
                self.consecutive_failures
            );
            self.consecutive_failures = 0;
        }

        let sample = self.monotonic(sample);
        log_sample(tick, &sample);

        if let Err(e) = self.sink.append(sample) {
            error!(tick, "Failed to write sample: {}", e);
            self.state = LoopState::Stopped;
            return Err(e);
        }

        self.summary.emitted += 1;
        Ok(TickOutcome::Emitted)
    }

    /// Keep timestamps non-decreasing if the wall clock steps back
    fn monotonic(&mut self, sample: Sample) -> Sample {
        let sample = match self.last_timestamp {
            Some(last) if sample.timestamp() < last => {
                warn!(
                    "Wall clock moved back ({} < {}), reusing previous timestamp",
                    sample.timestamp(),
                    last
                );
                sample.restamped(last)
            }
            _ => sample,
        };
        self.last_timestamp = Some(sample.timestamp());
        sample
    }

    /// Tick every period until `shutdown` completes or the sink fails
    ///
    /// The sink is flushed on the way out either way.
    ///
    /// # Errors
    ///
    /// Returns the `SinkError` that stopped the loop, or the error from the
    /// final flush.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<LoopSummary, SinkError>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!("Sampling every {:?}", self.period);

        while self.state == LoopState::Running {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    self.state = LoopState::Stopped;
                }

                _ = ticker.tick() => {
                    if let Err(e) = run_blocking(|| self.tick()) {
                        if let Err(flush_err) = self.sink.flush() {
                            warn!("Final flush failed: {}", flush_err);
                        }
                        return Err(e);
                    }
                }
            }
        }

        self.sink.flush()?;
        info!(
            "Stopped after {} ticks: {} samples written, {} skipped",
            self.summary.ticks, self.summary.emitted, self.summary.skipped
        );
        Ok(self.summary)
    }
}

/// Run a blocking bus cycle, handing the worker off on a multi-thread runtime
fn run_blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn log_sample(tick: u64, sample: &Sample) {
    let temperature = match sample.temperature() {
        Temperature::Celsius(c) => format!("{:.1}°C", c),
        Temperature::Unavailable => "n/a".to_string(),
    };
    info!(
        tick,
        "uptime={}s voltage={:.3}V current={:.3}A temp={} power={:.3}W remaining={}%",
        sample.uptime_s(),
        sample.voltage_v(),
        sample.current_a(),
        temperature,
        sample.wattage_w(),
        sample.percent()
    );
}
