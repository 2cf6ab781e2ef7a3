//! Per-source aggregation windows.
//!
//! Each source type owns one [`AggregationWindow`]: an accumulator that is
//! updated once per record and a clock that decides when the current window
//! closes. Closing flushes the accumulator into an immutable [`Summary`] and
//! resets it for the next window.

mod monitor;
mod mqtt;
mod netflow;
mod otel;
mod syslog;
mod trap;
mod winevent;


use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tracing::debug;

use logeye_core::config::{ReportConfig, ReportInterval};
use logeye_core::{LogRecord, RecordDetail, SourceType, Summary};

pub use monitor::MonitorAccumulator;
pub use mqtt::MqttAccumulator;
pub use netflow::{flow_key, is_fumble, NetflowAccumulator};
pub use otel::OtelAccumulator;
pub use syslog::SyslogAccumulator;
pub use trap::TrapAccumulator;
pub use winevent::WindowsAccumulator;

/// Severity bucket used by the free-text accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityClass {
    Normal,
    Warn,
    Error,
}

/// Counters and frequency tables for one source type.
pub trait Accumulator: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Fold one record into the window. Details of another type are ignored.
    fn update(&mut self, detail: &RecordDetail);

    /// Build the summary for the window starting at `time` and reset.
    fn flush(&mut self, time: DateTime<Utc>, top_n: usize) -> Summary;
}

pub fn new_accumulator(source: SourceType) -> Box<dyn Accumulator> {
    match source {
        SourceType::Syslog => Box::new(SyslogAccumulator::default()),
        SourceType::Trap => Box::new(TrapAccumulator::default()),
        SourceType::Netflow => Box::new(NetflowAccumulator::default()),
        SourceType::WindowsEvent => Box::new(WindowsAccumulator::default()),
        SourceType::OtelLog => Box::new(OtelAccumulator::default()),
        SourceType::Mqtt => Box::new(MqttAccumulator::default()),
        SourceType::Monitor => Box::new(MonitorAccumulator::default()),
    }
}

// ── Clock ───────────────────────────────────────────────────────────

fn truncate(time: DateTime<Utc>, interval: ReportInterval) -> DateTime<Utc> {
    let step = match interval {
        ReportInterval::Minute => TimeDelta::minutes(1),
        ReportInterval::Hour => TimeDelta::hours(1),
    };
    time.duration_trunc(step).unwrap_or(time)
}

/// Tracks the start of the open window and detects boundary crossings.
#[derive(Debug, Clone)]
pub struct WindowClock {
    interval: ReportInterval,
    current: DateTime<Utc>,
}

impl WindowClock {
    pub fn new(interval: ReportInterval, now: DateTime<Utc>) -> Self {
        Self {
            interval,
            current: truncate(now, interval),
        }
    }

    pub fn interval(&self) -> ReportInterval {
        self.interval
    }

    pub fn current(&self) -> DateTime<Utc> {
        self.current
    }

    /// Returns the start of the window that just closed when `now` has
    /// moved past a boundary.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let bucket = truncate(now, self.interval);
        if bucket > self.current {
            let closed = self.current;
            self.current = bucket;
            Some(closed)
        } else {
            None
        }
    }
}

// ── Window ──────────────────────────────────────────────────────────

/// Accumulator plus clock for one source type.
pub struct AggregationWindow {
    accumulator: Box<dyn Accumulator>,
    clock: WindowClock,
    top_n: usize,
    records: u64,
}

impl AggregationWindow {
    pub fn new(source: SourceType, report: &ReportConfig, now: DateTime<Utc>) -> Self {
        Self {
            accumulator: new_accumulator(source),
            clock: WindowClock::new(report.interval_for(source), now),
            top_n: report.top_n,
            records: 0,
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.accumulator.source_type()
    }

    /// Records folded into the open window so far.
    pub fn pending(&self) -> u64 {
        self.records
    }

    pub fn update(&mut self, record: &LogRecord) {
        match &record.detail {
            Some(detail) if detail.source_type() == self.source_type() => {
                self.accumulator.update(detail);
                self.records += 1;
            }
            Some(detail) => debug!(
                window = %self.source_type(),
                detail = %detail.source_type(),
                "record detail does not match window, skipping"
            ),
            None => debug!(window = %self.source_type(), source = %record.source, "record has no detail, skipping"),
        }
    }

    /// Flush when `now` crosses the window boundary.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Summary> {
        let closed = self.clock.tick(now)?;
        self.records = 0;
        Some(self.accumulator.flush(closed, self.top_n))
    }
}
