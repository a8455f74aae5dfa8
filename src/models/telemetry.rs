use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// A single time-stamped reading streamed by the device during a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub time_ms: u64,
    pub position: i32,
    pub setpoint: i32,
    pub output: i32,
}

impl TelemetrySample {
    pub fn new(time_ms: u64, position: i32, setpoint: i32, output: i32) -> Self {
        Self {
            time_ms,
            position,
            setpoint,
            output,
        }
    }

    /// Parses a `time,pos,setpoint,output` line.
    ///
    /// Returns `None` unless the line has exactly four integer fields.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split(',').map(str::trim);

        let time_ms = fields.next()?.parse().ok()?;
        let position = fields.next()?.parse().ok()?;
        let setpoint = fields.next()?.parse().ok()?;
        let output = fields.next()?.parse().ok()?;

        if fields.next().is_some() {
            return None;
        }

        Some(Self::new(time_ms, position, setpoint, output))
    }

    /// Absolute tracking error of this reading.
    pub fn abs_error(&self) -> f64 {
        (f64::from(self.setpoint) - f64::from(self.position)).abs()
    }
}

/// Samples of one trial, in arrival order. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    samples: Vec<TelemetrySample>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[TelemetrySample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TelemetrySample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&TelemetrySample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&TelemetrySample> {
        self.samples.last()
    }

    /// Renders the record as CSV with a `time,pos,setpoint,output` header.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from("time,pos,setpoint,output\n");
        for sample in &self.samples {
            // Writing into a String cannot fail
            let _ = writeln!(
                csv,
                "{},{},{},{}",
                sample.time_ms, sample.position, sample.setpoint, sample.output
            );
        }
        csv
    }
}

impl FromIterator<TelemetrySample> for TelemetryRecord {
    fn from_iter<I: IntoIterator<Item = TelemetrySample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TelemetryRecord {
    type Item = &'a TelemetrySample;
    type IntoIter = std::slice::Iter<'a, TelemetrySample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
