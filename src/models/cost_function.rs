//! Step-response cost.
//!
//! A trial is scored by three terms:
//!
//! ```text
//! cost = w_sae * mean_abs_error + w_overshoot * overshoot_score + w_settling * settling_ms / 1000
//! ```
//!
//! - `mean_abs_error`: mean of `|setpoint - position|`, so trials of different
//!   lengths stay comparable
//! - `overshoot_score`: overshoot past the first setpoint, minus a 5 unit dead-band
//! - `settling_ms`: time stamp of the last sample whose error exceeds 10 units
//!
//! An empty record scores [`EMPTY_RECORD_PENALTY`].

use super::{EMPTY_RECORD_PENALTY, TelemetryRecord};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Overshoot tolerated before it is penalized.
pub const OVERSHOOT_DEADBAND: f64 = 5.0;

/// Absolute error below which the response counts as settled.
pub const SETTLING_THRESHOLD: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
#[error("cost weights must be finite and non-negative, got sae={sae}, overshoot={overshoot}, settling={settling}")]
pub struct CostWeightError {
    sae: f64,
    overshoot: f64,
    settling: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    pub(crate) sae: f64,
    pub(crate) overshoot: f64,
    pub(crate) settling: f64,
}

impl CostWeights {
    pub fn new(sae: f64, overshoot: f64, settling: f64) -> Result<Self, CostWeightError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !(valid(sae) && valid(overshoot) && valid(settling)) {
            return Err(CostWeightError {
                sae,
                overshoot,
                settling,
            });
        }

        Ok(Self {
            sae,
            overshoot,
            settling,
        })
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            sae: 1.0,
            overshoot: 10.0,
            settling: 2.0,
        }
    }
}

/// Unweighted terms of a cost evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub mean_abs_error: f64,
    pub overshoot_score: f64,
    /// Settling time in seconds.
    pub settling_time_score: f64,
}

impl CostBreakdown {
    pub fn total(&self, weights: &CostWeights) -> f64 {
        weights.sae * self.mean_abs_error
            + weights.overshoot * self.overshoot_score
            + weights.settling * self.settling_time_score
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostFunction {
    weights: CostWeights,
}

impl CostFunction {
    pub fn new(weights: CostWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Scores a record. Lower is better; always finite.
    #[instrument(level = "debug", skip(self, record), fields(samples = record.len()))]
    pub fn evaluate(&self, record: &TelemetryRecord) -> f64 {
        match self.breakdown(record) {
            Some(breakdown) => breakdown.total(&self.weights),
            None => EMPTY_RECORD_PENALTY,
        }
    }

    /// Returns the unweighted terms, or `None` for an empty record.
    pub fn breakdown(&self, record: &TelemetryRecord) -> Option<CostBreakdown> {
        let first = record.first()?;
        let last = record.last()?;

        let mean_abs_error =
            record.iter().map(|s| s.abs_error()).sum::<f64>() / record.len() as f64;

        let target = f64::from(first.setpoint);
        let overshoot = if last.setpoint > first.position {
            let max_position = record.iter().map(|s| s.position).max().unwrap_or(first.position);
            (f64::from(max_position) - target).max(0.0)
        } else {
            let min_position = record.iter().map(|s| s.position).min().unwrap_or(first.position);
            (target - f64::from(min_position)).max(0.0)
        };
        let overshoot_score = (overshoot - OVERSHOOT_DEADBAND).max(0.0);

        let settling_ms = record
            .iter()
            .rev()
            .find(|s| s.abs_error() > SETTLING_THRESHOLD)
            .map(|s| s.time_ms)
            .unwrap_or(0);

        Some(CostBreakdown {
            mean_abs_error,
            overshoot_score,
            settling_time_score: settling_ms as f64 / 1000.0,
        })
    }
}
