use super::Gains;
use super::gains::Gene;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum GeneBoundError {
    #[error(
        "InvalidBounds: lower bound must not exceed upper. lower = {lower}, upper = {upper}"
    )]
    InvalidBound { lower: f64, upper: f64 },
    #[error("NonFiniteBound: bounds must be finite. lower = {lower}, upper = {upper}")]
    NonFinite { lower: f64, upper: f64 },
}

/// Inclusive range a single gene is kept within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneBounds {
    pub(crate) lower: f64,
    pub(crate) upper: f64,
}

impl GeneBounds {
    #[instrument(level = "debug", fields(lower = lower, upper = upper))]
    pub fn new(lower: f64, upper: f64) -> Result<Self, GeneBoundError> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(GeneBoundError::NonFinite { lower, upper });
        }

        if lower > upper {
            return Err(GeneBoundError::InvalidBound { lower, upper });
        }

        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Draws a value uniformly within the bounds.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.lower == self.upper {
            return self.lower;
        }
        rng.random_range(self.lower..=self.upper)
    }

    /// Clamps a value into the bounds. NaN clamps to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.lower;
        }
        value.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

/// Bounds for each gene of a gain set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainBounds {
    pub kp: GeneBounds,
    pub ki: GeneBounds,
    pub kd: GeneBounds,
}

impl GainBounds {
    pub fn new(kp: GeneBounds, ki: GeneBounds, kd: GeneBounds) -> Self {
        Self { kp, ki, kd }
    }

    fn of(&self, gene: Gene) -> &GeneBounds {
        match gene {
            Gene::Kp => &self.kp,
            Gene::Ki => &self.ki,
            Gene::Kd => &self.kd,
        }
    }

    #[instrument(level = "debug", skip(self, rng))]
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Gains {
        Gains::new(
            self.kp.random(rng),
            self.ki.random(rng),
            self.kd.random(rng),
        )
    }

    pub fn clamp(&self, gains: Gains) -> Gains {
        gains.map(|gene, value| self.of(gene).clamp(value))
    }

    pub fn contains(&self, gains: &Gains) -> bool {
        self.kp.contains(gains.kp) && self.ki.contains(gains.ki) && self.kd.contains(gains.kd)
    }
}

impl Default for GainBounds {
    fn default() -> Self {
        Self {
            kp: GeneBounds {
                lower: 0.1,
                upper: 10.0,
            },
            ki: GeneBounds {
                lower: 0.0,
                upper: 2.0,
            },
            kd: GeneBounds {
                lower: 0.0,
                upper: 5.0,
            },
        }
    }
}
