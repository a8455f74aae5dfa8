use serde::{Deserialize, Serialize};
use std::fmt;

/// Proportional, integral and derivative coefficients of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    /// Proportional-only gains.
    pub fn proportional(kp: f64) -> Self {
        Self::new(kp, 0.0, 0.0)
    }

    pub(crate) fn map(self, mut f: impl FnMut(Gene, f64) -> f64) -> Self {
        Self {
            kp: f(Gene::Kp, self.kp),
            ki: f(Gene::Ki, self.ki),
            kd: f(Gene::Kd, self.kd),
        }
    }

    pub(crate) fn zip(self, other: Self, mut f: impl FnMut(f64, f64) -> f64) -> Self {
        Self {
            kp: f(self.kp, other.kp),
            ki: f(self.ki, other.ki),
            kd: f(self.kd, other.kd),
        }
    }
}

impl fmt::Display for Gains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kp={:.3}, Ki={:.3}, Kd={:.3}", self.kp, self.ki, self.kd)
    }
}

/// Identifies one of the three genes of a gain set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gene {
    Kp,
    Ki,
    Kd,
}
