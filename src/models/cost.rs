use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Cost assigned to a telemetry record that carries no samples.
pub const EMPTY_RECORD_PENALTY: f64 = 1e6;

/// Cost of an individual. Lower is better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Cost {
    #[default]
    Unevaluated,
    Scored(f64),
}

impl Cost {
    /// Wraps a score. Non-finite scores are replaced by [`EMPTY_RECORD_PENALTY`].
    pub fn scored(value: f64) -> Self {
        if value.is_finite() {
            Self::Scored(value)
        } else {
            Self::Scored(EMPTY_RECORD_PENALTY)
        }
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Scored(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Scored(value) => Some(*value),
            Self::Unevaluated => None,
        }
    }

    /// Ranking order: ascending by score, unevaluated after every score.
    pub fn rank(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Scored(lhs), Self::Scored(rhs)) => lhs.total_cmp(rhs),
            (Self::Scored(_), Self::Unevaluated) => Ordering::Less,
            (Self::Unevaluated, Self::Scored(_)) => Ordering::Greater,
            (Self::Unevaluated, Self::Unevaluated) => Ordering::Equal,
        }
    }

    pub(crate) fn is_better(&self, other: &Self) -> bool {
        self.rank(other) == Ordering::Less
    }
}
