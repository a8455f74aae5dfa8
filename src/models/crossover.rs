use crate::models::Gains;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Convex blend of two gain sets with a single shared weight.
#[instrument(level = "debug", skip(lhs, rhs), fields(alpha = alpha))]
fn blend(alpha: f64, lhs: &Gains, rhs: &Gains) -> Gains {
    lhs.zip(*rhs, |l, r| alpha * l + (1.0 - alpha) * r)
}

/// Crossover strategy for combining the gains of two parents.
///
/// Both strategies are arithmetic: every child gene is
/// `alpha * parent1 + (1 - alpha) * parent2`, with one `alpha` shared by
/// kp, ki and kd so the child lies on the segment between its parents.
///
/// # Examples
///
/// ```rust
/// use fx_pid_tuner::models::Crossover;
///
/// // A fresh alpha in [0, 1) for every child
/// let arithmetic = Crossover::arithmetic();
///
/// // Always the midpoint between the parents
/// let midpoint = Crossover::fixed(0.5)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum Crossover {
    /// Draws `alpha` uniformly from `[0, 1)` for every child.
    #[default]
    Arithmetic,
    /// Uses the same `alpha` for every child.
    ///
    /// - `alpha = 1.0`: clones the first parent
    /// - `alpha = 0.0`: clones the second parent
    Fixed {
        /// Weight of the first parent (0.0 to 1.0)
        alpha: f64,
    },
}

/// Error returned when a fixed blend weight lies outside `[0, 1]`.
///
/// ```rust
/// use fx_pid_tuner::models::Crossover;
///
/// assert!(Crossover::fixed(-0.1).is_err());
/// assert!(Crossover::fixed(1.5).is_err());
/// assert!(Crossover::fixed(1.0).is_ok());
/// ```
#[derive(Debug, thiserror::Error)]
#[error("crossover alpha must be between 0.0 and 1.0, got {0}")]
pub struct ProbabilityOutOfRangeError(f64);

impl Crossover {
    pub fn arithmetic() -> Self {
        Self::Arithmetic
    }

    pub fn fixed(alpha: f64) -> Result<Self, ProbabilityOutOfRangeError> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ProbabilityOutOfRangeError(alpha));
        }

        Ok(Self::Fixed { alpha })
    }

    /// Produces the child gains of two parents.
    #[instrument(level = "debug", skip(self, rng), fields(crossover_type = ?self))]
    pub(crate) fn apply<R: Rng + ?Sized>(&self, rng: &mut R, lhs: &Gains, rhs: &Gains) -> Gains {
        let alpha = match self {
            Self::Arithmetic => rng.random::<f64>(),
            Self::Fixed { alpha } => *alpha,
        };
        blend(alpha, lhs, rhs)
    }
}
