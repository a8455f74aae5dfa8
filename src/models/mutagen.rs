use crate::models::{GainBounds, Gains};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Lower bound of the multiplicative mutation step.
pub const MIN_MUTATION_FACTOR: f64 = 0.8;

/// Upper bound of the multiplicative mutation step.
pub const MAX_MUTATION_FACTOR: f64 = 1.2;

// ============================================================
// MutationRate
// ============================================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationRate {
    value: f64,
}

#[derive(Debug, thiserror::Error)]
#[error("mutation_rate must be between 0.0 and 1.0, got: {0}")]
pub struct MutationRateOutOfRange(f64);

impl MutationRate {
    pub fn new(value: f64) -> Result<Self, MutationRateOutOfRange> {
        if !(0.0..=1.0).contains(&value) {
            return Err(MutationRateOutOfRange(value));
        }

        Ok(Self { value })
    }

    pub fn get(&self) -> f64 {
        self.value
    }
}

// ============================================================
// Mutagen
// ============================================================

/// Percentage mutation of gains.
///
/// Each gene is independently scaled by a factor in `[0.8, 1.2]` with
/// probability `mutation_rate`. Afterwards every gene is clamped into its
/// bound, mutated or not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mutagen {
    mutation_rate: MutationRate,
}

impl Mutagen {
    pub fn new(mutation_rate: MutationRate) -> Self {
        Self { mutation_rate }
    }

    pub fn constant(mutation_rate: f64) -> Result<Self, MutationRateOutOfRange> {
        Ok(Self::new(MutationRate::new(mutation_rate)?))
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation_rate.get()
    }

    #[instrument(level = "debug", skip(self, rng, bounds), fields(gains = %gains, mutation_rate = self.mutation_rate.get()))]
    pub(crate) fn mutate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        gains: Gains,
        bounds: &GainBounds,
    ) -> Gains {
        let rate = self.mutation_rate.get();

        let mutated = gains.map(|_, gene| {
            if rng.random_range(0.0..1.0) < rate {
                gene * rng.random_range(MIN_MUTATION_FACTOR..=MAX_MUTATION_FACTOR)
            } else {
                gene
            }
        });

        bounds.clamp(mutated)
    }
}

impl Default for Mutagen {
    fn default() -> Self {
        Self {
            mutation_rate: MutationRate { value: 0.1 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeneBounds;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_mutation_rate_validation_errors() {
        assert!(MutationRate::new(-0.1).is_err());
        assert!(MutationRate::new(1.5).is_err());
        assert!(MutationRate::new(f64::NAN).is_err());
        assert!(Mutagen::constant(2.0).is_err());
    }

    #[test]
    fn it_respects_zero_mutation_rate() {
        let mut rng = StdRng::seed_from_u64(42);
        let mutagen = Mutagen::constant(0.0).expect("mutation_rate is in range");
        let gains = Gains::new(2.0, 1.0, 0.5);

        let mutated = mutagen.mutate(&mut rng, gains, &GainBounds::default());
        assert_eq!(mutated, gains);
    }

    #[test]
    fn it_scales_genes_within_twenty_percent() {
        let mut rng = StdRng::seed_from_u64(42);
        let mutagen = Mutagen::constant(1.0).expect("mutation_rate is in range");
        let gains = Gains::new(5.0, 1.0, 2.0);

        for _ in 0..100 {
            let mutated = mutagen.mutate(&mut rng, gains, &GainBounds::default());
            for (before, after) in [
                (gains.kp, mutated.kp),
                (gains.ki, mutated.ki),
                (gains.kd, mutated.kd),
            ] {
                let factor = after / before;
                assert!(factor >= MIN_MUTATION_FACTOR - 1e-12);
                assert!(factor <= MAX_MUTATION_FACTOR + 1e-12);
            }
        }
    }

    #[test]
    fn it_always_clamps_into_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let bounds = GainBounds::new(
            GeneBounds::new(0.1, 10.0).expect("is valid"),
            GeneBounds::new(0.0, 2.0).expect("is valid"),
            GeneBounds::new(0.0, 5.0).expect("is valid"),
        );

        let priors = [
            Gains::new(9.99, 1.99, 4.99),
            Gains::new(100.0, -5.0, 1e9),
            Gains::new(-1.0, f64::NAN, f64::INFINITY),
            Gains::new(0.1, 0.0, 0.0),
        ];

        for rate in [0.0, 0.5, 1.0] {
            let mutagen = Mutagen::constant(rate).expect("mutation_rate is in range");
            for prior in priors {
                for _ in 0..50 {
                    let mutated = mutagen.mutate(&mut rng, prior, &bounds);
                    assert!(bounds.contains(&mutated), "{mutated} escaped bounds");
                }
            }
        }
    }
}
