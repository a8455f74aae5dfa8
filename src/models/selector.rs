//! Parent selection.
//!
//! Tournament selection samples `k` individuals without replacement and picks
//! the one with the lowest cost. Selection pressure grows with `k`:
//!
//! - **Size 2-3**: balanced exploration and exploitation
//! - **Size 4-5**: steady convergence
//! - **Size 6+**: fast convergence, risk of losing diversity early
//!
//! With populations of a few dozen gain sets, as is usual when every
//! evaluation is a physical trial, a size of 3 is a sensible default.
//!
//! ```rust
//! use fx_pid_tuner::models::Selector;
//!
//! let selector = Selector::tournament(3)?;
//! assert_eq!(selector.tournament_size(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use super::Individual;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Errors that can occur during parent selection.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum SelectionError {
    /// There is nobody to select from.
    #[error("No candidates available for selection")]
    NoCandidates,

    /// A tournament needs at least one contestant.
    #[error("Tournament size must be at least 1, got {size}")]
    InvalidTournamentSize { size: usize },
}

/// Runs one tournament and returns the index of its winner.
fn tournament<R: Rng + ?Sized>(
    rng: &mut R,
    tournament_size: usize,
    candidates: &[Arc<Individual>],
) -> Result<usize, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::NoCandidates);
    }

    let contestants = tournament_size.min(candidates.len());
    let indices = rand::seq::index::sample(rng, candidates.len(), contestants);

    let mut winner = indices.index(0);
    for idx in indices.iter() {
        if candidates[idx].cost().is_better(&candidates[winner].cost()) {
            winner = idx;
        }
    }

    Ok(winner)
}

/// Tournament parent selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    tournament_size: usize,
}

impl Selector {
    /// Creates a tournament selector. The tournament size is capped to the
    /// number of candidates at selection time.
    pub fn tournament(tournament_size: usize) -> Result<Self, SelectionError> {
        if tournament_size == 0 {
            return Err(SelectionError::InvalidTournamentSize {
                size: tournament_size,
            });
        }

        Ok(Self { tournament_size })
    }

    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }

    /// Selects one parent from the candidates.
    #[instrument(level = "debug", skip(self, rng, candidates), fields(tournament_size = self.tournament_size, num_candidates = candidates.len()))]
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        candidates: &'a [Arc<Individual>],
    ) -> Result<&'a Arc<Individual>, SelectionError> {
        let winner = tournament(rng, self.tournament_size, candidates)?;
        Ok(&candidates[winner])
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self { tournament_size: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cost, Gains, TelemetryRecord};
    use rand::{SeedableRng, rngs::StdRng};

    fn candidates(costs: &[f64]) -> Vec<Arc<Individual>> {
        costs
            .iter()
            .map(|&cost| {
                Arc::new(
                    Individual::new(Gains::proportional(cost), 0)
                        .scored(cost, TelemetryRecord::new()),
                )
            })
            .collect()
    }

    #[test]
    fn it_rejects_an_empty_tournament() {
        assert_eq!(
            Selector::tournament(0),
            Err(SelectionError::InvalidTournamentSize { size: 0 })
        );
    }

    #[test]
    fn it_errors_without_candidates() {
        let selector = Selector::tournament(3).expect("is valid");
        let mut rng = StdRng::seed_from_u64(42);

        assert_eq!(
            selector.select(&mut rng, &[]).map(|_| ()),
            Err(SelectionError::NoCandidates)
        );
    }

    #[test]
    fn it_picks_the_best_when_the_tournament_covers_everyone() {
        let selector = Selector::tournament(10).expect("is valid");
        let candidates = candidates(&[4.0, 2.0, 9.0, 1.0, 7.0]);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            let winner = selector.select(&mut rng, &candidates).expect("has candidates");
            assert_eq!(winner.cost(), Cost::Scored(1.0));
        }
    }

    #[test]
    fn it_never_picks_the_worst_with_a_tournament_of_two_or_more() {
        let selector = Selector::tournament(2).expect("is valid");
        let candidates = candidates(&[1.0, 2.0, 3.0, 4.0]);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..200 {
            let winner = selector.select(&mut rng, &candidates).expect("has candidates");
            assert_ne!(winner.cost(), Cost::Scored(4.0));
        }
    }

    #[test]
    fn it_returns_a_reference_into_the_candidates() {
        let selector = Selector::tournament(3).expect("is valid");
        let candidates = candidates(&[3.0, 1.0, 2.0]);
        let mut rng = StdRng::seed_from_u64(9);

        let winner = selector.select(&mut rng, &candidates).expect("has candidates");
        assert!(candidates.iter().any(|c| std::ptr::eq(c, winner)));
    }
}
