use crate::models::SelectionError;
use crate::protocol::SessionError;

/// Errors that can occur while configuring or running the tuner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("population has not been initialized")]
    NotInitialized,
    #[error("population_size must be at least 1")]
    EmptyPopulation,
    #[error("elite_count={elite_count} exceeds population_size={population_size}")]
    TooManyElites {
        elite_count: usize,
        population_size: usize,
    },
    #[error("elites must be re-evaluated at least every generation, got every {generations}")]
    InvalidElitePolicy { generations: u64 },
    #[error("interrupted in generation {generation} after {evaluated} of {total} trials")]
    Interrupted {
        generation: u64,
        evaluated: usize,
        total: usize,
    },
    #[error("SessionError: {0}")]
    SessionError(#[from] SessionError),
    #[error("SelectionError: {0}")]
    SelectionError(#[from] SelectionError),
}
