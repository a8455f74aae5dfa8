mod cost;
mod cost_function;
mod crossover;
mod gains;
mod gene_bounds;
mod individual;
mod mutagen;
mod population;
mod schedule;
mod selector;
mod telemetry;
mod terminated;

pub use cost::{Cost, EMPTY_RECORD_PENALTY};
pub use cost_function::{
    CostBreakdown, CostFunction, CostWeightError, CostWeights, OVERSHOOT_DEADBAND,
    SETTLING_THRESHOLD,
};
pub use crossover::{Crossover, ProbabilityOutOfRangeError};
pub use gains::Gains;
pub use gene_bounds::{GainBounds, GeneBoundError, GeneBounds};
pub use individual::Individual;
pub use mutagen::{
    MAX_MUTATION_FACTOR, MIN_MUTATION_FACTOR, Mutagen, MutationRate, MutationRateOutOfRange,
};
pub use population::Population;
pub use schedule::Schedule;
pub use selector::{SelectionError, Selector};
pub use telemetry::{TelemetryRecord, TelemetrySample};
pub use terminated::{Never, Terminated};

pub(crate) use schedule::ScheduleDecision;
