use crate::models::{
    CostBreakdown, CostFunction, Crossover, GainBounds, Gains, Individual, Mutagen, Selector,
};
use crate::protocol::Setpoint;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Move to a known position that precedes every trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Homing {
    pub gains: Gains,
    pub position: Setpoint,
    /// Pause after the homing move, letting the motor come to rest.
    pub settle: Duration,
}

impl Default for Homing {
    fn default() -> Self {
        Self {
            gains: Gains::proportional(1.0),
            position: Setpoint::saturating(400),
            settle: Duration::from_millis(300),
        }
    }
}

/// Whether elites carried into the next generation keep their cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElitePolicy {
    /// Elites are never trialled again.
    #[default]
    Memoize,
    /// Elites are trialled again on every n-th generation, so that one lucky
    /// trial cannot entrench itself.
    ReevaluateEvery { generations: u64 },
}

/// Parameters of a tuning run. Fixed once the tuner is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TunerConfig {
    pub population_size: usize,
    pub elite_count: usize,
    pub bounds: GainBounds,
    pub selector: Selector,
    pub crossover: Crossover,
    pub mutagen: Mutagen,
    pub cost_function: CostFunction,
    pub homing: Homing,
    pub elite_policy: ElitePolicy,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            elite_count: 2,
            bounds: GainBounds::default(),
            selector: Selector::default(),
            crossover: Crossover::default(),
            mutagen: Mutagen::default(),
            cost_function: CostFunction::default(),
            homing: Homing::default(),
            elite_policy: ElitePolicy::default(),
        }
    }
}

/// Summary of one completed generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Index of the evaluated generation, starting at 0.
    pub generation: u64,
    pub best: Individual,
    pub best_breakdown: Option<CostBreakdown>,
    pub mean_cost: Option<f64>,
    /// Trials run for this generation, homing excluded.
    pub evaluations: usize,
}

/// Outcome of [`GeneticTuner::run`](super::GeneticTuner::run).
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generations: u64,
    pub best: Option<Arc<Individual>>,
    pub evaluations: usize,
    pub interrupted: bool,
}
