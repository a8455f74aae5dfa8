use super::{Cost, Gains, TelemetryRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

/// A candidate gain set and, once a trial has run, its cost and telemetry.
///
/// Individuals are values: scoring produces a new `Individual` with the same
/// id and gains rather than mutating the original.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Individual {
    pub(crate) id: Uuid,
    pub(crate) generation: u64,
    pub(crate) gains: Gains,
    pub(crate) cost: Cost,
    #[serde(skip)]
    pub(crate) telemetry: Option<TelemetryRecord>,
    pub(crate) evaluated_at: Option<DateTime<Utc>>,
}

impl Individual {
    #[instrument(level = "debug", fields(gains = %gains, generation = generation))]
    pub fn new(gains: Gains, generation: u64) -> Self {
        Self {
            id: Uuid::now_v7(),
            generation,
            gains,
            cost: Cost::Unevaluated,
            telemetry: None,
            evaluated_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Generation this individual was bred in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn gains(&self) -> &Gains {
        &self.gains
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn telemetry(&self) -> Option<&TelemetryRecord> {
        self.telemetry.as_ref()
    }

    pub fn evaluated_at(&self) -> Option<DateTime<Utc>> {
        self.evaluated_at
    }

    pub fn is_evaluated(&self) -> bool {
        self.cost.is_evaluated()
    }

    /// Returns this individual carrying the outcome of its trial.
    pub(crate) fn scored(&self, cost: f64, telemetry: TelemetryRecord) -> Self {
        Self {
            id: self.id,
            generation: self.generation,
            gains: self.gains,
            cost: Cost::scored(cost),
            telemetry: Some(telemetry),
            evaluated_at: Some(Utc::now()),
        }
    }

    /// Returns this individual with its cost cleared, ready to be scored again.
    pub(crate) fn unscored(&self) -> Self {
        Self {
            id: self.id,
            generation: self.generation,
            gains: self.gains,
            cost: Cost::Unevaluated,
            telemetry: None,
            evaluated_at: None,
        }
    }
}
