use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Controls how long an evolution run continues.
///
/// A run stops as soon as any configured condition holds. With no condition
/// at all the run only ends when it is interrupted.
///
/// # Examples
///
/// ```rust
/// use fx_pid_tuner::models::Schedule;
///
/// // Ten generations, no matter how good the best controller gets
/// let fixed = Schedule::generations(10);
///
/// // At most 50 generations, earlier once a trial scores 15 or better
/// let bounded = Schedule::generations(50).until_cost(15.0);
///
/// // Until interrupted by the operator
/// let open_ended = Schedule::unbounded();
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Number of completed generations after which the run stops.
    pub max_generations: Option<u64>,
    /// Best cost at or below which the run stops.
    pub target_cost: Option<f64>,
}

/// Decision about whether to breed another generation.
#[derive(Debug, PartialEq)]
pub enum ScheduleDecision {
    Continue,
    Terminate,
}

impl Schedule {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn generations(max_generations: u64) -> Self {
        Self {
            max_generations: Some(max_generations),
            target_cost: None,
        }
    }

    pub fn until_cost(mut self, target_cost: f64) -> Self {
        self.target_cost = Some(target_cost);
        self
    }

    /// Decides whether to continue after `completed` generations with the
    /// given best cost so far.
    #[instrument(level = "debug", skip(self), fields(max_generations = ?self.max_generations, target_cost = ?self.target_cost))]
    pub(crate) fn decide(&self, completed: u64, best_cost: Option<f64>) -> ScheduleDecision {
        if self.max_generations.is_some_and(|max| completed >= max) {
            return ScheduleDecision::Terminate;
        }

        if let (Some(target), Some(best)) = (self.target_cost, best_cost) {
            if best <= target {
                return ScheduleDecision::Terminate;
            }
        }

        ScheduleDecision::Continue
    }
}
