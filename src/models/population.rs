use super::{Cost, Individual};
use std::sync::Arc;

/// Fixed-size, ordered set of individuals of one generation.
///
/// Individuals are shared so that elites carried into the next generation
/// keep their identity.
#[derive(Debug, Clone, Default)]
pub struct Population {
    individuals: Vec<Arc<Individual>>,
}

impl Population {
    pub fn new(individuals: Vec<Arc<Individual>>) -> Self {
        Self { individuals }
    }

    pub fn individuals(&self) -> &[Arc<Individual>] {
        &self.individuals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Individual>> {
        self.individuals.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Individual>> {
        self.individuals.get(index)
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Number of individuals still waiting for a trial.
    pub fn unevaluated(&self) -> usize {
        self.individuals.iter().filter(|i| !i.is_evaluated()).count()
    }

    /// Returns the population ordered ascending by cost. Ties keep their order.
    pub fn ranked(mut self) -> Self {
        self.individuals.sort_by(|a, b| a.cost().rank(&b.cost()));
        self
    }

    pub fn is_ranked(&self) -> bool {
        self.individuals
            .windows(2)
            .all(|pair| pair[0].cost().rank(&pair[1].cost()).is_le())
    }

    /// Mean of all scored costs, if any.
    pub fn mean_cost(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .individuals
            .iter()
            .filter_map(|i| i.cost().value())
            .collect();

        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub fn best(&self) -> Option<&Arc<Individual>> {
        self.individuals
            .iter()
            .filter(|i| i.is_evaluated())
            .min_by(|a, b| a.cost().rank(&b.cost()))
    }
}

impl FromIterator<Arc<Individual>> for Population {
    fn from_iter<I: IntoIterator<Item = Arc<Individual>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Population> for Vec<Arc<Individual>> {
    fn from(population: Population) -> Self {
        population.individuals
    }
}
