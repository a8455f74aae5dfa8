use super::{ElitePolicy, Error, GeneticTuner, Homing, TunerConfig};
use crate::models::{CostFunction, Crossover, GainBounds, Mutagen, Selector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::instrument;

pub struct TunerBuilder<R = StdRng> {
    pub(super) config: TunerConfig,
    pub(super) rng: R,
}

impl TunerBuilder<StdRng> {
    /// Starts from the default configuration and an OS-seeded generator.
    pub fn new() -> Self {
        Self {
            config: TunerConfig::default(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replaces the generator with one seeded from `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for TunerBuilder<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TunerBuilder<R> {
    pub fn with_rng<Q: Rng>(self, rng: Q) -> TunerBuilder<Q> {
        TunerBuilder {
            config: self.config,
            rng,
        }
    }

    pub fn with_config(mut self, config: TunerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_population_size(mut self, population_size: usize) -> Self {
        self.config.population_size = population_size;
        self
    }

    pub fn with_elite_count(mut self, elite_count: usize) -> Self {
        self.config.elite_count = elite_count;
        self
    }

    pub fn with_bounds(mut self, bounds: GainBounds) -> Self {
        self.config.bounds = bounds;
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.config.selector = selector;
        self
    }

    pub fn with_crossover(mut self, crossover: Crossover) -> Self {
        self.config.crossover = crossover;
        self
    }

    pub fn with_mutagen(mut self, mutagen: Mutagen) -> Self {
        self.config.mutagen = mutagen;
        self
    }

    pub fn with_cost_function(mut self, cost_function: CostFunction) -> Self {
        self.config.cost_function = cost_function;
        self
    }

    pub fn with_homing(mut self, homing: Homing) -> Self {
        self.config.homing = homing;
        self
    }

    pub fn with_elite_policy(mut self, elite_policy: ElitePolicy) -> Self {
        self.config.elite_policy = elite_policy;
        self
    }

    #[instrument(level = "debug", skip(self), fields(population_size = self.config.population_size, elite_count = self.config.elite_count, elite_policy = ?self.config.elite_policy))]
    pub fn build(self) -> Result<GeneticTuner<R>, Error> {
        let config = self.config;

        if config.population_size == 0 {
            return Err(Error::EmptyPopulation);
        }

        if config.elite_count > config.population_size {
            return Err(Error::TooManyElites {
                elite_count: config.elite_count,
                population_size: config.population_size,
            });
        }

        if let ElitePolicy::ReevaluateEvery { generations: 0 } = config.elite_policy {
            return Err(Error::InvalidElitePolicy { generations: 0 });
        }

        Ok(GeneticTuner {
            config,
            rng: self.rng,
            population: None,
            ranked: None,
            generation: 0,
            evaluations: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_builds_with_defaults() {
        let tuner = TunerBuilder::new().build().expect("is valid");
        let config = tuner.config();

        assert_eq!(config.population_size, 20);
        assert_eq!(config.elite_count, 2);
        assert_eq!(config.selector.tournament_size(), 3);
        assert_eq!(config.mutagen.mutation_rate(), 0.1);
        assert_eq!(config.elite_policy, ElitePolicy::Memoize);
        assert_eq!(config.homing, Homing::default());
        assert!(tuner.population().is_none());
    }

    #[test]
    fn it_validates_the_configuration() {
        assert!(matches!(
            TunerBuilder::new().with_population_size(0).build(),
            Err(Error::EmptyPopulation)
        ));
        assert!(matches!(
            TunerBuilder::new()
                .with_population_size(3)
                .with_elite_count(4)
                .build(),
            Err(Error::TooManyElites {
                elite_count: 4,
                population_size: 3
            })
        ));
        assert!(matches!(
            TunerBuilder::new()
                .with_elite_policy(ElitePolicy::ReevaluateEvery { generations: 0 })
                .build(),
            Err(Error::InvalidElitePolicy { generations: 0 })
        ));
    }

    #[test]
    fn it_replays_a_seeded_population() {
        let mut a = TunerBuilder::new().with_seed(9).build().expect("is valid");
        let mut b = TunerBuilder::new().with_seed(9).build().expect("is valid");
        a.initialize_population();
        b.initialize_population();

        let gains = |tuner: &GeneticTuner| {
            tuner
                .population()
                .expect("is initialized")
                .iter()
                .map(|i| *i.gains())
                .collect::<Vec<_>>()
        };
        assert_eq!(gains(&a), gains(&b));
    }

    #[test]
    fn it_accepts_any_generator() {
        let mut tuner = TunerBuilder::new()
            .with_rng(rand::rng())
            .with_population_size(2)
            .build()
            .expect("is valid");
        tuner.initialize_population();

        assert_eq!(tuner.population().expect("is initialized").len(), 2);
    }
}
