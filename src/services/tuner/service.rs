use super::{ElitePolicy, Error, GenerationReport, RunSummary, TunerBuilder, TunerConfig};
use crate::models::{Individual, Never, Population, Schedule, ScheduleDecision, Terminated};
use crate::protocol::{Session, Setpoint};
use rand::Rng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::instrument;

/// Genetic search for PID gains, one physical trial per evaluation.
///
/// Trials run strictly one after another, in population order, each preceded
/// by a homing move. The tuner owns its random generator so that a seeded
/// tuner replays the same search against a deterministic plant.
pub struct GeneticTuner<R = StdRng> {
    pub(super) config: TunerConfig,
    pub(super) rng: R,
    pub(super) population: Option<Population>,
    pub(super) ranked: Option<Population>,
    pub(super) generation: u64,
    pub(super) evaluations: usize,
}

impl GeneticTuner<StdRng> {
    pub fn builder() -> TunerBuilder<StdRng> {
        TunerBuilder::new()
    }
}

impl<R: Rng> GeneticTuner<R> {
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Number of completed generations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Total trials run, homing excluded.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// The population awaiting evaluation, if initialized.
    pub fn population(&self) -> Option<&Population> {
        self.population.as_ref()
    }

    /// The fully evaluated population of the last completed generation,
    /// ascending by cost.
    pub fn ranked(&self) -> Option<&Population> {
        self.ranked.as_ref()
    }

    /// Draws a fresh random population and restarts the generation count.
    #[instrument(level = "info", skip(self), fields(population_size = self.config.population_size))]
    pub fn initialize_population(&mut self) {
        tracing::info!("Generating initial population");

        let population = (0..self.config.population_size)
            .map(|_| Arc::new(Individual::new(self.config.bounds.random(&mut self.rng), 0)))
            .collect();

        self.population = Some(population);
        self.ranked = None;
        self.generation = 0;
    }

    /// Homes the motor, runs one trial with the individual's gains and scores
    /// it. Individuals that already carry a cost are returned without a
    /// trial.
    #[instrument(level = "info", skip(self, session, individual), fields(individual_id = %individual.id(), gains = %individual.gains(), setpoint = %setpoint))]
    pub async fn evaluate_individual<S>(
        &mut self,
        session: &mut S,
        individual: &Arc<Individual>,
        setpoint: Setpoint,
    ) -> Result<Arc<Individual>, Error>
    where
        S: Session + ?Sized,
    {
        if individual.is_evaluated() {
            tracing::debug!("Individual already scored, skipping trial");
            return Ok(individual.clone());
        }

        let homing = self.config.homing;

        // Return to a known position, the response is not scored
        let home = session.run_trial(homing.gains, homing.position).await?;
        if !home.is_completed() {
            tracing::warn!(termination = ?home.termination, "Homing did not complete");
        }
        tokio::time::sleep(homing.settle).await;

        let outcome = session.run_trial(*individual.gains(), setpoint).await?;
        self.evaluations += 1;

        let cost = self.config.cost_function.evaluate(&outcome.record);
        tracing::info!(
            cost,
            termination = ?outcome.termination,
            samples = outcome.record.len(),
            "Individual evaluated"
        );

        Ok(Arc::new(individual.scored(cost, outcome.record)))
    }

    /// Evaluates, ranks and breeds one generation. Returns its best individual.
    pub async fn run_generation<S>(
        &mut self,
        session: &mut S,
        setpoint: Setpoint,
    ) -> Result<Arc<Individual>, Error>
    where
        S: Session + ?Sized,
    {
        self.run_generation_until(session, setpoint, &Never).await
    }

    /// Like [`run_generation`](Self::run_generation), but checks `terminated`
    /// before every trial.
    ///
    /// When it trips, the partially evaluated population is kept and
    /// [`Error::Interrupted`] is returned. Calling again resumes with the
    /// individuals that still lack a cost.
    #[instrument(level = "info", skip(self, session, terminated), fields(generation = self.generation, setpoint = %setpoint))]
    pub async fn run_generation_until<S, T>(
        &mut self,
        session: &mut S,
        setpoint: Setpoint,
        terminated: &T,
    ) -> Result<Arc<Individual>, Error>
    where
        S: Session + ?Sized,
        T: Terminated + ?Sized,
    {
        let mut individuals: Vec<Arc<Individual>> = self
            .population
            .as_ref()
            .ok_or(Error::NotInitialized)?
            .individuals()
            .to_vec();
        let total = individuals.len();

        // Evaluate in population order
        for index in 0..total {
            if individuals[index].is_evaluated() {
                continue;
            }

            if terminated.is_terminated() {
                let evaluated = individuals.iter().filter(|i| i.is_evaluated()).count();
                tracing::warn!(evaluated, total, "Generation interrupted");

                self.population = Some(Population::new(individuals));
                return Err(Error::Interrupted {
                    generation: self.generation,
                    evaluated,
                    total,
                });
            }

            let individual = individuals[index].clone();
            match self.evaluate_individual(session, &individual, setpoint).await {
                Ok(scored) => individuals[index] = scored,
                Err(e) => {
                    // Keep what was scored so a retry does not repeat trials
                    self.population = Some(Population::new(individuals));
                    return Err(e);
                }
            }
        }

        let ranked = Population::new(individuals).ranked();
        let best = ranked.get(0).cloned().ok_or(Error::EmptyPopulation)?;

        tracing::info!(
            best_cost = ?best.cost().value(),
            best_gains = %best.gains(),
            mean_cost = ?ranked.mean_cost(),
            "Generation evaluated"
        );

        self.population = Some(ranked.clone());
        let next = self.breed(&ranked)?;

        self.ranked = Some(ranked);
        self.population = Some(next);
        self.generation += 1;

        Ok(best)
    }

    /// Picks one parent from the current population by tournament.
    pub fn tournament_select(&mut self) -> Result<Arc<Individual>, Error> {
        let population = self.population.as_ref().ok_or(Error::NotInitialized)?;
        let parent = self
            .config
            .selector
            .select(&mut self.rng, population.individuals())?;
        Ok(parent.clone())
    }

    /// Blends two parents into an unevaluated child of the next generation.
    pub fn crossover(&mut self, p1: &Individual, p2: &Individual) -> Individual {
        let gains = self
            .config
            .crossover
            .apply(&mut self.rng, p1.gains(), p2.gains());
        Individual::new(gains, self.generation + 1)
    }

    /// Perturbs the individual's gains. The result is always within bounds
    /// and unevaluated.
    pub fn mutate(&mut self, individual: &Individual) -> Individual {
        let gains = self.config.mutagen.mutate(
            &mut self.rng,
            *individual.gains(),
            &self.config.bounds,
        );
        Individual::new(gains, individual.generation())
    }

    /// Runs generations until `schedule` says stop or `terminated` trips,
    /// reporting after each completed generation.
    #[instrument(level = "info", skip(self, session, terminated, on_generation), fields(setpoint = %setpoint, schedule = ?schedule))]
    pub async fn run<S, T, F>(
        &mut self,
        session: &mut S,
        setpoint: Setpoint,
        schedule: Schedule,
        terminated: &T,
        mut on_generation: F,
    ) -> Result<RunSummary, Error>
    where
        S: Session + ?Sized,
        T: Terminated + ?Sized,
        F: FnMut(&GenerationReport),
    {
        if self.population.is_none() {
            self.initialize_population();
        }

        let started_with = self.evaluations;
        let mut best: Option<Arc<Individual>> = None;
        let mut interrupted = false;

        loop {
            let best_cost = best.as_ref().and_then(|b| b.cost().value());
            if schedule.decide(self.generation, best_cost) == ScheduleDecision::Terminate {
                break;
            }

            let before = self.evaluations;
            let generation_best = match self
                .run_generation_until(session, setpoint, terminated)
                .await
            {
                Ok(individual) => individual,
                Err(Error::Interrupted { .. }) => {
                    interrupted = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            if best
                .as_ref()
                .is_none_or(|b| generation_best.cost().is_better(&b.cost()))
            {
                best = Some(generation_best.clone());
            }

            let report = GenerationReport {
                generation: self.generation - 1,
                best: (*generation_best).clone(),
                best_breakdown: generation_best
                    .telemetry()
                    .and_then(|record| self.config.cost_function.breakdown(record)),
                mean_cost: self.ranked.as_ref().and_then(Population::mean_cost),
                evaluations: self.evaluations - before,
            };
            on_generation(&report);
        }

        tracing::info!(
            generations = self.generation,
            interrupted,
            best_cost = ?best.as_ref().and_then(|b| b.cost().value()),
            "Run finished"
        );

        Ok(RunSummary {
            generations: self.generation,
            best,
            evaluations: self.evaluations - started_with,
            interrupted,
        })
    }

    /// Elites first, then children bred from tournament winners.
    fn breed(&mut self, ranked: &Population) -> Result<Population, Error> {
        let size = self.config.population_size;
        let reevaluate = match self.config.elite_policy {
            ElitePolicy::Memoize => false,
            ElitePolicy::ReevaluateEvery { generations } => {
                (self.generation + 1) % generations == 0
            }
        };

        let mut next = Vec::with_capacity(size);
        for elite in ranked.iter().take(self.config.elite_count) {
            if reevaluate {
                next.push(Arc::new(elite.unscored()));
            } else {
                next.push(elite.clone());
            }
        }

        while next.len() < size {
            let p1 = self.tournament_select()?;
            let p2 = self.tournament_select()?;
            let child = self.crossover(&p1, &p2);
            next.push(Arc::new(self.mutate(&child)));
        }

        tracing::debug!(
            elites = self.config.elite_count.min(size),
            children = size.saturating_sub(self.config.elite_count),
            reevaluate,
            "Bred next generation"
        );

        Ok(Population::new(next))
    }
}
