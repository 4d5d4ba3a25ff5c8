use std::fmt;
use std::sync::Arc;

use rand::Rng;

use crate::error::{FitnessError, GenotypeError};
use crate::scheduler::{EvolutionContext, FitnessCell, FitnessState};
use crate::Genotype;

/// A genotype paired with a fitness value computed in the background.
///
/// Individuals are immutable once created; breeding and mutation always
/// produce new ones. They are shared between generations as `Arc`s.
pub struct Individual<G: Genotype> {
    id: u64,
    genotype: Arc<G>,
    fitness: Arc<FitnessCell>,
}

impl<G: Genotype> Individual<G> {
    /// Assigns the next id and queues the fitness task. Never blocks.
    pub fn new(ctx: &EvolutionContext<G>, genotype: G) -> Arc<Self> {
        let id = ctx.next_id();
        let genotype = Arc::new(genotype);
        let fitness = Arc::new(FitnessCell::new());

        let evaluator = Arc::clone(ctx.evaluator());
        let task_genotype = Arc::clone(&genotype);
        ctx.scheduler()
            .submit(id, Arc::clone(&fitness), move || evaluator.evaluate(&task_genotype));

        Arc::new(Self {
            id,
            genotype,
            fitness,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn genotype(&self) -> &G {
        &self.genotype
    }

    pub fn fitness_state(&self) -> FitnessState {
        self.fitness.state()
    }

    /// Blocks until this individual's own task is done.
    pub fn try_fitness(&self) -> Result<f64, FitnessError> {
        match self.fitness.wait() {
            FitnessState::Ready(value) => Ok(value),
            FitnessState::Panicked => Err(FitnessError::Panicked(self.id)),
            _ => Err(FitnessError::Abandoned(self.id)),
        }
    }

    /// Blocking fitness read. An evaluation that never completed reads as
    /// NaN, which every ordering in the crate ranks last.
    pub fn fitness(&self) -> f64 {
        self.try_fitness().unwrap_or(f64::NAN)
    }

    /// Crosses this individual's genotype with `other`'s into a new individual.
    pub fn breed<R: Rng + ?Sized>(
        &self,
        other: &Self,
        ctx: &EvolutionContext<G>,
        rng: &mut R,
    ) -> Result<Arc<Self>, GenotypeError> {
        let child = self.genotype.crossover(&other.genotype, rng)?;
        Ok(Self::new(ctx, child))
    }

    /// Mutated offspring, or `None` if no mutation event fired.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        ctx: &EvolutionContext<G>,
        probability: f64,
        rng: &mut R,
    ) -> Option<Arc<Self>> {
        self.genotype
            .mutate(rng, probability)
            .map(|genotype| Self::new(ctx, genotype))
    }
}

impl<G: Genotype> fmt::Debug for Individual<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Individual")
            .field("id", &self.id)
            .field("fitness", &self.fitness.state())
            .field("source", &self.genotype.source())
            .finish()
    }
}

impl<G: Genotype + fmt::Display> fmt::Display for Individual<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Individual ID: {}", self.id)?;
        writeln!(f, "\t Phenotype: {}", self.genotype)?;
        writeln!(f, "\t Fitness: {}", self.fitness())?;
        writeln!(f, "\t Source: {}", self.genotype.source())
    }
}
