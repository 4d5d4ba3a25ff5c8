//! Generational genetic-algorithm engine for maximum-parsimony phylogenetics.
//!
//! Individuals carry a [`Genotype`] and compute their fitness asynchronously
//! on a shared worker pool ([`scheduler::FitnessScheduler`]). The tree
//! genotype in [`phylo`] evolves binary trees of taxa, scored with the
//! Sankoff algorithm; lower parsimony cost is better, so every ordering
//! component takes a `low_good` flag.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod alignment;
pub mod config;
pub mod environment;
pub mod error;
pub mod individual;
pub mod phylo;
pub mod population;
pub mod report;
pub mod scheduler;
pub mod selection;
pub mod termination;
pub mod tree;

pub use environment::Environment;
pub use error::{EvolutionError, GenotypeError};
pub use individual::Individual;
pub use phylo::{Sankoff, Taxon, TreeGenotype};
pub use population::Population;
pub use scheduler::{EvolutionContext, FitnessScheduler};

/// How a genotype came to exist. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Initial,
    Mutation,
    Crossover,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Source::Initial => "INITIAL",
            Source::Mutation => "MUTATION",
            Source::Crossover => "CROSSOVER",
        };
        f.write_str(name)
    }
}

/// The 'DNA' of an individual.
///
/// Operators never touch `self`: published individuals are immutable, so
/// both crossover and mutation hand back a brand-new genotype.
pub trait Genotype: Clone + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// Combines `self` with `other`. Fails when the two cannot be bred,
    /// which the population treats as a fatal configuration error.
    fn crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> Result<Self, GenotypeError>;

    /// Returns a mutated copy, or `None` when no mutation event fired.
    fn mutate<R: Rng + ?Sized>(&self, rng: &mut R, probability: f64) -> Option<Self>;

    fn source(&self) -> Source;
}

/// Computes the fitness of a genotype. Runs on the worker pool.
pub trait Evaluator<G: Genotype>: Send + Sync {
    fn evaluate(&self, genotype: &G) -> f64;
}
