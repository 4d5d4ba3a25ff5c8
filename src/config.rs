//! Run configuration and assembly of an [`Environment`] from it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alignment::{ClustalFile, TaxonSource};
use crate::environment::Environment;
use crate::error::{ConfigError, EvolutionError};
use crate::phylo::{CherryCount, Sankoff, TreeGenotype};
use crate::population::{GenerationSettings, Population};
use crate::report::reporter_by_name;
use crate::scheduler::{EvolutionContext, FitnessScheduler};
use crate::selection::selection_by_name;
use crate::termination::terminator_from_spec;

/// Everything needed to start a run. Missing JSON fields take their
/// default values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub elitism: f64,
    pub max_population_size: usize,
    pub parent_selection: String,
    pub survivor_selection: String,
    /// `"generations:N"` or `"convergence:K"`.
    pub terminator: String,
    pub low_good: bool,
    pub seed: u64,
    /// Fitness workers; `None` uses every available core.
    pub workers: Option<usize>,
    pub alignment: Option<PathBuf>,
    pub printer: String,
    /// `"sankoff"` or `"cherry-count"`.
    pub evaluator: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            crossover_rate: 0.8,
            mutation_rate: 0.05,
            elitism: 0.1,
            max_population_size: 100,
            parent_selection: "tournament".to_string(),
            survivor_selection: "truncation".to_string(),
            terminator: "generations:50".to_string(),
            low_good: true,
            seed: 0,
            workers: None,
            alignment: None,
            printer: "max-fitness".to_string(),
            evaluator: "sankoff".to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let load_error = |reason: String| ConfigError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| load_error(e.to_string()))
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            crossover_rate: self.crossover_rate,
            mutation_rate: self.mutation_rate,
            elitism: self.elitism,
            max_size: Some(self.max_population_size),
            low_good: self.low_good,
        }
    }

    /// Rejects out-of-range rates, an empty population, a zero worker count
    /// and unknown strategy names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generation_settings().validate()?;
        if self.workers == Some(0) {
            return Err(ConfigError::NoWorkers);
        }
        selection_by_name::<TreeGenotype>(&self.parent_selection)?;
        selection_by_name::<TreeGenotype>(&self.survivor_selection)?;
        terminator_from_spec::<TreeGenotype>(&self.terminator, self.low_good)?;
        reporter_by_name::<TreeGenotype>(&self.printer)?;
        match self.evaluator.as_str() {
            "sankoff" | "cherry-count" => Ok(()),
            other => Err(ConfigError::UnknownEvaluator(other.to_string())),
        }
    }

    /// The configured ClustalW file.
    pub fn alignment_source(&self) -> Result<ClustalFile, ConfigError> {
        self.alignment
            .as_ref()
            .map(ClustalFile::new)
            .ok_or(ConfigError::MissingAlignment)
    }

    /// Validates, starts the worker pool and seeds a population from
    /// `source`.
    pub fn build_environment<S: TaxonSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Environment<TreeGenotype>, EvolutionError> {
        self.validate()?;
        let scheduler = match self.workers {
            Some(workers) => FitnessScheduler::with_workers(workers)?,
            None => FitnessScheduler::new()?,
        };
        debug!(workers = scheduler.workers(), evaluator = %self.evaluator, "building environment");
        let ctx = match self.evaluator.as_str() {
            "cherry-count" => EvolutionContext::with_scheduler(scheduler, CherryCount),
            _ => EvolutionContext::with_scheduler(scheduler, Sankoff::default()),
        };

        let mut population = Population::new(
            Arc::new(ctx),
            self.generation_settings(),
            selection_by_name(&self.parent_selection)?,
            selection_by_name(&self.survivor_selection)?,
            self.seed,
        )?;
        population.seed_from_taxa(source)?;

        Ok(Environment::new(
            population,
            terminator_from_spec(&self.terminator, self.low_good)?,
            reporter_by_name(&self.printer)?,
        ))
    }
}
