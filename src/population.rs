//! A generation of individuals and the transition to the next one.
//!
//! One call to [`Population::undergo_generation`]:
//! 1. selects `floor(crossover_rate * size)` parents,
//! 2. breeds every parent with a distinct random co-parent and mutates every
//!    member of the current generation, repeating both until the offspring
//!    pool reaches the maximum size,
//! 3. carries `floor(elitism * parents)` parents over unchanged,
//! 4. lets survivor selection cut the pool back to the maximum size.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{Level, debug, info};

use crate::alignment::TaxonSource;
use crate::error::{ConfigError, EvolutionError, GenotypeError};
use crate::individual::Individual;
use crate::phylo::TreeGenotype;
use crate::scheduler::EvolutionContext;
use crate::selection::{Pool, Selection, rank_fitness};
use crate::Genotype;

/// Rates and limits of the generational transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub elitism: f64,
    /// `None` means unbounded.
    pub max_size: Option<usize>,
    pub low_good: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            crossover_rate: 0.8,
            mutation_rate: 0.05,
            elitism: 0.1,
            max_size: Some(100),
            low_good: true,
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("crossover rate", self.crossover_rate),
            ("mutation rate", self.mutation_rate),
            ("elitism", self.elitism),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        if self.max_size == Some(0) {
            return Err(ConfigError::EmptyPopulation);
        }
        Ok(())
    }
}

/// Summary of one generation's fitness values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FitnessStats {
    pub best: f64,
    pub worst: f64,
    pub average: f64,
}

/// Sum of the fitness of `individuals`.
pub fn total_fitness<G: Genotype>(individuals: &[Arc<Individual<G>>]) -> f64 {
    individuals.iter().map(|i| i.fitness()).sum()
}

pub fn average_fitness<G: Genotype>(individuals: &[Arc<Individual<G>>]) -> f64 {
    total_fitness(individuals) / individuals.len() as f64
}

pub struct Population<G: Genotype> {
    individuals: Pool<G>,
    ctx: Arc<EvolutionContext<G>>,
    settings: GenerationSettings,
    parent_selection: Box<dyn Selection<G>>,
    survivor_selection: Box<dyn Selection<G>>,
    generation: u64,
    rng: Pcg64,
    stats: OnceLock<Option<FitnessStats>>,
    last_elapsed: Option<Duration>,
}

impl<G: Genotype> Population<G> {
    /// Creates an empty population.
    pub fn new(
        ctx: Arc<EvolutionContext<G>>,
        settings: GenerationSettings,
        parent_selection: Box<dyn Selection<G>>,
        survivor_selection: Box<dyn Selection<G>>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            individuals: Vec::new(),
            ctx,
            settings,
            parent_selection,
            survivor_selection,
            generation: 0,
            rng: Pcg64::seed_from_u64(seed),
            stats: OnceLock::new(),
            last_elapsed: None,
        })
    }

    /// Fills the population with `count` generated genotypes. Nothing is
    /// added unless every genotype is built successfully.
    pub fn seed_with<F>(&mut self, count: usize, mut factory: F) -> Result<(), GenotypeError>
    where
        F: FnMut(&mut Pcg64) -> Result<G, GenotypeError>,
    {
        let genotypes = (0..count)
            .map(|_| factory(&mut self.rng))
            .collect::<Result<Vec<_>, _>>()?;
        for genotype in genotypes {
            self.individuals.push(self.ctx.spawn(genotype));
        }
        self.stats = OnceLock::new();
        Ok(())
    }

    pub fn individuals(&self) -> &[Arc<Individual<G>>] {
        &self.individuals
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn low_good(&self) -> bool {
        self.settings.low_good
    }

    pub fn context(&self) -> &Arc<EvolutionContext<G>> {
        &self.ctx
    }

    pub fn parent_selection(&self) -> &dyn Selection<G> {
        self.parent_selection.as_ref()
    }

    pub fn survivor_selection(&self) -> &dyn Selection<G> {
        self.survivor_selection.as_ref()
    }

    /// Wall-clock time of the most recent generational transition.
    pub fn last_generation_elapsed(&self) -> Option<Duration> {
        self.last_elapsed
    }

    /// Best, worst and average fitness, computed once per generation.
    /// Blocks until every member's fitness is known.
    pub fn stats(&self) -> Option<FitnessStats> {
        *self.stats.get_or_init(|| {
            if self.individuals.is_empty() {
                return None;
            }
            let low_good = self.settings.low_good;
            let fitness: Vec<f64> = self.individuals.iter().map(|i| i.fitness()).collect();
            let best = fitness
                .iter()
                .copied()
                .min_by(|a, b| rank_fitness(*a, *b, low_good))?;
            let worst = fitness
                .iter()
                .copied()
                .max_by(|a, b| rank_fitness(*a, *b, low_good))?;
            let average = fitness.iter().sum::<f64>() / fitness.len() as f64;
            Some(FitnessStats {
                best,
                worst,
                average,
            })
        })
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.stats().map(|s| s.best)
    }

    pub fn average_fitness(&self) -> Option<f64> {
        self.stats().map(|s| s.average)
    }

    pub fn worst_fitness(&self) -> Option<f64> {
        self.stats().map(|s| s.worst)
    }

    /// The member with the best fitness; the first one on ties.
    pub fn best_individual(&self) -> Option<&Arc<Individual<G>>> {
        let low_good = self.settings.low_good;
        self.individuals.iter().reduce(|best, ind| {
            if rank_fitness(ind.fitness(), best.fitness(), low_good).is_lt() {
                ind
            } else {
                best
            }
        })
    }

    pub fn worst_individual(&self) -> Option<&Arc<Individual<G>>> {
        let low_good = self.settings.low_good;
        self.individuals.iter().reduce(|worst, ind| {
            if rank_fitness(ind.fitness(), worst.fitness(), low_good).is_gt() {
                ind
            } else {
                worst
            }
        })
    }

    /// Runs one generational transition and advances the generation counter.
    ///
    /// Breeding errors are fatal: the population is left untouched and the
    /// error is returned.
    pub fn undergo_generation(&mut self) -> Result<(), EvolutionError> {
        let start = Instant::now();
        let low_good = self.settings.low_good;
        let original = self.individuals.clone();

        let parent_count = (self.settings.crossover_rate * original.len() as f64).floor() as usize;
        let parents = self
            .parent_selection
            .select(&original, parent_count, low_good, &mut self.rng)?;

        let target = self.settings.max_size.unwrap_or(0);
        let mut offspring: Pool<G> = Vec::new();
        loop {
            let before = offspring.len();
            self.crossover_round(&parents, &mut offspring)?;
            self.mutation_round(&original, &mut offspring);
            debug!(
                generation = self.generation,
                offspring = offspring.len(),
                target,
                "breeding round"
            );
            if offspring.len() >= target {
                break;
            }
            if offspring.len() == before {
                return Err(EvolutionError::Stalled {
                    generation: self.generation,
                    pool: offspring.len(),
                    target,
                });
            }
        }

        let elite_count = (self.settings.elitism * parents.len() as f64).floor() as usize;
        let elite = self
            .parent_selection
            .select(&parents, elite_count, low_good, &mut self.rng)?;
        offspring.extend(elite);

        let survivors = self.settings.max_size.unwrap_or(offspring.len());
        let next = self
            .survivor_selection
            .select(&offspring, survivors, low_good, &mut self.rng)?;

        self.individuals = next;
        self.generation += 1;
        self.stats = OnceLock::new();
        self.last_elapsed = Some(start.elapsed());

        if !tracing::enabled!(Level::INFO) {
            return Ok(());
        }
        if let Some(stats) = self.stats() {
            info!(
                generation = self.generation,
                size = self.individuals.len(),
                best = stats.best,
                average = stats.average,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "generation complete"
            );
        }
        Ok(())
    }

    fn crossover_round(&mut self, parents: &[Arc<Individual<G>>], out: &mut Pool<G>) -> Result<(), GenotypeError> {
        if parents.len() < 2 {
            return Ok(());
        }
        for (x, parent) in parents.iter().enumerate() {
            let mut co_parent = self.rng.random_range(0..parents.len());
            while co_parent == x {
                co_parent = self.rng.random_range(0..parents.len());
            }
            out.push(parent.breed(&parents[co_parent], &self.ctx, &mut self.rng)?);
        }
        Ok(())
    }

    fn mutation_round(&mut self, pool: &[Arc<Individual<G>>], out: &mut Pool<G>) {
        let probability = self.settings.mutation_rate;
        out.extend(
            pool.iter()
                .filter_map(|ind| ind.mutate(&self.ctx, probability, &mut self.rng)),
        );
    }
}

impl Population<TreeGenotype> {
    /// Loads taxa from `source` and fills the population with
    /// `max_size` random trees.
    pub fn seed_from_taxa<S: TaxonSource + ?Sized>(&mut self, source: &S) -> Result<(), EvolutionError> {
        let taxa = source.load()?;
        let count = self.settings.max_size.ok_or(ConfigError::EmptyPopulation)?;
        self.seed_with(count, |rng| TreeGenotype::random(&taxa, rng))?;
        info!(taxa = taxa.len(), individuals = count, "population seeded");
        Ok(())
    }
}

impl<G: Genotype + fmt::Display> fmt::Display for Population<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(elapsed), Some(previous)) = (self.last_elapsed, self.generation.checked_sub(1)) {
            writeln!(f, "Generation #{previous} runtime(ms): {}", elapsed.as_millis())?;
        }
        writeln!(f, "Generation #: {}", self.generation)?;
        if let Some(stats) = self.stats() {
            writeln!(f, "Best fitness: {}", stats.best)?;
            writeln!(f, "Avg fitness: {}", stats.average)?;
            writeln!(f, "Worst fitness: {}", stats.worst)?;
        }
        writeln!(f, "Individuals ({} total):", self.individuals.len())?;
        for individual in &self.individuals {
            write!(f, "{individual}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::InMemoryTaxa;
    use crate::phylo::{Sankoff, Taxon};
    use crate::scheduler::FitnessScheduler;
    use crate::selection::{BinaryTournament, Truncation};

    fn context() -> Arc<EvolutionContext<TreeGenotype>> {
        Arc::new(EvolutionContext::with_scheduler(
            FitnessScheduler::with_workers(2).unwrap(),
            Sankoff::default(),
        ))
    }

    fn source() -> InMemoryTaxa {
        InMemoryTaxa(vec![
            Taxon::new("a", "AACG"),
            Taxon::new("b", "AACT"),
            Taxon::new("c", "TTGC"),
            Taxon::new("d", "TAGC"),
            Taxon::new("e", "CAGA"),
        ])
    }

    fn population(settings: GenerationSettings) -> Population<TreeGenotype> {
        Population::new(context(), settings, Box::new(Truncation), Box::new(Truncation), 42).unwrap()
    }

    #[test]
    fn test_settings_validation() {
        let bad = GenerationSettings {
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert_eq!(
            bad.validate(),
            Err(ConfigError::RateOutOfRange {
                name: "mutation rate",
                value: 1.5
            })
        );
        let empty = GenerationSettings {
            max_size: Some(0),
            ..Default::default()
        };
        assert_eq!(empty.validate(), Err(ConfigError::EmptyPopulation));
    }

    #[test]
    fn test_seed_fills_to_max_size() {
        let mut pop = population(GenerationSettings {
            max_size: Some(12),
            ..Default::default()
        });
        pop.seed_from_taxa(&source()).unwrap();
        assert_eq!(pop.len(), 12);
        assert_eq!(pop.generation(), 0);
        assert!(pop.individuals().iter().all(|i| i.genotype().taxon_count() == 5));
    }

    #[test]
    fn test_seed_failure_leaves_population_empty() {
        let mut pop = population(GenerationSettings::default());
        let err = pop.seed_from_taxa(&InMemoryTaxa(vec![])).unwrap_err();
        assert!(matches!(err, EvolutionError::Alignment(_)));
        assert!(pop.is_empty());
    }

    #[test]
    fn test_generation_keeps_size_and_counts() {
        let mut pop = population(GenerationSettings {
            crossover_rate: 1.0,
            mutation_rate: 0.0,
            elitism: 0.0,
            max_size: Some(10),
            low_good: true,
        });
        pop.seed_from_taxa(&source()).unwrap();
        for expected in 1..=2 {
            pop.undergo_generation().unwrap();
            assert_eq!(pop.len(), 10);
            assert_eq!(pop.generation(), expected);
        }
        assert!(pop.last_generation_elapsed().is_some());
    }

    #[test]
    fn test_generation_leaves_stats_lazy_without_logging() {
        let mut pop = population(GenerationSettings {
            max_size: Some(6),
            ..Default::default()
        });
        pop.seed_from_taxa(&source()).unwrap();
        pop.undergo_generation().unwrap();
        assert!(pop.stats.get().is_none());
        assert!(pop.stats().is_some());
        assert!(pop.stats.get().is_some());
    }

    #[test]
    fn test_truncation_never_worsens_best() {
        let mut pop = population(GenerationSettings {
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            elitism: 0.2,
            max_size: Some(16),
            low_good: true,
        });
        pop.seed_from_taxa(&source()).unwrap();
        let mut best = pop.best_fitness().unwrap();
        for _ in 0..5 {
            pop.undergo_generation().unwrap();
            let now = pop.best_fitness().unwrap();
            // elite parents compete with offspring under truncation
            assert!(now <= best);
            best = now;
        }
    }

    #[test]
    fn test_stalled_generation_is_error() {
        let mut pop = population(GenerationSettings {
            crossover_rate: 0.0,
            mutation_rate: 0.0,
            elitism: 0.0,
            max_size: Some(4),
            low_good: true,
        });
        pop.seed_from_taxa(&source()).unwrap();
        assert!(matches!(
            pop.undergo_generation(),
            Err(EvolutionError::Stalled { generation: 0, .. })
        ));
        assert_eq!(pop.generation(), 0);
        assert_eq!(pop.len(), 4);
    }

    #[test]
    fn test_unbounded_population_keeps_everything() {
        let mut pop = Population::new(
            context(),
            GenerationSettings {
                crossover_rate: 1.0,
                mutation_rate: 0.0,
                elitism: 1.0,
                max_size: None,
                low_good: true,
            },
            Box::new(Truncation),
            Box::new(BinaryTournament),
            3,
        )
        .unwrap();
        let taxa = source().load().unwrap();
        pop.seed_with(6, |rng| TreeGenotype::random(&taxa, rng)).unwrap();
        pop.undergo_generation().unwrap();
        // 6 children plus 6 elite parents
        assert_eq!(pop.len(), 12);
    }

    #[test]
    fn test_stats_and_best_agree() {
        let mut pop = population(GenerationSettings {
            max_size: Some(8),
            ..Default::default()
        });
        pop.seed_from_taxa(&source()).unwrap();
        let stats = pop.stats().unwrap();
        let best = pop.best_individual().unwrap();
        assert_eq!(best.fitness(), stats.best);
        assert!(stats.best <= stats.average && stats.average <= stats.worst);
        assert_eq!(average_fitness(pop.individuals()), stats.average);
    }

    #[test]
    fn test_display_has_header() {
        let mut pop = population(GenerationSettings {
            max_size: Some(3),
            ..Default::default()
        });
        pop.seed_from_taxa(&source()).unwrap();
        let text = pop.to_string();
        assert!(text.starts_with("Generation #: 0\n"));
        assert!(text.contains("Individuals (3 total):"));
    }
}
