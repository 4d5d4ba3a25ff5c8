//! Stopping conditions for a run.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::ConfigError;
use crate::population::Population;
use crate::Genotype;

/// Decides after every generation whether the run is over.
pub trait Terminator<G: Genotype>: Send {
    fn name(&self) -> &'static str;

    fn should_terminate(&mut self, population: &Population<G>) -> bool;
}

/// Stops once the population reaches a generation count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationsTerminator {
    pub generations: u64,
}

impl GenerationsTerminator {
    pub fn new(generations: u64) -> Self {
        Self { generations }
    }
}

impl<G: Genotype> Terminator<G> for GenerationsTerminator {
    fn name(&self) -> &'static str {
        "generations"
    }

    fn should_terminate(&mut self, population: &Population<G>) -> bool {
        population.generation() >= self.generations
    }
}

/// Stops when the average fitness stops improving.
///
/// The first `window` generations only record their averages. After that a
/// generation whose average is no better than the mean of the recorded
/// window ends the run; otherwise it replaces the oldest entry.
#[derive(Clone, Debug)]
pub struct ConvergenceTerminator {
    window: usize,
    low_good: bool,
    history: VecDeque<f64>,
}

impl ConvergenceTerminator {
    pub fn new(window: usize, low_good: bool) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::Terminator {
                spec: "convergence:0".to_string(),
                reason: "window must be at least one generation".to_string(),
            });
        }
        Ok(Self {
            window,
            low_good,
            history: VecDeque::with_capacity(window),
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Feeds one generation's average fitness.
    pub fn observe(&mut self, generation: u64, average: f64) -> bool {
        if generation < self.window as u64 {
            self.history.push_back(average);
            return false;
        }
        let past = self.history.iter().sum::<f64>() / self.history.len() as f64;
        let improved = if self.low_good {
            average < past
        } else {
            average > past
        };
        if !improved {
            debug!(generation, past, average, "average fitness converged");
            return true;
        }
        self.history.pop_front();
        self.history.push_back(average);
        false
    }
}

impl<G: Genotype> Terminator<G> for ConvergenceTerminator {
    fn name(&self) -> &'static str {
        "convergence"
    }

    fn should_terminate(&mut self, population: &Population<G>) -> bool {
        match population.average_fitness() {
            Some(average) => self.observe(population.generation(), average),
            None => true,
        }
    }
}

/// Builds a terminator from `"generations:N"` or `"convergence:K"`.
pub fn terminator_from_spec<G: Genotype>(spec: &str, low_good: bool) -> Result<Box<dyn Terminator<G>>, ConfigError> {
    let invalid = |reason: &str| ConfigError::Terminator {
        spec: spec.to_string(),
        reason: reason.to_string(),
    };
    let (kind, value) = spec
        .split_once(':')
        .ok_or_else(|| invalid("expected <kind>:<count>"))?;
    let count: u64 = value
        .trim()
        .parse()
        .map_err(|_| invalid("count is not a non-negative integer"))?;
    match kind.trim().to_ascii_lowercase().as_str() {
        "generations" | "numgenerations" => Ok(Box::new(GenerationsTerminator::new(count))),
        "convergence" => {
            let window = usize::try_from(count).map_err(|_| invalid("window too large"))?;
            let terminator =
                ConvergenceTerminator::new(window, low_good).map_err(|_| invalid("window must be at least one"))?;
            Ok(Box::new(terminator))
        }
        _ => Err(invalid("unknown terminator kind")),
    }
}
