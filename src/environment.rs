use std::io::Write;
use std::time::Instant;

use tracing::{error, info};

use crate::error::EvolutionError;
use crate::population::Population;
use crate::report::Reporter;
use crate::termination::Terminator;
use crate::Genotype;

/// A population together with its stopping condition and reporter.
pub struct Environment<G: Genotype> {
    population: Population<G>,
    terminator: Box<dyn Terminator<G>>,
    reporter: Box<dyn Reporter<G>>,
}

impl<G: Genotype> Environment<G> {
    pub fn new(
        population: Population<G>,
        terminator: Box<dyn Terminator<G>>,
        reporter: Box<dyn Reporter<G>>,
    ) -> Self {
        Self {
            population,
            terminator,
            reporter,
        }
    }

    pub fn population(&self) -> &Population<G> {
        &self.population
    }

    /// Runs generations until the terminator says stop, writing the
    /// reporter's output to `out`. The worker pool is shut down on the way
    /// out whether or not the run succeeded.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<(), EvolutionError> {
        let start = Instant::now();
        info!(
            size = self.population.len(),
            terminator = self.terminator.name(),
            reporter = self.reporter.name(),
            "run started"
        );
        let result = self.run_loop(out);
        self.population.context().cleanup();
        match &result {
            Ok(()) => info!(
                generations = self.population.generation(),
                best = ?self.population.best_fitness(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "run finished"
            ),
            Err(e) => error!(generation = self.population.generation(), "run aborted: {e}"),
        }
        result
    }

    fn run_loop<W: Write>(&mut self, out: &mut W) -> Result<(), EvolutionError> {
        out.write_all(self.reporter.on_start(self).as_bytes())?;
        out.write_all(self.reporter.on_generation(self).as_bytes())?;
        while !self.terminator.should_terminate(&self.population) {
            self.population.undergo_generation()?;
            out.write_all(self.reporter.on_generation(self).as_bytes())?;
        }
        out.write_all(self.reporter.on_end(self).as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
