//! Text reporters for the run loop.
//!
//! A reporter only produces text; the environment decides where it goes and
//! never branches on what it says.

use std::fmt;

use crate::environment::Environment;
use crate::error::ConfigError;
use crate::Genotype;

pub trait Reporter<G: Genotype>: Send {
    fn name(&self) -> &'static str;

    fn on_start(&self, env: &Environment<G>) -> String;

    fn on_generation(&self, env: &Environment<G>) -> String;

    fn on_end(&self, env: &Environment<G>) -> String;
}

fn best_summary<G: Genotype + fmt::Display>(env: &Environment<G>) -> String {
    match env.population().best_individual() {
        Some(best) => format!("Most fit individual:\n{best}\n"),
        None => "Population is empty.\n".to_string(),
    }
}

/// Dumps the whole population every generation.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerbosePrinter;

impl<G: Genotype + fmt::Display> Reporter<G> for VerbosePrinter {
    fn name(&self) -> &'static str {
        "verbose"
    }

    fn on_start(&self, _env: &Environment<G>) -> String {
        String::new()
    }

    fn on_generation(&self, env: &Environment<G>) -> String {
        format!("{}\n", env.population())
    }

    fn on_end(&self, env: &Environment<G>) -> String {
        best_summary(env)
    }
}

/// One line with the best fitness per generation.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxFitnessPrinter;

impl<G: Genotype + fmt::Display> Reporter<G> for MaxFitnessPrinter {
    fn name(&self) -> &'static str {
        "max-fitness"
    }

    fn on_start(&self, _env: &Environment<G>) -> String {
        "Best fitnesses:\n".to_string()
    }

    fn on_generation(&self, env: &Environment<G>) -> String {
        let population = env.population();
        match population.best_fitness() {
            Some(best) => format!("Generation {}: {best}\n", population.generation()),
            None => format!("Generation {}: -\n", population.generation()),
        }
    }

    fn on_end(&self, env: &Environment<G>) -> String {
        best_summary(env)
    }
}

/// Silent until the end.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuietPrinter;

impl<G: Genotype + fmt::Display> Reporter<G> for QuietPrinter {
    fn name(&self) -> &'static str {
        "quiet"
    }

    fn on_start(&self, _env: &Environment<G>) -> String {
        String::new()
    }

    fn on_generation(&self, _env: &Environment<G>) -> String {
        String::new()
    }

    fn on_end(&self, env: &Environment<G>) -> String {
        format!(
            "Finished after {} generations.\n{}",
            env.population().generation(),
            best_summary(env)
        )
    }
}

pub fn reporter_by_name<G: Genotype + fmt::Display>(name: &str) -> Result<Box<dyn Reporter<G>>, ConfigError> {
    match name.to_ascii_lowercase().as_str() {
        "verbose" | "verboseprinter" => Ok(Box::new(VerbosePrinter)),
        "max-fitness" | "max" | "maxfitnessprinter" => Ok(Box::new(MaxFitnessPrinter)),
        "quiet" => Ok(Box::new(QuietPrinter)),
        _ => Err(ConfigError::UnknownReporter(name.to_string())),
    }
}
