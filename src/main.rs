use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use symbios_parsimony::config::RunConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "symbios-parsimony")]
#[command(about = "Search for maximum-parsimony phylogenetic trees with a genetic algorithm")]
#[command(version)]
struct Cli {
    /// ClustalW alignment to read taxa from
    alignment: Option<PathBuf>,

    /// JSON run configuration; flags given here override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fraction of the population selected as parents
    #[arg(long)]
    crossover_rate: Option<f64>,

    /// Per-node mutation probability
    #[arg(long)]
    mutation_rate: Option<f64>,

    /// Fraction of parents carried over unchanged
    #[arg(long)]
    elitism: Option<f64>,

    /// Maximum population size
    #[arg(short, long)]
    population: Option<usize>,

    /// Parent selection: truncation, tournament or roulette
    #[arg(long)]
    parent_selection: Option<String>,

    /// Survivor selection: truncation, tournament or roulette
    #[arg(long)]
    survivor_selection: Option<String>,

    /// Stopping rule, e.g. generations:100 or convergence:10
    #[arg(short, long)]
    terminator: Option<String>,

    /// Treat higher fitness as better
    #[arg(long)]
    high_good: bool,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Fitness worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Reporter: verbose, max-fitness or quiet
    #[arg(long)]
    printer: Option<String>,

    /// Fitness function: sankoff or cherry-count
    #[arg(long)]
    evaluator: Option<String>,

    /// Write the best individual as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_config(self) -> Result<(RunConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(rate) = self.crossover_rate {
            config.crossover_rate = rate;
        }
        if let Some(rate) = self.mutation_rate {
            config.mutation_rate = rate;
        }
        if let Some(elitism) = self.elitism {
            config.elitism = elitism;
        }
        if let Some(size) = self.population {
            config.max_population_size = size;
        }
        if let Some(name) = self.parent_selection {
            config.parent_selection = name;
        }
        if let Some(name) = self.survivor_selection {
            config.survivor_selection = name;
        }
        if let Some(spec) = self.terminator {
            config.terminator = spec;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(name) = self.printer {
            config.printer = name;
        }
        if let Some(name) = self.evaluator {
            config.evaluator = name;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.alignment.is_some() {
            config.alignment = self.alignment;
        }
        if self.high_good {
            config.low_good = false;
        }
        Ok((config, self.output))
    }
}

#[derive(Serialize)]
struct BestIndividual {
    id: u64,
    fitness: f64,
    generation: u64,
    newick: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("symbios_parsimony={level}"))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let (config, output) = cli.into_config()?;
    config.validate().context("invalid run configuration")?;
    let source = config.alignment_source()?;
    tracing::info!(alignment = %source.path().display(), "reading taxa");

    let mut env = config
        .build_environment(&source)
        .with_context(|| format!("failed to set up run from {}", source.path().display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    env.run(&mut out).context("run aborted")?;

    if let Some(path) = output {
        let population = env.population();
        let best = population
            .best_individual()
            .context("population is empty, nothing to write")?;
        let record = BestIndividual {
            id: best.id(),
            fitness: best.fitness(),
            generation: population.generation(),
            newick: best.genotype().to_newick(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "best individual written");
    }
    Ok(())
}
