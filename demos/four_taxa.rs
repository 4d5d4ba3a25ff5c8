use std::sync::Arc;

use symbios_parsimony::alignment::InMemoryTaxa;
use symbios_parsimony::phylo::{Sankoff, Taxon, TreeGenotype};
use symbios_parsimony::population::GenerationSettings;
use symbios_parsimony::selection::{BinaryTournament, Truncation};
use symbios_parsimony::{EvolutionContext, FitnessScheduler, Population};

fn main() {
    let taxa = InMemoryTaxa(vec![
        Taxon::new("aa", "AA"),
        Taxon::new("at", "AT"),
        Taxon::new("tt", "TT"),
        Taxon::new("ta", "TA"),
    ]);

    let ctx: Arc<EvolutionContext<TreeGenotype>> = Arc::new(EvolutionContext::with_scheduler(
        FitnessScheduler::new().unwrap(),
        Sankoff::default(),
    ));
    let settings = GenerationSettings {
        crossover_rate: 0.8,
        mutation_rate: 0.1,
        elitism: 0.2,
        max_size: Some(20),
        low_good: true,
    };
    let mut population =
        Population::new(Arc::clone(&ctx), settings, Box::new(BinaryTournament), Box::new(Truncation), 42).unwrap();
    population.seed_from_taxa(&taxa).unwrap();

    for _ in 0..10 {
        let stats = population.stats().unwrap();
        println!(
            "Gen {}: best {} / avg {:.2} / worst {}",
            population.generation(),
            stats.best,
            stats.average,
            stats.worst
        );
        population.undergo_generation().unwrap();
    }

    let best = population.best_individual().unwrap();
    println!("Best tree: {} (cost {})", best.genotype().to_newick(), best.fitness());
    ctx.cleanup();
}
