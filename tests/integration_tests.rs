use std::io::Write;
use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use symbios_parsimony::alignment::{ClustalFile, InMemoryTaxa, TaxonSource};
use symbios_parsimony::config::RunConfig;
use symbios_parsimony::phylo::{ParsimonyItem, Sankoff, Taxon, TreeGenotype};
use symbios_parsimony::population::GenerationSettings;
use symbios_parsimony::selection::Truncation;
use symbios_parsimony::tree::Tree;
use symbios_parsimony::{Evaluator, EvolutionContext, FitnessScheduler, Population, Source};

// --- Fixtures ---

fn four_taxa() -> Vec<Arc<Taxon>> {
    [("aa", "AA"), ("at", "AT"), ("tt", "TT"), ("ta", "TA")]
        .into_iter()
        .map(|(name, seq)| Arc::new(Taxon::new(name, seq)))
        .collect()
}

/// ((first, second), (third, fourth))
fn paired(taxa: [&Arc<Taxon>; 4]) -> TreeGenotype {
    let mut tree = Tree::new(ParsimonyItem::ancestor());
    let root = tree.root();
    let left = tree.add_node(ParsimonyItem::ancestor());
    let right = tree.add_node(ParsimonyItem::ancestor());
    let leaves: Vec<_> = taxa
        .iter()
        .map(|t| tree.add_node(ParsimonyItem::taxon(Arc::clone(t))))
        .collect();
    tree.set_left(root, left);
    tree.set_right(root, right);
    tree.set_left(left, leaves[0]);
    tree.set_right(left, leaves[1]);
    tree.set_left(right, leaves[2]);
    tree.set_right(right, leaves[3]);
    TreeGenotype::from_tree(tree, Source::Initial)
}

fn context() -> Arc<EvolutionContext<TreeGenotype>> {
    Arc::new(EvolutionContext::with_scheduler(
        FitnessScheduler::with_workers(4).unwrap(),
        Sankoff::default(),
    ))
}

#[test]
fn test_random_trees_beat_worst_pairing() {
    let taxa = four_taxa();
    let sankoff = Sankoff::default();
    // AA with TT and AT with TA disagree at both columns
    let worst = sankoff.evaluate(&paired([&taxa[0], &taxa[2], &taxa[1], &taxa[3]]));
    assert_eq!(worst, 8.0);

    let mut rng = Pcg64::seed_from_u64(2024);
    let best = (0..20)
        .map(|_| {
            let genotype = TreeGenotype::random(&taxa, &mut rng).unwrap();
            let cost = sankoff.evaluate(&genotype);
            assert!(cost.is_finite() && cost >= 0.0);
            cost
        })
        .fold(f64::INFINITY, f64::min);
    assert!(best < worst, "best random tree cost {best}, worst pairing {worst}");
}

#[test]
fn test_two_generations_keep_size() {
    let settings = GenerationSettings {
        crossover_rate: 1.0,
        mutation_rate: 0.0,
        elitism: 0.0,
        max_size: Some(10),
        low_good: true,
    };
    let mut population = Population::new(context(), settings, Box::new(Truncation), Box::new(Truncation), 7).unwrap();
    population
        .seed_from_taxa(&InMemoryTaxa(four_taxa().iter().map(|t| (**t).clone()).collect()))
        .unwrap();
    assert_eq!(population.len(), 10);

    for expected in 1..=2 {
        let before = population.generation();
        population.undergo_generation().unwrap();
        assert_eq!(population.len(), 10);
        assert_eq!(population.generation(), before + 1);
        assert_eq!(population.generation(), expected);
    }
    population.context().cleanup();
}

#[test]
fn test_offspring_fitness_is_computed_in_background() {
    let ctx = context();
    let mut rng = Pcg64::seed_from_u64(5);
    let taxa = four_taxa();
    let individuals: Vec<_> = (0..32)
        .map(|_| ctx.spawn(TreeGenotype::random(&taxa, &mut rng).unwrap()))
        .collect();
    let sankoff = Sankoff::default();
    for ind in &individuals {
        assert_eq!(ind.fitness(), sankoff.evaluate(ind.genotype()));
    }
    ctx.cleanup();
}

#[test]
fn test_clustal_file_run_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "CLUSTAL W (1.83) multiple sequence alignment

human      ACGTACGTAA
chimp      ACGTACGTAT
gorilla    ACCTTCGAAT
orang      TCCTTCGAAA
gibbon     TCCTACG-AA
           ** * ***
"
    )
    .unwrap();

    let source = ClustalFile::new(file.path());
    let taxa = source.load().unwrap();
    assert_eq!(taxa.len(), 5);
    // columns with a gap or a singleton state are gone
    assert!(taxa.iter().all(|t| t.sites() == taxa[0].sites()));
    assert!(taxa[0].sites() < 10);

    let config = RunConfig {
        max_population_size: 12,
        terminator: "generations:4".to_string(),
        printer: "quiet".to_string(),
        workers: Some(2),
        seed: 99,
        ..Default::default()
    };
    let mut env = config.build_environment(&source).unwrap();
    let mut out = Vec::new();
    env.run(&mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Finished after 4 generations."));
    assert!(text.contains("Most fit individual:"));
    let best = env.population().best_individual().unwrap();
    assert_eq!(best.genotype().taxon_count(), 5);
    assert!(best.genotype().to_newick().ends_with(';'));
}

#[test]
fn test_stochastic_selections_run() {
    let config = RunConfig {
        max_population_size: 10,
        terminator: "generations:3".to_string(),
        printer: "max-fitness".to_string(),
        parent_selection: "roulette".to_string(),
        survivor_selection: "tournament".to_string(),
        workers: Some(2),
        seed: 3,
        ..Default::default()
    };
    let source = InMemoryTaxa(vec![
        Taxon::new("a", "AACGT"),
        Taxon::new("b", "AACGA"),
        Taxon::new("c", "TTCGA"),
        Taxon::new("d", "TTGCT"),
        Taxon::new("e", "ATGCT"),
        Taxon::new("f", "TAGCA"),
    ]);
    let mut env = config.build_environment(&source).unwrap();
    let mut out = Vec::new();
    env.run(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("Best fitnesses:\n"));
    assert!(text.contains("Generation 3: "));
    assert_eq!(env.population().generation(), 3);
    assert_eq!(env.population().len(), 10);
}
