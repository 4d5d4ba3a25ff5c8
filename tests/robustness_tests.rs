use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_pcg::Pcg64;
use symbios_parsimony::error::FitnessError;
use symbios_parsimony::phylo::{Sankoff, Taxon, TreeGenotype};
use symbios_parsimony::scheduler::FitnessState;
use symbios_parsimony::selection::{Selection, Truncation};
use symbios_parsimony::{Evaluator, EvolutionContext, FitnessScheduler, Genotype, GenotypeError, Source};

fn taxa(n: usize, sites: usize) -> Vec<Arc<Taxon>> {
    const BASES: &[u8] = b"ACGT";
    (0..n)
        .map(|i| {
            let sequence: String = (0..sites)
                .map(|s| BASES[(i * 7 + s * 3 + i * s) % 4] as char)
                .collect();
            Arc::new(Taxon::new(format!("t{i}"), sequence))
        })
        .collect()
}

fn names(genotype: &TreeGenotype) -> HashSet<String> {
    genotype.taxon_names().into_iter().map(str::to_string).collect()
}

#[test]
fn test_random_tree_shape_invariants() {
    let mut rng = Pcg64::seed_from_u64(17);
    for n in 1..=25 {
        let input = taxa(n, 3);
        let expected: HashSet<String> = input.iter().map(|t| t.name.clone()).collect();
        for _ in 0..10 {
            let genotype = TreeGenotype::random(&input, &mut rng).unwrap();
            let tree = genotype.tree();
            assert_eq!(tree.leaf_count(), n);
            assert_eq!(tree.node_count() - tree.leaf_count(), n - 1);
            assert_eq!(genotype.taxon_names().len(), n, "no taxon may repeat");
            assert_eq!(names(&genotype), expected);
        }
    }
}

#[test]
fn test_swap_twice_restores_tree() {
    let mut rng = Pcg64::seed_from_u64(23);
    let genotype = TreeGenotype::random(&taxa(9, 2), &mut rng).unwrap();
    let original = genotype.tree().clone();
    let nodes: Vec<_> = original.post_order().collect();
    let mut checked = 0;
    for &a in &nodes {
        for &b in &nodes {
            if a == b || !original.in_distinct_subtrees(a, b) {
                continue;
            }
            let mut tree = original.clone();
            tree.swap(a, b).unwrap();
            tree.swap(a, b).unwrap();
            assert_eq!(tree.to_string(), original.to_string());
            assert_eq!(tree.parent(a), original.parent(a));
            assert_eq!(tree.parent(b), original.parent(b));
            checked += 1;
        }
    }
    assert!(checked > 0);
}

#[test]
fn test_crossover_keeps_own_taxa_against_foreign_parent() {
    let mut rng = Pcg64::seed_from_u64(31);
    let mine = taxa(8, 4);
    let theirs: Vec<_> = taxa(12, 4).into_iter().skip(4).collect();
    let first = TreeGenotype::random(&mine, &mut rng).unwrap();
    let second = TreeGenotype::random(&theirs, &mut rng).unwrap();
    for _ in 0..50 {
        let child = first.crossover(&second, &mut rng).unwrap();
        assert_eq!(child.taxon_count(), 8);
        assert_eq!(names(&child), names(&first));
        assert_eq!(child.node_count(), first.node_count());
        assert_eq!(child.source(), Source::Crossover);
    }
}

#[test]
fn test_degenerate_inputs_fail_fast() {
    let mut rng = Pcg64::seed_from_u64(1);
    assert_eq!(TreeGenotype::random(&[], &mut rng).unwrap_err(), GenotypeError::EmptyTaxa);

    let single = TreeGenotype::random(&taxa(1, 2), &mut rng).unwrap();
    assert_eq!(single.node_count(), 1);
    assert!(single.mutate(&mut rng, 1.0).is_none());
    assert_eq!(
        single.crossover(&single, &mut rng).unwrap_err(),
        GenotypeError::NoInternalNode
    );

    let narrow = TreeGenotype::random(&taxa(4, 2), &mut rng).unwrap();
    let wide = TreeGenotype::random(&taxa(4, 5), &mut rng).unwrap();
    assert!(matches!(
        narrow.crossover(&wide, &mut rng),
        Err(GenotypeError::Incompatible { .. })
    ));
}

#[test]
fn test_mutation_probabilities() {
    let mut rng = Pcg64::seed_from_u64(4);
    let genotype = TreeGenotype::random(&taxa(10, 2), &mut rng).unwrap();
    for _ in 0..100 {
        assert!(genotype.mutate(&mut rng, 0.0).is_none());
    }
    let mutant = genotype.mutate(&mut rng, 1.0).unwrap();
    assert_eq!(mutant.source(), Source::Mutation);
    assert_eq!(names(&mutant), names(&genotype));
    // out-of-range probabilities are clamped
    assert!(genotype.mutate(&mut rng, -3.0).is_none());
    assert!(genotype.mutate(&mut rng, 7.0).is_some());
}

#[test]
fn test_genotype_serialization_preserves_cost() {
    let mut rng = Pcg64::seed_from_u64(8);
    let genotype = TreeGenotype::random(&taxa(7, 6), &mut rng).unwrap();
    let sankoff = Sankoff::default();
    let cost = sankoff.evaluate(&genotype);

    let json = serde_json::to_string(&genotype).unwrap();
    let from_json: TreeGenotype = serde_json::from_str(&json).unwrap();
    assert_eq!(from_json.to_newick(), genotype.to_newick());
    assert_eq!(sankoff.evaluate(&from_json), cost);

    let bytes = bincode::serialize(&genotype).unwrap();
    let from_bytes: TreeGenotype = bincode::deserialize(&bytes).unwrap();
    assert_eq!(from_bytes.node_count(), genotype.node_count());
    assert_eq!(sankoff.evaluate(&from_bytes), cost);
}

struct SlowEvaluator;

impl Evaluator<TreeGenotype> for SlowEvaluator {
    fn evaluate(&self, genotype: &TreeGenotype) -> f64 {
        std::thread::sleep(Duration::from_millis(200));
        genotype.node_count() as f64
    }
}

#[test]
fn test_fitness_after_cleanup_reads_nan() {
    let ctx = EvolutionContext::with_scheduler(FitnessScheduler::with_workers(1).unwrap(), SlowEvaluator);
    let mut rng = Pcg64::seed_from_u64(2);
    let input = taxa(5, 2);
    let individuals: Vec<_> = (0..4)
        .map(|_| ctx.spawn(TreeGenotype::random(&input, &mut rng).unwrap()))
        .collect();
    ctx.cleanup();

    let last = &individuals[3];
    assert_eq!(last.try_fitness(), Err(FitnessError::Abandoned(last.id())));
    assert!(last.fitness().is_nan());
    assert_eq!(last.fitness_state(), FitnessState::Abandoned);
    assert!(ctx.scheduler().is_shut_down());
}

struct PickyEvaluator;

impl Evaluator<TreeGenotype> for PickyEvaluator {
    fn evaluate(&self, genotype: &TreeGenotype) -> f64 {
        if genotype.taxon_count() == 3 {
            panic!("refusing to score three taxa");
        }
        genotype.taxon_count() as f64
    }
}

#[test]
fn test_panicked_evaluation_ranks_last() {
    let ctx = EvolutionContext::with_scheduler(FitnessScheduler::with_workers(2).unwrap(), PickyEvaluator);
    let mut rng = Pcg64::seed_from_u64(6);
    let pool: Vec<_> = [4, 3, 2, 5]
        .into_iter()
        .map(|n| ctx.spawn(TreeGenotype::random(&taxa(n, 2), &mut rng).unwrap()))
        .collect();
    assert!(matches!(pool[1].try_fitness(), Err(FitnessError::Panicked(_))));

    let ranked = Truncation.select(&pool, 4, true, &mut rng).unwrap();
    let fitness: Vec<f64> = ranked.iter().map(|i| i.fitness()).collect();
    assert_eq!(&fitness[..3], &[2.0, 4.0, 5.0]);
    assert!(fitness[3].is_nan());
    ctx.cleanup();
}
