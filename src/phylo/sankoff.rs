//! Sankoff small-parsimony scoring.
//!
//! For one alignment column the tree is walked in post-order. A leaf scores
//! 0 for its observed nucleotide and infinity elsewhere; an internal node
//! scores, per candidate state `x`, the sum over its children of
//! `min_y(cost(x, y) + child[y])`. The column cost is the minimum root score
//! and the fitness is the sum over every column. Lower is better.

use serde::{Deserialize, Serialize};

use super::genotype::TreeGenotype;
use super::item::{NUM_NUCLEOTIDES, ParsimonyItem, nucleotide_index};
use crate::Evaluator;
use crate::tree::Tree;

type Scores = [f64; NUM_NUCLEOTIDES];

/// Substitution costs indexed `[from][to]` in `ACGT` order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostMatrix(pub [[f64; NUM_NUCLEOTIDES]; NUM_NUCLEOTIDES]);

impl CostMatrix {
    /// Transitions (A<->G, C<->T) cost 1, transversions cost 2.
    pub fn transition_transversion() -> Self {
        Self([
            [0.0, 2.0, 1.0, 2.0],
            [2.0, 0.0, 2.0, 1.0],
            [1.0, 2.0, 0.0, 2.0],
            [2.0, 1.0, 2.0, 0.0],
        ])
    }

    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.0[from][to]
    }
}

impl Default for CostMatrix {
    fn default() -> Self {
        Self::transition_transversion()
    }
}

/// Per-pass DP scratch space, one score vector per arena slot.
#[derive(Debug, Default)]
pub struct SankoffTable {
    scores: Vec<Scores>,
}

impl SankoffTable {
    pub fn for_tree<T>(tree: &Tree<T>) -> Self {
        Self {
            scores: vec![[0.0; NUM_NUCLEOTIDES]; tree.arena_len()],
        }
    }

    /// Zeroes every entry, growing the table to `len` slots if needed.
    pub fn reset(&mut self, len: usize) {
        self.scores.clear();
        self.scores.resize(len, [0.0; NUM_NUCLEOTIDES]);
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Sankoff {
    costs: CostMatrix,
}

impl Sankoff {
    pub fn new(costs: CostMatrix) -> Self {
        Self { costs }
    }

    /// Parsimony cost of a single column.
    ///
    /// Symbols outside `ACGT` are treated as missing data and score zero for
    /// every state.
    pub fn site_cost(&self, tree: &Tree<ParsimonyItem>, site: usize, table: &mut SankoffTable) -> f64 {
        table.reset(tree.arena_len());
        for id in tree.post_order() {
            let scores = match tree.item(id).as_taxon() {
                Some(taxon) => leaf_scores(taxon.symbol(site)),
                None => {
                    let mut scores = [0.0; NUM_NUCLEOTIDES];
                    for child in [tree.left(id), tree.right(id)].into_iter().flatten() {
                        let below = &table.scores[child.index()];
                        for (x, score) in scores.iter_mut().enumerate() {
                            *score += (0..NUM_NUCLEOTIDES)
                                .map(|y| self.costs.cost(x, y) + below[y])
                                .fold(f64::INFINITY, f64::min);
                        }
                    }
                    scores
                }
            };
            table.scores[id.index()] = scores;
        }
        table.scores[tree.root().index()]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// Total cost over the first `sites` columns.
    pub fn tree_cost(&self, tree: &Tree<ParsimonyItem>, sites: usize) -> f64 {
        let mut table = SankoffTable::for_tree(tree);
        (0..sites)
            .map(|site| self.site_cost(tree, site, &mut table))
            .sum()
    }
}

fn leaf_scores(symbol: Option<u8>) -> Scores {
    match symbol.and_then(nucleotide_index) {
        Some(observed) => {
            let mut scores = [f64::INFINITY; NUM_NUCLEOTIDES];
            scores[observed] = 0.0;
            scores
        }
        None => [0.0; NUM_NUCLEOTIDES],
    }
}

impl Evaluator<TreeGenotype> for Sankoff {
    fn evaluate(&self, genotype: &TreeGenotype) -> f64 {
        self.tree_cost(genotype.tree(), genotype.sites())
    }
}

/// Counts cherries: internal nodes whose two children are both leaves.
#[derive(Clone, Copy, Debug, Default)]
pub struct CherryCount;

impl Evaluator<TreeGenotype> for CherryCount {
    fn evaluate(&self, genotype: &TreeGenotype) -> f64 {
        let tree = genotype.tree();
        tree.post_order()
            .filter(|&id| match (tree.left(id), tree.right(id)) {
                (Some(l), Some(r)) => tree.is_leaf(l) && tree.is_leaf(r),
                _ => false,
            })
            .count() as f64
    }
}
