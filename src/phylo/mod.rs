//! Phylogenetic tree genotype and its parsimony scoring.

pub mod genotype;
pub mod item;
pub mod sankoff;

pub use genotype::{TreeGenotype, create_random_tree};
pub use item::{NUCLEOTIDES, ParsimonyItem, Taxon};
pub use sankoff::{CherryCount, CostMatrix, Sankoff, SankoffTable};
