use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Nucleotide alphabet in score-vector order.
pub const NUCLEOTIDES: [u8; 4] = *b"ACGT";
pub const NUM_NUCLEOTIDES: usize = NUCLEOTIDES.len();

/// Position of `symbol` in [`NUCLEOTIDES`], case-insensitive.
pub fn nucleotide_index(symbol: u8) -> Option<usize> {
    match symbol.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// An observed species with its aligned (informative-site) sequence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Taxon {
    pub name: String,
    pub sequence: String,
}

impl Taxon {
    pub fn new(name: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.into(),
        }
    }

    /// Number of alignment columns.
    pub fn sites(&self) -> usize {
        self.sequence.len()
    }

    pub fn symbol(&self, site: usize) -> Option<u8> {
        self.sequence.as_bytes().get(site).copied()
    }
}

/// Payload of a phylogenetic tree node: a taxon at the leaves, an unlabeled
/// ancestor everywhere else.
///
/// Taxa are reference counted so that copying a tree for crossover or
/// mutation never duplicates sequence data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParsimonyItem {
    taxon: Option<Arc<Taxon>>,
}

impl ParsimonyItem {
    pub fn ancestor() -> Self {
        Self { taxon: None }
    }

    pub fn taxon(taxon: Arc<Taxon>) -> Self {
        Self { taxon: Some(taxon) }
    }

    pub fn is_ancestor(&self) -> bool {
        self.taxon.is_none()
    }

    pub fn is_taxon(&self) -> bool {
        self.taxon.is_some()
    }

    pub fn as_taxon(&self) -> Option<&Arc<Taxon>> {
        self.taxon.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.taxon.as_deref().map(|t| t.name.as_str())
    }

    pub fn sequence(&self) -> Option<&str> {
        self.taxon.as_deref().map(|t| t.sequence.as_str())
    }
}

impl fmt::Display for ParsimonyItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or(""))
    }
}
