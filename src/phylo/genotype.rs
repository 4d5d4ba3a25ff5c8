use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::item::{ParsimonyItem, Taxon};
use crate::error::GenotypeError;
use crate::tree::{NodeId, Tree};
use crate::{Genotype, Source};

/// A rooted binary tree with one taxon per leaf and unlabeled ancestors
/// at every internal node.
///
/// Node and taxon counts are cached at construction; the tree is never
/// edited in place afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreeGenotype {
    tree: Tree<ParsimonyItem>,
    node_count: usize,
    taxon_count: usize,
    source: Source,
}

impl TreeGenotype {
    pub fn from_tree(tree: Tree<ParsimonyItem>, source: Source) -> Self {
        let node_count = tree.node_count();
        let taxon_count = tree.leaf_count();
        Self {
            tree,
            node_count,
            taxon_count,
            source,
        }
    }

    /// Builds a random tree over `taxa`, tagged [`Source::Initial`].
    pub fn random<R: Rng + ?Sized>(taxa: &[Arc<Taxon>], rng: &mut R) -> Result<Self, GenotypeError> {
        let tree = create_random_tree(taxa, rng)?;
        Ok(Self::from_tree(tree, Source::Initial))
    }

    pub fn tree(&self) -> &Tree<ParsimonyItem> {
        &self.tree
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn taxon_count(&self) -> usize {
        self.taxon_count
    }

    /// Alignment width, read from the first leaf in post-order.
    pub fn sites(&self) -> usize {
        self.tree
            .post_order()
            .find_map(|id| self.tree.item(id).as_taxon().map(|t| t.sites()))
            .unwrap_or(0)
    }

    /// Taxon names in left-to-right leaf order.
    pub fn taxon_names(&self) -> Vec<&str> {
        self.tree
            .post_order()
            .filter_map(|id| self.tree.item(id).name())
            .collect()
    }

    pub fn to_newick(&self) -> String {
        format!("{};", self.tree)
    }
}

impl fmt::Display for TreeGenotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)
    }
}

impl Genotype for TreeGenotype {
    /// Subtree reordering crossover.
    ///
    /// A random internal node of a copy of `self` is chosen, and the taxa
    /// below it are permuted among their own leaf slots so that their
    /// left-to-right order matches the relative order of the same taxa in
    /// `other`. Shape and taxon set of `self` are preserved.
    fn crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> Result<Self, GenotypeError> {
        if self.sites() != other.sites() {
            return Err(GenotypeError::Incompatible {
                reason: format!(
                    "alignment widths differ ({} vs {} sites)",
                    self.sites(),
                    other.sites()
                ),
            });
        }
        if self.taxon_count < 2 {
            return Err(GenotypeError::NoInternalNode);
        }

        let mut tree = self.tree.clone();
        let subtree = loop {
            let candidate = tree.random_node(rng, self.node_count);
            if tree.is_internal(candidate) {
                break candidate;
            }
        };

        let leaves: Vec<(NodeId, Arc<Taxon>)> = tree
            .post_order_from(subtree)
            .filter_map(|id| tree.item(id).as_taxon().map(|t| (id, Arc::clone(t))))
            .collect();
        let under_subtree: HashSet<&str> = leaves.iter().map(|(_, t)| t.name.as_str()).collect();

        let wanted: Vec<&str> = other
            .taxon_names()
            .into_iter()
            .filter(|name| under_subtree.contains(name))
            .collect();
        let shared: HashSet<&str> = wanted.iter().copied().collect();

        let node_of: HashMap<&str, NodeId> = leaves
            .iter()
            .map(|(id, t)| (t.name.as_str(), *id))
            .collect();
        let mut at_slot: Vec<NodeId> = leaves
            .iter()
            .filter(|(_, t)| shared.contains(t.name.as_str()))
            .map(|(id, _)| *id)
            .collect();
        let mut slot_of: HashMap<NodeId, usize> =
            at_slot.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        for (slot, name) in wanted.iter().enumerate() {
            let Some(&target) = node_of.get(name) else {
                continue;
            };
            let current = at_slot[slot];
            if current == target {
                continue;
            }
            let Some(&target_slot) = slot_of.get(&target) else {
                continue;
            };
            // distinct leaves are always in distinct subtrees
            tree.swap(current, target)?;
            at_slot.swap(slot, target_slot);
            slot_of.insert(current, target_slot);
            slot_of.insert(target, slot);
        }

        Ok(Self {
            tree,
            node_count: self.node_count,
            taxon_count: self.taxon_count,
            source: Source::Crossover,
        })
    }

    /// Each node independently triggers a swap event with `probability`.
    /// Every event exchanges two random nodes that are not ancestor and
    /// descendant of each other.
    ///
    /// Trees with fewer than three nodes have no such pair and never mutate.
    fn mutate<R: Rng + ?Sized>(&self, rng: &mut R, probability: f64) -> Option<Self> {
        let probability = probability.clamp(0.0, 1.0);
        let events = (0..self.node_count)
            .filter(|_| rng.random_bool(probability))
            .count();
        if events == 0 || self.node_count < 3 {
            return None;
        }

        let mut tree = self.tree.clone();
        for _ in 0..events {
            let (a, b) = loop {
                let a = tree.random_node(rng, self.node_count);
                let b = tree.random_node(rng, self.node_count);
                if a != b && tree.in_distinct_subtrees(a, b) {
                    break (a, b);
                }
            };
            // neither node can be the root: it contains every other node
            let swapped = tree.swap(a, b);
            debug_assert!(swapped.is_ok());
        }

        Some(Self {
            tree,
            node_count: self.node_count,
            taxon_count: self.taxon_count,
            source: Source::Mutation,
        })
    }

    fn source(&self) -> Source {
        self.source
    }
}

/// Builds a random binary tree with one leaf per taxon and `n - 1`
/// ancestors.
///
/// Each ancestor receives two children, each either a taxon or a new
/// ancestor. Once one child is a taxon the other is forced to be an
/// ancestor while the ancestor budget lasts, so the frontier stays open
/// until every taxon is placed.
pub fn create_random_tree<R: Rng + ?Sized>(
    taxa: &[Arc<Taxon>],
    rng: &mut R,
) -> Result<Tree<ParsimonyItem>, GenotypeError> {
    match taxa {
        [] => Err(GenotypeError::EmptyTaxa),
        [only] => Ok(Tree::new(ParsimonyItem::taxon(Arc::clone(only)))),
        _ => {
            let mut builder = RandomTreeBuilder {
                tree: Tree::new(ParsimonyItem::ancestor()),
                taxa: taxa.to_vec(),
                remaining_ancestors: taxa.len() - 2,
                rng,
            };
            let root = builder.tree.root();
            builder.populate(root)?;
            Ok(builder.tree)
        }
    }
}

struct RandomTreeBuilder<'a, R: ?Sized> {
    tree: Tree<ParsimonyItem>,
    taxa: Vec<Arc<Taxon>>,
    remaining_ancestors: usize,
    rng: &'a mut R,
}

impl<R: Rng + ?Sized> RandomTreeBuilder<'_, R> {
    fn new_taxon(&mut self) -> Result<NodeId, GenotypeError> {
        let taxon = self.taxa.pop().ok_or(GenotypeError::EmptyTaxa)?;
        Ok(self.tree.add_node(ParsimonyItem::taxon(taxon)))
    }

    fn new_ancestor(&mut self) -> NodeId {
        self.remaining_ancestors -= 1;
        self.tree.add_node(ParsimonyItem::ancestor())
    }

    fn taxon_or_ancestor(&mut self) -> Result<(NodeId, bool), GenotypeError> {
        if self.remaining_ancestors == 0 || self.rng.random_bool(0.5) {
            Ok((self.new_taxon()?, true))
        } else {
            Ok((self.new_ancestor(), false))
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, on_left: bool) {
        if on_left {
            self.tree.set_left(parent, child);
        } else {
            self.tree.set_right(parent, child);
        }
    }

    fn populate(&mut self, node: NodeId) -> Result<(), GenotypeError> {
        let (first, first_is_taxon) = self.taxon_or_ancestor()?;
        let first_on_left = self.rng.random_bool(0.5);
        self.attach(node, first, first_on_left);

        let (second, second_is_taxon) = if first_is_taxon && self.remaining_ancestors > 0 {
            (self.new_ancestor(), false)
        } else {
            self.taxon_or_ancestor()?
        };
        self.attach(node, second, !first_on_left);

        match (first_is_taxon, second_is_taxon) {
            (false, false) => {
                if self.rng.random_bool(0.5) {
                    self.populate(first)?;
                    self.populate(second)?;
                } else {
                    self.populate(second)?;
                    self.populate(first)?;
                }
            }
            (true, false) => self.populate(second)?,
            (false, true) => self.populate(first)?,
            (true, true) => {}
        }
        Ok(())
    }
}
