//! Error types for every layer of the engine.
//!
//! Configuration and breeding errors are fatal for a run; the environment
//! surfaces them to the caller instead of skipping the offending individual.

use std::path::PathBuf;

use thiserror::Error;

use crate::tree::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0:?} does not belong to this tree")]
    UnknownNode(NodeId),

    #[error("node {0:?} is the root and has no parent to swap under")]
    RootSwap(NodeId),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenotypeError {
    #[error("cannot build a tree from an empty taxon list")]
    EmptyTaxa,

    #[error("tree has no internal node to cross over")]
    NoInternalNode,

    #[error("incompatible genotypes tried to cross: {reason}")]
    Incompatible { reason: String },

    #[error(transparent)]
    Tree(#[from] TreeError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("cannot select {requested} individuals from an empty pool")]
    EmptyPool { requested: usize },

    #[error("roulette wheel accepted {accepted} of {requested} after {sweeps} sweeps")]
    RouletteExhausted {
        requested: usize,
        accepted: usize,
        sweeps: usize,
    },
}

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("failed to read alignment {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected `<name> <sequence>`, found {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("alignment contains no taxa")]
    NoTaxa,

    #[error("taxon {name} has {found} columns, expected {expected}")]
    RaggedSequence {
        name: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },

    #[error("maximum population size must be at least 1")]
    EmptyPopulation,

    #[error("unknown selection mechanism {0:?}")]
    UnknownSelection(String),

    #[error("unknown evaluator {0:?}")]
    UnknownEvaluator(String),

    #[error("unknown reporter {0:?}")]
    UnknownReporter(String),

    #[error("malformed terminator {spec:?}: {reason}")]
    Terminator { spec: String, reason: String },

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("no alignment file configured")]
    MissingAlignment,

    #[error("failed to load configuration {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("failed to build fitness worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitnessError {
    #[error("fitness task for individual {0} was abandoned at shutdown")]
    Abandoned(u64),

    #[error("fitness evaluation for individual {0} panicked")]
    Panicked(u64),
}

/// Top-level failure of a run.
#[derive(Error, Debug)]
pub enum EvolutionError {
    #[error("breeding failed: {0}")]
    Breeding(#[from] GenotypeError),

    #[error("selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("generation {generation} produced no offspring ({pool} of {target} individuals)")]
    Stalled {
        generation: u64,
        pool: usize,
        target: usize,
    },

    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}
