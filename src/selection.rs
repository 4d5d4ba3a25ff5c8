//! Selection mechanisms over a population snapshot.
//!
//! Every mechanism reads fitness (which may block until the individual's
//! task completes) and never mutates individuals. Orderings honor
//! `low_good`; NaN fitness always ranks last.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::{Rng, RngCore};
use tracing::warn;

use crate::error::{ConfigError, SelectionError};
use crate::individual::Individual;
use crate::Genotype;

/// Upper bound on roulette sweeps before giving up.
pub const MAX_ROULETTE_SWEEPS: usize = 10_000;

pub type Pool<G> = Vec<Arc<Individual<G>>>;

/// Orders two fitness values best-first, with NaN pushed to the end.
pub fn rank_fitness(a: f64, b: f64, low_good: bool) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
            if low_good { ord } else { ord.reverse() }
        }
    }
}

/// Strictly better under the `low_good` direction.
pub fn is_better(a: f64, b: f64, low_good: bool) -> bool {
    rank_fitness(a, b, low_good) == Ordering::Less
}

pub trait Selection<G: Genotype>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Picks `count` individuals from `pool`.
    fn select(
        &self,
        pool: &[Arc<Individual<G>>],
        count: usize,
        low_good: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Pool<G>, SelectionError>;
}

fn check_pool<G: Genotype>(pool: &[Arc<Individual<G>>], count: usize) -> Result<(), SelectionError> {
    if pool.is_empty() && count > 0 {
        return Err(SelectionError::EmptyPool { requested: count });
    }
    Ok(())
}

/// Repeatedly takes the best remaining individual.
///
/// With `count >= pool.len()` the result is the whole pool, best first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Truncation;

impl<G: Genotype> Selection<G> for Truncation {
    fn name(&self) -> &'static str {
        "truncation"
    }

    fn select(
        &self,
        pool: &[Arc<Individual<G>>],
        count: usize,
        low_good: bool,
        _rng: &mut dyn RngCore,
    ) -> Result<Pool<G>, SelectionError> {
        check_pool(pool, count)?;
        let mut remaining: Vec<(f64, &Arc<Individual<G>>)> =
            pool.iter().map(|ind| (ind.fitness(), ind)).collect();
        let take = count.min(remaining.len());
        let mut selected = Vec::with_capacity(take);
        for _ in 0..take {
            let mut best = 0;
            for (i, (fitness, _)) in remaining.iter().enumerate().skip(1) {
                if is_better(*fitness, remaining[best].0, low_good) {
                    best = i;
                }
            }
            let (_, ind) = remaining.remove(best);
            selected.push(Arc::clone(ind));
        }
        Ok(selected)
    }
}

/// `count` independent rounds of "sample two, keep the better".
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryTournament;

impl<G: Genotype> Selection<G> for BinaryTournament {
    fn name(&self) -> &'static str {
        "binary-tournament"
    }

    fn select(
        &self,
        pool: &[Arc<Individual<G>>],
        count: usize,
        low_good: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Pool<G>, SelectionError> {
        check_pool(pool, count)?;
        let n = pool.len();
        let mut selected = Vec::with_capacity(count);
        for _ in 0..count {
            let first = rng.random_range(0..n);
            let mut second = rng.random_range(0..n);
            while n > 1 && second == first {
                second = rng.random_range(0..n);
            }
            let winner = if is_better(pool[first].fitness(), pool[second].fitness(), low_good) {
                first
            } else {
                second
            };
            selected.push(Arc::clone(&pool[winner]));
        }
        Ok(selected)
    }
}

/// Fitness-proportional acceptance sweeps.
///
/// Candidates are sorted by descending probability and swept repeatedly,
/// each accepted with its own probability, until `count` acceptances. An
/// individual can be accepted more than once across sweeps.
#[derive(Clone, Copy, Debug, Default)]
pub struct RouletteWheel;

/// Selection probability per fitness value: `f / total`, or `1 - f / total`
/// when lower is better. The total only counts finite values, and
/// non-finite fitness never gets picked.
///
/// Degenerate inputs (zero or non-finite total, no positive probability)
/// fall back to uniform probabilities over the finite entries, or over
/// every entry when none is finite.
pub fn roulette_probabilities(fitness: &[f64], low_good: bool) -> Vec<f64> {
    let total: f64 = fitness.iter().filter(|f| f.is_finite()).sum();
    let probabilities: Vec<f64> = fitness
        .iter()
        .map(|&f| {
            if !f.is_finite() {
                return 0.0;
            }
            let p = f / total;
            if low_good { 1.0 - p } else { p }
        })
        .collect();
    let degenerate = !total.is_finite()
        || total == 0.0
        || probabilities.iter().any(|p| p.is_nan())
        || probabilities.iter().all(|&p| p <= 0.0);
    if !degenerate || fitness.is_empty() {
        return probabilities;
    }
    warn!(total, "roulette probabilities degenerate, using uniform weights");
    let finite = fitness.iter().filter(|f| f.is_finite()).count();
    if finite == 0 {
        return vec![1.0 / fitness.len() as f64; fitness.len()];
    }
    fitness
        .iter()
        .map(|f| if f.is_finite() { 1.0 / finite as f64 } else { 0.0 })
        .collect()
}

impl<G: Genotype> Selection<G> for RouletteWheel {
    fn name(&self) -> &'static str {
        "roulette-wheel"
    }

    fn select(
        &self,
        pool: &[Arc<Individual<G>>],
        count: usize,
        low_good: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Pool<G>, SelectionError> {
        check_pool(pool, count)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let fitness: Vec<f64> = pool.iter().map(|ind| ind.fitness()).collect();
        let mut wheel: Vec<(f64, &Arc<Individual<G>>)> = roulette_probabilities(&fitness, low_good)
            .into_iter()
            .zip(pool)
            .collect();
        wheel.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let mut selected = Vec::with_capacity(count);
        let mut sweeps = 0;
        while selected.len() < count {
            if sweeps == MAX_ROULETTE_SWEEPS {
                return Err(SelectionError::RouletteExhausted {
                    requested: count,
                    accepted: selected.len(),
                    sweeps,
                });
            }
            for (probability, ind) in &wheel {
                if selected.len() >= count {
                    break;
                }
                if rng.random::<f64>() < *probability {
                    selected.push(Arc::clone(ind));
                }
            }
            sweeps += 1;
        }
        Ok(selected)
    }
}

/// Resolves a selection mechanism from its configuration name.
pub fn selection_by_name<G: Genotype>(name: &str) -> Result<Box<dyn Selection<G>>, ConfigError> {
    match name.to_ascii_lowercase().as_str() {
        "truncation" | "truncationselection" => Ok(Box::new(Truncation)),
        "tournament" | "binary-tournament" | "binarytournamentselection" => Ok(Box::new(BinaryTournament)),
        "roulette" | "roulette-wheel" | "roulettewheelselection" => Ok(Box::new(RouletteWheel)),
        _ => Err(ConfigError::UnknownSelection(name.to_string())),
    }
}
