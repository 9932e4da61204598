//! Sparse tree-keyed coefficient genomes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::tree::TreeKey;

/// Sparse map from tree keys to real coefficients.
///
/// A genome describes a candidate numerical method: each key stands for a
/// rooted-tree elementary differential and its coefficient for the weight
/// the method puts on it. Every stored key has order at most `max_order`.
///
/// Backed by a `BTreeMap` so iteration (and therefore every RNG draw made
/// while walking the genome) happens in a deterministic order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    coefficients: BTreeMap<TreeKey, f64>,
    max_order: u32,
}

impl Genome {
    pub fn new(max_order: u32) -> Self {
        Self {
            coefficients: BTreeMap::new(),
            max_order,
        }
    }

    pub fn max_order(&self) -> u32 {
        self.max_order
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn get(&self, key: &TreeKey) -> Option<f64> {
        self.coefficients.get(key).copied()
    }

    pub fn contains(&self, key: &TreeKey) -> bool {
        self.coefficients.contains_key(key)
    }

    /// Inserts or replaces a coefficient. Keys above `max_order` violate
    /// the genome invariant; operators never produce them.
    pub fn set(&mut self, key: TreeKey, coefficient: f64) {
        debug_assert!(key.order() <= self.max_order, "key order exceeds max_order");
        self.coefficients.insert(key, coefficient);
    }

    pub fn remove(&mut self, key: &TreeKey) -> Option<f64> {
        self.coefficients.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TreeKey, f64)> {
        self.coefficients.iter().map(|(k, &c)| (k, c))
    }

    pub fn keys(&self) -> impl Iterator<Item = &TreeKey> {
        self.coefficients.keys()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.coefficients.values_mut()
    }

    /// The key stored at `index` in iteration order, if any.
    pub fn nth_key(&self, index: usize) -> Option<&TreeKey> {
        self.coefficients.keys().nth(index)
    }

    /// Largest absolute coefficient, `None` for an empty genome.
    pub fn max_abs_coefficient(&self) -> Option<f64> {
        self.coefficients.values().map(|c| c.abs()).reduce(f64::max)
    }

    /// Population variance of the coefficient values; 0 below 2 entries.
    pub fn coefficient_variance(&self) -> f64 {
        let n = self.coefficients.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.coefficients.values().sum::<f64>() / n as f64;
        self.coefficients
            .values()
            .map(|c| (c - mean) * (c - mean))
            .sum::<f64>()
            / n as f64
    }

    /// Standard deviation of coefficient values; 0 below 2 entries.
    pub fn diversity(&self) -> f64 {
        self.coefficient_variance().sqrt()
    }

    /// RMS coefficient difference over the union of both key sets, with
    /// missing keys contributing 0. Symmetric, zero on itself, and defined
    /// for disjoint or empty genomes (an empty union gives 0).
    pub fn distance(&self, other: &Genome) -> f64 {
        let union: BTreeSet<&TreeKey> = self
            .coefficients
            .keys()
            .chain(other.coefficients.keys())
            .collect();
        if union.is_empty() {
            return 0.0;
        }

        let sum_sq: f64 = union
            .iter()
            .map(|key| {
                let a = self.get(key).unwrap_or(0.0);
                let b = other.get(key).unwrap_or(0.0);
                (a - b) * (a - b)
            })
            .sum();
        (sum_sq / union.len() as f64).sqrt()
    }
}
