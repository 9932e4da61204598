//! Ontogenetic kernels and their genetic operators.
//!
//! A [`Kernel`] wraps a [`Genome`] with identity, lineage, lifecycle and
//! fitness state, and carries the three reproduction operators (asexual
//! self-generation, sexual crossover, in-place mutation) plus the
//! four-component fitness evaluation.
//!
//! All randomized operators take an explicit `&mut R: Rng` and an id
//! source, so a seeded generator reproduces a run exactly: genomes iterate
//! in key order, and each operator documents its draw sequence through its
//! code path.

use std::collections::BTreeSet;

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::genome::Genome;
use crate::lifecycle::Lifecycle;
use crate::tree::TreeKey;
use crate::{DomainScorer, KernelIds, TreeOracle};

/// Relative noise scale for coefficient perturbation.
const NOISE_SIGMA: f64 = 0.1;
/// Per-gene probability of inserting a structural variant in self-generation.
const VARIANT_RATE: f64 = 0.2;
/// Keeps mutation noise non-degenerate around zero coefficients.
const COEFF_EPS: f64 = 1e-6;

/// Gaussian draw with the given standard deviation; 0 when the deviation
/// is degenerate (negative or non-finite).
fn gauss<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    Normal::new(0.0, std_dev)
        .map(|n| n.sample(rng))
        .unwrap_or(0.0)
}

/// A self-evolving integrator kernel.
///
/// Identity is fixed at creation; genome, lifecycle and fitness fields are
/// mutated in place by the operators below. A kernel is destroyed simply by
/// being left out of the next generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    id: String,
    pub genome: Genome,
    pub lifecycle: Lifecycle,
    /// Ancestor ids, oldest first.
    pub lineage: Vec<String>,
    pub fitness: f64,
    pub grip: f64,
    pub stability: f64,
    pub efficiency: f64,
    pub novelty: f64,
}

/// Fitness components computed against a population snapshot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FitnessParts {
    pub grip: f64,
    pub stability: f64,
    pub efficiency: f64,
    pub novelty: f64,
}

impl FitnessParts {
    pub(crate) fn combined(&self) -> f64 {
        0.25 * (self.grip + self.stability + self.efficiency + self.novelty)
    }
}

impl Kernel {
    fn with_genome(id: String, genome: Genome, lifecycle: Lifecycle, lineage: Vec<String>) -> Self {
        Self {
            id,
            genome,
            lifecycle,
            lineage,
            fitness: 0.0,
            grip: 0.0,
            stability: 0.0,
            efficiency: 0.0,
            novelty: 0.0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Seeds a fresh kernel from the oracle's key enumeration.
    ///
    /// Each candidate key is included independently with probability
    /// `density`. With `symmetric_bias` the coefficient is the deterministic
    /// magnitude `(0.1 / order) * (1 + symmetry)`; otherwise it is a
    /// zero-mean uniform value scaled by `0.1 / order`.
    pub fn create<O: TreeOracle, R: Rng>(
        oracle: &O,
        max_order: u32,
        symmetric_bias: bool,
        density: f64,
        rng: &mut R,
        ids: &mut KernelIds,
    ) -> Self {
        let mut genome = Genome::new(max_order);
        for key in oracle.enumerate_keys(max_order) {
            if rng.random::<f64>() < density {
                let scale = 0.1 / f64::from(key.order());
                let coefficient = if symmetric_bias {
                    scale * (1.0 + oracle.symmetry(&key))
                } else {
                    rng.random_range(-1.0..1.0) * scale
                };
                genome.set(key, coefficient);
            }
        }
        Self::with_genome(ids.next_id(), genome, Lifecycle::embryonic(0), Vec::new())
    }

    /// Asexual reproduction: each gene is copied with multiplicative
    /// Gaussian noise, and with probability 0.2 a structurally-perturbed
    /// variant of the gene's key (one level shifted by one) is inserted at
    /// half the coefficient.
    ///
    /// The offspring extends this kernel's lineage, bumps the generation,
    /// and starts embryonic at age 0.
    pub fn self_generate<R: Rng>(&self, rng: &mut R, ids: &mut KernelIds) -> Kernel {
        let mut genome = Genome::new(self.genome.max_order());
        for (key, coefficient) in self.genome.iter() {
            genome.set(key.clone(), coefficient * (1.0 + gauss(rng, NOISE_SIGMA)));
            if rng.random::<f64>() < VARIANT_RATE {
                let index = rng.random_range(0..key.order() as usize);
                let delta = if rng.random::<f64>() < 0.5 { -1 } else { 1 };
                genome.set(key.shifted(index, delta), coefficient / 2.0);
            }
        }

        let mut lineage = self.lineage.clone();
        lineage.push(self.id.clone());
        Self::with_genome(
            ids.next_id(),
            genome,
            Lifecycle::embryonic(self.lifecycle.generation + 1),
            lineage,
        )
    }

    /// Sexual reproduction producing two complementary offspring.
    ///
    /// The shuffled key union is split at its midpoint; for each index the
    /// first offspring sources the coefficient from one designated parent
    /// (omitting the key when that parent lacks it) and the second offspring
    /// from the other. No coefficient is ever blended between parents.
    ///
    /// Lineage records the two direct parents only; deeper ancestry is
    /// dropped at a crossover boundary.
    pub fn crossover<R: Rng>(
        &self,
        other: &Kernel,
        rng: &mut R,
        ids: &mut KernelIds,
    ) -> (Kernel, Kernel) {
        let mut union: Vec<TreeKey> = self
            .genome
            .keys()
            .chain(other.genome.keys())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();
        union.shuffle(rng);
        let mid = union.len() / 2;

        let max_order = self.genome.max_order().max(other.genome.max_order());
        let mut genome_a = Genome::new(max_order);
        let mut genome_b = Genome::new(max_order);
        for (i, key) in union.iter().enumerate() {
            let (source_a, source_b) = if i < mid { (self, other) } else { (other, self) };
            if let Some(c) = source_a.genome.get(key) {
                genome_a.set(key.clone(), c);
            }
            if let Some(c) = source_b.genome.get(key) {
                genome_b.set(key.clone(), c);
            }
        }

        let generation = self.lifecycle.generation.max(other.lifecycle.generation) + 1;
        let lineage = vec![self.id.clone(), other.id.clone()];
        let a = Self::with_genome(
            ids.next_id(),
            genome_a,
            Lifecycle::embryonic(generation),
            lineage.clone(),
        );
        let b = Self::with_genome(ids.next_id(), genome_b, Lifecycle::embryonic(generation), lineage);
        (a, b)
    }

    /// In-place mutation, three phases in fixed draw order:
    /// coefficient perturbation per gene, then a possible single-gene
    /// deletion (never below one remaining gene), then a possible insertion
    /// of a new key drawn from the oracle.
    pub fn mutate<O: TreeOracle, R: Rng>(&mut self, rate: f64, oracle: &O, rng: &mut R) {
        for coefficient in self.genome.values_mut() {
            if rng.random::<f64>() < rate {
                let sigma = NOISE_SIGMA * (*coefficient + COEFF_EPS).abs();
                *coefficient += gauss(rng, sigma);
            }
        }

        if rng.random::<f64>() < rate && self.genome.len() > 1 {
            let index = rng.random_range(0..self.genome.len());
            if let Some(key) = self.genome.nth_key(index).cloned() {
                self.genome.remove(&key);
            }
        }

        if rng.random::<f64>() < rate / 2.0 {
            let candidates = oracle.enumerate_keys(self.genome.max_order());
            if let Some(key) = candidates.choose(rng) {
                if !self.genome.contains(key) {
                    self.genome.set(key.clone(), rng.random_range(-0.05..0.05));
                }
            }
        }
    }

    /// Copy with a fresh id and age reset to 0.
    ///
    /// Unlike reproduction, cloning keeps the genome, fitness fields,
    /// lineage, stage, maturity and generation of the original.
    pub fn duplicate(&self, ids: &mut KernelIds) -> Kernel {
        let mut copy = self.clone();
        copy.id = ids.next_id();
        copy.lifecycle.age = 0;
        copy
    }

    /// Evaluates the four fitness components against `peers` (the current
    /// population snapshot; this kernel is skipped by id when present) and
    /// writes them plus their equal-weight combination back onto the
    /// kernel. Returns the new fitness.
    pub fn evaluate_fitness(&mut self, peers: &[Kernel], scorer: Option<&dyn DomainScorer>) -> f64 {
        let parts = fitness_parts(self, peers, scorer);
        self.apply_fitness(parts);
        self.fitness
    }

    pub(crate) fn apply_fitness(&mut self, parts: FitnessParts) {
        self.grip = parts.grip;
        self.stability = parts.stability;
        self.efficiency = parts.efficiency;
        self.novelty = parts.novelty;
        self.fitness = parts.combined();
    }

    /// Advances the lifecycle one step using the current fitness.
    pub fn update_stage(&mut self) {
        self.lifecycle.advance(self.fitness);
    }
}

/// RMS coefficient difference between two kernels' genomes.
pub fn genetic_distance(a: &Kernel, b: &Kernel) -> f64 {
    a.genome.distance(&b.genome)
}

/// Computes fitness components without touching the kernel, so evaluation
/// of a whole generation can run against one immutable snapshot.
pub(crate) fn fitness_parts(
    kernel: &Kernel,
    peers: &[Kernel],
    scorer: Option<&dyn DomainScorer>,
) -> FitnessParts {
    let genome = &kernel.genome;

    // Grip: domain fit when a scorer is supplied, else key-space coverage.
    let grip = match scorer {
        Some(s) => s.score(genome).clamp(0.0, 1.0),
        None => (genome.len() as f64 / 2f64.powi(genome.max_order() as i32)).min(1.0),
    };

    // Stability: penalize large and widely-spread coefficients. Empty
    // genomes get a defined floor rather than a degenerate 1.0.
    let stability = if genome.is_empty() {
        0.1
    } else {
        let mut s = 1.0 / (1.0 + genome.max_abs_coefficient().unwrap_or(0.0));
        if genome.len() >= 2 {
            s *= 1.0 / (1.0 + genome.coefficient_variance());
        }
        s.clamp(0.0, 1.0)
    };

    let efficiency = 1.0 / (1.0 + 0.1 * genome.len() as f64);

    // Novelty: mean genetic distance to every other member of the snapshot.
    let mut sum = 0.0;
    let mut others = 0usize;
    for peer in peers {
        if peer.id != kernel.id {
            sum += genome.distance(&peer.genome);
            others += 1;
        }
    }
    let novelty = if others == 0 { 0.5 } else { sum / others as f64 };

    FitnessParts {
        grip,
        stability,
        efficiency,
        novelty,
    }
}
