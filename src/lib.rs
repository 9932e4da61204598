//! Evolutionary search over sparse rooted-tree integrator kernels.
//!
//! A kernel's genome is a sparse map from rooted-tree structural keys to
//! real coefficients, in the spirit of a B-series expansion. Populations of
//! kernels are evolved with a generational genetic algorithm against a
//! four-component fitness model (grip, stability, efficiency, novelty).

use serde::{Deserialize, Serialize};

/// Source of tree structural keys usable as genome loci.
///
/// Implementations decide which rooted-tree shapes exist and how symmetric
/// each one is. The engine treats both answers as opaque; it only requires
/// that they are deterministic for a given key.
pub trait TreeOracle {
    /// All keys of orders `1..=max_order`, in a deterministic order.
    fn enumerate_keys(&self, max_order: u32) -> Vec<TreeKey>;

    /// Symmetry estimate for `key`, in `(0, 1]`.
    fn symmetry(&self, key: &TreeKey) -> f64;
}

/// Domain-specific genome scoring, plugged into the grip fitness component.
///
/// Whatever domain data the score is computed against is owned by the
/// scorer value itself. `Send + Sync` so evaluation can fan out across
/// worker threads.
pub trait DomainScorer: Send + Sync {
    /// Score `genome` against the captured domain data, in `[0, 1]`.
    fn score(&self, genome: &Genome) -> f64;
}

/// Monotonic kernel id source.
///
/// Injected into every kernel-creating operator so id uniqueness is
/// independent of RNG seeding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelIds {
    next: u64,
}

impl KernelIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next unique id.
    pub fn next_id(&mut self) -> String {
        let id = format!("k{:06}", self.next);
        self.next += 1;
        id
    }
}

pub mod evolve;
pub mod genome;
pub mod kernel;
pub mod lifecycle;
pub mod tree;

pub use evolve::{
    population_diversity, tournament_selection, ConfigError, EvolutionConfig, GenerationStats,
    KernelEvolver,
};
pub use genome::Genome;
pub use kernel::{genetic_distance, Kernel};
pub use lifecycle::{Lifecycle, Stage};
pub use tree::{tree_symmetry, SampledEnumerator, TreeKey};
