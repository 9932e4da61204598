//! Generational evolution of kernel populations.
//!
//! # Overview
//!
//! [`KernelEvolver`] runs a synchronous generational loop over an owned
//! population of [`Kernel`]s: evaluate everyone against the current
//! snapshot, sort, record a [`GenerationStats`] entry, stop on the fitness
//! threshold, otherwise build the next generation from elites plus
//! tournament-selected offspring and replace the population wholesale.
//!
//! # Determinism
//!
//! The evolver holds a seeded [`Pcg64`] and a monotonic [`KernelIds`]
//! counter; operators consume randomness in a fixed order, so a given seed
//! and initial population reproduce a run exactly. The whole evolver state,
//! RNG included, is serde-serializable for checkpointing.
//!
//! # Parallelism
//!
//! With the `parallel` feature, per-kernel fitness evaluation fans out over
//! rayon. Every worker reads the same pre-replacement snapshot (novelty is
//! defined against it) and writes only its own kernel's fields, so the
//! results are identical to the serial path.
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_pcg::Pcg64;
//! use ontokernel::{EvolutionConfig, Kernel, KernelEvolver, KernelIds, SampledEnumerator};
//!
//! let oracle = SampledEnumerator;
//! let mut ids = KernelIds::new();
//! let mut rng = Pcg64::seed_from_u64(7);
//! let mut population: Vec<Kernel> = (0..12)
//!     .map(|_| Kernel::create(&oracle, 4, true, 0.8, &mut rng, &mut ids))
//!     .collect();
//!
//! let config = EvolutionConfig {
//!     max_generations: 10,
//!     ..EvolutionConfig::default()
//! };
//! let mut evolver = KernelEvolver::new(config, 42).unwrap();
//! let history = evolver.run(&mut population, &oracle, None);
//! assert!(!history.is_empty());
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use log::{debug, info};
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::kernel::{fitness_parts, genetic_distance, FitnessParts, Kernel};
use crate::lifecycle::Stage;
use crate::{DomainScorer, KernelIds, TreeOracle};

/// Compare two f64 values, treating NaN as less than all other values, so
/// NaN-fitness kernels sort to the end rather than poisoning the order.
fn cmp_f64_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Run parameters, validated before any generation executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Per-gene perturbation probability, in `[0, 1]`.
    pub mutation_rate: f64,
    /// Probability of sexual over asexual reproduction, in `[0, 1]`.
    pub crossover_rate: f64,
    /// Fraction of the population carried over unchanged, in `[0, 1]`.
    pub elitism_rate: f64,
    pub tournament_size: usize,
    pub max_generations: u32,
    /// Best-fitness level at which the run stops early.
    pub fitness_threshold: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            mutation_rate: 0.1,
            crossover_rate: 0.7,
            elitism_rate: 0.1,
            tournament_size: 3,
            max_generations: 50,
            fitness_threshold: 0.95,
        }
    }
}

impl EvolutionConfig {
    /// Fails fast on malformed parameters; nothing half-runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidPopulationSize);
        }
        if self.max_generations == 0 {
            return Err(ConfigError::InvalidMaxGenerations);
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }
        for (name, value) in [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
            ("elitism_rate", self.elitism_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RateOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("population_size must be positive")]
    InvalidPopulationSize,
    #[error("max_generations must be positive")]
    InvalidMaxGenerations,
    #[error("tournament_size must be at least 1")]
    InvalidTournamentSize,
    #[error("{name} must be within [0, 1], got {value}")]
    RateOutOfRange { name: &'static str, value: f64 },
}

/// Immutable per-generation snapshot of population statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub worst_fitness: f64,
    /// Mean pairwise genetic distance across the population.
    pub diversity: f64,
    pub avg_grip: f64,
    pub avg_stability: f64,
    pub avg_efficiency: f64,
    pub avg_novelty: f64,
    pub stage_distribution: BTreeMap<Stage, usize>,
}

impl GenerationStats {
    fn collect(generation: u32, population: &[Kernel]) -> Self {
        let n = population.len() as f64;
        let mut stage_distribution = BTreeMap::new();
        for kernel in population {
            *stage_distribution.entry(kernel.lifecycle.stage).or_insert(0) += 1;
        }

        let best_fitness = population
            .iter()
            .map(|k| k.fitness)
            .max_by(|a, b| cmp_f64_nan_last(*a, *b))
            .unwrap_or(0.0);
        let worst_fitness = population
            .iter()
            .map(|k| k.fitness)
            .min_by(|a, b| cmp_f64_nan_last(*a, *b))
            .unwrap_or(0.0);

        Self {
            generation,
            best_fitness,
            avg_fitness: population.iter().map(|k| k.fitness).sum::<f64>() / n,
            worst_fitness,
            diversity: population_diversity(population),
            avg_grip: population.iter().map(|k| k.grip).sum::<f64>() / n,
            avg_stability: population.iter().map(|k| k.stability).sum::<f64>() / n,
            avg_efficiency: population.iter().map(|k| k.efficiency).sum::<f64>() / n,
            avg_novelty: population.iter().map(|k| k.novelty).sum::<f64>() / n,
            stage_distribution,
        }
    }
}

/// Mean pairwise genetic distance; 0 below two members.
pub fn population_diversity(population: &[Kernel]) -> f64 {
    let n = population.len();
    if n < 2 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += genetic_distance(&population[i], &population[j]);
        }
    }
    sum / (n * (n - 1) / 2) as f64
}

/// Picks `min(k, len)` distinct members uniformly and returns the fittest.
/// `None` only for an empty population.
pub fn tournament_selection<'a, R: Rng>(
    population: &'a [Kernel],
    k: usize,
    rng: &mut R,
) -> Option<&'a Kernel> {
    let k = k.min(population.len()).max(1);
    population
        .choose_multiple(rng, k)
        .max_by(|a, b| cmp_f64_nan_last(a.fitness, b.fitness))
}

/// Evaluate every kernel against the same pre-replacement snapshot, then
/// write the components back.
fn evaluate_population(population: &mut [Kernel], scorer: Option<&dyn DomainScorer>) {
    let parts: Vec<FitnessParts> = {
        let snapshot: &[Kernel] = population;
        #[cfg(feature = "parallel")]
        {
            snapshot
                .par_iter()
                .map(|k| fitness_parts(k, snapshot, scorer))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            snapshot
                .iter()
                .map(|k| fitness_parts(k, snapshot, scorer))
                .collect()
        }
    };
    for (kernel, p) in population.iter_mut().zip(parts) {
        kernel.apply_fitness(p);
    }
}

/// Generational evolution engine for kernel populations.
#[derive(Serialize, Deserialize)]
pub struct KernelEvolver {
    config: EvolutionConfig,
    rng: Pcg64,
    ids: KernelIds,
}

impl KernelEvolver {
    /// Validates `config` and seeds the engine RNG.
    pub fn new(config: EvolutionConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: Pcg64::seed_from_u64(seed),
            ids: KernelIds::new(),
        })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Id source shared with the run, for seeding kernels consistently.
    pub fn ids_mut(&mut self) -> &mut KernelIds {
        &mut self.ids
    }

    /// Runs up to `max_generations` generations over `population`,
    /// returning one [`GenerationStats`] per generation executed
    /// (numbered from 1, inclusive of the converging generation).
    ///
    /// An empty population runs no generations.
    pub fn run<O: TreeOracle>(
        &mut self,
        population: &mut Vec<Kernel>,
        oracle: &O,
        scorer: Option<&dyn DomainScorer>,
    ) -> Vec<GenerationStats> {
        let mut history = Vec::new();
        if population.is_empty() {
            return history;
        }

        for generation in 1..=self.config.max_generations {
            evaluate_population(population, scorer);
            population.sort_by(|a, b| cmp_f64_nan_last(b.fitness, a.fitness));

            let stats = GenerationStats::collect(generation, population);
            debug!(
                "generation {generation}: best {:.4} avg {:.4} diversity {:.4}",
                stats.best_fitness, stats.avg_fitness, stats.diversity
            );
            let best = stats.best_fitness;
            history.push(stats);

            if best >= self.config.fitness_threshold {
                info!("converged at generation {generation} with best fitness {best:.4}");
                break;
            }

            self.next_generation(population, oracle);
        }
        history
    }

    /// Builds and installs the next generation: elites carried unchanged,
    /// the rest filled by tournament-selected crossover or cloning, then
    /// every member aged by one step.
    fn next_generation<O: TreeOracle>(&mut self, population: &mut Vec<Kernel>, oracle: &O) {
        let n = self.config.population_size;
        let elite_count = ((self.config.elitism_rate * n as f64) as usize).max(1).min(n);
        let mut next_gen = population[..elite_count.min(population.len())].to_vec();

        while next_gen.len() < n {
            let Some(p1) = tournament_selection(population, self.config.tournament_size, &mut self.rng)
            else {
                break;
            };
            let Some(p2) = tournament_selection(population, self.config.tournament_size, &mut self.rng)
            else {
                break;
            };

            if self.rng.random::<f64>() < self.config.crossover_rate {
                let (mut a, mut b) = p1.crossover(p2, &mut self.rng, &mut self.ids);
                a.mutate(self.config.mutation_rate, oracle, &mut self.rng);
                b.mutate(self.config.mutation_rate, oracle, &mut self.rng);
                next_gen.push(a);
                if next_gen.len() < n {
                    next_gen.push(b);
                }
            } else {
                let mut clone = p1.duplicate(&mut self.ids);
                clone.mutate(self.config.mutation_rate, oracle, &mut self.rng);
                next_gen.push(clone);
            }
        }
        next_gen.truncate(n);

        for kernel in &mut next_gen {
            kernel.lifecycle.age += 1;
            kernel.update_stage();
        }
        *population = next_gen;
    }
}
