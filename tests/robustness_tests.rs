//! Edge-case behavior: degenerate genomes, tiny populations, malformed
//! configuration, and hostile scorers must never panic mid-run.

use rand::SeedableRng;
use rand_pcg::Pcg64;

use ontokernel::{
    genetic_distance, tournament_selection, population_diversity, ConfigError, DomainScorer,
    EvolutionConfig, Genome, Kernel, KernelEvolver, KernelIds, SampledEnumerator,
};

struct NanScorer;
impl DomainScorer for NanScorer {
    fn score(&self, _genome: &Genome) -> f64 {
        f64::NAN
    }
}

fn empty_kernel(ids: &mut KernelIds) -> Kernel {
    let oracle = SampledEnumerator;
    let mut rng = Pcg64::seed_from_u64(0);
    // Density 0 includes no keys at all.
    Kernel::create(&oracle, 3, true, 0.0, &mut rng, ids)
}

// ============================================================================
// Degenerate genomes
// ============================================================================

#[test]
fn empty_genome_fitness_has_defined_floors() {
    let mut ids = KernelIds::new();
    let mut kernel = empty_kernel(&mut ids);
    assert!(kernel.genome.is_empty());

    let fitness = kernel.evaluate_fitness(&[], None);
    assert_eq!(kernel.grip, 0.0);
    assert_eq!(kernel.stability, 0.1);
    assert_eq!(kernel.efficiency, 1.0);
    assert_eq!(kernel.novelty, 0.5);
    assert!((fitness - 0.25 * 1.6).abs() < 1e-12);
}

#[test]
fn distance_between_empty_genomes_is_zero() {
    let mut ids = KernelIds::new();
    let a = empty_kernel(&mut ids);
    let b = empty_kernel(&mut ids);
    assert_eq!(genetic_distance(&a, &b), 0.0);
}

#[test]
fn operators_tolerate_empty_genomes() {
    let oracle = SampledEnumerator;
    let mut ids = KernelIds::new();
    let mut rng = Pcg64::seed_from_u64(4);

    let a = empty_kernel(&mut ids);
    let b = empty_kernel(&mut ids);

    let child = a.self_generate(&mut rng, &mut ids);
    assert!(child.genome.is_empty());

    let (x, y) = a.crossover(&b, &mut rng, &mut ids);
    assert!(x.genome.is_empty());
    assert!(y.genome.is_empty());

    // Mutation on an empty genome may only ever insert.
    let mut m = a.clone();
    for _ in 0..50 {
        m.mutate(1.0, &oracle, &mut rng);
    }
    assert!(m.genome.len() <= 50);
}

#[test]
fn mutation_never_deletes_the_last_gene() {
    let oracle = SampledEnumerator;
    let mut ids = KernelIds::new();
    let mut rng = Pcg64::seed_from_u64(9);

    let mut kernel = Kernel::create(&oracle, 3, true, 1.0, &mut rng, &mut ids);
    for _ in 0..200 {
        kernel.mutate(1.0, &oracle, &mut rng);
        assert!(!kernel.genome.is_empty());
    }
}

#[test]
fn crossover_of_disjoint_genomes_partitions_the_union() {
    let oracle = SampledEnumerator;
    let mut ids = KernelIds::new();
    let mut rng = Pcg64::seed_from_u64(14);

    // Orders 1-2 on one side, order-4 shapes on the other.
    let mut p1 = Kernel::create(&oracle, 2, true, 1.0, &mut rng, &mut ids);
    let mut p2 = Kernel::create(&oracle, 4, true, 1.0, &mut rng, &mut ids);
    let shared: Vec<_> = p1
        .genome
        .keys()
        .filter(|k| p2.genome.contains(k))
        .cloned()
        .collect();
    for key in &shared {
        p2.genome.remove(key);
    }

    let union_len = p1.genome.len() + p2.genome.len();
    let (a, b) = p1.crossover(&p2, &mut rng, &mut ids);
    assert!(a.genome.len() <= union_len);
    assert!(b.genome.len() <= union_len);
    for child in [&a, &b] {
        for (key, _) in child.genome.iter() {
            assert!(p1.genome.contains(key) || p2.genome.contains(key));
        }
    }
}

// ============================================================================
// Tiny populations
// ============================================================================

#[test]
fn tournament_on_empty_population_returns_none() {
    let mut rng = Pcg64::seed_from_u64(0);
    assert!(tournament_selection(&[], 3, &mut rng).is_none());
}

#[test]
fn diversity_of_tiny_populations_is_zero() {
    let mut ids = KernelIds::new();
    let oracle = SampledEnumerator;
    let mut rng = Pcg64::seed_from_u64(2);
    let one = vec![Kernel::create(&oracle, 3, true, 1.0, &mut rng, &mut ids)];

    assert_eq!(population_diversity(&[]), 0.0);
    assert_eq!(population_diversity(&one), 0.0);
}

#[test]
fn evolving_an_empty_population_yields_no_stats() {
    let oracle = SampledEnumerator;
    let mut evolver =
        KernelEvolver::new(EvolutionConfig::default(), 3).expect("valid config");
    let mut population = Vec::new();
    let history = evolver.run(&mut population, &oracle, None);
    assert!(history.is_empty());
    assert!(population.is_empty());
}

#[test]
fn single_member_population_survives_a_run() {
    let oracle = SampledEnumerator;
    let mut ids = KernelIds::new();
    let mut rng = Pcg64::seed_from_u64(6);
    let mut population = vec![Kernel::create(&oracle, 3, true, 1.0, &mut rng, &mut ids)];

    let config = EvolutionConfig {
        population_size: 1,
        max_generations: 4,
        fitness_threshold: 10.0,
        ..EvolutionConfig::default()
    };
    let mut evolver = KernelEvolver::new(config, 8).expect("valid config");
    let history = evolver.run(&mut population, &oracle, None);
    assert_eq!(history.len(), 4);
    assert_eq!(population.len(), 1);
}

// ============================================================================
// Hostile scorers
// ============================================================================

#[test]
fn nan_scorer_does_not_poison_the_run() {
    let oracle = SampledEnumerator;
    let mut ids = KernelIds::new();
    let mut rng = Pcg64::seed_from_u64(10);
    let mut population: Vec<Kernel> = (0..6)
        .map(|_| Kernel::create(&oracle, 3, false, 0.8, &mut rng, &mut ids))
        .collect();

    let config = EvolutionConfig {
        population_size: 6,
        max_generations: 3,
        fitness_threshold: 10.0,
        ..EvolutionConfig::default()
    };
    let mut evolver = KernelEvolver::new(config, 11).expect("valid config");
    let history = evolver.run(&mut population, &oracle, Some(&NanScorer));
    assert_eq!(history.len(), 3);
    assert_eq!(population.len(), 6);
}

// ============================================================================
// Configuration validation
// ============================================================================

#[test]
fn malformed_configs_fail_before_any_generation() {
    let cases = [
        (
            EvolutionConfig {
                population_size: 0,
                ..EvolutionConfig::default()
            },
            "population",
        ),
        (
            EvolutionConfig {
                max_generations: 0,
                ..EvolutionConfig::default()
            },
            "generations",
        ),
        (
            EvolutionConfig {
                tournament_size: 0,
                ..EvolutionConfig::default()
            },
            "tournament",
        ),
        (
            EvolutionConfig {
                mutation_rate: 1.5,
                ..EvolutionConfig::default()
            },
            "mutation_rate",
        ),
        (
            EvolutionConfig {
                crossover_rate: -0.1,
                ..EvolutionConfig::default()
            },
            "crossover_rate",
        ),
        (
            EvolutionConfig {
                elitism_rate: 2.0,
                ..EvolutionConfig::default()
            },
            "elitism_rate",
        ),
    ];

    for (config, hint) in cases {
        let err = KernelEvolver::new(config, 0).err().unwrap_or_else(|| {
            panic!("config with bad {hint} was accepted");
        });
        assert!(
            err.to_string().contains(hint),
            "error for {hint} reads: {err}"
        );
    }
}

#[test]
fn rate_errors_carry_the_offending_value() {
    let config = EvolutionConfig {
        mutation_rate: 1.5,
        ..EvolutionConfig::default()
    };
    match config.validate() {
        Err(ConfigError::RateOutOfRange { name, value }) => {
            assert_eq!(name, "mutation_rate");
            assert_eq!(value, 1.5);
        }
        other => panic!("expected RateOutOfRange, got {other:?}"),
    }
}
