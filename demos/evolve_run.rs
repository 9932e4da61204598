//! Evolves a small kernel population from scratch and prints the
//! generation-by-generation statistics.
//!
//! Run with `RUST_LOG=debug` to see the engine's per-generation logging.

use rand::SeedableRng;
use rand_pcg::Pcg64;

use ontokernel::{EvolutionConfig, Kernel, KernelEvolver, KernelIds, SampledEnumerator};

fn main() {
    env_logger::init();

    let oracle = SampledEnumerator;
    let mut ids = KernelIds::new();
    let mut rng = Pcg64::seed_from_u64(2024);

    let config = EvolutionConfig {
        population_size: 24,
        max_generations: 40,
        fitness_threshold: 0.75,
        ..EvolutionConfig::default()
    };
    let mut population: Vec<Kernel> = (0..config.population_size)
        .map(|_| Kernel::create(&oracle, 5, true, 0.6, &mut rng, &mut ids))
        .collect();

    let mut evolver = KernelEvolver::new(config, 2024).expect("default-shaped config is valid");
    let history = evolver.run(&mut population, &oracle, None);

    println!("gen |   best |    avg |  worst | diversity | stages");
    for stats in &history {
        let stages: Vec<String> = stats
            .stage_distribution
            .iter()
            .map(|(stage, count)| format!("{stage:?}:{count}"))
            .collect();
        println!(
            "{:>3} | {:.4} | {:.4} | {:.4} |    {:.4} | {}",
            stats.generation,
            stats.best_fitness,
            stats.avg_fitness,
            stats.worst_fitness,
            stats.diversity,
            stages.join(" ")
        );
    }

    let best = population
        .iter()
        .max_by(|a, b| {
            a.fitness
                .partial_cmp(&b.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("population is non-empty");
    println!(
        "\nbest kernel {} after {} generations: fitness {:.4}, {} genes, lineage depth {}",
        best.id(),
        history.len(),
        best.fitness,
        best.genome.len(),
        best.lineage.len()
    );
}
