//! Goal-region CLI - Run a weighted goal sampling demo from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use goal_region::{SamplerConfig, StateSpace, WeightedGoalSampler};

/// Planar unit square with a circular obstacle in the middle.
struct PlaneWorld {
    obstacle_center: [f64; 2],
    obstacle_radius: f64,
}

impl StateSpace for PlaneWorld {
    type State = [f64; 2];

    fn is_ready(&self) -> bool {
        true
    }

    fn satisfies_bounds(&self, state: &[f64; 2]) -> bool {
        state.iter().all(|c| (0.0..=1.0).contains(c))
    }

    fn is_valid(&self, state: &[f64; 2]) -> bool {
        self.distance(state, &self.obstacle_center) > self.obstacle_radius
    }

    fn distance(&self, a: &[f64; 2], b: &[f64; 2]) -> f64 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [iterations]", args[0]);
        eprintln!();
        eprintln!("Run a weighted goal-region sampling demo from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to sampler configuration file");
        eprintln!("  iterations   Number of sample/feedback rounds (default: 100)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");

        if args.len() > 1 && args[1] == "--example" {
            print_example_config();
        }

        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let iterations: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SamplerConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let world = Arc::new(PlaneWorld {
        obstacle_center: [0.5, 0.5],
        obstacle_radius: 0.2,
    });

    println!("Weighted Goal-Region Sampling");
    println!("=============================");
    println!("Sampling cap: {}", config.max_sampled_goals);
    println!("Min goal separation: {}", config.min_distance);
    println!("Iterations: {}", iterations);
    println!();

    // Candidate goals live on a ring around the obstacle; some fall inside
    // it and get filtered by the validity check.
    let ring_center = [0.5, 0.5];
    let min_distance = config.min_distance;
    let mut sampler = WeightedGoalSampler::new(world, config)
        .unwrap_or_else(|e| {
            eprintln!("Invalid config: {}", e);
            std::process::exit(1);
        })
        .with_proposal(Arc::new(move |region| {
            let mut rng = rand::thread_rng();
            let mut batch = Vec::with_capacity(4);
            for _ in 0..4 {
                let theta = rng.gen_range(0.0..std::f64::consts::TAU);
                let r = 0.15 + 0.3 * rng.gen_range(0.0f64..1.0).sqrt();
                let candidate = [
                    ring_center[0] + r * theta.cos(),
                    ring_center[1] + r * theta.sin(),
                ];
                // Drop near-duplicates of goals the region already holds.
                match region.distance_goal(&candidate) {
                    Ok(d) if d < min_distance => continue,
                    _ => batch.push(candidate),
                }
            }
            batch
        }));

    sampler.set_new_state_callback(Arc::new(|state: &[f64; 2]| {
        log::info!("new goal at [{:.3}, {:.3}]", state[0], state[1]);
    }));
    // Seed one handcrafted goal alongside the sampled ones.
    sampler.add_state_if_different([0.85, 0.85], min_distance);

    println!("Running sampler...");
    let start = Instant::now();
    sampler.start_sampling();

    // Let the worker fill the initial pool.
    while !sampler.has_states() && start.elapsed() < Duration::from_secs(2) {
        std::thread::sleep(Duration::from_millis(1));
    }
    if !sampler.could_sample() {
        eprintln!("Sampler produced no goals");
        std::process::exit(1);
    }

    // A stand-in for the planner: goals in the upper-right quadrant are
    // reachable and get rewarded, the rest get penalized.
    let mut rewards = 0u64;
    let mut penalties = 0u64;
    for i in 0..iterations {
        let goal = sampler.sample_weighted_goal().unwrap_or_else(|e| {
            eprintln!("Error sampling goal: {}", e);
            std::process::exit(1);
        });
        if goal.state[0] > 0.5 && goal.state[1] > 0.5 {
            sampler.reward(goal.id);
            rewards += 1;
        } else {
            sampler.penalize(goal.id);
            penalties += 1;
        }

        // Print progress every 10%
        if (i + 1) % (iterations / 10).max(1) == 0 {
            println!(
                "  Round {}/{}: goals={}, cap={}, top weight={:.4}",
                i + 1,
                iterations,
                sampler.state_count(),
                sampler.max_sampled_goals(),
                goal.weight,
            );
        }
    }

    sampler.stop_sampling();
    let elapsed = start.elapsed();

    println!();
    println!("Final state:");
    println!("  Goals in pool: {}", sampler.state_count());
    println!("  Sampling cap: {}", sampler.max_sampled_goals());
    println!("  Sampling attempts: {}", sampler.sampling_attempts());
    println!("  Rewards: {} / penalties: {}", rewards, penalties);
    println!(
        "Time: {:.2}s ({:.1} rounds/s)",
        elapsed.as_secs_f32(),
        iterations as f32 / elapsed.as_secs_f32()
    );
}

fn print_example_config() {
    let config = SamplerConfig::default();

    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
