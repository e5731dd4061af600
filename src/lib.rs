//! Weighted goal-region sampling for sampling-based motion planners.
//!
//! Instead of steering a search toward one fixed target configuration, the
//! engine maintains a growing, weighted pool of candidate goal
//! configurations. A background worker keeps proposing and validating new
//! candidates while the foreground search draws the currently best-weighted
//! goal, then reports back with `penalize` or `reward`. When every known
//! goal has stopped paying off, an adaptive reset re-levels the weights and
//! raises the sampling cap so the pool keeps growing.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: configuration types for the engine
//! - `sampler`: the engine (candidate store, weighted queue, workers)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use goal_region::{SamplerConfig, StateSpace, WeightedGoalSampler};
//!
//! /// The unit interval; every configuration is valid.
//! struct Line;
//!
//! impl StateSpace for Line {
//!     type State = f64;
//!     fn is_ready(&self) -> bool { true }
//!     fn satisfies_bounds(&self, s: &f64) -> bool { (0.0..=1.0).contains(s) }
//!     fn is_valid(&self, _s: &f64) -> bool { true }
//!     fn distance(&self, a: &f64, b: &f64) -> f64 { (a - b).abs() }
//! }
//!
//! let mut sampler = WeightedGoalSampler::new(Arc::new(Line), SamplerConfig::default())
//!     .unwrap()
//!     .with_proposal(Arc::new(|_region| vec![0.25, 0.75]));
//! sampler.start_sampling();
//!
//! std::thread::sleep(Duration::from_millis(20));
//! if let Ok(goal) = sampler.sample_weighted_goal() {
//!     // ... plan toward goal.state, then report the outcome:
//!     sampler.penalize(goal.id);
//! }
//! sampler.stop_sampling();
//! ```

pub mod sampler;
pub mod schema;

// Re-export commonly used types
pub use sampler::{
    EmptyStoreError, GoalId, GoalProposal, GoalRegion, NewStateCallback, RoadmapPlanner,
    StateSpace, WeightedGoal, WeightedGoalSampler,
};
pub use schema::{ConfigError, SamplerConfig};
