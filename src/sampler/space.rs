//! Interfaces of the external collaborators consumed by the engine.

use std::sync::Arc;
use std::time::Duration;

use super::region::GoalRegion;

/// Oracle describing the planning state space.
///
/// Implemented by the host planning library. Bounds, validity and readiness
/// checks are always invoked outside the engine lock; the distance metric is
/// the one call made while the lock is held, since it scans the protected
/// store.
pub trait StateSpace: Send + Sync + 'static {
    /// A point in the planning state space, opaque to the engine.
    type State: Clone + Send + Sync + 'static;

    /// Whether the space is fully set up and can answer queries.
    fn is_ready(&self) -> bool;
    /// Whether a configuration lies within the space bounds.
    fn satisfies_bounds(&self, state: &Self::State) -> bool;
    /// Whether a configuration is admissible (e.g. collision-free).
    fn is_valid(&self, state: &Self::State) -> bool;
    /// Distance between two configurations.
    fn distance(&self, a: &Self::State, b: &Self::State) -> f64;
}

/// Incremental structure builder (e.g. roadmap expansion) driven by the
/// growth worker, unrelated to goal weighting.
pub trait RoadmapPlanner: Send + Sync + 'static {
    /// Grow the structure for at most `budget`.
    fn grow(&self, budget: Duration);
    /// Number of nodes currently in the structure.
    fn node_count(&self) -> usize;
    /// Number of edges currently in the structure.
    fn edge_count(&self) -> usize;
}

/// Candidate-proposal function invoked repeatedly by the sampling worker.
///
/// Receives the shared goal region so it can query already accepted goals,
/// and returns a batch of raw candidate configurations. A proposal that
/// never returns will block engine shutdown; cancellation is cooperative at
/// batch granularity.
pub type GoalProposal<S> =
    Arc<dyn Fn(&GoalRegion<S>) -> Vec<<S as StateSpace>::State> + Send + Sync>;

/// Callback fired after `add_state_if_different` accepts a configuration.
/// Always invoked outside the engine lock, so it may query the region.
pub type NewStateCallback<C> = Arc<dyn Fn(&C) + Send + Sync>;
