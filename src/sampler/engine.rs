//! The engine: owns the shared goal region and both background workers.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::schema::{ConfigError, SamplerConfig};

use super::heap::GoalId;
use super::region::{GoalRegion, WeightedGoal};
use super::space::{GoalProposal, NewStateCallback, RoadmapPlanner, StateSpace};
use super::store::EmptyStoreError;

/// Weighted goal-region sampling engine.
///
/// Owns the shared [`GoalRegion`], a background sampling worker driving the
/// candidate-proposal function, and an independent growth worker driving an
/// optional roadmap planner. Dropping the engine stops both workers before
/// the shared data is released.
pub struct WeightedGoalSampler<S: StateSpace> {
    region: Arc<GoalRegion<S>>,
    config: SamplerConfig,
    proposal: Option<GoalProposal<S>>,
    planner: Option<Arc<dyn RoadmapPlanner>>,
    // Declaration order matters: the sampling worker joins before the
    // growth worker on drop.
    sampling_worker: super::worker::WorkerHandle,
    growth_worker: super::worker::WorkerHandle,
}

impl<S: StateSpace> WeightedGoalSampler<S> {
    /// Creates an engine over `space`. Fails if the configuration is
    /// invalid.
    pub fn new(space: Arc<S>, config: SamplerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let region = Arc::new(GoalRegion::new(space, config.max_sampled_goals));
        Ok(Self {
            region,
            config,
            proposal: None,
            planner: None,
            sampling_worker: super::worker::WorkerHandle::idle(),
            growth_worker: super::worker::WorkerHandle::idle(),
        })
    }

    /// Registers the candidate-proposal function. With `auto_start` set in
    /// the configuration this also starts the sampling worker.
    pub fn with_proposal(mut self, proposal: GoalProposal<S>) -> Self {
        self.proposal = Some(proposal);
        if self.config.auto_start {
            self.start_sampling();
        }
        self
    }

    /// Registers the structure-growth collaborator.
    pub fn with_planner(mut self, planner: Arc<dyn RoadmapPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Registers the callback fired for every goal accepted by
    /// `add_state_if_different`, invoked outside the engine lock.
    pub fn set_new_state_callback(&self, callback: NewStateCallback<S::State>) {
        self.region.set_new_state_callback(callback);
    }

    /// Shared handle to the goal region, as also seen by the proposal
    /// function.
    pub fn region(&self) -> &Arc<GoalRegion<S>> {
        &self.region
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Worker lifecycle
    // ------------------------------------------------------------------

    /// Starts the background sampling worker. No-op when already running.
    pub fn start_sampling(&mut self) {
        if self.sampling_worker.is_running() {
            return;
        }
        debug!("starting goal sampling thread");
        self.region.begin_sampling();
        let region = Arc::clone(&self.region);
        let proposal = self.proposal.clone();
        let readiness_poll = self.config.readiness_poll();
        let resume_poll = self.config.resume_poll();
        self.sampling_worker.spawn("goal-region-sampling", move || {
            sampling_loop(&region, proposal, readiness_poll, resume_poll);
        });
    }

    /// Stops the sampling worker and blocks until its current iteration
    /// completes and the thread exits. Safe to call when never started;
    /// re-raises a panic that escaped the worker.
    pub fn stop_sampling(&mut self) {
        if self.region.request_sampling_stop() {
            debug!("attempting to stop the goal sampling thread");
        }
        self.sampling_worker.join();
        self.region.finish_sampling_stop();
    }

    /// Starts the roadmap growth worker. No-op when already running or
    /// when no planner was supplied.
    pub fn start_growing(&mut self) {
        if self.growth_worker.is_running() {
            return;
        }
        let Some(planner) = self.planner.clone() else {
            warn!("no roadmap planner set; growth thread not started");
            return;
        };
        debug!("starting roadmap growth thread");
        self.region.begin_growth();
        let region = Arc::clone(&self.region);
        let slice = self.config.growth_slice();
        self.growth_worker.spawn("goal-region-growth", move || {
            growth_loop(&region, &*planner, slice);
        });
    }

    /// Stops the growth worker and blocks until the thread exits. Safe to
    /// call when never started; re-raises a panic that escaped the worker.
    pub fn stop_growing(&mut self) {
        if self.region.request_growth_stop() {
            debug!("attempting to stop the roadmap growth thread");
        }
        self.growth_worker.join();
        self.region.finish_growth_stop();
    }

    pub fn is_sampling(&self) -> bool {
        self.region.is_sampling()
    }

    pub fn is_growing(&self) -> bool {
        self.region.is_growing()
    }

    /// Whether the caller can expect goals now or later: the store already
    /// has states, or the sampling worker is still producing them.
    pub fn could_sample(&self) -> bool {
        self.region.has_states() || self.region.is_sampling()
    }

    // ------------------------------------------------------------------
    // Query surface forwarded to the region
    // ------------------------------------------------------------------

    pub fn add_state(&self, state: S::State) -> GoalId {
        self.region.add_state(state)
    }

    pub fn add_state_if_different(&self, state: S::State, min_distance: f64) -> bool {
        self.region.add_state_if_different(state, min_distance)
    }

    pub fn sample_goal(&self) -> Result<S::State, EmptyStoreError> {
        self.region.sample_goal()
    }

    pub fn sample_weighted_goal(&self) -> Result<WeightedGoal<S::State>, EmptyStoreError> {
        self.region.sample_weighted_goal()
    }

    pub fn sample_consecutive_goal(&self) -> Result<WeightedGoal<S::State>, EmptyStoreError> {
        self.region.sample_consecutive_goal()
    }

    pub fn distance_goal(&self, state: &S::State) -> Result<f64, EmptyStoreError> {
        self.region.distance_goal(state)
    }

    pub fn state(&self, index: usize) -> Option<S::State> {
        self.region.state(index)
    }

    pub fn state_count(&self) -> usize {
        self.region.state_count()
    }

    pub fn has_states(&self) -> bool {
        self.region.has_states()
    }

    pub fn max_sample_count(&self) -> usize {
        self.region.max_sample_count()
    }

    pub fn penalize(&self, id: GoalId) {
        self.region.penalize(id);
    }

    pub fn reward(&self, id: GoalId) {
        self.region.reward(id);
    }

    pub fn clear(&self) {
        self.region.clear();
    }

    pub fn num_sampled_goals(&self) -> u32 {
        self.region.num_sampled_goals()
    }

    pub fn max_sampled_goals(&self) -> u32 {
        self.region.max_sampled_goals()
    }

    pub fn sampling_attempts(&self) -> u32 {
        self.region.sampling_attempts()
    }
}

impl<S: StateSpace> Drop for WeightedGoalSampler<S> {
    /// Requests both workers to stop; the worker handles join in their own
    /// drop, sampling first. A worker panic is swallowed here since drop
    /// must not unwind; call `stop_sampling`/`stop_growing` to observe it.
    fn drop(&mut self) {
        self.region.request_sampling_stop();
        self.region.request_growth_stop();
    }
}

/// Body of the sampling worker.
///
/// Waits (cancellable, fixed poll) for the state space to become ready,
/// then repeatedly proposes and filters candidate batches. Termination is
/// checked per iteration, never mid-batch.
fn sampling_loop<S: StateSpace>(
    region: &GoalRegion<S>,
    proposal: Option<GoalProposal<S>>,
    readiness_poll: Duration,
    resume_poll: Duration,
) {
    if !region.space().is_ready() {
        debug!("waiting for the state space to be ready before sampling goals");
        while region.is_sampling() && !region.space().is_ready() {
            thread::sleep(readiness_poll);
        }
    }

    let prev_attempts = region.sampling_attempts();
    match proposal {
        Some(proposal) if region.is_sampling() && region.space().is_ready() => {
            debug!("beginning goal sampling computation");
            while region.is_sampling() {
                if !region.wants_batch() {
                    // Paused at the cap: park until the adaptive reset or a
                    // stop request wakes us.
                    if !region.wait_for_resume(resume_poll) {
                        break;
                    }
                    continue;
                }

                let batch = proposal(region);
                let mut accepted_any = false;
                for candidate in batch {
                    // Oracle checks run outside the lock.
                    if region.space().satisfies_bounds(&candidate)
                        && region.space().is_valid(&candidate)
                    {
                        if region.accept_sampled_goal(candidate) {
                            debug!("adding goal state");
                            accepted_any = true;
                        } else {
                            debug!("sampling cap reached; dropping surplus goal candidate");
                        }
                    } else {
                        debug!("invalid goal candidate");
                    }
                }
                region.finish_batch(accepted_any);
            }
        }
        proposal => {
            let reason = if proposal.is_none() {
                " No proposal function set."
            } else if !region.space().is_ready() {
                " State space never became ready."
            } else {
                ""
            };
            warn!("goal sampling thread never did any work.{reason}");
        }
    }

    region.mark_sampling_terminated();
    debug!(
        "stopped goal sampling thread after {} sampling attempts",
        region.sampling_attempts() - prev_attempts
    );
}

/// Body of the growth worker: drives the planner in fixed time slices.
/// Never touches the candidate store or the weighted queue.
fn growth_loop<S: StateSpace>(
    region: &GoalRegion<S>,
    planner: &dyn RoadmapPlanner,
    slice: Duration,
) {
    while region.is_growing() {
        planner.grow(slice);
    }
    region.mark_growth_terminated();
    debug!(
        "stopped roadmap growth thread with {} nodes and {} edges",
        planner.node_count(),
        planner.edge_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::test_support::{CountingPlanner, PlaneSpace, wait_until};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine(
        space: PlaneSpace,
        config: SamplerConfig,
        proposal: GoalProposal<PlaneSpace>,
    ) -> WeightedGoalSampler<PlaneSpace> {
        WeightedGoalSampler::new(Arc::new(space), config)
            .unwrap()
            .with_proposal(proposal)
    }

    /// Batch of three with one candidate inside the obstacle.
    fn mixed_batch() -> GoalProposal<PlaneSpace> {
        Arc::new(|_region: &GoalRegion<PlaneSpace>| {
            vec![[0.9, 0.9], [0.5, 0.5], [0.1, 0.9]]
        })
    }

    #[test]
    fn test_accepts_valid_candidates_until_cap() {
        let config = SamplerConfig {
            max_sampled_goals: 2,
            ..Default::default()
        };
        let mut sampler = engine(PlaneSpace::with_obstacle(0.2), config, mixed_batch());
        sampler.start_sampling();

        assert!(wait_until(|| sampler.num_sampled_goals() == 2));
        // Paused at the cap: no further growth.
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(sampler.num_sampled_goals(), 2);
        assert_eq!(sampler.state_count(), 2);
        assert!(sampler.sampling_attempts() >= 1);

        sampler.stop_sampling();
        assert!(!sampler.is_sampling());
    }

    #[test]
    fn test_adaptive_reset_resumes_paused_worker() {
        let config = SamplerConfig {
            max_sampled_goals: 1,
            ..Default::default()
        };
        let mut sampler = engine(PlaneSpace::open(), config, mixed_batch());
        sampler.start_sampling();
        assert!(wait_until(|| sampler.num_sampled_goals() == 1));

        // Drive the single goal below the reset threshold.
        let id = sampler.sample_weighted_goal().unwrap().id;
        for _ in 0..4 {
            sampler.penalize(id);
        }
        assert_eq!(sampler.max_sampled_goals(), 11);
        assert!(wait_until(|| sampler.num_sampled_goals() > 1));

        sampler.stop_sampling();
    }

    #[test]
    fn test_stop_without_start_is_a_noop() {
        let mut sampler = engine(PlaneSpace::open(), SamplerConfig::default(), mixed_batch());
        sampler.stop_sampling();
        sampler.stop_growing();
        assert!(!sampler.is_sampling());
        assert!(!sampler.is_growing());
        assert_eq!(sampler.state_count(), 0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let config = SamplerConfig {
            max_sampled_goals: 2,
            ..Default::default()
        };
        let mut sampler = engine(PlaneSpace::open(), config, mixed_batch());
        sampler.start_sampling();
        sampler.start_sampling();
        assert!(wait_until(|| sampler.num_sampled_goals() == 2));
        sampler.stop_sampling();
        assert_eq!(sampler.num_sampled_goals(), 2);
    }

    #[test]
    fn test_could_sample() {
        let mut sampler = engine(PlaneSpace::open(), SamplerConfig::default(), mixed_batch());
        assert!(!sampler.could_sample());
        sampler.start_sampling();
        assert!(sampler.could_sample());
        assert!(wait_until(|| sampler.has_states()));
        sampler.stop_sampling();
        // Worker stopped but states remain available.
        assert!(sampler.could_sample());
    }

    #[test]
    fn test_waits_for_space_readiness() {
        let space = PlaneSpace::not_ready();
        let config = SamplerConfig {
            max_sampled_goals: 2,
            ..Default::default()
        };
        let mut sampler = engine(space, config, mixed_batch());
        sampler.start_sampling();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(sampler.state_count(), 0);

        sampler.region().space().make_ready();
        assert!(wait_until(|| sampler.num_sampled_goals() == 2));
        sampler.stop_sampling();
    }

    #[test]
    fn test_no_proposal_worker_exits_cleanly() {
        let mut sampler =
            WeightedGoalSampler::new(Arc::new(PlaneSpace::open()), SamplerConfig::default())
                .unwrap();
        sampler.start_sampling();
        assert!(wait_until(|| !sampler.is_sampling()));
        sampler.stop_sampling();
        assert_eq!(sampler.state_count(), 0);
    }

    #[test]
    fn test_auto_start() {
        let config = SamplerConfig {
            max_sampled_goals: 2,
            auto_start: true,
            ..Default::default()
        };
        let sampler = engine(PlaneSpace::open(), config, mixed_batch());
        assert!(sampler.is_sampling());
        assert!(wait_until(|| sampler.num_sampled_goals() == 2));
    }

    #[test]
    fn test_growth_worker_runs_independently() {
        let planner = Arc::new(CountingPlanner::new());
        let config = SamplerConfig {
            growth_slice_ms: 1,
            ..Default::default()
        };
        let mut sampler =
            WeightedGoalSampler::new(Arc::new(PlaneSpace::open()), config)
                .unwrap()
                .with_planner(Arc::clone(&planner) as Arc<dyn RoadmapPlanner>);
        sampler.start_growing();
        assert!(sampler.is_growing());
        assert!(wait_until(|| planner.node_count() >= 3));
        sampler.stop_growing();
        assert!(!sampler.is_growing());
        // Goal structures untouched by growth.
        assert_eq!(sampler.state_count(), 0);
    }

    #[test]
    fn test_growth_without_planner_is_a_noop() {
        let mut sampler =
            WeightedGoalSampler::new(Arc::new(PlaneSpace::open()), SamplerConfig::default())
                .unwrap();
        sampler.start_growing();
        assert!(!sampler.is_growing());
    }

    #[test]
    fn test_proposal_sees_region_queries() {
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&observed);
        let proposal: GoalProposal<PlaneSpace> = Arc::new(move |region| {
            counter.store(region.state_count(), Ordering::SeqCst);
            vec![[0.3, 0.3]]
        });
        let config = SamplerConfig {
            max_sampled_goals: 3,
            ..Default::default()
        };
        let mut sampler = engine(PlaneSpace::open(), config, proposal);
        sampler.start_sampling();
        assert!(wait_until(|| sampler.num_sampled_goals() == 3));
        sampler.stop_sampling();
        assert!(observed.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    #[should_panic(expected = "proposal exploded")]
    fn test_collaborator_panic_propagates_on_stop() {
        let called = Arc::new(AtomicUsize::new(0));
        let marker = Arc::clone(&called);
        let proposal: GoalProposal<PlaneSpace> = Arc::new(move |_region| {
            marker.store(1, Ordering::SeqCst);
            panic!("proposal exploded");
        });
        let mut sampler = engine(PlaneSpace::open(), SamplerConfig::default(), proposal);
        sampler.start_sampling();
        assert!(wait_until(|| called.load(Ordering::SeqCst) == 1));
        sampler.stop_sampling();
    }
}
