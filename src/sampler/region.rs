//! Shared core of the engine: candidate store, weighted queue and lifecycle
//! state behind a single mutex.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use super::heap::{GoalId, WeightedHeap};
use super::space::{NewStateCallback, StateSpace};
use super::store::{EmptyStoreError, GoalStore};

/// Weight assigned to every goal at acceptance, and restored to every goal
/// by the adaptive reset.
pub const INITIAL_GOAL_WEIGHT: f64 = 0.5;

/// Post-penalty weight below which the adaptive reset may fire.
const RESET_TRIGGER_WEIGHT: f64 = 0.2;

/// Cap increase applied by the adaptive reset.
const CAP_INCREMENT: u32 = 10;

/// Contraction toward 0: `w -> w / (w + 1)`.
///
/// Weight 0 is a fixed point shared with `rewarded`: a goal that reaches
/// exactly 0 stays permanently disfavored.
fn penalized(weight: f64) -> f64 {
    weight / (weight + 1.0)
}

/// Expansion toward 1, clamped: `w -> min(w / (1 - w), 1)`.
fn rewarded(weight: f64) -> f64 {
    (weight / (1.0 - weight)).min(1.0)
}

/// A goal drawn from the weighted queue: a copy of the configuration, its
/// weight at selection time, and the stable handle used for later
/// `penalize`/`reward` calls.
#[derive(Debug, Clone)]
pub struct WeightedGoal<C> {
    /// Copy of the stored configuration.
    pub state: C,
    /// Weight at selection time.
    pub weight: f64,
    /// Queue handle, valid until `clear`.
    pub id: GoalId,
}

/// Everything guarded by the region mutex.
struct RegionState<C> {
    store: GoalStore<C>,
    queue: WeightedHeap,
    /// Goals accepted through the sampling path. Resets only on `clear`.
    num_sampled_goals: u32,
    /// Current sampling cap; raised by the adaptive reset.
    max_sampled_goals: u32,
    /// Proposal batches that produced at least one acceptance.
    sampling_attempts: u32,
    /// False while the sampling worker is paused at the cap.
    sample_goals: bool,
    terminate_sampling: bool,
    terminate_growth: bool,
    sampling_running: bool,
    growth_running: bool,
}

/// Thread-safe weighted goal region, shared between the foreground search,
/// the sampling worker and the proposal function.
///
/// One mutex guards the candidate store, the weighted queue and all
/// lifecycle flags and counters. Critical sections are kept short; external
/// collaborators (proposal function, bounds/validity checks, growth
/// operation, new-state callback) are never invoked while the lock is held.
pub struct GoalRegion<S: StateSpace> {
    space: Arc<S>,
    state: Mutex<RegionState<S::State>>,
    /// Wakes a sampling worker paused at the cap (adaptive reset or stop).
    resume: Condvar,
    callback: Mutex<Option<NewStateCallback<S::State>>>,
}

impl<S: StateSpace> GoalRegion<S> {
    pub(crate) fn new(space: Arc<S>, max_sampled_goals: u32) -> Self {
        Self {
            space,
            state: Mutex::new(RegionState {
                store: GoalStore::new(),
                queue: WeightedHeap::new(),
                num_sampled_goals: 0,
                max_sampled_goals,
                sampling_attempts: 0,
                sample_goals: true,
                terminate_sampling: false,
                terminate_growth: false,
                sampling_running: false,
                growth_running: false,
            }),
            resume: Condvar::new(),
            callback: Mutex::new(None),
        }
    }

    /// The state-space oracle this region samples from.
    #[inline]
    pub fn space(&self) -> &S {
        &self.space
    }

    fn lock(&self) -> MutexGuard<'_, RegionState<S::State>> {
        self.state.lock().expect("goal region state poisoned")
    }

    // ------------------------------------------------------------------
    // Store surface
    // ------------------------------------------------------------------

    /// Appends a goal unconditionally and registers it in the weighted
    /// queue at the initial weight.
    pub fn add_state(&self, state: S::State) -> GoalId {
        let mut s = self.lock();
        s.store.push(state);
        s.queue.push(INITIAL_GOAL_WEIGHT)
    }

    /// Appends `state` only if it is farther than `min_distance` from every
    /// stored goal. The new-state callback, if registered, runs after the
    /// lock is released so it can query the region without deadlocking.
    pub fn add_state_if_different(&self, state: S::State, min_distance: f64) -> bool {
        let accepted = {
            let mut s = self.lock();
            let far_enough = s
                .store
                .min_distance(&state, |a, b| self.space.distance(a, b))
                .is_none_or(|d| d > min_distance);
            if far_enough {
                s.store.push(state.clone());
                s.queue.push(INITIAL_GOAL_WEIGHT);
            }
            far_enough
        };
        if accepted {
            let callback = self
                .callback
                .lock()
                .expect("goal region callback poisoned")
                .clone();
            if let Some(callback) = callback {
                callback(&state);
            }
        }
        accepted
    }

    /// Base selection: cycles through stored goals in insertion order.
    pub fn sample_goal(&self) -> Result<S::State, EmptyStoreError> {
        let mut s = self.lock();
        let index = s.store.sample_next()?;
        s.store.get(index).cloned().ok_or(EmptyStoreError)
    }

    /// Minimum distance from `state` to any stored goal.
    pub fn distance_goal(&self, state: &S::State) -> Result<f64, EmptyStoreError> {
        let s = self.lock();
        s.store
            .min_distance(state, |a, b| self.space.distance(a, b))
            .ok_or(EmptyStoreError)
    }

    /// Copy of the goal at `index`, in insertion order.
    pub fn state(&self, index: usize) -> Option<S::State> {
        self.lock().store.get(index).cloned()
    }

    pub fn state_count(&self) -> usize {
        self.lock().store.len()
    }

    pub fn has_states(&self) -> bool {
        !self.lock().store.is_empty()
    }

    /// Number of distinct goals a caller can draw, i.e. the store size.
    pub fn max_sample_count(&self) -> usize {
        self.lock().store.len()
    }

    /// Empties store and queue together in one critical section, resetting
    /// the sampled-goal counter and invalidating all handles.
    /// `sampling_attempts` stays monotonic, it is diagnostic only.
    pub fn clear(&self) {
        let mut s = self.lock();
        s.store.clear();
        s.queue.clear();
        s.num_sampled_goals = 0;
    }

    // ------------------------------------------------------------------
    // Weighted selection and update policy
    // ------------------------------------------------------------------

    /// Copies out the top-weighted goal without consuming or reweighting
    /// it; callers report the search outcome through `penalize`/`reward`.
    pub fn sample_weighted_goal(&self) -> Result<WeightedGoal<S::State>, EmptyStoreError> {
        let s = self.lock();
        let id = s.queue.top().ok_or(EmptyStoreError)?;
        let state = s.store.get(id.index()).cloned().ok_or(EmptyStoreError)?;
        let weight = s.queue.weight(id).ok_or(EmptyStoreError)?;
        Ok(WeightedGoal { state, weight, id })
    }

    /// Base round-robin selection wrapped in the weighted-goal shape;
    /// ignores weights.
    pub fn sample_consecutive_goal(&self) -> Result<WeightedGoal<S::State>, EmptyStoreError> {
        let mut s = self.lock();
        let index = s.store.sample_next()?;
        let id = GoalId(index);
        let state = s.store.get(index).cloned().ok_or(EmptyStoreError)?;
        let weight = s.queue.weight(id).ok_or(EmptyStoreError)?;
        Ok(WeightedGoal { state, weight, id })
    }

    /// Lowers the appeal of a goal after a failed search attempt.
    ///
    /// When the just-penalized weight falls below the reset threshold while
    /// sampling is paused at the cap, the adaptive reset fires: every
    /// weight snaps back to the initial value, the cap is raised and the
    /// paused sampling worker is woken to produce fresh goals.
    pub fn penalize(&self, id: GoalId) {
        let mut s = self.lock();
        let Some(weight) = s.queue.weight(id) else {
            debug!("penalize on stale goal handle {id:?}");
            return;
        };
        let new_weight = penalized(weight);
        s.queue.set_weight(id, new_weight);

        if new_weight < RESET_TRIGGER_WEIGHT && !s.sample_goals {
            debug!(
                "goal weights exhausted; resetting {} goals and raising cap to {}",
                s.queue.len(),
                s.max_sampled_goals + CAP_INCREMENT
            );
            let ids: Vec<GoalId> = s.queue.ids().collect();
            for id in ids {
                s.queue.set_weight(id, INITIAL_GOAL_WEIGHT);
            }
            s.sample_goals = true;
            s.max_sampled_goals += CAP_INCREMENT;
            self.resume.notify_all();
        }
    }

    /// Raises the appeal of a goal after a successful search attempt.
    /// No-op at weight 1 or above.
    pub fn reward(&self, id: GoalId) {
        let mut s = self.lock();
        let Some(weight) = s.queue.weight(id) else {
            debug!("reward on stale goal handle {id:?}");
            return;
        };
        if weight < 1.0 {
            s.queue.set_weight(id, rewarded(weight));
        }
    }

    /// Current weight of a goal, `None` for a stale handle.
    pub fn goal_weight(&self, id: GoalId) -> Option<f64> {
        self.lock().queue.weight(id)
    }

    // ------------------------------------------------------------------
    // Counters and lifecycle flags
    // ------------------------------------------------------------------

    /// Goals accepted through the sampling path since the last `clear`.
    pub fn num_sampled_goals(&self) -> u32 {
        self.lock().num_sampled_goals
    }

    /// Current sampling cap.
    pub fn max_sampled_goals(&self) -> u32 {
        self.lock().max_sampled_goals
    }

    /// Proposal batches that produced at least one acceptance. Diagnostic.
    pub fn sampling_attempts(&self) -> u32 {
        self.lock().sampling_attempts
    }

    /// True while the sampling worker is running and not asked to stop.
    pub fn is_sampling(&self) -> bool {
        let s = self.lock();
        !s.terminate_sampling && s.sampling_running
    }

    /// True while the growth worker is running and not asked to stop.
    pub fn is_growing(&self) -> bool {
        let s = self.lock();
        !s.terminate_growth && s.growth_running
    }

    /// Registers the callback fired for every goal accepted by
    /// `add_state_if_different`.
    pub fn set_new_state_callback(&self, callback: NewStateCallback<S::State>) {
        *self
            .callback
            .lock()
            .expect("goal region callback poisoned") = Some(callback);
    }

    // ------------------------------------------------------------------
    // Worker-side operations
    // ------------------------------------------------------------------

    /// Stores a validated candidate, but only while capacity remains, so
    /// the cap holds at every snapshot even mid-batch.
    pub(crate) fn accept_sampled_goal(&self, state: S::State) -> bool {
        let mut s = self.lock();
        if s.num_sampled_goals >= s.max_sampled_goals {
            return false;
        }
        s.store.push(state);
        s.queue.push(INITIAL_GOAL_WEIGHT);
        s.num_sampled_goals += 1;
        true
    }

    /// Batch bookkeeping after one proposal-and-filter pass.
    pub(crate) fn finish_batch(&self, accepted_any: bool) {
        let mut s = self.lock();
        if accepted_any {
            s.sampling_attempts += 1;
        }
        if s.num_sampled_goals >= s.max_sampled_goals {
            s.sample_goals = false;
        }
    }

    /// True when a proposal batch may run now.
    pub(crate) fn wants_batch(&self) -> bool {
        let s = self.lock();
        !s.terminate_sampling && s.sample_goals && s.num_sampled_goals < s.max_sampled_goals
    }

    /// Parks the sampling worker on the resume condvar for at most
    /// `timeout`. Returns false once termination has been requested.
    pub(crate) fn wait_for_resume(&self, timeout: Duration) -> bool {
        let s = self.lock();
        if s.terminate_sampling {
            return false;
        }
        let (s, _timed_out) = self
            .resume
            .wait_timeout(s, timeout)
            .expect("goal region state poisoned");
        !s.terminate_sampling
    }

    pub(crate) fn begin_sampling(&self) {
        let mut s = self.lock();
        s.terminate_sampling = false;
        s.sampling_running = true;
    }

    /// Sets the sampling termination flag and wakes a paused worker.
    /// Returns whether the worker was still considered active.
    pub(crate) fn request_sampling_stop(&self) -> bool {
        let was_active = {
            let mut s = self.lock();
            let was_active = !s.terminate_sampling && s.sampling_running;
            s.terminate_sampling = true;
            was_active
        };
        self.resume.notify_all();
        was_active
    }

    pub(crate) fn finish_sampling_stop(&self) {
        self.lock().sampling_running = false;
    }

    pub(crate) fn begin_growth(&self) {
        let mut s = self.lock();
        s.terminate_growth = false;
        s.growth_running = true;
    }

    /// Sets the growth termination flag. Returns whether the worker was
    /// still considered active.
    pub(crate) fn request_growth_stop(&self) -> bool {
        let mut s = self.lock();
        let was_active = !s.terminate_growth && s.growth_running;
        s.terminate_growth = true;
        was_active
    }

    pub(crate) fn finish_growth_stop(&self) {
        self.lock().growth_running = false;
    }

    /// Defensive: workers set their own termination flag on every exit path.
    pub(crate) fn mark_sampling_terminated(&self) {
        self.lock().terminate_sampling = true;
    }

    pub(crate) fn mark_growth_terminated(&self) {
        self.lock().terminate_growth = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::test_support::PlaneSpace;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn region(max_sampled_goals: u32) -> GoalRegion<PlaneSpace> {
        GoalRegion::new(Arc::new(PlaneSpace::open()), max_sampled_goals)
    }

    #[test]
    fn test_add_state_registers_in_queue() {
        let region = region(10);
        assert!(!region.has_states());
        let id = region.add_state([0.1, 0.1]);
        assert!(region.has_states());
        assert_eq!(region.state_count(), 1);
        assert_eq!(region.max_sample_count(), 1);
        assert_eq!(region.goal_weight(id), Some(INITIAL_GOAL_WEIGHT));
    }

    #[test]
    fn test_add_state_if_different() {
        let region = region(10);
        // Empty store: always accepted.
        assert!(region.add_state_if_different([0.5, 0.5], 0.1));
        // Within the threshold: rejected, store unchanged.
        assert!(!region.add_state_if_different([0.5, 0.55], 0.1));
        assert_eq!(region.state_count(), 1);
        // Beyond the threshold: accepted.
        assert!(region.add_state_if_different([0.9, 0.9], 0.1));
        assert_eq!(region.state_count(), 2);
    }

    #[test]
    fn test_new_state_callback_runs_outside_lock() {
        let region = Arc::new(region(10));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handle = Arc::clone(&region);
        region.set_new_state_callback(Arc::new(move |state: &[f64; 2]| {
            // Would deadlock if the region lock were still held.
            assert!(handle.state_count() > 0);
            assert!(handle.distance_goal(state).unwrap() <= f64::EPSILON);
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(region.add_state_if_different([0.2, 0.2], 0.05));
        assert!(!region.add_state_if_different([0.2, 0.2], 0.05));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_selection_on_empty_store_fails() {
        let region = region(10);
        assert_eq!(region.sample_goal().unwrap_err(), EmptyStoreError);
        assert!(region.sample_weighted_goal().is_err());
        assert!(region.sample_consecutive_goal().is_err());
        assert!(region.distance_goal(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_sample_weighted_goal_returns_top() {
        let region = region(10);
        let a = region.add_state([0.1, 0.1]);
        let b = region.add_state([0.9, 0.9]);
        region.reward(b); // 0.5 -> 1.0
        let goal = region.sample_weighted_goal().unwrap();
        assert_eq!(goal.id, b);
        assert_eq!(goal.weight, 1.0);
        assert_eq!(goal.state, [0.9, 0.9]);
        // Selection is read-only.
        assert_eq!(region.goal_weight(b), Some(1.0));
        assert_eq!(region.goal_weight(a), Some(0.5));
    }

    #[test]
    fn test_sample_consecutive_goal_ignores_weights() {
        let region = region(10);
        region.add_state([0.1, 0.1]);
        let b = region.add_state([0.9, 0.9]);
        region.reward(b);
        let first = region.sample_consecutive_goal().unwrap();
        let second = region.sample_consecutive_goal().unwrap();
        let third = region.sample_consecutive_goal().unwrap();
        assert_eq!(first.state, [0.1, 0.1]);
        assert_eq!(second.state, [0.9, 0.9]);
        assert_eq!(third.state, [0.1, 0.1]);
    }

    #[test]
    fn test_penalize_decreases_monotonically() {
        let region = region(10);
        let id = region.add_state([0.3, 0.3]);
        let mut previous = region.goal_weight(id).unwrap();
        for _ in 0..50 {
            region.penalize(id);
            let current = region.goal_weight(id).unwrap();
            assert!(current < previous);
            assert!(current > 0.0);
            previous = current;
        }
    }

    #[test]
    fn test_reward_from_initial_reaches_one() {
        let region = region(10);
        let id = region.add_state([0.3, 0.3]);
        region.reward(id); // 0.5 / (1 - 0.5) = 1.0
        assert_eq!(region.goal_weight(id), Some(1.0));
        region.reward(id); // no-op at 1.0
        assert_eq!(region.goal_weight(id), Some(1.0));
    }

    #[test]
    fn test_weight_maps_share_fixed_point_at_zero() {
        // A goal at exactly weight 0 can never recover; kept as-is.
        assert_eq!(penalized(0.0), 0.0);
        assert_eq!(rewarded(0.0), 0.0);
    }

    #[test]
    fn test_adaptive_reset_after_four_penalties() {
        let region = region(5);
        for i in 0..5 {
            let state = [0.1 * f64::from(i), 0.1];
            assert!(region.accept_sampled_goal(state));
        }
        region.finish_batch(true);
        assert_eq!(region.num_sampled_goals(), 5);
        assert!(!region.wants_batch()); // paused at the cap

        // 0.5 -> 1/3 -> 1/4 -> 1/5 -> 1/6; the fourth penalty crosses 0.2.
        let top = region.sample_weighted_goal().unwrap().id;
        for _ in 0..3 {
            region.penalize(top);
        }
        assert_eq!(region.max_sampled_goals(), 5);
        region.penalize(top);

        assert_eq!(region.max_sampled_goals(), 15);
        assert!(region.wants_batch()); // sampling re-enabled
        for id in [0, 1, 2, 3, 4].map(GoalId) {
            assert_eq!(region.goal_weight(id), Some(INITIAL_GOAL_WEIGHT));
        }
    }

    #[test]
    fn test_reset_requires_paused_sampling() {
        let region = region(10);
        let id = region.add_state([0.1, 0.1]);
        for _ in 0..10 {
            region.penalize(id);
        }
        // Well below the threshold, but sampling never paused: no reset.
        assert!(region.goal_weight(id).unwrap() < 0.1);
        assert_eq!(region.max_sampled_goals(), 10);
    }

    #[test]
    fn test_clear_invalidates_handles_and_counters() {
        let region = region(3);
        for i in 0..3 {
            assert!(region.accept_sampled_goal([0.1 * f64::from(i), 0.2]));
        }
        region.finish_batch(true);
        let id = region.sample_weighted_goal().unwrap().id;
        region.clear();
        assert!(!region.has_states());
        assert_eq!(region.num_sampled_goals(), 0);
        assert_eq!(region.goal_weight(id), None);
        // Stale handles are ignored, not fatal.
        region.penalize(id);
        region.reward(id);
        assert!(region.sample_weighted_goal().is_err());
        // Attempts counter stays monotonic across clear.
        assert_eq!(region.sampling_attempts(), 1);
    }

    #[test]
    fn test_accept_sampled_goal_respects_cap() {
        let region = region(2);
        assert!(region.accept_sampled_goal([0.1, 0.1]));
        assert!(region.accept_sampled_goal([0.2, 0.2]));
        assert!(!region.accept_sampled_goal([0.3, 0.3]));
        assert_eq!(region.num_sampled_goals(), 2);
        assert_eq!(region.state_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_penalize_contracts(w in 1e-9f64..=1.0) {
            let p = penalized(w);
            prop_assert!(p > 0.0);
            prop_assert!(p < w);
        }

        #[test]
        fn prop_reward_never_shrinks(w in 0.0f64..1.0) {
            let r = rewarded(w);
            prop_assert!(r >= w);
            prop_assert!(r <= 1.0);
        }
    }
}
