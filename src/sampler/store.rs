//! Append-only store of accepted goal configurations.

/// Error returned when a goal-selection operation finds the store empty.
///
/// A precondition violation: callers should check `has_states()` or
/// `could_sample()` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("there are no goal states to sample")]
pub struct EmptyStoreError;

/// Ordered, append-only sequence of accepted goal configurations.
///
/// Entries are never removed individually, only by `clear`. Carries the
/// cycling cursor that implements the base ("consecutive") selection
/// strategy. No internal locking: the engine always accesses the store
/// under its own mutex.
#[derive(Debug)]
pub struct GoalStore<C> {
    states: Vec<C>,
    /// Next index handed out by `sample_next`.
    cursor: usize,
}

impl<C> GoalStore<C> {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            cursor: 0,
        }
    }

    /// Appends a configuration unconditionally.
    pub fn push(&mut self, state: C) {
        self.states.push(state);
    }

    /// Bounds-checked indexed access, in insertion order.
    pub fn get(&self, index: usize) -> Option<&C> {
        self.states.get(index)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Empties the store and resets the sample cursor.
    pub fn clear(&mut self) {
        self.states.clear();
        self.cursor = 0;
    }

    /// Base selection: returns the index of the next stored configuration,
    /// cycling through the store in insertion order.
    pub fn sample_next(&mut self) -> Result<usize, EmptyStoreError> {
        if self.states.is_empty() {
            return Err(EmptyStoreError);
        }
        let index = self.cursor % self.states.len();
        self.cursor = (index + 1) % self.states.len();
        Ok(index)
    }

    /// Minimum distance from `state` to any stored configuration, or `None`
    /// when the store is empty.
    pub fn min_distance<F>(&self, state: &C, mut distance: F) -> Option<f64>
    where
        F: FnMut(&C, &C) -> f64,
    {
        self.states
            .iter()
            .map(|stored| distance(state, stored))
            .fold(None, |best: Option<f64>, d| {
                Some(best.map_or(d, |b| b.min(d)))
            })
    }
}

impl<C> Default for GoalStore<C> {
    fn default() -> Self {
        Self::new()
    }
}
