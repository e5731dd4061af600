//! Indexed max-heap over goal weights with stable handles.

/// Stable handle to a weighted goal entry.
///
/// Handles stay valid for the lifetime of their entry and are invalidated
/// only by `clear`. The id doubles as the entry's index in the goal store,
/// since store and heap only ever grow together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GoalId(pub(crate) usize);

impl GoalId {
    /// Index of this goal in the candidate store.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Array-backed max-heap keyed by weight.
///
/// `heap` holds ids in heap order and `pos` maps an id back to its current
/// heap slot, so a weight change re-heapifies in O(log n) without removal
/// or reinsertion and without pointers into heap nodes.
#[derive(Debug, Default)]
pub struct WeightedHeap {
    /// Weight per id, addressed directly.
    weights: Vec<f64>,
    /// Ids in heap order; slot 0 is the maximum.
    heap: Vec<usize>,
    /// id -> heap slot.
    pos: Vec<usize>,
}

impl WeightedHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Inserts a new entry and returns its stable handle.
    pub fn push(&mut self, weight: f64) -> GoalId {
        let id = self.weights.len();
        self.weights.push(weight);
        self.heap.push(id);
        self.pos.push(self.heap.len() - 1);
        self.sift_up(self.heap.len() - 1);
        GoalId(id)
    }

    /// Highest-weight entry without removing it.
    pub fn top(&self) -> Option<GoalId> {
        self.heap.first().map(|&id| GoalId(id))
    }

    /// Current weight of an entry, `None` for a stale handle.
    pub fn weight(&self, id: GoalId) -> Option<f64> {
        self.weights.get(id.0).copied()
    }

    /// Sets the weight of an entry and restores heap order in place.
    /// Returns false for a stale handle.
    pub fn set_weight(&mut self, id: GoalId, weight: f64) -> bool {
        if id.0 >= self.weights.len() {
            return false;
        }
        self.weights[id.0] = weight;
        let slot = self.pos[id.0];
        let slot = self.sift_up(slot);
        self.sift_down(slot);
        true
    }

    /// All handles, in unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = GoalId> + '_ {
        (0..self.weights.len()).map(GoalId)
    }

    /// Drops every entry, invalidating all handles.
    pub fn clear(&mut self) {
        self.weights.clear();
        self.heap.clear();
        self.pos.clear();
    }

    fn sift_up(&mut self, mut slot: usize) -> usize {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.weights[self.heap[slot]] <= self.weights[self.heap[parent]] {
                break;
            }
            self.swap_slots(slot, parent);
            slot = parent;
        }
        slot
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut largest = slot;
            if left < self.heap.len()
                && self.weights[self.heap[left]] > self.weights[self.heap[largest]]
            {
                largest = left;
            }
            if right < self.heap.len()
                && self.weights[self.heap[right]] > self.weights[self.heap[largest]]
            {
                largest = right;
            }
            if largest == slot {
                break;
            }
            self.swap_slots(slot, largest);
            slot = largest;
        }
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.pos[self.heap[a]] = a;
        self.pos[self.heap[b]] = b;
    }
}
