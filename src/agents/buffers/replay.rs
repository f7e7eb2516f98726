use crate::SacError;
use ndarray::{Array, Array1, Array2, ArrayView1, Axis, Dimension};
use rand::distributions::Uniform;
use rand::Rng;
use tch::{Device, Tensor};

/// Fixed-capacity circular buffer of transitions.
///
/// Transitions are stored in parallel arrays indexed by slot rather than as individual records.
/// The successor state of the transition in slot `i` is read from slot `i + 1`.
/// This is exact within an episode but not across the two boundaries where contiguity fails:
/// * the slot just before the write pointer once the buffer has wrapped,
///     whose successor slot holds the oldest stored transition;
/// * the last step of an episode that ended without termination (truncation),
///     whose successor slot holds the first state of the next episode.
///
/// Terminal transitions are unaffected since their successor value is masked out by the
/// bootstrap target.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayBuffer {
    /// States; one flattened row per slot.
    states: Array2<f32>,
    /// Actions; one row per slot.
    actions: Array2<f32>,
    rewards: Array1<f32>,
    dones: Array1<bool>,
    /// The next slot to write. Always the slot of the oldest transition once the buffer is full.
    pointer: usize,
    /// Number of slots holding a stored transition. Saturates at the capacity.
    len: usize,
}

impl ReplayBuffer {
    /// Create a new buffer.
    ///
    /// # Args
    /// * `capacity` - Maximum number of stored transitions.
    /// * `observation_size` - Number of elements in a (flattened) state.
    /// * `action_dim` - Number of action dimensions.
    ///
    /// # Panics
    /// If `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize, observation_size: usize, action_dim: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be positive");
        Self {
            states: Array2::zeros((capacity, observation_size)),
            actions: Array2::zeros((capacity, action_dim)),
            rewards: Array1::zeros(capacity),
            dones: Array1::from_elem(capacity, false),
            pointer: 0,
            len: 0,
        }
    }

    /// Maximum number of stored transitions.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.rewards.len()
    }

    /// Number of elements in a stored state.
    #[must_use]
    pub fn observation_size(&self) -> usize {
        self.states.ncols()
    }

    /// Number of action dimensions.
    #[must_use]
    pub fn action_dim(&self) -> usize {
        self.actions.ncols()
    }

    /// Number of stored transitions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The slot that the next call to [`ReplayBuffer::store`] will write.
    #[must_use]
    pub const fn pointer(&self) -> usize {
        self.pointer
    }

    /// Store a transition, overwriting the oldest stored transition if the buffer is full.
    ///
    /// # Args
    /// * `state` - The state in which the action was taken, flattened.
    /// * `action` - The action taken.
    /// * `reward` - The reward received for the action.
    /// * `done` - Whether the action led to a terminal state.
    pub fn store(
        &mut self,
        state: &[f32],
        action: &[f32],
        reward: f32,
        done: bool,
    ) -> Result<(), SacError> {
        check_size("state", self.observation_size(), state.len())?;
        check_size("action", self.action_dim(), action.len())?;

        let slot = self.pointer;
        self.states.row_mut(slot).assign(&ArrayView1::from(state));
        self.actions.row_mut(slot).assign(&ArrayView1::from(action));
        self.rewards[slot] = reward;
        self.dones[slot] = done;

        self.len = self.len.max(slot + 1);
        self.pointer = (slot + 1) % self.capacity();
        Ok(())
    }

    /// View the transition stored in a slot.
    ///
    /// Slots are in storage order, not chronological order.
    /// Returns `None` if the slot does not hold a stored transition.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<Transition<'_>> {
        if slot >= self.len {
            return None;
        }
        Some(Transition {
            state: self.states.row(slot),
            action: self.actions.row(slot),
            reward: self.rewards[slot],
            done: self.dones[slot],
        })
    }

    /// Sample slot indices independently and uniformly with replacement.
    ///
    /// Indices are drawn from `0 .. len - 1` so that every index has a stored successor.
    pub fn sample_indices<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, SacError> {
        if self.len < 2 {
            return Err(SacError::BufferUnderflow { len: self.len });
        }
        let index_dist = Uniform::new(0, self.len - 1);
        Ok((0..batch_size).map(|_| rng.sample(index_dist)).collect())
    }

    /// Sample a batch of transitions with their successor states.
    ///
    /// Rows of the batch are in sampling order.
    pub fn sample_batch<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<ReplayBatch, SacError> {
        let indices = self.sample_indices(batch_size, rng)?;
        Ok(self.batch_at(indices))
    }

    /// Assemble a batch from the given slot indices.
    ///
    /// # Panics
    /// If any index does not have a stored successor (`index + 1 >= len`).
    #[must_use]
    pub fn batch_at(&self, indices: Vec<usize>) -> ReplayBatch {
        assert!(
            indices.iter().all(|&i| i + 1 < self.len),
            "batch index without a stored successor"
        );
        let next_indices: Vec<_> = indices.iter().map(|i| i + 1).collect();
        ReplayBatch {
            states: self.states.select(Axis(0), &indices),
            actions: self.actions.select(Axis(0), &indices),
            rewards: self.rewards.select(Axis(0), &indices),
            next_states: self.states.select(Axis(0), &next_indices),
            dones: indices
                .iter()
                .map(|&i| if self.dones[i] { 1.0 } else { 0.0 })
                .collect(),
            indices,
        }
    }
}

fn check_size(what: &'static str, expected: usize, actual: usize) -> Result<(), SacError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SacError::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// View of a stored transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<'a> {
    pub state: ArrayView1<'a, f32>,
    pub action: ArrayView1<'a, f32>,
    pub reward: f32,
    pub done: bool,
}

/// A batch of transitions sampled from a [`ReplayBuffer`].
///
/// Row `j` of every array corresponds to the transition in slot `indices[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayBatch {
    /// Buffer slot of each row.
    pub indices: Vec<usize>,
    pub states: Array2<f32>,
    pub actions: Array2<f32>,
    pub rewards: Array1<f32>,
    /// States read from the slot following each index.
    pub next_states: Array2<f32>,
    /// Done flags as `0.0` or `1.0`.
    pub dones: Array1<f32>,
}

impl ReplayBatch {
    /// Number of transitions in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Copy the batch into tensors on the given device.
    #[must_use]
    pub fn to_tensors(&self, device: Device) -> TensorBatch {
        TensorBatch {
            states: array_to_tensor(&self.states, device),
            actions: array_to_tensor(&self.actions, device),
            rewards: array_to_tensor(&self.rewards, device),
            next_states: array_to_tensor(&self.next_states, device),
            dones: array_to_tensor(&self.dones, device),
        }
    }
}

/// A [`ReplayBatch`] as `f32` tensors.
///
/// Shapes are `[B, observation_size]` for states, `[B, action_dim]` for actions
/// and `[B]` for rewards and dones.
#[derive(Debug)]
pub struct TensorBatch {
    pub states: Tensor,
    pub actions: Tensor,
    pub rewards: Tensor,
    pub next_states: Tensor,
    pub dones: Tensor,
}

#[allow(clippy::cast_possible_wrap)]
fn array_to_tensor<D: Dimension>(array: &Array<f32, D>, device: Device) -> Tensor {
    let shape: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::of_slice(&data).reshape(&shape).to_device(device)
}
