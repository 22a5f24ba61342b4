//! Shuffle permutations for queue randomization
//!
//! Pure functions over arrays and index permutations. The engine keeps the
//! queue in shuffled order while shuffle is on, so every helper here returns
//! both the reordered array and the bidirectional index mapping needed to
//! restore the original order later.

use rand::Rng;

/// Bidirectional permutation between original and shuffled orderings
///
/// `to[original] = shuffled_position` and `from[shuffled_position] =
/// original`. The two directions are exact inverses over the current queue
/// length at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleMapping {
    to: Vec<usize>,
    from: Vec<usize>,
}

impl ShuffleMapping {
    /// Identity mapping over `len` elements
    pub fn identity(len: usize) -> Self {
        Self {
            to: (0..len).collect(),
            from: (0..len).collect(),
        }
    }

    /// Build a mapping from its `from` direction (shuffled -> original)
    fn from_permutation(from: Vec<usize>) -> Self {
        let mut to = vec![0; from.len()];
        for (position, &original) in from.iter().enumerate() {
            to[original] = position;
        }
        Self { to, from }
    }

    /// Number of elements covered by the mapping
    pub fn len(&self) -> usize {
        self.from.len()
    }

    /// Whether the mapping covers no elements
    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
    }

    /// Shuffled position of an original index
    pub fn shuffled_position(&self, original: usize) -> Option<usize> {
        self.to.get(original).copied()
    }

    /// Original index of a shuffled position
    pub fn original_position(&self, shuffled: usize) -> Option<usize> {
        self.from.get(shuffled).copied()
    }

    /// Extend with an identity entry for a newly appended element
    ///
    /// A song enqueued while shuffle is on stays at its append position
    /// rather than being reshuffled out of view.
    pub fn push_identity(&mut self) {
        let next = self.len();
        self.to.push(next);
        self.from.push(next);
    }

    /// Swap two shuffled positions, keeping both directions in sync
    fn swap_shuffled(&mut self, a: usize, b: usize) {
        self.from.swap(a, b);
        self.to[self.from[a]] = a;
        self.to[self.from[b]] = b;
    }

    /// Check that the two directions are exact inverses
    pub fn is_consistent(&self) -> bool {
        self.to.len() == self.from.len()
            && self
                .from
                .iter()
                .enumerate()
                .all(|(position, &original)| self.to.get(original) == Some(&position))
    }
}

/// Shuffle with the thread-local RNG
///
/// See [`shuffle_with`].
pub fn shuffle<T: Clone>(items: &[T], pin_first: Option<usize>) -> (Vec<T>, ShuffleMapping) {
    shuffle_with(items, pin_first, &mut rand::thread_rng())
}

/// Produce a uniformly random permutation plus its index mappings
///
/// Fisher-Yates over the index permutation. If `pin_first` names an original
/// index (the currently playing slot), the mapping is post-processed so that
/// index lands at shuffled position 0, preserving invertibility; the user's
/// selection is never reordered away from view.
pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(
    items: &[T],
    pin_first: Option<usize>,
    rng: &mut R,
) -> (Vec<T>, ShuffleMapping) {
    let len = items.len();
    let mut from: Vec<usize> = (0..len).collect();

    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        from.swap(i, j);
    }

    let mut mapping = ShuffleMapping::from_permutation(from);

    if let Some(pin) = pin_first {
        if let Some(position) = mapping.shuffled_position(pin) {
            mapping.swap_shuffled(0, position);
        }
    }

    let shuffled = mapping.from.iter().map(|&o| items[o].clone()).collect();
    (shuffled, mapping)
}

/// Remove the element at a shuffled position
///
/// Shifts every shuffled position after `index` down by one and compacts the
/// original indices past the removed element, so the returned mappings stay
/// exact inverses over the shrunk length.
pub fn remove_from_shuffled<T: Clone>(
    items: &[T],
    mapping: &ShuffleMapping,
    index: usize,
) -> (Vec<T>, ShuffleMapping) {
    debug_assert_eq!(items.len(), mapping.len());

    let Some(removed_original) = mapping.original_position(index) else {
        return (items.to_vec(), mapping.clone());
    };

    let mut remaining = items.to_vec();
    remaining.remove(index);

    let mut from = Vec::with_capacity(mapping.len().saturating_sub(1));
    for (position, &original) in mapping.from.iter().enumerate() {
        if position == index {
            continue;
        }
        from.push(if original > removed_original {
            original - 1
        } else {
            original
        });
    }

    (remaining, ShuffleMapping::from_permutation(from))
}
