//! Randomised option order with index tracking.
//!
//! Positions are followed through the permutation itself, so options with
//! identical text never get confused with each other.

use rand::Rng;

/// Where every option of one question ended up for one display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleRecord {
    original_correct: usize,
    /// `mapping[original] == shuffled`
    mapping: Vec<usize>,
    /// `order[shuffled] == original`
    order: Vec<usize>,
    shuffled_correct: usize,
}

impl ShuffleRecord {
    /// Record that keeps options in bank order.
    pub fn identity(len: usize, correct: usize) -> Self {
        let order: Vec<usize> = (0..len).collect();
        Self::from_order(order, correct)
    }

    /// Fisher–Yates over indices. Each of the `len!` orders is equally likely.
    pub fn shuffle<R: Rng + ?Sized>(len: usize, correct: usize, rng: &mut R) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        for i in (1..len).rev() {
            let j = rng.gen_range(0..=i);
            order.swap(i, j);
        }
        Self::from_order(order, correct)
    }

    fn from_order(order: Vec<usize>, original_correct: usize) -> Self {
        let mut mapping = vec![0; order.len()];
        for (shuffled, &original) in order.iter().enumerate() {
            mapping[original] = shuffled;
        }
        let shuffled_correct = mapping.get(original_correct).copied().unwrap_or(0);
        Self {
            original_correct,
            mapping,
            order,
            shuffled_correct,
        }
    }

    pub fn original_correct(&self) -> usize {
        self.original_correct
    }

    pub fn shuffled_correct(&self) -> usize {
        self.shuffled_correct
    }

    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn original_index(&self, shuffled: usize) -> Option<usize> {
        self.order.get(shuffled).copied()
    }

    /// Options in display order.
    pub fn apply<T: Clone>(&self, options: &[T]) -> Vec<T> {
        self.order.iter().map(|&original| options[original].clone()).collect()
    }
}
