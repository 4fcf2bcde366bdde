use crate::dataset::MemoryDataset;
use crate::error::{TrainingError, TrainingResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Resumable position of a [`SerialIterator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorState {
    /// Length of the dataset the state was taken on.
    pub dataset_len: usize,
    pub epoch: u64,
    pub current_position: usize,
    pub is_new_epoch: bool,
    pub order: Option<Vec<usize>>,
}

/// Walks a dataset in mini-batches of example indices.
///
/// With `repeat`, the iterator never ends: a batch that crosses the end of the
/// dataset is completed from the next epoch's order. Without it, the last
/// batch may be short and the iterator is exhausted until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct SerialIterator {
    dataset: Arc<MemoryDataset>,
    batch_size: usize,
    repeat: bool,
    shuffle: bool,
    seed: u64,
    order: Option<Vec<usize>>,
    current_position: usize,
    epoch: u64,
    is_new_epoch: bool,
}

impl SerialIterator {
    #[must_use]
    pub fn new(dataset: Arc<MemoryDataset>, batch_size: usize, repeat: bool, shuffle: bool, seed: u64) -> Self {
        let mut it = Self {
            dataset,
            batch_size: batch_size.max(1),
            repeat,
            shuffle,
            seed,
            order: None,
            current_position: 0,
            epoch: 0,
            is_new_epoch: false,
        };
        it.order = it.order_for_epoch(0);
        it
    }

    #[must_use]
    pub fn dataset(&self) -> &Arc<MemoryDataset> {
        &self.dataset
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn is_new_epoch(&self) -> bool {
        self.is_new_epoch
    }

    /// Fractional epoch count, e.g. `1.5` halfway through the second epoch.
    #[must_use]
    pub fn epoch_detail(&self) -> f64 {
        let len = self.dataset.len().max(1);
        self.epoch as f64 + self.current_position as f64 / len as f64
    }

    /// Number of `next_batch` calls that make up one epoch (rounded up).
    #[must_use]
    pub fn iterations_per_epoch(&self) -> u64 {
        self.dataset.len().div_ceil(self.batch_size) as u64
    }

    fn order_for_epoch(&self, epoch: u64) -> Option<Vec<usize>> {
        if !self.shuffle {
            return None;
        }
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch));
        order.shuffle(&mut rng);
        Some(order)
    }

    fn index_at(&self, position: usize) -> usize {
        self.order.as_ref().map_or(position, |order| order[position])
    }

    /// Next batch of example indices, `None` once a non-repeating iterator is exhausted.
    pub fn next_batch(&mut self) -> Option<Vec<usize>> {
        let n = self.dataset.len();
        if n == 0 || (!self.repeat && self.epoch > 0) {
            return None;
        }

        let i = self.current_position;
        let i_end = i + self.batch_size;
        let mut batch: Vec<usize> = (i..i_end.min(n)).map(|p| self.index_at(p)).collect();

        if i_end >= n {
            self.epoch += 1;
            self.is_new_epoch = true;
            self.current_position = 0;
            if self.repeat {
                self.order = self.order_for_epoch(self.epoch);
                let mut rest = i_end - n;
                while rest > 0 {
                    let take = rest.min(n);
                    batch.extend((0..take).map(|p| self.index_at(p)));
                    self.current_position = take;
                    rest -= take;
                    if rest > 0 {
                        self.epoch += 1;
                        self.current_position = 0;
                        self.order = self.order_for_epoch(self.epoch);
                    }
                }
            }
        } else {
            self.is_new_epoch = false;
            self.current_position = i_end;
        }

        Some(batch)
    }

    /// Rewind to the start of the first epoch.
    pub fn reset(&mut self) {
        self.current_position = 0;
        self.epoch = 0;
        self.is_new_epoch = false;
        self.order = self.order_for_epoch(0);
    }

    #[must_use]
    pub fn state(&self) -> IteratorState {
        IteratorState {
            dataset_len: self.dataset.len(),
            epoch: self.epoch,
            current_position: self.current_position,
            is_new_epoch: self.is_new_epoch,
            order: self.order.clone(),
        }
    }

    /// Continue from a saved position; the state must come from a dataset of the same length.
    pub fn restore(&mut self, state: IteratorState) -> TrainingResult<()> {
        let n = self.dataset.len();
        if state.dataset_len != n {
            return Err(TrainingError::Checkpoint(format!(
                "iterator state was saved on {} examples but the dataset has {n}",
                state.dataset_len
            )));
        }
        if state.current_position > n {
            return Err(TrainingError::Checkpoint(format!(
                "iterator position {} is past the end of {n} examples",
                state.current_position
            )));
        }
        match &state.order {
            Some(order) if order.len() != n || order.iter().any(|&i| i >= n) => {
                return Err(TrainingError::Checkpoint(format!(
                    "saved shuffle order does not cover the {n} examples of the dataset"
                )));
            }
            None if self.shuffle => {
                return Err(TrainingError::Checkpoint("saved iterator state has no shuffle order".to_string()));
            }
            _ => {}
        }

        self.epoch = state.epoch;
        self.current_position = state.current_position;
        self.is_new_epoch = state.is_new_epoch;
        self.order = state.order;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> Arc<MemoryDataset> {
        let vectors = (0..n).map(|i| vec![i as f32]).collect();
        let labels = (0..n).map(|i| (i % 2) as i32).collect();
        Arc::new(MemoryDataset::from_parts(vectors, labels).unwrap())
    }

    #[test]
    fn test_non_repeating_keeps_order_and_short_tail() {
        let mut it = SerialIterator::new(dataset(5), 2, false, false, 0);
        assert_eq!(it.next_batch(), Some(vec![0, 1]));
        assert_eq!(it.next_batch(), Some(vec![2, 3]));
        assert!(!it.is_new_epoch());
        assert_eq!(it.next_batch(), Some(vec![4]));
        assert!(it.is_new_epoch());
        assert_eq!(it.next_batch(), None);

        it.reset();
        assert_eq!(it.next_batch(), Some(vec![0, 1]));
    }

    #[test]
    fn test_repeating_fills_batch_across_epoch_boundary() {
        let mut it = SerialIterator::new(dataset(3), 2, true, false, 0);
        assert_eq!(it.next_batch(), Some(vec![0, 1]));
        assert_eq!(it.epoch(), 0);
        assert_eq!(it.next_batch(), Some(vec![2, 0]));
        assert_eq!(it.epoch(), 1);
        assert!(it.is_new_epoch());
        assert!((it.epoch_detail() - (1.0 + 1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(it.next_batch(), Some(vec![1, 2]));
        assert_eq!(it.epoch(), 2);
    }

    #[test]
    fn test_shuffle_is_a_permutation_and_seeded() {
        let mut a = SerialIterator::new(dataset(10), 10, true, true, 7);
        let mut b = SerialIterator::new(dataset(10), 10, true, true, 7);
        let first = a.next_batch().unwrap();
        assert_eq!(first, b.next_batch().unwrap());

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
        assert_eq!(a.epoch(), 1);
    }

    #[test]
    fn test_state_restore_resumes_sequence() {
        let mut it = SerialIterator::new(dataset(7), 3, true, true, 11);
        it.next_batch();
        it.next_batch();
        let saved = it.state();
        let expected = it.next_batch();

        let mut resumed = SerialIterator::new(dataset(7), 3, true, true, 11);
        resumed.restore(saved).unwrap();
        assert_eq!(resumed.next_batch(), expected);
    }

    #[test]
    fn test_restore_on_dataset_of_other_length_fails() {
        let mut it = SerialIterator::new(dataset(6), 4, true, true, 5);
        it.next_batch();
        let saved = it.state();
        assert_eq!(saved.dataset_len, 6);

        let mut larger = SerialIterator::new(dataset(18), 4, true, true, 5);
        let err = larger.restore(saved.clone()).unwrap_err();
        assert!(matches!(err, TrainingError::Checkpoint(_)));
        assert_eq!(larger.epoch(), 0);

        let mut tampered = saved;
        tampered.order = Some(vec![0, 1, 2]);
        let mut same = SerialIterator::new(dataset(6), 4, true, true, 5);
        assert!(same.restore(tampered).is_err());
    }

    #[test]
    fn test_iterations_per_epoch_rounds_up() {
        assert_eq!(SerialIterator::new(dataset(10), 5, true, false, 0).iterations_per_epoch(), 2);
        assert_eq!(SerialIterator::new(dataset(11), 5, true, false, 0).iterations_per_epoch(), 3);
    }
}
