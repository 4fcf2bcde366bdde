use crate::error::{TrainingError, TrainingResult};

/// A single labeled example: a pre-vectorized feature window and its class.
pub type Example = (Vec<f32>, i32);

/// In-memory dataset of `(vector, label)` pairs.
///
/// Every vector has the same width so batches can be stacked into one tensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDataset {
    data: Vec<Example>,
    width: usize,
}

/// A collated mini-batch, row-major `[len, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Vec<f32>,
    pub labels: Vec<i32>,
    pub width: usize,
}

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl MemoryDataset {
    /// Pair up vectors and labels by position.
    pub fn from_parts(vectors: Vec<Vec<f32>>, labels: Vec<i32>) -> TrainingResult<Self> {
        if vectors.len() != labels.len() {
            return Err(TrainingError::Dataset(format!(
                "vector count ({}) does not match label count ({})",
                vectors.len(),
                labels.len()
            )));
        }

        let width = vectors.first().map_or(0, Vec::len);
        for (idx, v) in vectors.iter().enumerate() {
            if v.len() != width {
                return Err(TrainingError::Dataset(format!(
                    "vector[{idx}] has width {} (expected {width})",
                    v.len()
                )));
            }
        }

        Ok(Self { data: vectors.into_iter().zip(labels).collect(), width })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Width of every vector in the dataset.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn get_example(&self, i: usize) -> Option<&Example> {
        self.data.get(i)
    }

    pub fn labels(&self) -> impl Iterator<Item = i32> + '_ {
        self.data.iter().map(|(_, label)| *label)
    }

    /// Count of examples per label, indexed by label.
    #[must_use]
    pub fn label_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; num_classes];
        for label in self.labels() {
            if let Some(c) = usize::try_from(label).ok().and_then(|l| counts.get_mut(l)) {
                *c += 1;
            }
        }
        counts
    }

    /// Stack the examples at `indices` into one batch.
    pub fn collate(&self, indices: &[usize]) -> TrainingResult<Batch> {
        let mut inputs = Vec::with_capacity(indices.len() * self.width);
        let mut labels = Vec::with_capacity(indices.len());
        for &i in indices {
            let (vector, label) = self.data.get(i).ok_or_else(|| {
                TrainingError::Dataset(format!("example index {i} out of range (len {})", self.len()))
            })?;
            inputs.extend_from_slice(vector);
            labels.push(*label);
        }
        Ok(Batch { inputs, labels, width: self.width })
    }
}
