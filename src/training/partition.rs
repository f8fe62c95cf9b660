use crate::error::{ForecastError, Result};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

/// Seeded random train/test partition of row indices.
///
/// Rows are shuffled uniformly, the first `ceil(test_fraction * n)` indices
/// of the permutation form the test set and the rest the training set. The
/// partition is not chronological.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainTestSplit {
    pub test_fraction: f64,
    pub seed: u64,
}

/// Row indices of both sides, in permutation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    pub fn new(test_fraction: f64, seed: u64) -> Self {
        Self {
            test_fraction,
            seed,
        }
    }

    pub fn test_size(&self, n_rows: usize) -> usize {
        ((n_rows as f64 * self.test_fraction).ceil() as usize).min(n_rows)
    }

    pub fn partition(&self, n_rows: usize) -> Result<Partition> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ForecastError::invalid_config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }

        let n_test = self.test_size(n_rows);
        let empty = |partition| ForecastError::EmptyPartition {
            partition,
            total: n_rows,
            test_fraction: self.test_fraction,
        };
        if n_test == 0 {
            return Err(empty("test"));
        }
        if n_test == n_rows {
            return Err(empty("train"));
        }

        let mut permutation = (0..n_rows).collect::<Vec<_>>();
        permutation.shuffle(&mut StdRng::seed_from_u64(self.seed));
        let train = permutation.split_off(n_test);
        Ok(Partition {
            train,
            test: permutation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        let partition = TrainTestSplit::new(0.2, 42).partition(11).unwrap();
        assert_eq!(partition.test.len(), 3);
        assert_eq!(partition.train.len(), 8);
    }

    #[test]
    fn test_disjoint_and_complete() {
        let partition = TrainTestSplit::new(0.2, 7).partition(100).unwrap();
        let mut all = partition
            .train
            .iter()
            .chain(&partition.test)
            .copied()
            .collect::<Vec<_>>();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_reproducible() {
        let split = TrainTestSplit::new(0.2, 42);
        assert_eq!(split.partition(50).unwrap(), split.partition(50).unwrap());
        let other = TrainTestSplit::new(0.2, 43).partition(50).unwrap();
        assert_ne!(split.partition(50).unwrap(), other);
    }

    #[test]
    fn test_single_row_has_no_training_side() {
        assert!(matches!(
            TrainTestSplit::new(0.2, 42).partition(1),
            Err(ForecastError::EmptyPartition {
                partition: "train",
                total: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_no_rows() {
        assert!(matches!(
            TrainTestSplit::new(0.2, 42).partition(0),
            Err(ForecastError::EmptyPartition {
                partition: "test",
                ..
            })
        ));
    }

    #[test]
    fn test_fraction_out_of_range() {
        assert!(matches!(
            TrainTestSplit::new(1.0, 42).partition(10),
            Err(ForecastError::InvalidConfig(_))
        ));
    }
}
