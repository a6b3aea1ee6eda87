//! Deterministic shuffled train/validation/test partitioning

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use lcfuse_core::{Error, Result};

/// Samples and labels of one partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<usize>,
}

impl Partition {
    fn take(x: &[Vec<f64>], y: &[usize], indices: &[usize]) -> Self {
        Self {
            x: indices.iter().map(|&i| x[i].clone()).collect(),
            y: indices.iter().map(|&i| y[i]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// 60/20/20 split of a labelled dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DataSplit {
    pub train: Partition,
    pub validation: Partition,
    pub test: Partition,
}

/// Shuffle with `seed`, then hold out `ceil(n * test_size)` samples.
///
/// Returns `(train, test)`. Both parts must be non-empty.
pub fn train_test_split(
    x: &[Vec<f64>],
    y: &[usize],
    test_size: f64,
    seed: u64,
) -> Result<(Partition, Partition)> {
    if x.len() != y.len() {
        return Err(Error::InvalidParameter {
            name: "y",
            value: y.len().to_string(),
            reason: format!("{} samples but {} labels", x.len(), y.len()),
        });
    }
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(Error::InvalidParameter {
            name: "test_size",
            value: test_size.to_string(),
            reason: "must be in (0, 1)".into(),
        });
    }

    let n = x.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::InvalidParameter {
            name: "samples",
            value: n.to_string(),
            reason: format!("too few to hold out a {} fraction", test_size),
        });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((Partition::take(x, y, train_idx), Partition::take(x, y, test_idx)))
}

/// Two shuffled splits: 40% held out, then that half-and-half into validation and test.
pub fn train_val_test_split(x: &[Vec<f64>], y: &[usize], seed: u64) -> Result<DataSplit> {
    let (train, temp) = train_test_split(x, y, 0.4, seed)?;
    let (validation, test) = train_test_split(&temp.x, &temp.y, 0.5, seed)?;
    tracing::info!(
        train = train.len(),
        validation = validation.len(),
        test = test.len(),
        "dataset split"
    );
    Ok(DataSplit {
        train,
        validation,
        test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = (0..n).map(|i| vec![i as f64]).collect();
        let y = (0..n).map(|i| i % 3).collect();
        (x, y)
    }

    #[test]
    fn test_sizes_sixty_twenty_twenty() {
        let (x, y) = dataset(100);
        let split = train_val_test_split(&x, &y, 42).unwrap();
        assert_eq!(split.train.len(), 60);
        assert_eq!(split.validation.len(), 20);
        assert_eq!(split.test.len(), 20);
    }

    #[test]
    fn test_sizes_with_rounding() {
        let (x, y) = dataset(37);
        let split = train_val_test_split(&x, &y, 42).unwrap();
        let n = 37.0;
        assert!((split.train.len() as f64 - 0.6 * n).abs() <= 1.0);
        assert!((split.validation.len() as f64 - 0.2 * n).abs() <= 1.0);
        assert!((split.test.len() as f64 - 0.2 * n).abs() <= 1.0);
        assert_eq!(split.train.len() + split.validation.len() + split.test.len(), 37);
    }

    #[test]
    fn test_reproducible_per_seed() {
        let (x, y) = dataset(50);
        let a = train_val_test_split(&x, &y, 7).unwrap();
        let b = train_val_test_split(&x, &y, 7).unwrap();
        assert_eq!(a, b);
        let c = train_val_test_split(&x, &y, 8).unwrap();
        assert_ne!(a.train.x, c.train.x);
    }

    #[test]
    fn test_partitions_are_disjoint() {
        let (x, y) = dataset(30);
        let split = train_val_test_split(&x, &y, 1).unwrap();
        let mut all: Vec<f64> = [&split.train, &split.validation, &split.test]
            .iter()
            .flat_map(|p| p.x.iter().map(|r| r[0]))
            .collect();
        all.sort_by(f64::total_cmp);
        assert_eq!(all, (0..30).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_few_samples() {
        let (x, y) = dataset(2);
        assert!(train_val_test_split(&x, &y, 42).is_err());
    }
}
