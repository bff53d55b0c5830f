// DataLoader — batching, shuffling, parallel sample fetch

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, SeedableRng};

use rayon::prelude::*;

use crate::dataset::{Dataset, Sample};

/// Configuration for the DataLoader.
#[derive(Debug, Clone)]
pub struct DataLoaderConfig {
    /// Number of samples per batch.
    pub batch_size: usize,
    /// Whether to shuffle indices each epoch.
    pub shuffle: bool,
    /// Whether to drop the last incomplete batch.
    pub drop_last: bool,
    /// Number of parallel workers for sample fetching (0 = sequential).
    pub num_workers: usize,
    /// Optional random seed for reproducible shuffling.
    pub seed: Option<u64>,
}

impl Default for DataLoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            shuffle: true,
            drop_last: false,
            num_workers: 0,
            seed: None,
        }
    }
}

impl DataLoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn shuffle(mut self, s: bool) -> Self {
        self.shuffle = s;
        self
    }

    pub fn drop_last(mut self, d: bool) -> Self {
        self.drop_last = d;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }
}

/// A DataLoader wraps a [`Dataset`] and yields batches of samples.
///
/// Each lookup is independent and the dataset is read-only, so with
/// `num_workers > 0` the samples of a batch are fetched (and decoded) in
/// parallel via rayon.  Batches come out as `Vec<Sample>`; stacking into
/// whatever tensor type the consumer uses is the consumer's job.
pub struct DataLoader<'a> {
    dataset: &'a dyn Dataset,
    config: DataLoaderConfig,
    indices: Vec<usize>,
}

impl<'a> DataLoader<'a> {
    /// Create a new DataLoader over a dataset.
    pub fn new(dataset: &'a dyn Dataset, config: DataLoaderConfig) -> Self {
        let indices: Vec<usize> = (0..dataset.len()).collect();
        Self {
            dataset,
            config,
            indices,
        }
    }

    /// The number of batches per epoch.
    pub fn num_batches(&self) -> usize {
        if self.config.drop_last {
            self.dataset.len() / self.config.batch_size
        } else {
            self.dataset.len().div_ceil(self.config.batch_size)
        }
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Reshuffle indices (called at the start of each epoch).
    pub fn reshuffle(&mut self) {
        if self.config.shuffle {
            match self.config.seed {
                Some(seed) => {
                    let mut rng = StdRng::seed_from_u64(seed);
                    self.indices.shuffle(&mut rng);
                }
                None => {
                    let mut rng = thread_rng();
                    self.indices.shuffle(&mut rng);
                }
            }
        }
    }

    /// Fetch a slice of samples, in parallel when workers are configured.
    fn fetch_samples(&self, indices: &[usize]) -> Vec<Sample> {
        if self.config.num_workers > 0 && indices.len() > 1 {
            indices.par_iter().map(|&i| self.dataset.get(i)).collect()
        } else {
            indices.iter().map(|&i| self.dataset.get(i)).collect()
        }
    }

    /// Iterate over one epoch of batches.
    pub fn iter_batches(&mut self) -> BatchIterator<'_, 'a> {
        self.reshuffle();
        BatchIterator {
            loader: self,
            batch_idx: 0,
        }
    }
}

/// Iterator that yields one batch of samples at a time.
pub struct BatchIterator<'l, 'a> {
    loader: &'l DataLoader<'a>,
    batch_idx: usize,
}

impl<'l, 'a> Iterator for BatchIterator<'l, 'a> {
    type Item = Vec<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let bs = self.loader.config.batch_size;
        let n = self.loader.dataset.len();
        let start = self.batch_idx * bs;

        if start >= n {
            return None;
        }
        if self.loader.config.drop_last && start + bs > n {
            return None;
        }

        let end = (start + bs).min(n);
        self.batch_idx += 1;

        let batch_indices: Vec<usize> = (start..end).map(|i| self.loader.indices[i]).collect();
        Some(self.loader.fetch_samples(&batch_indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // In-memory dataset: sample i is a single pixel with value i.
    struct ToyDataset {
        n: usize,
    }

    impl Dataset for ToyDataset {
        fn len(&self) -> usize {
            self.n
        }

        fn get(&self, index: usize) -> Sample {
            let v = index as f64;
            Sample {
                image: vec![v, v, v],
                shape: vec![1, 1, 3],
                class_id: index as i64,
            }
        }

        fn name(&self) -> &str {
            "toy"
        }
    }

    #[test]
    fn num_batches_rounds_up() {
        let ds = ToyDataset { n: 10 };
        let config = DataLoaderConfig::default().batch_size(3).shuffle(false);
        let loader = DataLoader::new(&ds, config);
        assert_eq!(loader.num_batches(), 4);
        assert_eq!(loader.len(), 10);
    }

    #[test]
    fn drop_last_discards_partial_batch() {
        let ds = ToyDataset { n: 10 };
        let config = DataLoaderConfig::default()
            .batch_size(3)
            .shuffle(false)
            .drop_last(true);
        let mut loader = DataLoader::new(&ds, config);
        assert_eq!(loader.num_batches(), 3);

        let total: usize = loader.iter_batches().map(|b| b.len()).sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn unshuffled_batches_preserve_order() {
        let ds = ToyDataset { n: 5 };
        let config = DataLoaderConfig::default().batch_size(2).shuffle(false);
        let mut loader = DataLoader::new(&ds, config);

        let batches: Vec<Vec<Sample>> = loader.iter_batches().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0][0].class_id, 0);
        assert_eq!(batches[0][1].class_id, 1);
        assert_eq!(batches[2][0].class_id, 4);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let ds = ToyDataset { n: 64 };
        let config = DataLoaderConfig::default().batch_size(64).seed(42);

        let order =
            |loader: &mut DataLoader| -> Vec<i64> {
                loader
                    .iter_batches()
                    .flatten()
                    .map(|s| s.class_id)
                    .collect()
            };

        let mut a = DataLoader::new(&ds, config.clone());
        let mut b = DataLoader::new(&ds, config);
        let first = order(&mut a);
        let second = order(&mut b);
        assert_eq!(first, second);
        assert_ne!(first, (0..64).collect::<Vec<i64>>());
    }

    #[test]
    fn parallel_fetch_matches_sequential() {
        let ds = ToyDataset { n: 12 };
        let sequential = DataLoaderConfig::default().batch_size(4).shuffle(false);
        let parallel = sequential.clone().num_workers(4);

        let mut a = DataLoader::new(&ds, sequential);
        let mut b = DataLoader::new(&ds, parallel);
        let sa: Vec<Vec<Sample>> = a.iter_batches().collect();
        let sb: Vec<Vec<Sample>> = b.iter_batches().collect();
        assert_eq!(sa, sb);
    }
}
