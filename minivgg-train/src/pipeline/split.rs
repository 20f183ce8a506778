//! Train/evaluation split policy
//!
//! Held-out mode shuffles with a seeded `ChaCha8Rng` and reserves
//! `ceil(test_fraction * N)` samples for evaluation. Train-only mode keeps
//! every sample for training and evaluates on that same partition, so its
//! accuracy measures fit quality rather than generalization.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::loader::LabeledImage;
use super::preprocess::ImageArray;

/// Index-aligned images, labels and source paths
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub images: Vec<ImageArray>,
    pub labels: Vec<String>,
    pub sources: Vec<PathBuf>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn push(&mut self, image: LabeledImage) {
        self.images.push(image.pixels);
        self.labels.push(image.label);
        self.sources.push(image.path);
    }
}

impl FromIterator<LabeledImage> for Partition {
    fn from_iter<I: IntoIterator<Item = LabeledImage>>(iter: I) -> Self {
        let mut partition = Partition::default();
        for image in iter {
            partition.push(image);
        }
        partition
    }
}

/// Training partition plus an optional held-out partition
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    train: Partition,
    held_out: Option<Partition>,
}

impl DatasetSplit {
    pub fn train(&self) -> &Partition {
        &self.train
    }

    /// Held-out partition, or the training partition in train-only mode
    pub fn evaluation(&self) -> &Partition {
        self.held_out.as_ref().unwrap_or(&self.train)
    }

    pub fn is_held_out(&self) -> bool {
        self.held_out.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitPolicy {
    test_fraction: f64,
    stratified: bool,
}

impl Default for SplitPolicy {
    fn default() -> Self {
        Self {
            test_fraction: 0.25,
            stratified: false,
        }
    }
}

impl SplitPolicy {
    pub fn new(test_fraction: f64, stratified: bool) -> Self {
        Self {
            test_fraction,
            stratified,
        }
    }

    /// Evaluation partition size for `total` samples
    pub fn test_count(&self, total: usize) -> usize {
        ((self.test_fraction * total as f64).ceil() as usize).min(total)
    }

    pub fn apply(&self, images: Vec<LabeledImage>, train_only: bool, seed: u64) -> DatasetSplit {
        if train_only {
            return DatasetSplit {
                train: images.into_iter().collect(),
                held_out: None,
            };
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n_test = self.test_count(images.len());
        let test_indices = if self.stratified {
            stratified_test_indices(&images, n_test, &mut rng)
        } else {
            let mut order: Vec<usize> = (0..images.len()).collect();
            order.shuffle(&mut rng);
            order.truncate(n_test);
            order
        };

        let mut is_test = vec![false; images.len()];
        for &i in &test_indices {
            is_test[i] = true;
        }

        // Both partitions come out in shuffled order
        let mut order: Vec<usize> = (0..images.len()).collect();
        order.shuffle(&mut rng);

        let mut slots: Vec<Option<LabeledImage>> = images.into_iter().map(Some).collect();
        let mut train = Partition::default();
        let mut held_out = Partition::default();
        for i in order {
            if let Some(image) = slots[i].take() {
                if is_test[i] {
                    held_out.push(image);
                } else {
                    train.push(image);
                }
            }
        }

        DatasetSplit {
            train,
            held_out: Some(held_out),
        }
    }
}

/// Pick `n_test` indices keeping per-class proportions
///
/// Class quotas are `floor(n_test * class_size / total)`; the leftover slots
/// go to the classes with the largest fractional remainder.
fn stratified_test_indices(
    images: &[LabeledImage],
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, image) in images.iter().enumerate() {
        by_class.entry(image.label.as_str()).or_default().push(i);
    }

    let total = images.len() as f64;
    let mut quotas: Vec<(usize, f64)> = by_class
        .values()
        .map(|members| {
            let exact = n_test as f64 * members.len() as f64 / total;
            (exact.floor() as usize, exact - exact.floor())
        })
        .collect();

    let assigned: usize = quotas.iter().map(|(q, _)| q).sum();
    let mut by_remainder: Vec<usize> = (0..quotas.len()).collect();
    by_remainder.sort_by(|a, b| quotas[*b].1.total_cmp(&quotas[*a].1));
    for &class in by_remainder.iter().cycle().take(n_test.saturating_sub(assigned)) {
        quotas[class].0 += 1;
    }

    let mut test = Vec::with_capacity(n_test);
    for (members, (quota, _)) in by_class.into_values().zip(quotas) {
        let mut members = members;
        members.shuffle(rng);
        test.extend(members.into_iter().take(quota));
    }
    test
}
