//! Seeded row splits for validation and cross-validation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Split `0..n` into (train, validation) index lists, each ascending
///
/// The validation share is rounded up, but at least one row is always left
/// for training.
pub fn train_validation_split(n: usize, validation_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    // Epsilon keeps exact products like 20 * 0.1 from rounding up to 3
    let n_validation = ((n as f64) * validation_fraction - 1e-9).ceil().max(0.0) as usize;
    let n_validation = n_validation.min(n.saturating_sub(1));

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let mut validation = order[..n_validation].to_vec();
    let mut train = order[n_validation..].to_vec();
    validation.sort_unstable();
    train.sort_unstable();
    (train, validation)
}

/// Test-fold index lists with each label spread evenly over the folds
///
/// Labels are visited in ascending order; each label's rows are shuffled
/// and dealt round-robin, continuing where the previous label stopped.
pub fn stratified_folds(labels: &[i64], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let k = k.max(1);
    let mut by_label: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_label.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    let mut next = 0;
    for (_, mut rows) in by_label {
        rows.shuffle(&mut rng);
        for row in rows {
            folds[next % k].push(row);
            next += 1;
        }
    }

    for fold in &mut folds {
        fold.sort_unstable();
    }
    folds
}
