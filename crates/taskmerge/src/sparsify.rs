//! Sparsification of individual task tensors.
//!
//! Pruning reduces interference when merging by keeping only a `density`
//! fraction of each task tensor's elements and zeroing the rest.
//!
//! # Selection
//!
//! Magnitude pruning ranks elements by absolute value and keeps the top
//! `floor(density * n)`. The ranking is a total order: larger magnitude first,
//! then lower flat (row-major) index first, with NaN magnitudes above every
//! finite one. The cut is found with Quickselect
//! (`select_nth_unstable_by`), O(n) on average, and is reproducible across
//! platforms because the order has no ties.

use std::fmt;

use ndarray::ArrayD;
use rand::distributions::{Bernoulli, Distribution};
use rand::Rng;
use tracing::{trace, warn};

use crate::config::validate_density;
use crate::{MergeError, PruneMethod, Result};

/// Non-fatal condition reported by [`prune`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PruneAdvisory {
    /// `density >= 1`: the tensor was returned unchanged.
    NoPruning {
        /// The requested density.
        density: f32,
    },
}

impl fmt::Display for PruneAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneAdvisory::NoPruning { density } => write!(
                f,
                "the density {} is greater than or equal to 1, no pruning will be performed",
                density
            ),
        }
    }
}

/// Output of [`prune`].
#[derive(Debug, Clone)]
pub struct Pruned {
    /// The pruned tensor (same shape as the input).
    pub tensor: ArrayD<f32>,
    /// Set when the call degenerated to a no-op.
    pub advisory: Option<PruneAdvisory>,
}

impl Pruned {
    /// Discard the advisory and keep the tensor.
    pub fn into_tensor(self) -> ArrayD<f32> {
        self.tensor
    }
}

/// Number of elements kept at `density` out of `n`.
///
/// The product is taken in f64, which is exact for `n < 2^29`.
pub fn retained_count(density: f32, n: usize) -> usize {
    ((f64::from(density) * n as f64).floor() as usize).min(n)
}

/// Flat indices of the `k` largest values, ranked larger first then lower index.
///
/// The returned indices are not sorted.
pub fn top_k_indices(magnitudes: &[f32], k: usize) -> Vec<usize> {
    let n = magnitudes.len();
    let mut order: Vec<usize> = (0..n).collect();
    if k >= n {
        return order;
    }
    if k == 0 {
        return Vec::new();
    }

    order.select_nth_unstable_by(k - 1, |&a, &b| {
        magnitudes[b].total_cmp(&magnitudes[a]).then(a.cmp(&b))
    });
    order.truncate(k);
    order
}

/// Keep only the top `density` fraction of a tensor by magnitude.
///
/// # Arguments
/// * `tensor` - Input tensor to prune
/// * `density` - Fraction of elements to keep (0.0 to 1.0)
///
/// # Returns
/// A tensor with the same shape where exactly `floor(density * n)` positions
/// keep their value and every other position is zero.
pub fn magnitude_based_pruning(tensor: &ArrayD<f32>, density: f32) -> ArrayD<f32> {
    let n = tensor.len();
    let k = retained_count(density, n);

    let magnitudes: Vec<f32> = tensor.iter().map(|x| x.abs()).collect();
    let mut keep = vec![false; n];
    for idx in top_k_indices(&magnitudes, k) {
        keep[idx] = true;
    }

    let mut pruned = tensor.clone();
    for (value, &kept) in pruned.iter_mut().zip(keep.iter()) {
        if !kept {
            *value = 0.0;
        }
    }

    trace!(elements = n, kept = k, "magnitude pruning");
    pruned
}

/// Keep each element independently with probability `density`.
///
/// With `rescale`, kept values are divided by `density` so the pruned tensor
/// has the same expected value as the input. The rescaled values are what is
/// returned.
///
/// # Arguments
/// * `tensor` - Input tensor
/// * `density` - Keep probability (0.0 to 1.0)
/// * `rescale` - Divide survivors by `density`
/// * `rng` - Random source; seed it for reproducible masks
pub fn random_pruning<R: Rng + ?Sized>(
    tensor: &ArrayD<f32>,
    density: f32,
    rescale: bool,
    rng: &mut R,
) -> Result<ArrayD<f32>> {
    let keep = Bernoulli::new(f64::from(density)).map_err(|_| {
        MergeError::InvalidArgument(format!(
            "density for random pruning must be in [0, 1], got {}",
            density
        ))
    })?;

    let rescale = rescale && density > 0.0;
    let pruned = tensor.mapv(|x| {
        if keep.sample(&mut *rng) {
            if rescale {
                x / density
            } else {
                x
            }
        } else {
            0.0
        }
    });

    trace!(elements = tensor.len(), density, rescale, "random pruning");
    Ok(pruned)
}

/// Prune a tensor with the given method.
///
/// * `density >= 1` returns the tensor unchanged with a
///   [`PruneAdvisory::NoPruning`], also logged as a warning.
/// * `density < 0` (or NaN) fails with [`MergeError::InvalidArgument`].
///
/// `rescale` only affects [`PruneMethod::Random`]. `rng` is only drawn from by
/// the random method.
pub fn prune<R: Rng + ?Sized>(
    tensor: &ArrayD<f32>,
    density: f32,
    method: PruneMethod,
    rescale: bool,
    rng: &mut R,
) -> Result<Pruned> {
    if let Some(advisory) = check_prune_density(density)? {
        return Ok(Pruned {
            tensor: tensor.clone(),
            advisory: Some(advisory),
        });
    }

    let tensor = match method {
        PruneMethod::Magnitude => magnitude_based_pruning(tensor, density),
        PruneMethod::Random => random_pruning(tensor, density, rescale, rng)?,
    };
    Ok(Pruned {
        tensor,
        advisory: None,
    })
}

/// [`prune`] with [`PruneMethod::Magnitude`], which never needs randomness.
pub(crate) fn prune_by_magnitude(tensor: &ArrayD<f32>, density: f32) -> Result<ArrayD<f32>> {
    if check_prune_density(density)?.is_some() {
        return Ok(tensor.clone());
    }
    Ok(magnitude_based_pruning(tensor, density))
}

/// Density gate shared by both pruning entry points.
///
/// Returns the advisory (already logged) when pruning is a no-op and rejects
/// negative or NaN densities.
fn check_prune_density(density: f32) -> Result<Option<PruneAdvisory>> {
    if density >= 1.0 {
        let advisory = PruneAdvisory::NoPruning { density };
        warn!("{}", advisory);
        return Ok(Some(advisory));
    }
    validate_density(density)?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn values(tensor: &ArrayD<f32>) -> Vec<f32> {
        tensor.iter().copied().collect()
    }

    #[test]
    fn test_prune_full_density_is_noop() {
        let tensor = arr1(&[1.0_f32, 2.0, 3.0, 4.0]).into_dyn();
        let mut rng = StdRng::seed_from_u64(0);

        for method in [PruneMethod::Magnitude, PruneMethod::Random] {
            let pruned = prune(&tensor, 1.0, method, false, &mut rng).unwrap();
            assert_eq!(pruned.tensor, tensor);
            assert_eq!(
                pruned.advisory,
                Some(PruneAdvisory::NoPruning { density: 1.0 })
            );
        }

        let pruned = prune(&tensor, 2.5, PruneMethod::Magnitude, false, &mut rng).unwrap();
        assert_eq!(pruned.tensor, tensor);
        assert!(pruned.advisory.is_some());
    }

    #[test]
    fn test_prune_negative_density_fails() {
        let tensor = arr1(&[1.0_f32, 2.0]).into_dyn();
        let mut rng = StdRng::seed_from_u64(0);

        for method in [PruneMethod::Magnitude, PruneMethod::Random] {
            let result = prune(&tensor, -0.1, method, true, &mut rng);
            assert!(matches!(result, Err(MergeError::InvalidArgument(_))));
        }
        let result = prune(&tensor, f32::NAN, PruneMethod::Magnitude, false, &mut rng);
        assert!(matches!(result, Err(MergeError::InvalidArgument(_))));
    }

    #[test]
    fn test_magnitude_half_density() {
        let tensor = arr1(&[1.0_f32, 2.0, 3.0, 4.0]).into_dyn();
        let result = magnitude_based_pruning(&tensor, 0.5);

        // Keeps the two largest by magnitude (3.0 and 4.0)
        assert_eq!(values(&result), vec![0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_magnitude_handles_negative() {
        let tensor = arr1(&[-4.0_f32, 1.0, -2.0, 3.0]).into_dyn();
        let result = magnitude_based_pruning(&tensor, 0.5);

        assert_eq!(values(&result), vec![-4.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_magnitude_zero_density() {
        let tensor = arr1(&[1.0_f32, 2.0, 3.0, 4.0]).into_dyn();
        let result = magnitude_based_pruning(&tensor, 0.0);

        assert_eq!(values(&result), vec![0.0; 4]);
    }

    #[test]
    fn test_magnitude_ties_prefer_lower_index() {
        let tensor = arr1(&[1.0_f32, -1.0, 1.0, -1.0, 1.0]).into_dyn();
        let result = magnitude_based_pruning(&tensor, 0.4);

        assert_eq!(values(&result), vec![1.0, -1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_magnitude_preserves_shape() {
        let tensor = arr2(&[[1.0_f32, -5.0, 2.0], [0.5, 4.0, -3.0]]).into_dyn();
        let result = magnitude_based_pruning(&tensor, 0.5);

        assert_eq!(result.shape(), &[2, 3]);
        assert_eq!(
            result,
            arr2(&[[0.0_f32, -5.0, 0.0], [0.0, 4.0, -3.0]]).into_dyn()
        );
    }

    #[test]
    fn test_magnitude_floor_of_count() {
        // floor(0.3 * 10) = 3
        let tensor = arr1(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]).into_dyn();
        let result = magnitude_based_pruning(&tensor, 0.3);

        let kept = result.iter().filter(|&&x| x != 0.0).count();
        assert_eq!(kept, 3);
        assert_eq!(&values(&result)[7..], &[8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_retained_count_large_tensor() {
        // 0.3_f32 is 0.30000001192092896; the exact product is 30000001.19...
        assert_eq!(retained_count(0.3, 100_000_001), 30_000_001);
        assert_eq!(retained_count(0.5, 1 << 28), 1 << 27);
        assert_eq!(retained_count(2.0, 10), 10);
        assert_eq!(retained_count(0.0, 10), 0);
    }

    #[test]
    fn test_prune_by_magnitude_matches_prune() {
        let tensor = arr1(&[3.0_f32, -1.0, 4.0, -1.5, 5.0, 9.0]).into_dyn();
        let mut rng = StdRng::seed_from_u64(0);

        for density in [0.0_f32, 0.5, 1.0, 3.0] {
            let direct = prune_by_magnitude(&tensor, density).unwrap();
            let general = prune(&tensor, density, PruneMethod::Magnitude, false, &mut rng)
                .unwrap()
                .into_tensor();
            assert_eq!(direct, general, "density {}", density);
        }

        for density in [-0.1_f32, f32::NAN] {
            assert!(matches!(
                prune_by_magnitude(&tensor, density),
                Err(MergeError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_top_k_indices() {
        let mut idx = top_k_indices(&[0.5, 2.0, 2.0, 1.0], 2);
        idx.sort_unstable();
        assert_eq!(idx, vec![1, 2]);

        let mut idx = top_k_indices(&[0.5, 2.0, 2.0, 1.0], 1);
        idx.sort_unstable();
        assert_eq!(idx, vec![1]);

        assert!(top_k_indices(&[1.0, 2.0], 0).is_empty());
        assert_eq!(top_k_indices(&[1.0, 2.0], 5).len(), 2);
    }

    #[test]
    fn test_random_pruning_seeded() {
        let tensor = arr1(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]).into_dyn();

        let r1 = random_pruning(&tensor, 0.5, true, &mut StdRng::seed_from_u64(42)).unwrap();
        let r2 = random_pruning(&tensor, 0.5, true, &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(r1, r2);
    }

    #[test]
    fn test_random_pruning_rescales_survivors() {
        let tensor = ArrayD::<f32>::ones(ndarray::IxDyn(&[1000]));
        let result = random_pruning(&tensor, 0.5, true, &mut StdRng::seed_from_u64(12345)).unwrap();

        // Survivors are 1.0 / 0.5 = 2.0
        assert!(result.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        assert!(result.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_random_pruning_rescale_changes_output() {
        let tensor = arr1(&[1.0_f32, -2.0, 3.0, -4.0, 5.0, -6.0, 7.0, -8.0]).into_dyn();

        let scaled = random_pruning(&tensor, 0.5, true, &mut StdRng::seed_from_u64(3)).unwrap();
        let plain = random_pruning(&tensor, 0.5, false, &mut StdRng::seed_from_u64(3)).unwrap();

        for (s, p) in scaled.iter().zip(plain.iter()) {
            assert!((s - p * 2.0).abs() < 1e-6);
        }
        assert!(plain.iter().any(|&v| v != 0.0));
        assert_ne!(scaled, plain);
    }

    #[test]
    fn test_random_pruning_zero_density() {
        let tensor = arr1(&[1.0_f32, 2.0, 3.0]).into_dyn();
        let result = random_pruning(&tensor, 0.0, true, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(values(&result), vec![0.0; 3]);
    }

    #[test]
    fn test_random_pruning_rejects_out_of_range() {
        let tensor = arr1(&[1.0_f32]).into_dyn();
        let result = random_pruning(&tensor, 1.5, false, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(MergeError::InvalidArgument(_))));
    }

    #[test]
    fn test_advisory_message() {
        let advisory = PruneAdvisory::NoPruning { density: 1.0 };
        assert!(advisory.to_string().contains("no pruning"));
    }
}
