//! Sign election and disjoint merging.
//!
//! Sign consensus is the "elect" step of TIES-Merging (Yadav et al. 2023). It
//! reduces interference by:
//! 1. Electing a majority sign at each parameter position.
//! 2. Discarding contributions from tasks whose sign disagrees with it.
//! 3. Averaging the remaining contributions (disjoint merge).
//!
//! All functions operate on task sets stacked along axis 0.
//!
//! # Zero convention
//!
//! `sign(0) = 0`. An exactly-zero element contributes nothing to a
//! `frequency` vote and never agrees with the elected sign, which is always
//! `+1` or `-1`. NaN is treated like zero.

use ndarray::{ArrayD, Axis, Zip};
use tracing::trace;

use crate::{MajoritySignMethod, MergeError, Result};

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Compute which elements agree with the per-position majority sign.
///
/// # Arguments
/// * `task_tensors` - Task set of shape `[N, ...S]`
/// * `method` - `Total` sums raw values, `Frequency` sums signs
///
/// # Returns
/// A boolean mask of shape `[N, ...S]`, true where the task's sign equals the
/// elected sign. The elected sign is `+1` where the vote is `>= 0` and `-1`
/// otherwise.
pub fn calculate_majority_sign_mask(
    task_tensors: &ArrayD<f32>,
    method: MajoritySignMethod,
) -> Result<ArrayD<bool>> {
    if task_tensors.ndim() == 0 {
        return Err(MergeError::InvalidArgument(
            "majority sign mask needs a task axis".to_string(),
        ));
    }

    let signs = task_tensors.mapv(sign);
    let vote = match method {
        MajoritySignMethod::Total => task_tensors.sum_axis(Axis(0)),
        MajoritySignMethod::Frequency => signs.sum_axis(Axis(0)),
    };
    let majority = vote.mapv(|v| if v >= 0.0 { 1.0_f32 } else { -1.0 });

    let mask = Zip::from(&signs)
        .and_broadcast(&majority)
        .map_collect(|&s, &m| s == m);

    trace!(%method, shape = ?mask.shape(), "majority sign mask");
    Ok(mask)
}

/// Merge weighted task tensors using only sign-agreeing contributions.
///
/// Sums `task_tensors * mask` along the task axis and divides by the number
/// of agreeing tasks at each position, clamped to at least one. Positions
/// where no task agrees are exactly zero.
///
/// # Arguments
/// * `task_tensors` - Weighted task set of shape `[N, ...S]`
/// * `majority_sign_mask` - Mask from [`calculate_majority_sign_mask`]
pub fn disjoint_merge(
    task_tensors: &ArrayD<f32>,
    majority_sign_mask: &ArrayD<bool>,
) -> Result<ArrayD<f32>> {
    if task_tensors.shape() != majority_sign_mask.shape() {
        return Err(MergeError::InvalidArgument(format!(
            "mask shape {:?} does not match task tensors shape {:?}",
            majority_sign_mask.shape(),
            task_tensors.shape()
        )));
    }
    if task_tensors.ndim() == 0 {
        return Err(MergeError::InvalidArgument(
            "disjoint merge needs a task axis".to_string(),
        ));
    }

    let mask = majority_sign_mask.mapv(f32::from);
    let mixed = (task_tensors * &mask).sum_axis(Axis(0));
    let preserved = mask.sum_axis(Axis(0)).mapv(|count| count.max(1.0));

    Ok(mixed / preserved)
}
