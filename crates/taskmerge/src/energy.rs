//! Variance selection and energy coefficients for SCE merging.
//!
//! SCE (Select, Calculate, Erase) ranks parameter positions by how much the
//! tasks disagree on them and weights each task by the energy of its delta.
//!
//! Reference: Wan et al., "FuseChat: Knowledge Fusion of Chat Models" (2024).

use ndarray::{Array1, ArrayD, Axis};
use tracing::trace;

use crate::sparsify::{retained_count, top_k_indices};
use crate::{MergeError, Result};

/// Below this total energy the tasks are weighted uniformly.
pub const ENERGY_EPSILON: f32 = 1e-6;

/// Per-task merging coefficients from mean squared magnitude.
///
/// Each task's energy is the mean of its squared elements; the result is the
/// energies divided by their sum. If the sum is below [`ENERGY_EPSILON`] in
/// absolute value, every task gets `1 / N`.
///
/// # Arguments
/// * `task_tensors` - Task set of shape `[N, ...S]`
pub fn sce_weight(task_tensors: &ArrayD<f32>) -> Result<Array1<f32>> {
    if task_tensors.ndim() == 0 || task_tensors.len_of(Axis(0)) == 0 {
        return Err(MergeError::NotEnoughModels {
            expected: 1,
            actual: 0,
        });
    }

    let energies: Array1<f32> = task_tensors
        .outer_iter()
        .map(|task| task.mapv(|x| x * x).mean().unwrap_or(0.0))
        .collect();
    let total = energies.sum();
    trace!(?energies, total, "task energies");

    if total.abs() < ENERGY_EPSILON {
        let num_tasks = energies.len();
        return Ok(Array1::from_elem(num_tasks, 1.0 / num_tasks as f32));
    }
    Ok(energies / total)
}

/// Select the positions with the highest cross-task variance.
///
/// * `density <= 0`: no position is selected.
/// * `density >= 1`: every position is selected.
/// * Otherwise `k = floor(density * count(variance != 0))` positions are
///   selected by largest variance; ties go to the lower flat index.
///
/// # Arguments
/// * `task_tensors` - Task set of shape `[N, ...S]`
/// * `density` - Fraction of varying positions to keep
///
/// # Returns
/// A mask of shape `S`.
pub fn sce_mask(task_tensors: &ArrayD<f32>, density: f32) -> Result<ArrayD<bool>> {
    if task_tensors.ndim() == 0 || task_tensors.len_of(Axis(0)) == 0 {
        return Err(MergeError::NotEnoughModels {
            expected: 1,
            actual: 0,
        });
    }

    let position_dim = task_tensors.index_axis(Axis(0), 0).raw_dim();
    if density <= 0.0 {
        return Ok(ArrayD::from_elem(position_dim, false));
    }
    if density >= 1.0 {
        return Ok(ArrayD::from_elem(position_dim, true));
    }

    let variance = task_tensors.var_axis(Axis(0), 0.0);
    let nonzero = variance.iter().filter(|&&v| v != 0.0).count();
    let k = retained_count(density, nonzero);
    trace!(nonzero, k, "variance selection");
    if k == 0 {
        return Ok(ArrayD::from_elem(position_dim, false));
    }

    let magnitudes: Vec<f32> = variance.iter().map(|v| v.abs()).collect();
    let mut selected = vec![false; magnitudes.len()];
    for idx in top_k_indices(&magnitudes, k) {
        selected[idx] = true;
    }
    Ok(ArrayD::from_shape_vec(position_dim, selected)?)
}
