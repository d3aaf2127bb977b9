//! Magnitude pruning followed by a weighted sum.
//!
//! The "trim" step of TIES without sign election: each task keeps only its
//! largest `density` fraction of elements before the weighted sum, so small
//! and likely redundant updates do not accumulate.

use ndarray::{ArrayD, Axis};
use tracing::debug_span;

use crate::sparsify::prune_by_magnitude;
use crate::{stack_task_tensors, weighted_task_tensors, MergeMethod, MergeParameters, Result};

/// Prune each task tensor by magnitude, then take the weighted sum.
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `weights` - One weight per task
/// * `density` - Fraction of each task's elements to keep
pub fn magnitude_prune(
    task_tensors: &[ArrayD<f32>],
    weights: &[f32],
    density: f32,
) -> Result<ArrayD<f32>> {
    let _span = debug_span!("magnitude_prune", tasks = task_tensors.len(), density).entered();

    let pruned: Vec<ArrayD<f32>> = task_tensors
        .iter()
        .map(|t| prune_by_magnitude(t, density))
        .collect::<Result<Vec<_>>>()?;

    let stacked = stack_task_tensors(&pruned)?;
    let weighted = weighted_task_tensors(&stacked, weights)?;
    Ok(weighted.sum_axis(Axis(0)))
}

/// Magnitude-prune merge implementation.
#[derive(Debug, Clone, Default)]
pub struct MagnitudePruneMerge;

impl MagnitudePruneMerge {
    /// Create a new magnitude-prune merge method.
    pub fn new() -> Self {
        Self
    }
}

impl MergeMethod for MagnitudePruneMerge {
    fn name(&self) -> &'static str {
        "magnitude_prune"
    }

    fn description(&self) -> &'static str {
        "Per-task magnitude pruning followed by a weighted sum"
    }

    fn merge(
        &self,
        task_tensors: &[ArrayD<f32>],
        weights: &[f32],
        params: &MergeParameters,
    ) -> Result<ArrayD<f32>> {
        magnitude_prune(task_tensors, weights, params.density())
    }
}
