//! SCE merging - Select, Calculate, Erase.
//!
//! 1. **Select**: keep the positions whose values vary most across tasks
//!    (one mask shared by every task, unlike TIES which prunes each task alone)
//! 2. **Calculate**: derive a coefficient per task from the energy of its delta
//! 3. **Erase**: drop contributions whose sign disagrees with the majority
//!
//! The merged value at each position is the coefficient-weighted sum of the
//! surviving contributions divided by the sum of their coefficients.
//!
//! Caller-supplied weights are not used: the coefficients come from the
//! tensors themselves.
//!
//! Reference: Wan et al., "FuseChat: Knowledge Fusion of Chat Models" (2024)

use ndarray::{ArrayD, Axis};
use tracing::{debug, debug_span, trace};

use crate::config::validate_density;
use crate::{
    calculate_majority_sign_mask, reshape_weight_task_tensors, sce_mask, sce_weight,
    stack_task_tensors, MajoritySignMethod, MergeMethod, MergeParameters, Result,
};

/// Lower bound on the per-position coefficient sum.
const MIN_WEIGHT_SUM: f32 = 1e-6;

/// Merge task tensors with SCE.
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `density` - Fraction of varying positions to keep; `>= 1` keeps all
/// * `majority_sign_method` - How the per-position sign is elected
pub fn sce(
    task_tensors: &[ArrayD<f32>],
    density: f32,
    majority_sign_method: MajoritySignMethod,
) -> Result<ArrayD<f32>> {
    let _span = debug_span!(
        "sce",
        tasks = task_tensors.len(),
        density,
        method = %majority_sign_method
    )
    .entered();
    validate_density(density)?;

    let mut stacked = stack_task_tensors(task_tensors)?;

    // Select
    if density < 1.0 {
        let mask = sce_mask(&stacked, density)?.mapv(f32::from);
        trace!(selected = mask.sum(), "variance mask");
        stacked = &stacked * &mask;
    }

    // Erase
    let erase_mask = calculate_majority_sign_mask(&stacked, majority_sign_method)?;

    // Calculate
    let task_weights = sce_weight(&stacked)?;
    debug!(weights = ?task_weights, "energy coefficients");
    let task_weights = reshape_weight_task_tensors(&stacked, &task_weights.into_dyn())?;

    let erased_weights = erase_mask.mapv(f32::from) * &task_weights;
    let merged = (&stacked * &erased_weights).sum_axis(Axis(0));
    let weight_sum = erased_weights
        .sum_axis(Axis(0))
        .mapv(|w| w.max(MIN_WEIGHT_SUM));

    Ok(merged / weight_sum)
}

/// SCE merge implementation.
#[derive(Debug, Clone, Default)]
pub struct SceMerge;

impl SceMerge {
    /// Create a new SCE merge method.
    pub fn new() -> Self {
        Self
    }
}

impl MergeMethod for SceMerge {
    fn name(&self) -> &'static str {
        "sce"
    }

    fn description(&self) -> &'static str {
        "Variance selection, energy coefficients and sign erasure"
    }

    fn uses_weights(&self) -> bool {
        false
    }

    fn merge(
        &self,
        task_tensors: &[ArrayD<f32>],
        _weights: &[f32],
        params: &MergeParameters,
    ) -> Result<ArrayD<f32>> {
        sce(
            task_tensors,
            params.density(),
            params.majority_sign_method(),
        )
    }
}
