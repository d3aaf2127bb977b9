//! TIES-Merging - Task arithmetic with sparsification and sign consensus.
//!
//! TIES (TrIm, Elect Sign & merge) improves on basic task arithmetic by:
//! 1. Sparsifying each task tensor to its top `density` fraction by magnitude
//! 2. Electing a majority sign per position
//! 3. Averaging only the weighted contributions that agree with that sign
//!
//! Reference: Yadav et al., "TIES-Merging: Resolving Interference When Merging Models" (2023)
//!
//! Best for:
//! - Combining many specialised task deltas from the same base
//! - Reducing interference when tasks pull parameters in opposite directions

use ndarray::ArrayD;
use tracing::{debug_span, trace};

use crate::sparsify::prune_by_magnitude;
use crate::{
    calculate_majority_sign_mask, disjoint_merge, stack_task_tensors, weighted_task_tensors,
    MajoritySignMethod, MergeMethod, MergeParameters, Result,
};

/// Merge task tensors with TIES.
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `weights` - One weight per task
/// * `density` - Fraction of each task's elements to keep
/// * `majority_sign_method` - How the per-position sign is elected
pub fn ties(
    task_tensors: &[ArrayD<f32>],
    weights: &[f32],
    density: f32,
    majority_sign_method: MajoritySignMethod,
) -> Result<ArrayD<f32>> {
    let _span = debug_span!(
        "ties",
        tasks = task_tensors.len(),
        density,
        method = %majority_sign_method
    )
    .entered();

    // Trim
    let pruned: Vec<ArrayD<f32>> = task_tensors
        .iter()
        .map(|t| prune_by_magnitude(t, density))
        .collect::<Result<Vec<_>>>()?;
    let stacked = stack_task_tensors(&pruned)?;

    // Elect sign
    let mask = calculate_majority_sign_mask(&stacked, majority_sign_method)?;
    trace!(
        agreeing = mask.iter().filter(|&&m| m).count(),
        "sign election"
    );

    // Disjoint merge
    let weighted = weighted_task_tensors(&stacked, weights)?;
    disjoint_merge(&weighted, &mask)
}

/// TIES merge implementation.
#[derive(Debug, Clone, Default)]
pub struct TiesMerge;

impl TiesMerge {
    /// Create a new TIES merge method.
    pub fn new() -> Self {
        Self
    }
}

impl MergeMethod for TiesMerge {
    fn name(&self) -> &'static str {
        "ties"
    }

    fn description(&self) -> &'static str {
        "Task arithmetic with sparsification and sign consensus"
    }

    fn merge(
        &self,
        task_tensors: &[ArrayD<f32>],
        weights: &[f32],
        params: &MergeParameters,
    ) -> Result<ArrayD<f32>> {
        ties(
            task_tensors,
            weights,
            params.density(),
            params.majority_sign_method(),
        )
    }
}
