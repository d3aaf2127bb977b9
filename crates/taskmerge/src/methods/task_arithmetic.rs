use ndarray::{ArrayD, Axis};
use tracing::debug_span;

use crate::{stack_task_tensors, weighted_task_tensors, MergeMethod, MergeParameters, Result};

/// Merge task tensors with a plain weighted sum.
///
/// Formula: `merged = sum_i(w_i * tau_i)`
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `weights` - One weight per task; need not sum to one
pub fn task_arithmetic(task_tensors: &[ArrayD<f32>], weights: &[f32]) -> Result<ArrayD<f32>> {
    let _span = debug_span!("task_arithmetic", tasks = task_tensors.len()).entered();

    let stacked = stack_task_tensors(task_tensors)?;
    let weighted = weighted_task_tensors(&stacked, weights)?;
    Ok(weighted.sum_axis(Axis(0)))
}

/// Task Arithmetic merging.
///
/// As described in "Editing Models with Task Arithmetic" (Ilharco et al., 2022):
/// task vectors are scaled by their weights and summed.
///
/// Best for:
/// - Combining a handful of non-conflicting task deltas
/// - Arithmetic on capabilities (negative weights subtract a skill)
#[derive(Debug, Clone, Default)]
pub struct TaskArithmeticMerge;

impl TaskArithmeticMerge {
    /// Create a new Task Arithmetic merge method.
    pub fn new() -> Self {
        Self
    }
}

impl MergeMethod for TaskArithmeticMerge {
    fn name(&self) -> &'static str {
        "task_arithmetic"
    }

    fn description(&self) -> &'static str {
        "Task Arithmetic (Ilharco et al., 2022)"
    }

    fn merge(
        &self,
        task_tensors: &[ArrayD<f32>],
        weights: &[f32],
        _params: &MergeParameters,
    ) -> Result<ArrayD<f32>> {
        task_arithmetic(task_tensors, weights)
    }
}
