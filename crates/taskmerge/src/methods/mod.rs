//! Merge strategy implementations.
//!
//! Each strategy combines N task tensors of one shape into a single tensor of
//! that shape. Every strategy is available both as a free function taking
//! explicit arguments and as a [`MergeMethod`] reading [`MergeParameters`].
//!
//! - **Task Arithmetic**: weighted sum
//! - **Magnitude Prune**: per-task magnitude pruning, then weighted sum
//! - **TIES**: magnitude pruning, sign election, disjoint merge
//! - **DARE**: random drop with rescale, linear or with TIES sign election
//! - **SCE**: variance selection, energy coefficients, sign erasure

mod dare;
mod magnitude_prune;
mod sce;
mod task_arithmetic;
mod ties;

pub use dare::{dare_linear, dare_ties, DareMerge};
pub use magnitude_prune::{magnitude_prune, MagnitudePruneMerge};
pub use sce::{sce, SceMerge};
pub use task_arithmetic::{task_arithmetic, TaskArithmeticMerge};
pub use ties::{ties, TiesMerge};

use crate::{MergeParameters, Result};
use ndarray::ArrayD;

/// Trait for merge strategy implementations.
pub trait MergeMethod: Send + Sync {
    /// Name of the merge strategy.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Whether the caller's per-task weights are read.
    ///
    /// Strategies that derive their own coefficients return false and accept
    /// any weight slice, including an empty one.
    fn uses_weights(&self) -> bool {
        true
    }

    /// Merge a set of task tensors.
    ///
    /// # Arguments
    /// * `task_tensors` - One tensor per task, all the same shape
    /// * `weights` - One weight per task, in the same order
    /// * `params` - Strategy parameters
    fn merge(
        &self,
        task_tensors: &[ArrayD<f32>],
        weights: &[f32],
        params: &MergeParameters,
    ) -> Result<ArrayD<f32>>;
}
