//! DARE merge method - Drop And REscale.
//!
//! DARE is an alternative to TIES that uses random pruning instead of
//! magnitude-based pruning. It randomly drops a fraction of parameters
//! and rescales the remaining ones to maintain the expected value.
//!
//! Formula:
//! ```text
//! mask = bernoulli(density)
//! sparse_delta = mask * delta / density
//! ```
//!
//! The sparse deltas are then either summed with their weights (`dare_linear`)
//! or combined with TIES sign election and disjoint merge (`dare_ties`).
//!
//! Reference: Yu et al., "Language Models are Super Mario: Absorbing Abilities from Homologous Models as a Free Lunch" (2023)
//!
//! Best for:
//! - Alternative to TIES when you want stochastic sparsification
//! - When magnitude-based pruning removes important small-magnitude weights

use ndarray::{ArrayD, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug_span;

use crate::{
    calculate_majority_sign_mask, disjoint_merge, prune, stack_task_tensors,
    weighted_task_tensors, MajoritySignMethod, MergeMethod, MergeParameters, PruneMethod, Result,
};

/// Randomly prune every task tensor with rescaling and stack the results.
fn dare_sparsify<R: Rng + ?Sized>(
    task_tensors: &[ArrayD<f32>],
    density: f32,
    rng: &mut R,
) -> Result<ArrayD<f32>> {
    let pruned: Vec<ArrayD<f32>> = task_tensors
        .iter()
        .map(|t| prune(t, density, PruneMethod::Random, true, &mut *rng).map(|p| p.into_tensor()))
        .collect::<Result<Vec<_>>>()?;
    stack_task_tensors(&pruned)
}

/// Merge with random drop-and-rescale followed by a weighted sum.
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `weights` - One weight per task
/// * `density` - Keep probability for each element
/// * `rng` - Random source for the drop masks
pub fn dare_linear<R: Rng + ?Sized>(
    task_tensors: &[ArrayD<f32>],
    weights: &[f32],
    density: f32,
    rng: &mut R,
) -> Result<ArrayD<f32>> {
    let _span = debug_span!("dare_linear", tasks = task_tensors.len(), density).entered();

    let stacked = dare_sparsify(task_tensors, density, rng)?;
    let weighted = weighted_task_tensors(&stacked, weights)?;
    Ok(weighted.sum_axis(Axis(0)))
}

/// Merge with random drop-and-rescale followed by TIES sign election and
/// disjoint merge.
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `weights` - One weight per task
/// * `density` - Keep probability for each element
/// * `majority_sign_method` - How the per-position sign is elected
/// * `rng` - Random source for the drop masks
pub fn dare_ties<R: Rng + ?Sized>(
    task_tensors: &[ArrayD<f32>],
    weights: &[f32],
    density: f32,
    majority_sign_method: MajoritySignMethod,
    rng: &mut R,
) -> Result<ArrayD<f32>> {
    let _span = debug_span!(
        "dare_ties",
        tasks = task_tensors.len(),
        density,
        method = %majority_sign_method
    )
    .entered();

    let stacked = dare_sparsify(task_tensors, density, rng)?;
    let mask = calculate_majority_sign_mask(&stacked, majority_sign_method)?;
    let weighted = weighted_task_tensors(&stacked, weights)?;
    disjoint_merge(&weighted, &mask)
}

/// DARE merge implementation.
#[derive(Debug, Clone)]
pub struct DareMerge {
    /// Whether to use TIES-style sign consensus.
    use_ties_consensus: bool,
    /// Random seed for reproducibility; overridden by `MergeParameters::seed`.
    seed: Option<u64>,
}

impl Default for DareMerge {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DareMerge {
    /// Create a new DARE merge method.
    ///
    /// # Arguments
    /// * `use_ties_consensus` - If true, apply TIES sign consensus after random pruning
    pub fn new(use_ties_consensus: bool) -> Self {
        Self {
            use_ties_consensus,
            seed: None,
        }
    }

    /// Create DARE with TIES consensus (dare_ties).
    pub fn with_ties() -> Self {
        Self::new(true)
    }

    /// Create DARE with linear combination (dare_linear).
    pub fn linear() -> Self {
        Self::new(false)
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self, params: &MergeParameters) -> StdRng {
        match params.seed.or(self.seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

impl MergeMethod for DareMerge {
    fn name(&self) -> &'static str {
        if self.use_ties_consensus {
            "dare_ties"
        } else {
            "dare_linear"
        }
    }

    fn description(&self) -> &'static str {
        if self.use_ties_consensus {
            "Random pruning with rescaling and TIES sign consensus"
        } else {
            "Random pruning with rescaling and linear combination"
        }
    }

    fn merge(
        &self,
        task_tensors: &[ArrayD<f32>],
        weights: &[f32],
        params: &MergeParameters,
    ) -> Result<ArrayD<f32>> {
        let mut rng = self.rng(params);
        if self.use_ties_consensus {
            dare_ties(
                task_tensors,
                weights,
                params.density(),
                params.majority_sign_method(),
                &mut rng,
            )
        } else {
            dare_linear(task_tensors, weights, params.density(), &mut rng)
        }
    }
}
