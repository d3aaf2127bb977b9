//! Task tensor merging.
//!
//! This crate combines independently produced parameter deltas ("task
//! tensors", e.g. per-task fine-tuning updates to one base model) into a single
//! merged delta of the same shape.
//!
//! # Supported Strategies
//!
//! - **Task Arithmetic**: Weighted sum of task tensors
//! - **Magnitude Prune**: Per-task magnitude pruning, then weighted sum
//! - **TIES**: Magnitude pruning, sign election and disjoint merge
//! - **DARE Linear / DARE TIES**: Random drop with rescaling, then sum or TIES
//! - **SCE**: Variance selection, energy coefficients and sign erasure
//!
//! All functions are pure: inputs are borrowed, every result is a new array
//! and nothing is retained between calls. Random pruning draws from a
//! caller-supplied [`rand::Rng`] (or a per-call RNG seeded from
//! [`MergeParameters::seed`]).
//!
//! # Example
//!
//! ```
//! use ndarray::arr1;
//! use taskmerge::{merge, MergeConfig, MergeStrategy, MajoritySignMethod};
//!
//! let tensors = vec![
//!     arr1(&[1.0_f32, 2.0, -3.0, 4.0]).into_dyn(),
//!     arr1(&[1.0_f32, -2.0, 3.0, -4.0]).into_dyn(),
//! ];
//! let config = MergeConfig::new(MergeStrategy::Ties)
//!     .with_density(0.5)
//!     .with_majority_sign_method(MajoritySignMethod::Total);
//!
//! let merged = merge(&tensors, &[0.5, 0.5], &config)?;
//! assert_eq!(merged, arr1(&[0.0_f32, 0.0, 1.5, 2.0]).into_dyn());
//! # Ok::<(), taskmerge::MergeError>(())
//! ```

#![warn(missing_docs)]

mod broadcast;
mod config;
mod consensus;
mod energy;
mod error;
mod merge;
pub mod methods;
mod sparsify;

pub use broadcast::*;
pub use config::*;
pub use consensus::*;
pub use energy::*;
pub use error::*;
pub use merge::*;
pub use sparsify::*;

/// Re-export merge methods for convenience
pub use methods::{
    dare_linear, dare_ties, magnitude_prune, sce, task_arithmetic, ties, DareMerge,
    MagnitudePruneMerge, MergeMethod, SceMerge, TaskArithmeticMerge, TiesMerge,
};
