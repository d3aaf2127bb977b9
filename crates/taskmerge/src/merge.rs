//! Strategy dispatch.
//!
//! This module provides the high-level entry point used by callers that hold
//! a strategy name and parameters rather than a concrete merge function.

use ndarray::ArrayD;
use tracing::debug;

use crate::{
    DareMerge, MagnitudePruneMerge, MergeConfig, MergeMethod, MergeStrategy, Result, SceMerge,
    TaskArithmeticMerge, TiesMerge,
};

/// Merge task tensors with the strategy and parameters in `config`.
///
/// # Arguments
/// * `task_tensors` - One tensor per task, all the same shape
/// * `weights` - One weight per task, in the same order. Ignored by
///   [`MergeStrategy::Sce`], which derives its own coefficients
/// * `config` - Strategy and its parameters
///
/// # Returns
/// One tensor of the shared task tensor shape.
pub fn merge(
    task_tensors: &[ArrayD<f32>],
    weights: &[f32],
    config: &MergeConfig,
) -> Result<ArrayD<f32>> {
    config.validate()?;

    let method = create_merge_method(config.strategy);
    debug!(
        "Using merge method: {} - {}",
        method.name(),
        method.description()
    );
    if !method.uses_weights() && !weights.is_empty() {
        debug!(
            strategy = method.name(),
            "caller weights are ignored by this strategy"
        );
    }

    let merged = method.merge(task_tensors, weights, &config.parameters)?;
    debug!(
        strategy = method.name(),
        tasks = task_tensors.len(),
        shape = ?merged.shape(),
        "merged task tensors"
    );
    Ok(merged)
}

/// Create the merge method for a strategy.
pub fn create_merge_method(strategy: MergeStrategy) -> Box<dyn MergeMethod> {
    match strategy {
        MergeStrategy::TaskArithmetic => Box::new(TaskArithmeticMerge::new()),
        MergeStrategy::MagnitudePrune => Box::new(MagnitudePruneMerge::new()),
        MergeStrategy::Ties => Box::new(TiesMerge::new()),
        MergeStrategy::DareLinear => Box::new(DareMerge::linear()),
        MergeStrategy::DareTies => Box::new(DareMerge::with_ties()),
        MergeStrategy::Sce => Box::new(SceMerge::new()),
    }
}

/// Builder for merge configurations, parsing names at the boundary.
#[derive(Debug, Default)]
pub struct MergeBuilder {
    strategy: Option<String>,
    density: Option<f32>,
    majority_sign_method: Option<String>,
    seed: Option<u64>,
}

impl MergeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy by name.
    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    /// Set the pruning density.
    pub fn density(mut self, density: f32) -> Self {
        self.density = Some(density);
        self
    }

    /// Set the sign election method by name.
    pub fn majority_sign_method(mut self, name: impl Into<String>) -> Self {
        self.majority_sign_method = Some(name.into());
        self
    }

    /// Set the random seed for the DARE strategies.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the configuration, rejecting unknown names and invalid densities.
    pub fn build(self) -> Result<MergeConfig> {
        let strategy: MergeStrategy = self
            .strategy
            .as_deref()
            .unwrap_or_default()
            .parse()?;

        let mut config = MergeConfig::new(strategy);
        config.parameters.density = self.density;
        config.parameters.seed = self.seed;
        if let Some(name) = self.majority_sign_method.as_deref() {
            config.parameters.majority_sign_method = Some(name.parse()?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Build the configuration and merge.
    pub fn run(self, task_tensors: &[ArrayD<f32>], weights: &[f32]) -> Result<ArrayD<f32>> {
        let config = self.build()?;
        merge(task_tensors, weights, &config)
    }
}
