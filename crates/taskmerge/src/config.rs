//! Configuration types for task tensor merging.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{MergeError, Result};

/// Complete merge configuration, typically loaded from YAML.
///
/// ```yaml
/// strategy: ties
/// parameters:
///   density: 0.5
///   majority_sign_method: frequency
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// The merge strategy to use.
    pub strategy: MergeStrategy,

    /// Strategy parameters.
    #[serde(default)]
    pub parameters: MergeParameters,
}

impl MergeConfig {
    /// Create a configuration with default parameters.
    pub fn new(strategy: MergeStrategy) -> Self {
        Self {
            strategy,
            parameters: MergeParameters::default(),
        }
    }

    /// Set the pruning density.
    pub fn with_density(mut self, density: f32) -> Self {
        self.parameters.density = Some(density);
        self
    }

    /// Set the sign consensus method.
    pub fn with_majority_sign_method(mut self, method: MajoritySignMethod) -> Self {
        self.parameters.majority_sign_method = Some(method);
        self
    }

    /// Set the random seed used by the DARE strategies.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.parameters.seed = Some(seed);
        self
    }

    /// Parse a configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Check parameters against the chosen strategy.
    ///
    /// Parameters the strategy does not read are accepted and reported at
    /// debug level.
    pub fn validate(&self) -> Result<()> {
        if let Some(density) = self.parameters.density {
            validate_density(density)?;
            if !self.strategy.uses_density() {
                debug!(strategy = %self.strategy, density, "density is ignored by this strategy");
            }
        }
        if self.parameters.majority_sign_method.is_some() && !self.strategy.uses_sign_consensus() {
            debug!(strategy = %self.strategy, "majority_sign_method is ignored by this strategy");
        }
        if self.parameters.seed.is_some() && !self.strategy.is_random() {
            debug!(strategy = %self.strategy, "seed is ignored by this strategy");
        }
        Ok(())
    }
}

/// Reject negative or NaN densities. Values above one are allowed.
pub(crate) fn validate_density(density: f32) -> Result<()> {
    if density.is_nan() || density < 0.0 {
        return Err(MergeError::InvalidArgument(format!(
            "density should be >= 0, got {}",
            density
        )));
    }
    Ok(())
}

/// The named merge strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Weighted sum of task tensors.
    TaskArithmetic,

    /// Magnitude pruning per task, then weighted sum.
    MagnitudePrune,

    /// Magnitude pruning, sign election and disjoint merge (Yadav et al., 2023).
    Ties,

    /// Random drop with rescale, then weighted sum (Yu et al., 2023).
    DareLinear,

    /// Random drop with rescale, sign election and disjoint merge.
    DareTies,

    /// Variance selection, energy coefficients and sign erasure.
    /// Caller-supplied weights are ignored.
    Sce,
}

impl MergeStrategy {
    /// All strategies, in documentation order.
    pub const ALL: [MergeStrategy; 6] = [
        MergeStrategy::TaskArithmetic,
        MergeStrategy::MagnitudePrune,
        MergeStrategy::Ties,
        MergeStrategy::DareLinear,
        MergeStrategy::DareTies,
        MergeStrategy::Sce,
    ];

    /// Canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            MergeStrategy::TaskArithmetic => "task_arithmetic",
            MergeStrategy::MagnitudePrune => "magnitude_prune",
            MergeStrategy::Ties => "ties",
            MergeStrategy::DareLinear => "dare_linear",
            MergeStrategy::DareTies => "dare_ties",
            MergeStrategy::Sce => "sce",
        }
    }

    /// Whether the caller's weight vector is used.
    pub fn uses_weights(self) -> bool {
        !matches!(self, MergeStrategy::Sce)
    }

    /// Whether the `density` parameter is read.
    pub fn uses_density(self) -> bool {
        !matches!(self, MergeStrategy::TaskArithmetic)
    }

    /// Whether the `majority_sign_method` parameter is read.
    pub fn uses_sign_consensus(self) -> bool {
        matches!(
            self,
            MergeStrategy::Ties | MergeStrategy::DareTies | MergeStrategy::Sce
        )
    }

    /// Whether the result depends on a random source.
    pub fn is_random(self) -> bool {
        matches!(self, MergeStrategy::DareLinear | MergeStrategy::DareTies)
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MergeStrategy {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        MergeStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| MergeError::UnknownMethod {
                kind: "merge",
                name: s.to_string(),
            })
    }
}

/// How the majority sign is elected at each position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MajoritySignMethod {
    /// Sign of the sum of raw values.
    #[default]
    Total,

    /// Sign of the sum of signs (one vote per task).
    Frequency,
}

impl MajoritySignMethod {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            MajoritySignMethod::Total => "total",
            MajoritySignMethod::Frequency => "frequency",
        }
    }
}

impl fmt::Display for MajoritySignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MajoritySignMethod {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "total" => Ok(MajoritySignMethod::Total),
            "frequency" => Ok(MajoritySignMethod::Frequency),
            other => Err(MergeError::UnknownMethod {
                kind: "majority sign",
                name: other.to_string(),
            }),
        }
    }
}

/// How elements are chosen for removal when pruning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneMethod {
    /// Keep the largest magnitudes.
    Magnitude,

    /// Keep each element independently with probability `density`.
    Random,
}

impl PruneMethod {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            PruneMethod::Magnitude => "magnitude",
            PruneMethod::Random => "random",
        }
    }
}

impl fmt::Display for PruneMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PruneMethod {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "magnitude" => Ok(PruneMethod::Magnitude),
            "random" => Ok(PruneMethod::Random),
            other => Err(MergeError::UnknownMethod {
                kind: "pruning",
                name: other.to_string(),
            }),
        }
    }
}

/// Parameters for merge strategies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeParameters {
    /// Fraction of elements to keep (0.0-1.0). Values >= 1 disable pruning.
    #[serde(default)]
    pub density: Option<f32>,

    /// Sign election method for TIES, DARE-TIES and SCE.
    #[serde(default)]
    pub majority_sign_method: Option<MajoritySignMethod>,

    /// Seed for the random drop in the DARE strategies.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl MergeParameters {
    /// Get density with default of 1.0 (no pruning).
    pub fn density(&self) -> f32 {
        self.density.unwrap_or(1.0)
    }

    /// Get majority sign method with default of `total`.
    pub fn majority_sign_method(&self) -> MajoritySignMethod {
        self.majority_sign_method.unwrap_or_default()
    }
}
