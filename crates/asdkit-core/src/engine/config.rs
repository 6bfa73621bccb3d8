use crate::core::error::PropertyError;
use crate::core::miscibility::MiscibilityMethod;
use crate::core::thermal::TgMixingLaw;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

fn check_unit(parameter: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(invalid(parameter, format!("must be between 0 and 1, got {}", value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageConditions {
    pub temperature_c: f64,
    /// Relative humidity in percent.
    pub relative_humidity: f64,
}

impl Default for StorageConditions {
    fn default() -> Self {
        Self {
            temperature_c: 25.0,
            relative_humidity: 60.0,
        }
    }
}

impl StorageConditions {
    pub fn new(temperature_c: f64, relative_humidity: f64) -> Result<Self, ConfigError> {
        if !temperature_c.is_finite() || temperature_c <= -273.15 {
            return Err(invalid(
                "temperature",
                format!("must lie above absolute zero, got {}", temperature_c),
            ));
        }
        if !relative_humidity.is_finite() || !(0.0..=100.0).contains(&relative_humidity) {
            return Err(invalid(
                "humidity",
                format!("must be between 0 and 100, got {}", relative_humidity),
            ));
        }
        Ok(Self {
            temperature_c,
            relative_humidity,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    ShortTerm,
    Intermediate,
    #[default]
    LongTerm,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [
        Timeframe::ShortTerm,
        Timeframe::Intermediate,
        Timeframe::LongTerm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::ShortTerm => "short_term",
            Timeframe::Intermediate => "intermediate",
            Timeframe::LongTerm => "long_term",
        }
    }

    /// `(thermodynamic, kinetic)` blend of the sub-scores.
    pub fn weights(&self) -> (f64, f64) {
        match self {
            Timeframe::ShortTerm => (0.3, 0.7),
            Timeframe::Intermediate => (0.5, 0.5),
            Timeframe::LongTerm => (0.7, 0.3),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                PropertyError::unknown_name(
                    "timeframe",
                    s,
                    &Self::ALL.map(|t| t.as_str()),
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityModel {
    #[default]
    RuleBased,
    ThermodynamicOnly,
    KineticOnly,
    Combined,
    MlRandomForest,
    MlSvm,
    MlNeuralNetwork,
}

impl StabilityModel {
    pub const ALL: [StabilityModel; 7] = [
        StabilityModel::RuleBased,
        StabilityModel::ThermodynamicOnly,
        StabilityModel::KineticOnly,
        StabilityModel::Combined,
        StabilityModel::MlRandomForest,
        StabilityModel::MlSvm,
        StabilityModel::MlNeuralNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityModel::RuleBased => "rule_based",
            StabilityModel::ThermodynamicOnly => "thermodynamic_only",
            StabilityModel::KineticOnly => "kinetic_only",
            StabilityModel::Combined => "combined",
            StabilityModel::MlRandomForest => "ml_random_forest",
            StabilityModel::MlSvm => "ml_svm",
            StabilityModel::MlNeuralNetwork => "ml_neural_network",
        }
    }

    pub fn is_machine_learning(&self) -> bool {
        matches!(
            self,
            StabilityModel::MlRandomForest | StabilityModel::MlSvm | StabilityModel::MlNeuralNetwork
        )
    }

    /// Static confidence reported with every result of this model.
    ///
    /// Machine-learning variants report the confidence of the rule-based model they fall
    /// back to.
    pub fn confidence(&self) -> f64 {
        match self {
            StabilityModel::ThermodynamicOnly | StabilityModel::KineticOnly => 0.6,
            StabilityModel::Combined => 0.75,
            _ => 0.7,
        }
    }

    pub fn default_weights(&self) -> FactorWeights {
        match self {
            StabilityModel::ThermodynamicOnly
            | StabilityModel::KineticOnly
            | StabilityModel::Combined => FactorWeights {
                tg: 0.40,
                miscibility: 0.40,
                loading: 0.20,
                hygroscopicity: 0.40,
                crystallization: 0.40,
                process: 0.20,
            },
            _ => FactorWeights::default(),
        }
    }
}

impl fmt::Display for StabilityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StabilityModel {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| {
                PropertyError::unknown_name("model type", s, &Self::ALL.map(|m| m.as_str()))
            })
    }
}

/// Relative weights of the six stability factors.
///
/// Each sub-score renormalises its three weights, so only their ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FactorWeights {
    pub tg: f64,
    pub miscibility: f64,
    pub loading: f64,
    pub hygroscopicity: f64,
    pub crystallization: f64,
    pub process: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            tg: 0.25,
            miscibility: 0.25,
            loading: 0.15,
            hygroscopicity: 0.15,
            crystallization: 0.10,
            process: 0.10,
        }
    }
}

impl FactorWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, w) in [
            ("weights.tg", self.tg),
            ("weights.miscibility", self.miscibility),
            ("weights.loading", self.loading),
            ("weights.hygroscopicity", self.hygroscopicity),
            ("weights.crystallization", self.crystallization),
            ("weights.process", self.process),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(invalid(name, format!("must be a non-negative number, got {}", w)));
            }
        }
        if self.tg + self.miscibility + self.loading <= 0.0 {
            return Err(invalid("weights", "thermodynamic weights sum to zero"));
        }
        if self.hygroscopicity + self.crystallization + self.process <= 0.0 {
            return Err(invalid("weights", "kinetic weights sum to zero"));
        }
        Ok(())
    }
}

/// Constants of the manufacturing-process heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProcessFactors {
    pub hot_melt_suitable: f64,
    pub hot_melt_challenging: f64,
    pub hot_melt_max_melting_point_c: f64,
    pub hot_melt_max_mixture_tg_c: f64,
    pub spray_drying: f64,
    pub other: f64,
}

impl Default for ProcessFactors {
    fn default() -> Self {
        Self {
            hot_melt_suitable: 0.9,
            hot_melt_challenging: 0.5,
            hot_melt_max_melting_point_c: 250.0,
            hot_melt_max_mixture_tg_c: 100.0,
            spray_drying: 0.8,
            other: 0.7,
        }
    }
}

/// Monotonic score-to-months table: the first rung whose threshold the score exceeds wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShelfLifeLadder {
    rungs: Vec<(f64, u32)>,
    floor_months: u32,
}

impl Default for ShelfLifeLadder {
    fn default() -> Self {
        Self {
            rungs: vec![(0.8, 36), (0.6, 24), (0.4, 12), (0.2, 6)],
            floor_months: 3,
        }
    }
}

impl ShelfLifeLadder {
    pub fn new(mut rungs: Vec<(f64, u32)>, floor_months: u32) -> Result<Self, ConfigError> {
        rungs.sort_by(|a, b| b.0.total_cmp(&a.0));
        let mut previous_months = u32::MAX;
        for &(threshold, months) in &rungs {
            check_unit("shelf_life.threshold", threshold)?;
            if months > previous_months {
                return Err(invalid(
                    "shelf_life",
                    "months must not increase as the score threshold drops",
                ));
            }
            previous_months = months;
        }
        if floor_months > previous_months {
            return Err(invalid("shelf_life", "floor exceeds the lowest rung"));
        }
        Ok(Self {
            rungs,
            floor_months,
        })
    }

    /// Nine-rung ladder reaching 48 months above 0.9.
    pub fn extended() -> Self {
        Self {
            rungs: vec![
                (0.9, 48),
                (0.8, 36),
                (0.7, 30),
                (0.6, 24),
                (0.5, 18),
                (0.4, 12),
                (0.3, 9),
                (0.2, 6),
            ],
            floor_months: 3,
        }
    }

    pub fn months(&self, score: f64) -> u32 {
        self.rungs
            .iter()
            .find(|(threshold, _)| score > *threshold)
            .map(|(_, months)| *months)
            .unwrap_or(self.floor_months)
    }

    pub fn rungs(&self) -> &[(f64, u32)] {
        &self.rungs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub model: StabilityModel,
    pub weights: FactorWeights,
    pub mixing_law: TgMixingLaw,
    pub miscibility: MiscibilityMethod,
    /// Tg excess over storage temperature that earns a full Tg-margin score.
    pub tg_margin_span_c: f64,
    pub process: ProcessFactors,
    pub shelf_life: ShelfLifeLadder,
    /// Missing solubility parameters fail the evaluation instead of scoring a neutral 0.5.
    pub require_miscibility: bool,
}

impl ScoringConfig {
    /// Checks the constants every factor score divides or clamps by.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        if !(self.tg_margin_span_c.is_finite() && self.tg_margin_span_c > 0.0) {
            return Err(invalid(
                "tg_margin_span",
                format!("must be positive, got {}", self.tg_margin_span_c),
            ));
        }

        if let TgMixingLaw::GordonTaylor(gt) = &self.mixing_law {
            if let Some(k) = gt.k {
                if !(k.is_finite() && k > 0.0) {
                    return Err(invalid("gordon_taylor_k", format!("must be positive, got {}", k)));
                }
            }
        }

        for (name, value) in [
            ("process.hot_melt_suitable", self.process.hot_melt_suitable),
            ("process.hot_melt_challenging", self.process.hot_melt_challenging),
            ("process.spray_drying", self.process.spray_drying),
            ("process.other", self.process.other),
        ] {
            check_unit(name, value)?;
        }
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            model: StabilityModel::RuleBased,
            weights: FactorWeights::default(),
            mixing_law: TgMixingLaw::default(),
            miscibility: MiscibilityMethod::default(),
            tg_margin_span_c: 50.0,
            process: ProcessFactors::default(),
            shelf_life: ShelfLifeLadder::default(),
            require_miscibility: true,
        }
    }
}

#[derive(Default)]
pub struct ScoringConfigBuilder {
    model: Option<StabilityModel>,
    weights: Option<FactorWeights>,
    mixing_law: Option<TgMixingLaw>,
    miscibility: Option<MiscibilityMethod>,
    tg_margin_span_c: Option<f64>,
    process: Option<ProcessFactors>,
    shelf_life: Option<ShelfLifeLadder>,
    require_miscibility: Option<bool>,
}

impl ScoringConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: StabilityModel) -> Self {
        self.model = Some(model);
        self
    }
    /// Overrides the model's default weights.
    pub fn weights(mut self, weights: FactorWeights) -> Self {
        self.weights = Some(weights);
        self
    }
    pub fn mixing_law(mut self, law: TgMixingLaw) -> Self {
        self.mixing_law = Some(law);
        self
    }
    pub fn miscibility(mut self, method: MiscibilityMethod) -> Self {
        self.miscibility = Some(method);
        self
    }
    pub fn tg_margin_span_c(mut self, span: f64) -> Self {
        self.tg_margin_span_c = Some(span);
        self
    }
    pub fn process_factors(mut self, factors: ProcessFactors) -> Self {
        self.process = Some(factors);
        self
    }
    pub fn shelf_life(mut self, ladder: ShelfLifeLadder) -> Self {
        self.shelf_life = Some(ladder);
        self
    }
    pub fn require_miscibility(mut self, required: bool) -> Self {
        self.require_miscibility = Some(required);
        self
    }

    pub fn build(self) -> Result<ScoringConfig, ConfigError> {
        let model = self.model.unwrap_or_default();
        let config = ScoringConfig {
            model,
            weights: self.weights.unwrap_or_else(|| model.default_weights()),
            mixing_law: self.mixing_law.unwrap_or_default(),
            miscibility: self.miscibility.unwrap_or_default(),
            tg_margin_span_c: self.tg_margin_span_c.unwrap_or(50.0),
            process: self.process.unwrap_or_default(),
            shelf_life: self.shelf_life.unwrap_or_default(),
            require_miscibility: self.require_miscibility.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    Grid,
    #[default]
    Binary,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Grid => "grid",
            SearchStrategy::Binary => "binary",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" | "grid_search" => Ok(SearchStrategy::Grid),
            "binary" | "binary_search" => Ok(SearchStrategy::Binary),
            _ => Err(PropertyError::unknown_name(
                "search strategy",
                s,
                &["grid", "binary"],
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Inclusive `(min, max)` API weight fractions.
    pub loading_range: (f64, f64),
    pub min_stability: f64,
    pub strategy: SearchStrategy,
    pub grid_points: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub conditions: StorageConditions,
    pub timeframe: Timeframe,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            loading_range: (0.1, 0.5),
            min_stability: 0.7,
            strategy: SearchStrategy::Binary,
            grid_points: 9,
            max_iterations: 10,
            tolerance: 0.01,
            conditions: StorageConditions::default(),
            timeframe: Timeframe::LongTerm,
        }
    }
}

/// Builds an [`OptimizerConfig`]; the stability threshold is required.
#[derive(Default)]
pub struct OptimizerConfigBuilder {
    loading_range: Option<(f64, f64)>,
    min_stability: Option<f64>,
    strategy: Option<SearchStrategy>,
    grid_points: Option<usize>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
    conditions: Option<StorageConditions>,
    timeframe: Option<Timeframe>,
}

impl OptimizerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loading_range(mut self, min: f64, max: f64) -> Self {
        self.loading_range = Some((min, max));
        self
    }
    pub fn min_stability(mut self, threshold: f64) -> Self {
        self.min_stability = Some(threshold);
        self
    }
    pub fn strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
    pub fn grid_points(mut self, n: usize) -> Self {
        self.grid_points = Some(n);
        self
    }
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn conditions(mut self, conditions: StorageConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    pub fn build(self) -> Result<OptimizerConfig, ConfigError> {
        let defaults = OptimizerConfig::default();
        let (min, max) = self.loading_range.unwrap_or(defaults.loading_range);
        check_unit("loading_range.min", min)?;
        check_unit("loading_range.max", max)?;
        if min >= max {
            return Err(invalid(
                "loading_range",
                format!("min ({}) must be below max ({})", min, max),
            ));
        }

        let min_stability = check_unit(
            "min_stability",
            self.min_stability
                .ok_or(ConfigError::MissingParameter("min_stability"))?,
        )?;

        let grid_points = self.grid_points.unwrap_or(defaults.grid_points);
        if grid_points < 2 {
            return Err(invalid("grid_points", "need at least the two endpoints"));
        }
        let max_iterations = self.max_iterations.unwrap_or(defaults.max_iterations);
        if max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        let tolerance = self.tolerance.unwrap_or(defaults.tolerance);
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(invalid("tolerance", format!("must be positive, got {}", tolerance)));
        }

        Ok(OptimizerConfig {
            loading_range: (min, max),
            min_stability,
            strategy: self.strategy.unwrap_or(defaults.strategy),
            grid_points,
            max_iterations,
            tolerance,
            conditions: self.conditions.unwrap_or(defaults.conditions),
            timeframe: self.timeframe.unwrap_or(defaults.timeframe),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel { max_workers: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Parallel { max_workers: 4 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningConfig {
    pub drug_loading: f64,
    pub execution: ExecutionMode,
    /// Candidates that would start after this much wall time are recorded as timed out.
    pub timeout: Option<Duration>,
    pub conditions: StorageConditions,
    pub timeframe: Timeframe,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            drug_loading: 0.3,
            execution: ExecutionMode::default(),
            timeout: None,
            conditions: StorageConditions::default(),
            timeframe: Timeframe::LongTerm,
        }
    }
}

/// Builds a [`ScreeningConfig`]; the drug loading is required.
#[derive(Default)]
pub struct ScreeningConfigBuilder {
    drug_loading: Option<f64>,
    execution: Option<ExecutionMode>,
    timeout: Option<Duration>,
    conditions: Option<StorageConditions>,
    timeframe: Option<Timeframe>,
}

impl ScreeningConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drug_loading(mut self, loading: f64) -> Self {
        self.drug_loading = Some(loading);
        self
    }
    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.execution = Some(mode);
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
    pub fn conditions(mut self, conditions: StorageConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }
    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    pub fn build(self) -> Result<ScreeningConfig, ConfigError> {
        let drug_loading = check_unit(
            "drug_loading",
            self.drug_loading
                .ok_or(ConfigError::MissingParameter("drug_loading"))?,
        )?;
        let execution = self.execution.unwrap_or_default();
        if let ExecutionMode::Parallel { max_workers: 0 } = execution {
            return Err(invalid("max_workers", "must be at least 1"));
        }
        Ok(ScreeningConfig {
            drug_loading,
            execution,
            timeout: self.timeout,
            conditions: self.conditions.unwrap_or_default(),
            timeframe: self.timeframe.unwrap_or_default(),
        })
    }
}
