//! The stability scorer, the evaluation primitive every workflow is built on.
//!
//! Six factor scores in `[0, 1]` are combined into a thermodynamic sub-score (Tg margin,
//! miscibility, drug loading) and a kinetic sub-score (polymer hygroscopicity, API
//! crystallization tendency, manufacturing process). The storage timeframe decides how
//! the two are blended into the overall score.
//!
//! Optional inputs that are commonly unavailable fall back to a neutral 0.5 with a
//! `warn!` event and are listed in [`StabilityResult::defaulted_factors`]. The reported
//! confidence is a fixed constant per model and does not reflect those substitutions.

use super::config::{
    ConfigError, FactorWeights, ScoringConfig, StabilityModel, StorageConditions, Timeframe,
};
use super::error::EngineError;
use crate::core::miscibility::MiscibilityMethod;
use crate::core::models::formulation::{Formulation, ProcessMethod};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const NEUTRAL_SCORE: f64 = 0.5;
const MAJOR_FACTOR_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityFactor {
    GlassTransition,
    Miscibility,
    DrugLoading,
    Hygroscopicity,
    Crystallization,
    Process,
}

impl StabilityFactor {
    pub const ALL: [StabilityFactor; 6] = [
        StabilityFactor::GlassTransition,
        StabilityFactor::Miscibility,
        StabilityFactor::DrugLoading,
        StabilityFactor::Hygroscopicity,
        StabilityFactor::Crystallization,
        StabilityFactor::Process,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StabilityFactor::GlassTransition => "Glass transition temperature",
            StabilityFactor::Miscibility => "API-polymer miscibility",
            StabilityFactor::DrugLoading => "Drug loading",
            StabilityFactor::Hygroscopicity => "Polymer hygroscopicity",
            StabilityFactor::Crystallization => "API crystallization tendency",
            StabilityFactor::Process => "Manufacturing process",
        }
    }

    fn is_thermodynamic(&self) -> bool {
        matches!(
            self,
            StabilityFactor::GlassTransition
                | StabilityFactor::Miscibility
                | StabilityFactor::DrugLoading
        )
    }
}

impl fmt::Display for StabilityFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorScore {
    pub factor: StabilityFactor,
    pub score: f64,
}

/// Mixture-level predictions the scorer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Predictions {
    pub mixture_tg_c: Option<f64>,
    pub miscibility: Option<f64>,
}

/// The six factor scores of one formulation, in [`StabilityFactor::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorScores {
    scores: [f64; 6],
    defaulted: Vec<StabilityFactor>,
}

impl FactorScores {
    pub fn get(&self, factor: StabilityFactor) -> f64 {
        self.scores[factor as usize]
    }

    pub fn defaulted(&self) -> &[StabilityFactor] {
        &self.defaulted
    }

    fn weighted_mean(&self, weights: &FactorWeights, thermodynamic: bool) -> f64 {
        let (numerator, denominator) = StabilityFactor::ALL
            .iter()
            .filter(|f| f.is_thermodynamic() == thermodynamic)
            .fold((0.0, 0.0), |(num, den), f| {
                let w = weight_of(weights, *f);
                (num + w * self.get(*f), den + w)
            });
        (numerator / denominator).clamp(0.0, 1.0)
    }

    pub fn thermodynamic(&self, weights: &FactorWeights) -> f64 {
        self.weighted_mean(weights, true)
    }

    pub fn kinetic(&self, weights: &FactorWeights) -> f64 {
        self.weighted_mean(weights, false)
    }

    /// Up to three lowest-scoring factors among `candidates`, ascending.
    fn lowest(&self, candidates: &[StabilityFactor]) -> Vec<FactorScore> {
        let mut ranked: Vec<FactorScore> = candidates
            .iter()
            .map(|&factor| FactorScore {
                factor,
                score: self.get(factor),
            })
            .collect();
        ranked.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.factor.cmp(&b.factor)));
        ranked.truncate(MAJOR_FACTOR_COUNT);
        ranked
    }
}

fn weight_of(weights: &FactorWeights, factor: StabilityFactor) -> f64 {
    match factor {
        StabilityFactor::GlassTransition => weights.tg,
        StabilityFactor::Miscibility => weights.miscibility,
        StabilityFactor::DrugLoading => weights.loading,
        StabilityFactor::Hygroscopicity => weights.hygroscopicity,
        StabilityFactor::Crystallization => weights.crystallization,
        StabilityFactor::Process => weights.process,
    }
}

/// Substitutes `default` for an unavailable optional input and records the substitution.
fn resolve(
    value: Option<f64>,
    default: f64,
    factor: StabilityFactor,
    defaulted: &mut Vec<StabilityFactor>,
) -> f64 {
    match value {
        Some(v) => v,
        None => {
            defaulted.push(factor);
            default
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityResult {
    pub score: f64,
    pub thermodynamic: f64,
    pub kinetic: f64,
    pub confidence: f64,
    pub major_factors: Vec<FactorScore>,
    pub shelf_life_months: u32,
    pub model: StabilityModel,
    pub timeframe: Timeframe,
    /// Factors scored with the neutral default because an input was unavailable.
    pub defaulted_factors: Vec<StabilityFactor>,
    /// Set when a machine-learning model fell back to the rule-based computation.
    pub fallback_model: Option<StabilityModel>,
}

/// Descriptor of a trained model attached to a machine-learning variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Persisted description of a scorer: its model variant and factor weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModelMetadata {
    pub model_type: StabilityModel,
    pub weights: FactorWeights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trained_model: Option<TrainedModel>,
}

#[derive(Debug, Clone)]
pub struct StabilityScorer {
    config: ScoringConfig,
    trained_model: Option<TrainedModel>,
}

impl StabilityScorer {
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            trained_model: None,
        })
    }

    pub fn with_trained_model(mut self, model: TrainedModel) -> Self {
        self.trained_model = Some(model);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn model(&self) -> StabilityModel {
        self.config.model
    }

    pub fn trained_model(&self) -> Option<&TrainedModel> {
        self.trained_model.as_ref()
    }

    /// Mixture Tg under the configured law, `None` when either component Tg is unknown.
    pub fn predict_tg(&self, formulation: &Formulation) -> Result<Option<f64>, EngineError> {
        let (api, polymer) = (formulation.api(), formulation.polymer());
        match (api.glass_transition_c(), polymer.glass_transition_c()) {
            (Some(tg_api), Some(tg_polymer)) => Ok(Some(self.config.mixing_law.estimate(
                tg_api,
                tg_polymer,
                formulation.drug_loading(),
            )?)),
            _ => {
                warn!(
                    api = api.name(),
                    polymer = polymer.name(),
                    "Glass transition temperature unavailable; Tg margin falls back to neutral."
                );
                Ok(None)
            }
        }
    }

    /// Miscibility under the configured method.
    ///
    /// Missing solubility parameters fail when `require_miscibility` is set and yield
    /// `None` otherwise.
    pub fn predict_miscibility(
        &self,
        formulation: &Formulation,
    ) -> Result<Option<f64>, EngineError> {
        self.estimate_miscibility(&self.config.miscibility, formulation)
    }

    fn estimate_miscibility(
        &self,
        method: &MiscibilityMethod,
        formulation: &Formulation,
    ) -> Result<Option<f64>, EngineError> {
        match method.estimate(formulation.api(), formulation.polymer()) {
            Ok(score) => Ok(Some(score)),
            Err(e) if !self.config.require_miscibility => {
                warn!(error = %e, "Miscibility unavailable; falling back to neutral.");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn predictions(&self, formulation: &Formulation) -> Result<Predictions, EngineError> {
        Ok(Predictions {
            mixture_tg_c: self.predict_tg(formulation)?,
            miscibility: self.predict_miscibility(formulation)?,
        })
    }

    /// Scores a formulation from scratch.
    pub fn score(
        &self,
        formulation: &Formulation,
        conditions: &StorageConditions,
        timeframe: Timeframe,
    ) -> Result<StabilityResult, EngineError> {
        let predictions = self.predictions(formulation)?;
        self.score_with(formulation, &predictions, conditions, timeframe)
    }

    /// Scores a formulation from already computed mixture predictions.
    pub fn score_with(
        &self,
        formulation: &Formulation,
        predictions: &Predictions,
        conditions: &StorageConditions,
        timeframe: Timeframe,
    ) -> Result<StabilityResult, EngineError> {
        let model = self.config.model;
        if model.is_machine_learning() {
            let Some(trained) = &self.trained_model else {
                return Err(EngineError::ModelNotTrained {
                    model: model.to_string(),
                });
            };
            warn!(
                model = %model,
                trained_model = %trained.name,
                "Machine-learning inference is not available; falling back to the rule-based model."
            );
        }

        let factors = self.factor_scores(formulation, predictions, conditions);
        let weights = &self.config.weights;
        let thermodynamic = factors.thermodynamic(weights);
        let kinetic = factors.kinetic(weights);

        let (score, thermodynamic, kinetic, major_factors) = match model {
            StabilityModel::ThermodynamicOnly => {
                let own = [
                    StabilityFactor::GlassTransition,
                    StabilityFactor::Miscibility,
                    StabilityFactor::DrugLoading,
                ];
                (thermodynamic, thermodynamic, NEUTRAL_SCORE, factors.lowest(&own))
            }
            StabilityModel::KineticOnly => {
                let own = [
                    StabilityFactor::Hygroscopicity,
                    StabilityFactor::Crystallization,
                    StabilityFactor::Process,
                ];
                (kinetic, NEUTRAL_SCORE, kinetic, factors.lowest(&own))
            }
            _ => {
                let (thermo_weight, kinetic_weight) = timeframe.weights();
                let overall = thermo_weight * thermodynamic + kinetic_weight * kinetic;
                (
                    overall,
                    thermodynamic,
                    kinetic,
                    factors.lowest(&StabilityFactor::ALL),
                )
            }
        };
        let score = score.clamp(0.0, 1.0);

        let result = StabilityResult {
            score,
            thermodynamic,
            kinetic,
            confidence: model.confidence(),
            major_factors,
            shelf_life_months: self.config.shelf_life.months(score),
            model,
            timeframe,
            defaulted_factors: factors.defaulted().to_vec(),
            fallback_model: model
                .is_machine_learning()
                .then_some(StabilityModel::RuleBased),
        };
        debug!(
            formulation = %formulation,
            score = result.score,
            shelf_life_months = result.shelf_life_months,
            "Scored formulation."
        );
        Ok(result)
    }

    pub fn factor_scores(
        &self,
        formulation: &Formulation,
        predictions: &Predictions,
        conditions: &StorageConditions,
    ) -> FactorScores {
        let api = formulation.api();
        let polymer = formulation.polymer();
        let mut defaulted = Vec::new();

        let tg_margin = predictions.mixture_tg_c.map(|tg| {
            ((tg - conditions.temperature_c) / self.config.tg_margin_span_c).clamp(0.0, 1.0)
        });
        let tg = resolve(
            tg_margin,
            NEUTRAL_SCORE,
            StabilityFactor::GlassTransition,
            &mut defaulted,
        );
        let miscibility = resolve(
            predictions.miscibility.map(|m| m.clamp(0.0, 1.0)),
            NEUTRAL_SCORE,
            StabilityFactor::Miscibility,
            &mut defaulted,
        );
        let loading = formulation.polymer_fraction().clamp(0.0, 1.0);
        let hygroscopicity = resolve(
            polymer
                .hygroscopicity()
                .map(|h| (1.0 - h * conditions.relative_humidity / 100.0).clamp(0.0, 1.0)),
            NEUTRAL_SCORE,
            StabilityFactor::Hygroscopicity,
            &mut defaulted,
        );
        let crystallization = resolve(
            api.crystallization_tendency().map(|c| 1.0 - c),
            NEUTRAL_SCORE,
            StabilityFactor::Crystallization,
            &mut defaulted,
        );
        let process = self.process_factor(formulation, predictions, &mut defaulted);

        if !defaulted.is_empty() {
            warn!(
                formulation = %formulation,
                defaulted = ?defaulted,
                "Neutral defaults substituted for unavailable inputs."
            );
        }

        FactorScores {
            scores: [tg, miscibility, loading, hygroscopicity, crystallization, process],
            defaulted,
        }
    }

    fn process_factor(
        &self,
        formulation: &Formulation,
        predictions: &Predictions,
        defaulted: &mut Vec<StabilityFactor>,
    ) -> f64 {
        let factors = &self.config.process;
        match formulation.process() {
            Some(ProcessMethod::HotMeltExtrusion) => {
                let suitability = formulation
                    .api()
                    .melting_point_c()
                    .zip(predictions.mixture_tg_c)
                    .map(|(melting_point, tg)| {
                        if melting_point > factors.hot_melt_max_melting_point_c
                            || tg > factors.hot_melt_max_mixture_tg_c
                        {
                            factors.hot_melt_challenging
                        } else {
                            factors.hot_melt_suitable
                        }
                    });
                resolve(suitability, factors.other, StabilityFactor::Process, defaulted)
            }
            Some(ProcessMethod::SprayDrying) => factors.spray_drying,
            _ => factors.other,
        }
    }

    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            model_type: self.config.model,
            weights: self.config.weights,
            trained_model: self.trained_model.clone(),
        }
    }

    pub fn save_metadata(&self, path: &Path) -> Result<(), EngineError> {
        let path_str = path.to_string_lossy().to_string();
        let content = toml::to_string_pretty(&self.metadata()).map_err(|e| {
            EngineError::ModelMetadata {
                path: path_str.clone(),
                message: e.to_string(),
            }
        })?;
        std::fs::write(path, content).map_err(|e| EngineError::ModelMetadata {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Rebuilds a scorer from saved metadata on top of `base`.
    pub fn load_metadata(path: &Path, base: ScoringConfig) -> Result<Self, EngineError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| EngineError::ModelMetadata {
            path: path_str.clone(),
            message: e.to_string(),
        })?;
        let metadata: ModelMetadata =
            toml::from_str(&content).map_err(|e| EngineError::ModelMetadata {
                path: path_str,
                message: e.to_string(),
            })?;
        let config = ScoringConfig {
            model: metadata.model_type,
            weights: metadata.weights,
            ..base
        };
        config.validate()?;
        Ok(Self {
            config,
            trained_model: metadata.trained_model,
        })
    }
}

impl Default for StabilityScorer {
    fn default() -> Self {
        Self {
            config: ScoringConfig::default(),
            trained_model: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PropertyError;
    use crate::core::models::formulation::ProcessParameters;
    use crate::core::models::substance::{
        HansenParameters, SubstanceKind, SubstanceProperties,
    };
    use crate::engine::config::ScoringConfigBuilder;
    use proptest::prelude::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ibuprofen() -> Arc<SubstanceProperties> {
        Arc::new(
            SubstanceProperties::builder("ibuprofen", SubstanceKind::Api)
                .glass_transition_c(-45.0)
                .melting_point_c(76.0)
                .solubility_parameters(HansenParameters::new(18.2, 3.8, 8.0).unwrap())
                .crystallization_tendency(0.4)
                .build()
                .unwrap(),
        )
    }

    fn pvp() -> Arc<SubstanceProperties> {
        Arc::new(
            SubstanceProperties::builder("PVP K30", SubstanceKind::Polymer)
                .glass_transition_c(149.0)
                .solubility_parameters(HansenParameters::new(17.0, 8.0, 12.0).unwrap())
                .hygroscopicity(0.8)
                .build()
                .unwrap(),
        )
    }

    fn bare_polymer() -> Arc<SubstanceProperties> {
        Arc::new(
            SubstanceProperties::builder("bare", SubstanceKind::Polymer)
                .build()
                .unwrap(),
        )
    }

    fn formulation(loading: f64) -> Formulation {
        Formulation::new(ibuprofen(), pvp(), loading).unwrap()
    }

    fn scorer(model: StabilityModel) -> StabilityScorer {
        StabilityScorer::new(ScoringConfigBuilder::new().model(model).build().unwrap()).unwrap()
    }

    #[test]
    fn rule_based_score_matches_hand_computed_factors() {
        let f = formulation(0.3);
        let scorer = StabilityScorer::default();
        let conditions = StorageConditions::default();
        let predictions = scorer.predictions(&f).unwrap();
        let result = scorer
            .score_with(&f, &predictions, &conditions, Timeframe::LongTerm)
            .unwrap();

        let tg = predictions.mixture_tg_c.unwrap();
        let tg_factor = ((tg - 25.0) / 50.0).clamp(0.0, 1.0);
        let miscibility = 1.0 - 39.4f64.sqrt() / 10.0;
        let thermo = (0.25 * tg_factor + 0.25 * miscibility + 0.15 * 0.7) / 0.65;
        let kinetic = (0.15 * (1.0 - 0.8 * 0.6) + 0.10 * 0.6 + 0.10 * 0.7) / 0.35;

        assert!((result.thermodynamic - thermo).abs() < 1e-12);
        assert!((result.kinetic - kinetic).abs() < 1e-12);
        assert!((result.score - (0.7 * thermo + 0.3 * kinetic)).abs() < 1e-12);
        assert_eq!(result.confidence, 0.7);
        assert!(result.defaulted_factors.is_empty());
        assert_eq!(result.fallback_model, None);
    }

    #[test]
    fn major_factors_are_three_lowest_in_ascending_order() {
        let result = StabilityScorer::default()
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap();
        assert_eq!(result.major_factors.len(), 3);
        assert!(
            result
                .major_factors
                .windows(2)
                .all(|w| w[0].score <= w[1].score)
        );
        assert_eq!(result.major_factors[0].factor, StabilityFactor::Miscibility);
    }

    #[test]
    fn timeframe_shifts_weight_between_sub_scores() {
        let scorer = StabilityScorer::default();
        let f = formulation(0.3);
        let conditions = StorageConditions::default();
        let short = scorer.score(&f, &conditions, Timeframe::ShortTerm).unwrap();
        let mid = scorer.score(&f, &conditions, Timeframe::Intermediate).unwrap();
        assert!((short.score - (0.3 * short.thermodynamic + 0.7 * short.kinetic)).abs() < 1e-12);
        assert!((mid.score - 0.5 * (mid.thermodynamic + mid.kinetic)).abs() < 1e-12);
    }

    #[test]
    fn missing_optional_inputs_fall_back_to_neutral_and_are_reported() {
        let api = Arc::new(
            SubstanceProperties::builder("unknown api", SubstanceKind::Api)
                .solubility_parameters(HansenParameters::new(18.0, 5.0, 8.0).unwrap())
                .build()
                .unwrap(),
        );
        let polymer = Arc::new(
            SubstanceProperties::builder("unknown polymer", SubstanceKind::Polymer)
                .solubility_parameters(HansenParameters::new(18.0, 5.0, 8.0).unwrap())
                .build()
                .unwrap(),
        );
        let f = Formulation::new(api, polymer, 0.2).unwrap();
        let scorer = StabilityScorer::default();
        let factors = scorer.factor_scores(
            &f,
            &scorer.predictions(&f).unwrap(),
            &StorageConditions::default(),
        );

        assert_eq!(factors.get(StabilityFactor::GlassTransition), 0.5);
        assert_eq!(factors.get(StabilityFactor::Hygroscopicity), 0.5);
        assert_eq!(factors.get(StabilityFactor::Crystallization), 0.5);
        assert_eq!(factors.get(StabilityFactor::Miscibility), 1.0);
        assert_eq!(
            factors.defaulted(),
            &[
                StabilityFactor::GlassTransition,
                StabilityFactor::Hygroscopicity,
                StabilityFactor::Crystallization,
            ]
        );
    }

    #[test]
    fn scorer_rejects_hand_built_config_that_would_score_nan() {
        let config = ScoringConfig {
            tg_margin_span_c: 0.0,
            ..ScoringConfig::default()
        };
        assert!(matches!(
            StabilityScorer::new(config),
            Err(ConfigError::InvalidValue { .. })
        ));

        let zero_weights = ScoringConfig {
            weights: FactorWeights {
                tg: 0.0,
                miscibility: 0.0,
                loading: 0.0,
                ..FactorWeights::default()
            },
            ..ScoringConfig::default()
        };
        assert!(StabilityScorer::new(zero_weights).is_err());
        assert!(StabilityScorer::new(ScoringConfig::default()).is_ok());
    }

    #[test]
    fn hydrophilic_polymer_without_measured_hygroscopicity_is_not_defaulted() {
        let polymer = Arc::new(
            SubstanceProperties::builder("hydrophilic polymer", SubstanceKind::Polymer)
                .solubility_parameters(HansenParameters::new(18.0, 5.0, 8.0).unwrap())
                .hydrophilicity(0.9)
                .build()
                .unwrap(),
        );
        let f = Formulation::new(ibuprofen(), polymer, 0.2).unwrap();
        let scorer = StabilityScorer::default();
        let factors = scorer.factor_scores(
            &f,
            &scorer.predictions(&f).unwrap(),
            &StorageConditions::default(),
        );

        let expected = 1.0 - 0.82 * StorageConditions::default().relative_humidity / 100.0;
        assert!((factors.get(StabilityFactor::Hygroscopicity) - expected).abs() < 1e-12);
        assert!(!factors.defaulted().contains(&StabilityFactor::Hygroscopicity));
    }

    #[test]
    fn missing_solubility_parameters_fail_when_miscibility_is_required() {
        let f = Formulation::new(ibuprofen(), bare_polymer(), 0.3).unwrap();
        let err = StabilityScorer::default()
            .score(&f, &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Property(PropertyError::MissingParameter { .. })
        ));
    }

    #[test]
    fn missing_solubility_parameters_score_neutral_when_miscibility_is_optional() {
        let f = Formulation::new(ibuprofen(), bare_polymer(), 0.3).unwrap();
        let scorer = StabilityScorer::new(
            ScoringConfigBuilder::new()
                .require_miscibility(false)
                .build()
                .unwrap(),
        )
        .unwrap();
        let result = scorer
            .score(&f, &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap();
        assert!(result.defaulted_factors.contains(&StabilityFactor::Miscibility));
    }

    #[test]
    fn hot_melt_extrusion_is_suitable_for_low_melting_api_and_low_tg_mixture() {
        let f = formulation(0.8).with_process(ProcessMethod::HotMeltExtrusion, ProcessParameters::new());
        let scorer = StabilityScorer::default();
        let predictions = scorer.predictions(&f).unwrap();
        assert!(predictions.mixture_tg_c.unwrap() <= 100.0);
        let factors = scorer.factor_scores(&f, &predictions, &StorageConditions::default());
        assert_eq!(factors.get(StabilityFactor::Process), 0.9);

        let hot = Predictions {
            mixture_tg_c: Some(120.0),
            ..predictions
        };
        let factors = scorer.factor_scores(&f, &hot, &StorageConditions::default());
        assert_eq!(factors.get(StabilityFactor::Process), 0.5);
    }

    #[test]
    fn spray_drying_and_unspecified_process_use_flat_scores() {
        let scorer = StabilityScorer::default();
        let conditions = StorageConditions::default();
        let sprayed = formulation(0.3).with_process(ProcessMethod::SprayDrying, ProcessParameters::new());
        let p = scorer.predictions(&sprayed).unwrap();
        assert_eq!(
            scorer.factor_scores(&sprayed, &p, &conditions).get(StabilityFactor::Process),
            0.8
        );
        let plain = formulation(0.3);
        assert_eq!(
            scorer.factor_scores(&plain, &p, &conditions).get(StabilityFactor::Process),
            0.7
        );
    }

    #[test]
    fn thermodynamic_only_reports_neutral_kinetic_and_lower_confidence() {
        let result = scorer(StabilityModel::ThermodynamicOnly)
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::ShortTerm)
            .unwrap();
        assert_eq!(result.kinetic, 0.5);
        assert_eq!(result.score, result.thermodynamic);
        assert_eq!(result.confidence, 0.6);
        assert!(result.major_factors.iter().all(|f| f.factor.is_thermodynamic()));
    }

    #[test]
    fn kinetic_only_reports_neutral_thermodynamic() {
        let result = scorer(StabilityModel::KineticOnly)
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap();
        assert_eq!(result.thermodynamic, 0.5);
        assert_eq!(result.score, result.kinetic);
        assert!(result.major_factors.iter().all(|f| !f.factor.is_thermodynamic()));
    }

    #[test]
    fn combined_model_reports_higher_confidence() {
        let result = scorer(StabilityModel::Combined)
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap();
        assert_eq!(result.confidence, 0.75);
    }

    #[test]
    fn untrained_machine_learning_model_fails() {
        let err = scorer(StabilityModel::MlRandomForest)
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap_err();
        assert!(matches!(err, EngineError::ModelNotTrained { model } if model == "ml_random_forest"));
    }

    #[test]
    fn trained_machine_learning_model_falls_back_and_says_so() {
        let ml = scorer(StabilityModel::MlSvm).with_trained_model(TrainedModel {
            name: "svm-2024".to_string(),
            path: None,
        });
        let result = ml
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap();
        let baseline = StabilityScorer::default()
            .score(&formulation(0.3), &StorageConditions::default(), Timeframe::LongTerm)
            .unwrap();
        assert_eq!(result.model, StabilityModel::MlSvm);
        assert_eq!(result.fallback_model, Some(StabilityModel::RuleBased));
        assert_eq!(result.score, baseline.score);
    }

    #[test]
    fn scoring_twice_is_bit_identical() {
        let scorer = StabilityScorer::default();
        let f = formulation(0.35);
        let conditions = StorageConditions::new(40.0, 75.0).unwrap();
        let a = scorer.score(&f, &conditions, Timeframe::Intermediate).unwrap();
        let b = scorer.score(&f, &conditions, Timeframe::Intermediate).unwrap();
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn metadata_round_trips_through_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        let original = scorer(StabilityModel::MlNeuralNetwork).with_trained_model(TrainedModel {
            name: "nn".to_string(),
            path: Some(PathBuf::from("weights.bin")),
        });
        original.save_metadata(&path).unwrap();

        let loaded = StabilityScorer::load_metadata(&path, ScoringConfig::default()).unwrap();
        assert_eq!(loaded.model(), StabilityModel::MlNeuralNetwork);
        assert_eq!(loaded.config().weights, original.config().weights);
        assert_eq!(loaded.trained_model(), original.trained_model());
    }

    #[test]
    fn load_metadata_reports_missing_file() {
        let err = StabilityScorer::load_metadata(
            Path::new("/nonexistent/model.toml"),
            ScoringConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ModelMetadata { .. }));
    }

    proptest! {
        #[test]
        fn scores_and_factors_stay_bounded(
            loading in 0.0f64..=1.0,
            temperature in -20.0f64..80.0,
            humidity in 0.0f64..=100.0,
            tendency in 0.0f64..=1.0,
            hygroscopicity in 0.0f64..=1.0,
            tg_api in -60.0f64..150.0,
            tg_polymer in -30.0f64..200.0,
        ) {
            let api = Arc::new(
                SubstanceProperties::builder("api", SubstanceKind::Api)
                    .glass_transition_c(tg_api)
                    .solubility_parameters(HansenParameters::new(19.0, 6.0, 9.0).unwrap())
                    .crystallization_tendency(tendency)
                    .build()
                    .unwrap(),
            );
            let polymer = Arc::new(
                SubstanceProperties::builder("polymer", SubstanceKind::Polymer)
                    .glass_transition_c(tg_polymer)
                    .solubility_parameters(HansenParameters::new(16.0, 10.0, 17.0).unwrap())
                    .hygroscopicity(hygroscopicity)
                    .build()
                    .unwrap(),
            );
            let f = Formulation::new(api, polymer, loading).unwrap();
            let conditions = StorageConditions::new(temperature, humidity).unwrap();
            for model in [
                StabilityModel::RuleBased,
                StabilityModel::ThermodynamicOnly,
                StabilityModel::KineticOnly,
                StabilityModel::Combined,
            ] {
                for timeframe in Timeframe::ALL {
                    let r = scorer(model).score(&f, &conditions, timeframe).unwrap();
                    prop_assert!((0.0..=1.0).contains(&r.score));
                    prop_assert!((0.0..=1.0).contains(&r.thermodynamic));
                    prop_assert!((0.0..=1.0).contains(&r.kinetic));
                    prop_assert!(r.major_factors.len() <= 3);
                    prop_assert!(r.major_factors.windows(2).all(|w| w[0].score <= w[1].score));
                }
            }
        }
    }
}
