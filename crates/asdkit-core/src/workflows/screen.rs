use crate::core::error::PropertyError;
use crate::core::models::formulation::{Formulation, ProcessMethod, ProcessParameters};
use crate::core::models::substance::SubstanceProperties;
use crate::engine::config::{ExecutionMode, ScreeningConfig};
use crate::engine::error::EngineError;
use crate::engine::evaluation::{self, Evaluation};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::stability::{FactorScore, StabilityScorer};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    Stability,
    Miscibility,
    ShelfLife,
    ThermodynamicStability,
    KineticStability,
    GlassTransitionTemp,
}

impl RankingCriterion {
    pub const ALL: [RankingCriterion; 6] = [
        RankingCriterion::Stability,
        RankingCriterion::Miscibility,
        RankingCriterion::ShelfLife,
        RankingCriterion::ThermodynamicStability,
        RankingCriterion::KineticStability,
        RankingCriterion::GlassTransitionTemp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingCriterion::Stability => "stability",
            RankingCriterion::Miscibility => "miscibility",
            RankingCriterion::ShelfLife => "shelf_life",
            RankingCriterion::ThermodynamicStability => "thermodynamic_stability",
            RankingCriterion::KineticStability => "kinetic_stability",
            RankingCriterion::GlassTransitionTemp => "glass_transition_temp",
        }
    }

    /// `None` when the summary has no value for this criterion.
    pub fn value(&self, summary: &ScreeningSummary) -> Option<f64> {
        match self {
            RankingCriterion::Stability => Some(summary.stability),
            RankingCriterion::Miscibility => summary.miscibility,
            RankingCriterion::ShelfLife => Some(f64::from(summary.shelf_life_months)),
            RankingCriterion::ThermodynamicStability => Some(summary.thermodynamic),
            RankingCriterion::KineticStability => Some(summary.kinetic),
            RankingCriterion::GlassTransitionTemp => summary.predicted_tg_c,
        }
    }
}

impl fmt::Display for RankingCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingCriterion {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let alias = match normalized.as_str() {
            "stability_score" => "stability",
            "shelf_life_months" => "shelf_life",
            "tg" | "predicted_tg" => "glass_transition_temp",
            other => other,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == alias)
            .ok_or_else(|| {
                PropertyError::unknown_name(
                    "ranking criterion",
                    s,
                    &Self::ALL.map(|c| c.as_str()),
                )
            })
    }
}

/// Outcome of one successfully screened polymer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningSummary {
    pub polymer: String,
    pub stability: f64,
    pub thermodynamic: f64,
    pub kinetic: f64,
    pub miscibility: Option<f64>,
    pub predicted_tg_c: Option<f64>,
    pub shelf_life_months: u32,
    pub confidence: f64,
    pub major_factors: Vec<FactorScore>,
}

impl ScreeningSummary {
    fn new(polymer: &str, evaluation: Evaluation) -> Self {
        let stability = evaluation.stability;
        Self {
            polymer: polymer.to_string(),
            stability: stability.score,
            thermodynamic: stability.thermodynamic,
            kinetic: stability.kinetic,
            miscibility: evaluation.miscibility,
            predicted_tg_c: evaluation.predicted_tg_c,
            shelf_life_months: stability.shelf_life_months,
            confidence: stability.confidence,
            major_factors: stability.major_factors,
        }
    }
}

fn serialize_error<S: Serializer>(error: &EngineError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScreeningEntry {
    Success(ScreeningSummary),
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: EngineError,
    },
}

impl ScreeningEntry {
    pub fn summary(&self) -> Option<&ScreeningSummary> {
        match self {
            ScreeningEntry::Success(summary) => Some(summary),
            ScreeningEntry::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            ScreeningEntry::Success(_) => None,
            ScreeningEntry::Failed { error } => Some(error),
        }
    }
}

/// One entry per screened polymer, keyed by polymer name.
#[derive(Debug, Serialize)]
pub struct ScreeningResult {
    pub api: String,
    pub drug_loading: f64,
    pub process_method: Option<ProcessMethod>,
    pub process_parameters: ProcessParameters,
    entries: BTreeMap<String, ScreeningEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningSnapshot {
    pub api: String,
    pub drug_loading: f64,
    pub process_method: Option<ProcessMethod>,
    pub process_parameters: ProcessParameters,
    pub ranking: Vec<ScreeningSummary>,
    pub failures: BTreeMap<String, String>,
}

impl ScreeningResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, polymer: &str) -> Option<&ScreeningEntry> {
        self.entries.get(polymer)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ScreeningEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn successes(&self) -> impl Iterator<Item = &ScreeningSummary> {
        self.entries.values().filter_map(ScreeningEntry::summary)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &EngineError)> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| entry.error().map(|e| (name.as_str(), e)))
    }

    /// Successful entries with a value for `criterion`, best first.
    ///
    /// Failed entries never appear; ties keep polymer-name order.
    pub fn rank_by(&self, criterion: RankingCriterion) -> Vec<&ScreeningSummary> {
        let mut ranked: Vec<(f64, &ScreeningSummary)> = self
            .successes()
            .filter_map(|s| criterion.value(s).map(|v| (v, s)))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().map(|(_, s)| s).collect()
    }

    pub fn rank_by_stability(&self) -> Vec<&ScreeningSummary> {
        self.rank_by(RankingCriterion::Stability)
    }

    pub fn rank_by_miscibility(&self) -> Vec<&ScreeningSummary> {
        self.rank_by(RankingCriterion::Miscibility)
    }

    pub fn top_polymers(&self, n: usize, criterion: RankingCriterion) -> Vec<&ScreeningSummary> {
        let mut ranked = self.rank_by(criterion);
        ranked.truncate(n);
        ranked
    }

    pub fn snapshot(&self) -> ScreeningSnapshot {
        ScreeningSnapshot {
            api: self.api.clone(),
            drug_loading: self.drug_loading,
            process_method: self.process_method,
            process_parameters: self.process_parameters.clone(),
            ranking: self.rank_by_stability().into_iter().cloned().collect(),
            failures: self
                .failures()
                .map(|(name, e)| (name.to_string(), e.to_string()))
                .collect(),
        }
    }
}

/// Scores one API against many carrier polymers at a fixed loading.
#[derive(Debug, Clone)]
pub struct PolymerScreener {
    scorer: StabilityScorer,
    config: ScreeningConfig,
    process: Option<(ProcessMethod, ProcessParameters)>,
}

impl PolymerScreener {
    pub fn new(scorer: StabilityScorer, config: ScreeningConfig) -> Self {
        Self {
            scorer,
            config,
            process: None,
        }
    }

    pub fn with_process(mut self, method: ProcessMethod, parameters: ProcessParameters) -> Self {
        self.process = Some((method, parameters));
        self
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// Screens `api` against every polymer.
    ///
    /// Per-polymer failures become [`ScreeningEntry::Failed`] entries; only a duplicate
    /// polymer name or a worker pool that cannot start fails the whole screen.
    #[instrument(skip_all, name = "polymer_screening")]
    pub fn screen(
        &self,
        api: &Arc<SubstanceProperties>,
        polymers: &[Arc<SubstanceProperties>],
        reporter: &ProgressReporter,
    ) -> Result<ScreeningResult, EngineError> {
        let mut seen = HashSet::new();
        for polymer in polymers {
            if !seen.insert(polymer.name().to_lowercase()) {
                return Err(EngineError::InvalidInput(format!(
                    "polymer '{}' is listed more than once",
                    polymer.name()
                )));
            }
        }

        info!(
            api = api.name(),
            candidates = polymers.len(),
            drug_loading = self.config.drug_loading,
            execution = ?self.config.execution,
            "Starting polymer screening."
        );
        reporter.report(Progress::PhaseStart {
            name: "Polymer Screening",
        });
        reporter.report(Progress::TaskStart {
            total_steps: polymers.len() as u64,
        });

        let deadline = self.config.timeout.map(|t| (Instant::now() + t, t));
        let outcomes = self.run_candidates(api, polymers, deadline, reporter);

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        let entries: BTreeMap<String, ScreeningEntry> = polymers
            .iter()
            .zip(outcomes?)
            .map(|(polymer, outcome)| {
                let entry = match outcome {
                    Ok(evaluation) => {
                        ScreeningEntry::Success(ScreeningSummary::new(polymer.name(), evaluation))
                    }
                    Err(error) => {
                        warn!(polymer = polymer.name(), error = %error, "Screening candidate failed.");
                        ScreeningEntry::Failed { error }
                    }
                };
                (polymer.name().to_string(), entry)
            })
            .collect();

        let (process_method, process_parameters) = match &self.process {
            Some((method, parameters)) => (Some(*method), parameters.clone()),
            None => (None, ProcessParameters::new()),
        };
        let result = ScreeningResult {
            api: api.name().to_string(),
            drug_loading: self.config.drug_loading,
            process_method,
            process_parameters,
            entries,
        };
        info!(
            succeeded = result.successes().count(),
            failed = result.failures().count(),
            "Polymer screening complete."
        );
        Ok(result)
    }

    fn run_candidates(
        &self,
        api: &Arc<SubstanceProperties>,
        polymers: &[Arc<SubstanceProperties>],
        deadline: Option<(Instant, Duration)>,
        reporter: &ProgressReporter,
    ) -> Result<Vec<Result<Evaluation, EngineError>>, EngineError> {
        let task = |polymer: &Arc<SubstanceProperties>| {
            let outcome = self.evaluate_candidate(api, polymer, deadline);
            reporter.report(Progress::TaskIncrement);
            outcome
        };

        match self.config.execution {
            ExecutionMode::Sequential => Ok(polymers.iter().map(task).collect()),
            #[cfg(feature = "parallel")]
            ExecutionMode::Parallel { max_workers } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(max_workers)
                    .build()
                    .map_err(|e| EngineError::WorkerPool(e.to_string()))?;
                Ok(pool.install(|| polymers.par_iter().map(task).collect()))
            }
            #[cfg(not(feature = "parallel"))]
            ExecutionMode::Parallel { .. } => {
                warn!("Built without the `parallel` feature; screening sequentially.");
                Ok(polymers.iter().map(task).collect())
            }
        }
    }

    fn evaluate_candidate(
        &self,
        api: &Arc<SubstanceProperties>,
        polymer: &Arc<SubstanceProperties>,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<Evaluation, EngineError> {
        if let Some((deadline, limit)) = deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout(limit));
            }
        }
        let mut formulation =
            Formulation::new(Arc::clone(api), Arc::clone(polymer), self.config.drug_loading)?;
        if let Some((method, parameters)) = &self.process {
            formulation = formulation.with_process(*method, parameters.clone());
        }
        let evaluation = evaluation::evaluate(
            &self.scorer,
            &formulation,
            &self.config.conditions,
            self.config.timeframe,
        )?;
        debug!(
            polymer = polymer.name(),
            score = evaluation.stability.score,
            "Screened polymer."
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::substance::{HansenParameters, ParameterValue, SubstanceKind};
    use crate::engine::config::ScreeningConfigBuilder;

    fn api() -> Arc<SubstanceProperties> {
        Arc::new(
            SubstanceProperties::builder("ketoconazole", SubstanceKind::Api)
                .glass_transition_c(45.0)
                .melting_point_c(146.0)
                .solubility_parameters(HansenParameters::new(20.5, 7.2, 6.9).unwrap())
                .crystallization_tendency(0.6)
                .build()
                .unwrap(),
        )
    }

    fn polymer(name: &str, tg: f64, hsp: Option<(f64, f64, f64)>) -> Arc<SubstanceProperties> {
        let mut builder = SubstanceProperties::builder(name, SubstanceKind::Polymer)
            .glass_transition_c(tg)
            .hygroscopicity(0.4);
        if let Some((d, p, h)) = hsp {
            builder = builder.solubility_parameters(HansenParameters::new(d, p, h).unwrap());
        }
        Arc::new(builder.build().unwrap())
    }

    fn candidates() -> Vec<Arc<SubstanceProperties>> {
        vec![
            polymer("PVP K30", 149.0, Some((17.0, 8.0, 12.0))),
            polymer("HPMCAS", 120.0, Some((19.0, 10.5, 11.5))),
            polymer("mystery", 90.0, None),
        ]
    }

    fn screener(execution: ExecutionMode) -> PolymerScreener {
        let config = ScreeningConfigBuilder::new()
            .drug_loading(0.3)
            .execution(execution)
            .build()
            .unwrap();
        PolymerScreener::new(StabilityScorer::default(), config)
    }

    #[test]
    fn one_failing_polymer_yields_one_error_entry_and_is_not_ranked() {
        let result = screener(ExecutionMode::Sequential)
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result.successes().count(), 2);
        let failures: Vec<_> = result.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "mystery");
        assert!(matches!(
            failures[0].1,
            EngineError::Property(PropertyError::MissingParameter { .. })
        ));

        let ranked = result.rank_by_stability();
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].stability >= ranked[1].stability);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_and_sequential_screens_agree() {
        let sequential = screener(ExecutionMode::Sequential)
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();
        let parallel = screener(ExecutionMode::Parallel { max_workers: 2 })
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();
        assert_eq!(sequential.snapshot(), parallel.snapshot());
    }

    #[test]
    fn duplicate_polymer_names_are_rejected() {
        let polymers = vec![
            polymer("Soluplus", 70.0, Some((17.4, 5.5, 9.0))),
            polymer("soluplus", 70.0, Some((17.4, 5.5, 9.0))),
        ];
        let err = screener(ExecutionMode::Sequential)
            .screen(&api(), &polymers, &ProgressReporter::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn expired_deadline_marks_every_candidate_timed_out() {
        let config = ScreeningConfigBuilder::new()
            .drug_loading(0.3)
            .execution(ExecutionMode::Sequential)
            .timeout(Duration::ZERO)
            .build()
            .unwrap();
        let result = PolymerScreener::new(StabilityScorer::default(), config)
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();
        assert_eq!(result.len(), 3);
        assert!(
            result
                .failures()
                .all(|(_, e)| matches!(e, EngineError::Timeout(_)))
        );
        assert_eq!(result.failures().count(), 3);
    }

    #[test]
    fn top_polymers_truncates_the_ranking() {
        let result = screener(ExecutionMode::Sequential)
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();
        let top = result.top_polymers(1, RankingCriterion::Miscibility);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].polymer, result.rank_by_miscibility()[0].polymer);
        assert_eq!(result.top_polymers(10, RankingCriterion::ShelfLife).len(), 2);
    }

    #[test]
    fn ranking_criteria_parse_with_aliases() {
        assert_eq!(
            "glass-transition-temp".parse::<RankingCriterion>(),
            Ok(RankingCriterion::GlassTransitionTemp)
        );
        assert_eq!("tg".parse::<RankingCriterion>(), Ok(RankingCriterion::GlassTransitionTemp));
        assert_eq!("Shelf_Life".parse::<RankingCriterion>(), Ok(RankingCriterion::ShelfLife));
        assert!(matches!(
            "price".parse::<RankingCriterion>(),
            Err(PropertyError::InvalidInput(_))
        ));
    }

    #[test]
    fn snapshot_lists_failures_by_polymer() {
        let result = screener(ExecutionMode::Sequential)
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();
        let snapshot = result.snapshot();
        assert_eq!(snapshot.ranking.len(), 2);
        assert!(snapshot.failures["mystery"].contains("solubility_parameters"));
        assert_eq!(snapshot.process_method, None);
        assert!(snapshot.process_parameters.is_empty());
    }

    #[test]
    fn result_keeps_the_process_the_candidates_were_screened_with() {
        let mut parameters = ProcessParameters::new();
        parameters.insert("inlet_temperature".to_string(), ParameterValue::Number(120.0));
        let result = screener(ExecutionMode::Sequential)
            .with_process(ProcessMethod::SprayDrying, parameters.clone())
            .screen(&api(), &candidates(), &ProgressReporter::new())
            .unwrap();

        assert_eq!(result.process_method, Some(ProcessMethod::SprayDrying));
        assert_eq!(result.process_parameters, parameters);
        let snapshot = result.snapshot();
        assert_eq!(snapshot.process_method, Some(ProcessMethod::SprayDrying));
        assert_eq!(snapshot.process_parameters, parameters);
    }
}
