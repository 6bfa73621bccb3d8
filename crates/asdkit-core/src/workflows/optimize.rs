use crate::core::models::formulation::{Formulation, FormulationSnapshot};
use crate::engine::cache::EvaluationCache;
use crate::engine::config::{OptimizerConfig, SearchStrategy};
use crate::engine::error::EngineError;
use crate::engine::evaluation::{self, Evaluation};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::search;
use crate::engine::stability::StabilityScorer;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub loading: f64,
    pub stability: f64,
    /// False when no evaluated loading met the threshold and `loading` is merely the best one.
    pub qualified: bool,
    pub strategy: SearchStrategy,
    pub evaluations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadingProfilePoint {
    pub loading: f64,
    pub score: f64,
    pub thermodynamic: f64,
    pub kinetic: f64,
    pub predicted_tg_c: Option<f64>,
    pub shelf_life_months: u32,
}

impl From<&Evaluation> for LoadingProfilePoint {
    fn from(evaluation: &Evaluation) -> Self {
        Self {
            loading: evaluation.loading,
            score: evaluation.stability.score,
            thermodynamic: evaluation.stability.thermodynamic,
            kinetic: evaluation.stability.kinetic,
            predicted_tg_c: evaluation.predicted_tg_c,
            shelf_life_months: evaluation.stability.shelf_life_months,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerSnapshot {
    pub formulation: FormulationSnapshot,
    pub loading_range: (f64, f64),
    pub min_stability: f64,
    pub strategy: SearchStrategy,
    pub profile: Vec<LoadingProfilePoint>,
}

/// Finds the highest drug loading of an API/polymer pair that still meets a stability threshold.
///
/// Every loading the optimizer scores, through [`LoadingOptimizer::evaluate`] or during a
/// search, is kept for the lifetime of the optimizer and never re-scored.
#[derive(Debug, Clone)]
pub struct LoadingOptimizer {
    formulation: Formulation,
    scorer: StabilityScorer,
    config: OptimizerConfig,
    cache: EvaluationCache,
}

impl LoadingOptimizer {
    /// `formulation` fixes the pair and process; its own loading is ignored.
    pub fn new(formulation: Formulation, scorer: StabilityScorer, config: OptimizerConfig) -> Self {
        Self {
            formulation,
            scorer,
            config,
            cache: EvaluationCache::new(),
        }
    }

    pub fn formulation(&self) -> &Formulation {
        &self.formulation
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn evaluate(&mut self, loading: f64) -> Result<&Evaluation, EngineError> {
        let Self {
            formulation,
            scorer,
            config,
            cache,
        } = self;
        cache.get_or_try_insert_with(loading, || {
            let candidate = formulation.with_loading(loading)?;
            let result =
                evaluation::evaluate(scorer, &candidate, &config.conditions, config.timeframe)?;
            debug!(
                loading,
                score = result.stability.score,
                "Evaluated loading."
            );
            Ok(result)
        })
    }

    #[instrument(skip_all, name = "loading_optimization")]
    pub fn optimize(
        &mut self,
        reporter: &ProgressReporter,
    ) -> Result<OptimizationResult, EngineError> {
        let range = self.config.loading_range;
        let threshold = self.config.min_stability;
        let strategy = self.config.strategy;
        let grid_points = self.config.grid_points;
        let max_iterations = self.config.max_iterations;
        let tolerance = self.config.tolerance;

        info!(
            formulation = %self.formulation,
            min_loading = range.0,
            max_loading = range.1,
            threshold,
            strategy = %strategy,
            "Starting loading optimization."
        );
        reporter.report(Progress::PhaseStart {
            name: "Loading Optimization",
        });
        let total_steps = match strategy {
            SearchStrategy::Grid => grid_points,
            SearchStrategy::Binary => max_iterations + 2,
        };
        reporter.report(Progress::TaskStart {
            total_steps: total_steps as u64,
        });

        let step = |loading: f64| -> Result<f64, EngineError> {
            reporter.report(Progress::TaskIncrement);
            self.evaluate(loading).map(|e| e.stability.score)
        };
        let outcome = match strategy {
            SearchStrategy::Grid => search::grid_search(range, grid_points, threshold, step),
            SearchStrategy::Binary => {
                search::binary_search(range, threshold, max_iterations, tolerance, step)
            }
        };

        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);
        let outcome = outcome?;

        if !outcome.qualified {
            warn!(
                threshold,
                best_stability = outcome.stability,
                "No loading in range meets the stability threshold; returning the best-scoring one."
            );
        }
        let result = OptimizationResult {
            loading: outcome.loading,
            stability: outcome.stability,
            qualified: outcome.qualified,
            strategy,
            evaluations: self.cache.len(),
        };
        info!(
            loading = result.loading,
            stability = result.stability,
            evaluations = result.evaluations,
            "Loading optimization complete."
        );
        Ok(result)
    }

    /// Every evaluation made so far.
    pub fn results(&self) -> &EvaluationCache {
        &self.cache
    }

    pub fn loading_profile(&self) -> Vec<LoadingProfilePoint> {
        self.cache.iter().map(LoadingProfilePoint::from).collect()
    }

    pub fn snapshot(&self) -> OptimizerSnapshot {
        OptimizerSnapshot {
            formulation: self.formulation.snapshot(),
            loading_range: self.config.loading_range,
            min_stability: self.config.min_stability,
            strategy: self.config.strategy,
            profile: self.loading_profile(),
        }
    }
}
