use super::config::{StorageConditions, Timeframe};
use super::error::EngineError;
use super::stability::{StabilityResult, StabilityScorer};
use crate::core::models::formulation::Formulation;
use serde::Serialize;

/// Everything computed for one formulation at one loading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub loading: f64,
    pub predicted_tg_c: Option<f64>,
    pub miscibility: Option<f64>,
    pub stability: StabilityResult,
}

/// Predicts mixture Tg and miscibility once, then scores from those predictions.
pub fn evaluate(
    scorer: &StabilityScorer,
    formulation: &Formulation,
    conditions: &StorageConditions,
    timeframe: Timeframe,
) -> Result<Evaluation, EngineError> {
    let predictions = scorer.predictions(formulation)?;
    let stability = scorer.score_with(formulation, &predictions, conditions, timeframe)?;
    Ok(Evaluation {
        loading: formulation.drug_loading(),
        predicted_tg_c: predictions.mixture_tg_c,
        miscibility: predictions.miscibility,
        stability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::substance::{HansenParameters, SubstanceKind, SubstanceProperties};
    use std::sync::Arc;

    #[test]
    fn evaluation_carries_predictions_and_matches_direct_scoring() {
        let api = Arc::new(
            SubstanceProperties::builder("felodipine", SubstanceKind::Api)
                .glass_transition_c(44.0)
                .solubility_parameters(HansenParameters::new(20.2, 6.1, 7.5).unwrap())
                .build()
                .unwrap(),
        );
        let polymer = Arc::new(
            SubstanceProperties::builder("HPMCAS", SubstanceKind::Polymer)
                .glass_transition_c(120.0)
                .solubility_parameters(HansenParameters::new(19.0, 10.5, 11.5).unwrap())
                .build()
                .unwrap(),
        );
        let formulation = Formulation::new(api, polymer, 0.25).unwrap();
        let scorer = StabilityScorer::default();
        let conditions = StorageConditions::default();

        let evaluation =
            evaluate(&scorer, &formulation, &conditions, Timeframe::LongTerm).unwrap();
        let direct = scorer
            .score(&formulation, &conditions, Timeframe::LongTerm)
            .unwrap();

        assert_eq!(evaluation.loading, 0.25);
        let tg = evaluation.predicted_tg_c.unwrap();
        assert!(tg > 44.0 && tg < 120.0);
        assert!(evaluation.miscibility.is_some());
        assert_eq!(evaluation.stability, direct);
    }
}
