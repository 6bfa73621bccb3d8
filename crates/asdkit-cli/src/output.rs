use crate::error::Result;
use asdkit::core::models::formulation::{FormulationSnapshot, ProcessMethod, ProcessParameters};
use asdkit::core::models::substance::SubstanceProperties;
use asdkit::engine::evaluation::Evaluation;
use asdkit::workflows::optimize::{LoadingProfilePoint, OptimizationResult};
use asdkit::workflows::screen::{RankingCriterion, ScreeningResult, ScreeningSummary};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct ScoreReport<'a> {
    pub formulation: FormulationSnapshot,
    pub evaluation: &'a Evaluation,
}

#[derive(Debug, Serialize)]
pub struct OptimizeReport {
    pub formulation: FormulationSnapshot,
    pub result: OptimizationResult,
    pub min_stability: f64,
    pub profile: Vec<LoadingProfilePoint>,
}

#[derive(Debug, Serialize)]
pub struct ScreenReport<'a> {
    pub api: &'a str,
    pub drug_loading: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_method: Option<ProcessMethod>,
    pub process_parameters: &'a ProcessParameters,
    pub criterion: RankingCriterion,
    pub ranking: Vec<&'a ScreeningSummary>,
    pub failures: BTreeMap<&'a str, String>,
}

impl<'a> ScreenReport<'a> {
    pub fn new(result: &'a ScreeningResult, criterion: RankingCriterion, top: Option<usize>) -> Self {
        let ranking = match top {
            Some(n) => result.top_polymers(n, criterion),
            None => result.rank_by(criterion),
        };
        Self {
            api: &result.api,
            drug_loading: result.drug_loading,
            process_method: result.process_method,
            process_parameters: &result.process_parameters,
            criterion,
            ranking,
            failures: result
                .failures()
                .map(|(name, e)| (name, e.to_string()))
                .collect(),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn optional(value: Option<f64>, precision: usize, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.*}{}", precision, v, unit),
        None => "n/a".to_string(),
    }
}

pub fn render_score(report: &ScoreReport) -> String {
    let stability = &report.evaluation.stability;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Formulation:       {} in {} at {} drug loading",
        report.formulation.api,
        report.formulation.polymer,
        percent(report.formulation.drug_loading)
    );
    if let Some(method) = report.formulation.process_method {
        let _ = writeln!(out, "Process:           {}", method);
    }
    let _ = writeln!(
        out,
        "Predicted Tg:      {}",
        optional(report.evaluation.predicted_tg_c, 1, " °C")
    );
    let _ = writeln!(
        out,
        "Miscibility:       {}",
        optional(report.evaluation.miscibility, 3, "")
    );
    let _ = writeln!(out, "Stability score:   {:.3}", stability.score);
    let _ = writeln!(out, "  thermodynamic:   {:.3}", stability.thermodynamic);
    let _ = writeln!(out, "  kinetic:         {:.3}", stability.kinetic);
    let _ = writeln!(out, "Shelf life:        {} months", stability.shelf_life_months);
    let _ = writeln!(
        out,
        "Model:             {} ({}, confidence {:.2})",
        stability.model, stability.timeframe, stability.confidence
    );
    if let Some(fallback) = stability.fallback_model {
        let _ = writeln!(out, "  scored with:     {}", fallback);
    }
    let _ = writeln!(out, "Major factors:");
    for factor in &stability.major_factors {
        let _ = writeln!(out, "  {:<30} {:.3}", factor.factor.label(), factor.score);
    }
    if !stability.defaulted_factors.is_empty() {
        let labels: Vec<&str> = stability.defaulted_factors.iter().map(|f| f.label()).collect();
        let _ = writeln!(out, "Defaulted inputs:  {}", labels.join(", "));
    }
    out
}

pub fn render_optimization(report: &OptimizeReport) -> String {
    let result = &report.result;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Formulation:       {} in {}",
        report.formulation.api, report.formulation.polymer
    );
    if result.qualified {
        let _ = writeln!(
            out,
            "Optimal loading:   {} (stability {:.3} >= {:.2})",
            percent(result.loading),
            result.stability,
            report.min_stability
        );
    } else {
        let _ = writeln!(
            out,
            "No loading meets the {:.2} threshold; best is {} (stability {:.3})",
            report.min_stability,
            percent(result.loading),
            result.stability
        );
    }
    let _ = writeln!(
        out,
        "Search:            {} ({} evaluations)",
        result.strategy, result.evaluations
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>8}  {:>9}  {:>7}  {:>7}  {:>9}  {:>6}",
        "loading", "stability", "thermo", "kinetic", "Tg (°C)", "months"
    );
    for point in &report.profile {
        let _ = writeln!(
            out,
            "{:>8}  {:>9.3}  {:>7.3}  {:>7.3}  {:>9}  {:>6}",
            percent(point.loading),
            point.score,
            point.thermodynamic,
            point.kinetic,
            optional(point.predicted_tg_c, 1, ""),
            point.shelf_life_months
        );
    }
    out
}

pub fn render_screening(report: &ScreenReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Screening {} at {} drug loading, ranked by {}",
        report.api,
        percent(report.drug_loading),
        report.criterion
    );
    if let Some(method) = report.process_method {
        let _ = writeln!(out, "Process: {}", method);
    }
    let _ = writeln!(out);
    let name_width = report
        .ranking
        .iter()
        .map(|s| s.polymer.chars().count())
        .max()
        .unwrap_or(0)
        .max("polymer".len());
    let _ = writeln!(
        out,
        "{:>4}  {:<name_width$}  {:>9}  {:>11}  {:>9}  {:>6}",
        "rank", "polymer", "stability", "miscibility", "Tg (°C)", "months"
    );
    for (rank, summary) in report.ranking.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:<name_width$}  {:>9.3}  {:>11}  {:>9}  {:>6}",
            rank + 1,
            summary.polymer,
            summary.stability,
            optional(summary.miscibility, 3, ""),
            optional(summary.predicted_tg_c, 1, ""),
            summary.shelf_life_months
        );
    }
    if !report.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failed ({}):", report.failures.len());
        for (polymer, error) in &report.failures {
            let _ = writeln!(out, "  {}: {}", polymer, error);
        }
    }
    out
}

pub fn render_material(record: &SubstanceProperties) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", record);
    if let Some(structure) = record.structure() {
        let _ = writeln!(out, "  structure:                {}", structure);
    }
    if let Some(class) = record.polymer_class() {
        let _ = writeln!(out, "  polymer class:            {}", class);
    }
    if let Some(log_p) = record.log_p() {
        let _ = writeln!(out, "  logP:                     {:.2}", log_p);
    }
    if let Some(hsp) = record.solubility_parameters() {
        let _ = writeln!(
            out,
            "  solubility (d, p, h):     {:.1}, {:.1}, {:.1} MPa^0.5",
            hsp.dispersive, hsp.polar, hsp.hydrogen
        );
    }
    if let Some(h) = record.hydrophilicity() {
        let _ = writeln!(out, "  hydrophilicity:           {:.2}", h);
    }
    if let Some(c) = record.crystallization_tendency() {
        let _ = writeln!(out, "  crystallization tendency: {:.2}", c);
    }
    if let Some(t) = record.degradation_temperature_c() {
        let _ = writeln!(out, "  degradation temperature:  {:.1} °C", t);
    }
    for (key, value) in record.extensions() {
        let _ = writeln!(out, "  {}: {:?}", key, value);
    }
    out
}
