use super::{CommandContext, build_formulation};
use crate::cli::{OptimizeArgs, OutputFormat};
use crate::error::Result;
use crate::output::{self, OptimizeReport};
use asdkit::core::materials::MaterialsDatabase;
use asdkit::engine::progress::ProgressReporter;
use asdkit::engine::stability::StabilityScorer;
use asdkit::workflows::optimize::LoadingOptimizer;
use tracing::{info, warn};

pub fn run(args: OptimizeArgs, ctx: &CommandContext) -> Result<()> {
    let db = ctx.load_database()?;
    let progress_handler = ctx.progress_handler();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let report = optimize(&args, ctx, &db, &reporter)?;
    if !report.result.qualified {
        warn!(
            min_stability = report.min_stability,
            "Reporting the best loading found; it does not meet the threshold."
        );
    }
    match ctx.format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => {
            print!("{}", output::render_optimization(&report));
            Ok(())
        }
    }
}

fn optimize(
    args: &OptimizeArgs,
    ctx: &CommandContext,
    db: &MaterialsDatabase,
    reporter: &ProgressReporter,
) -> Result<OptimizeReport> {
    let optimizer_config = ctx.config.optimizer(args)?;
    // The optimizer overrides this loading; it only has to be valid.
    let seed_loading = optimizer_config.loading_range.0;
    let formulation = build_formulation(db, &args.api, &args.polymer, seed_loading, &args.process)?;
    let scorer = StabilityScorer::new(ctx.config.scoring(None)?)?;

    info!("Invoking the loading optimizer...");
    let mut optimizer = LoadingOptimizer::new(formulation, scorer, optimizer_config);
    let result = optimizer.optimize(reporter)?;
    let snapshot = optimizer.snapshot();

    Ok(OptimizeReport {
        formulation: snapshot.formulation,
        result,
        min_stability: snapshot.min_stability,
        profile: snapshot.profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ConditionArgs, ProcessArgs};
    use crate::commands::test_support::context;
    use crate::error::CliError;
    use asdkit::engine::config::SearchStrategy;

    fn args() -> OptimizeArgs {
        OptimizeArgs {
            api: "griseofulvin".to_string(),
            polymer: "HPMC".to_string(),
            min_loading: Some(0.1),
            max_loading: Some(0.6),
            min_stability: Some(0.5),
            strategy: Some("grid".to_string()),
            conditions: ConditionArgs::default(),
            process: ProcessArgs::default(),
        }
    }

    #[test]
    fn grid_optimization_reports_every_grid_point_in_the_profile() {
        let db = MaterialsDatabase::new().unwrap();
        let ctx = context(OutputFormat::Table);

        let report = optimize(&args(), &ctx, &db, &ProgressReporter::new()).unwrap();
        assert_eq!(report.result.strategy, SearchStrategy::Grid);
        assert_eq!(report.profile.len(), report.result.evaluations);
        assert!(report.profile.windows(2).all(|w| w[0].loading < w[1].loading));
        assert!((0.1..=0.6).contains(&report.result.loading));
        if report.result.qualified {
            assert!(report.result.stability >= 0.5);
        }
        assert_eq!(report.formulation.api, "griseofulvin");
    }

    #[test]
    fn inverted_range_is_a_config_error() {
        let db = MaterialsDatabase::new().unwrap();
        let ctx = context(OutputFormat::Table);
        let mut args = args();
        args.min_loading = Some(0.7);
        args.max_loading = Some(0.2);
        assert!(matches!(
            optimize(&args, &ctx, &db, &ProgressReporter::new()),
            Err(CliError::Config(_))
        ));
    }
}
