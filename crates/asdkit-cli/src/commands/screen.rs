use super::{CommandContext, parse_process};
use crate::cli::{OutputFormat, ScreenArgs};
use crate::error::{CliError, Result};
use crate::output::{self, ScreenReport};
use asdkit::core::materials::{MaterialsDatabase, PropertyProvider};
use asdkit::core::models::substance::SubstanceKind;
use asdkit::engine::progress::ProgressReporter;
use asdkit::engine::stability::StabilityScorer;
use asdkit::workflows::screen::{PolymerScreener, RankingCriterion, ScreeningResult};
use tracing::{info, warn};

pub fn run(args: ScreenArgs, ctx: &CommandContext) -> Result<()> {
    let criterion: RankingCriterion = args.rank_by.parse()?;
    if args.top == Some(0) {
        return Err(CliError::Argument("--top must be at least 1".to_string()));
    }
    let db = ctx.load_database()?;
    let progress_handler = ctx.progress_handler();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let result = screen(&args, ctx, &db, &reporter)?;
    let report = ScreenReport::new(&result, criterion, args.top);
    if report.ranking.is_empty() {
        warn!("No polymer produced a value for the ranking criterion.");
    }
    match ctx.format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => {
            print!("{}", output::render_screening(&report));
            Ok(())
        }
    }
}

fn screen(
    args: &ScreenArgs,
    ctx: &CommandContext,
    db: &MaterialsDatabase,
    reporter: &ProgressReporter,
) -> Result<ScreeningResult> {
    let api = db.lookup(&args.api, SubstanceKind::Api)?;
    let polymers = if args.polymers.is_empty() {
        db.common_polymers()
    } else {
        args.polymers
            .iter()
            .map(|name| db.lookup(name, SubstanceKind::Polymer))
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let config = ctx.config.screening(args, ctx.threads)?;
    let mut screener = PolymerScreener::new(StabilityScorer::new(ctx.config.scoring(None)?)?, config);
    if let Some((method, parameters)) = parse_process(&args.process)? {
        screener = screener.with_process(method, parameters);
    }

    info!(api = api.name(), candidates = polymers.len(), "Invoking the polymer screener...");
    Ok(screener.screen(&api, &polymers, reporter)?)
}
