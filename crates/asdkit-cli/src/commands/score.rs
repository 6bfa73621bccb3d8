use super::{CommandContext, build_formulation};
use crate::cli::{OutputFormat, ScoreArgs};
use crate::error::Result;
use crate::output::{self, ScoreReport};
use asdkit::core::materials::MaterialsDatabase;
use asdkit::core::models::formulation::Formulation;
use asdkit::engine::evaluation::{self, Evaluation};
use asdkit::engine::stability::StabilityScorer;
use tracing::info;

pub fn run(args: ScoreArgs, ctx: &CommandContext) -> Result<()> {
    let db = ctx.load_database()?;
    let (formulation, evaluation) = score(&args, ctx, &db)?;
    let report = ScoreReport {
        formulation: formulation.snapshot(),
        evaluation: &evaluation,
    };
    match ctx.format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Table => {
            print!("{}", output::render_score(&report));
            Ok(())
        }
    }
}

fn score(
    args: &ScoreArgs,
    ctx: &CommandContext,
    db: &MaterialsDatabase,
) -> Result<(Formulation, Evaluation)> {
    let formulation = build_formulation(db, &args.api, &args.polymer, args.loading, &args.process)?;
    let (conditions, timeframe) = ctx.config.conditions(&args.conditions)?;

    let scorer = match &args.model_metadata {
        Some(path) => {
            info!(path = %path.display(), "Loading model metadata.");
            StabilityScorer::load_metadata(path, ctx.config.scoring(None)?)?
        }
        None => StabilityScorer::new(ctx.config.scoring(args.model.as_deref())?)?,
    };

    info!(formulation = %formulation, model = %scorer.model(), "Scoring formulation.");
    let evaluation = evaluation::evaluate(&scorer, &formulation, &conditions, timeframe)?;
    Ok((formulation, evaluation))
}
