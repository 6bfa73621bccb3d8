use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "ASDkit Developers",
    version,
    about = "ASDkit CLI - stability scoring, drug-loading optimization and polymer screening for amorphous solid dispersions.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads for parallel screening.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Path to a TOML configuration file.
    /// Defaults to `config.toml` in the platform configuration directory, if present.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Materials file (.toml or .csv) loaded on top of the built-in catalogue.
    /// Can be used multiple times; later files override earlier ones.
    #[arg(long = "database", global = true, value_name = "PATH")]
    pub databases: Vec<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S scoring.weights.tg=0.3
    #[arg(short = 'S', long = "set", global = true, value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Predict the physical stability of one API/polymer formulation.
    Score(ScoreArgs),
    /// Find the highest drug loading that meets a stability threshold.
    Optimize(OptimizeArgs),
    /// Rank carrier polymers for an API at a fixed drug loading.
    Screen(ScreenArgs),
    /// Inspect the materials database.
    Materials(MaterialsArgs),
}

/// Storage conditions shared by every scoring command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConditionArgs {
    /// Storage temperature in °C.
    #[arg(long, value_name = "CELSIUS")]
    pub temperature: Option<f64>,

    /// Storage relative humidity in percent.
    #[arg(long, value_name = "PERCENT")]
    pub humidity: Option<f64>,

    /// Storage timeframe: short_term, intermediate or long_term.
    #[arg(long, value_name = "NAME")]
    pub timeframe: Option<String>,
}

/// Manufacturing process shared by every scoring command.
#[derive(Args, Debug, Clone, Default)]
pub struct ProcessArgs {
    /// Manufacturing process (e.g., hot_melt_extrusion, spray_drying).
    #[arg(long, value_name = "NAME")]
    pub process: Option<String>,

    /// Process parameter. Can be used multiple times. Example: --process-param temperature=160
    #[arg(long = "process-param", value_name = "KEY=VALUE", requires = "process")]
    pub process_params: Vec<String>,
}

/// Arguments for the `score` subcommand.
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// API name as listed in the materials database.
    #[arg(long, value_name = "NAME")]
    pub api: String,

    /// Polymer name as listed in the materials database.
    #[arg(long, value_name = "NAME")]
    pub polymer: String,

    /// Drug loading as an API weight fraction in [0, 1].
    #[arg(long, value_name = "FRACTION")]
    pub loading: f64,

    /// Stability model variant, overriding the config file.
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Saved model metadata (TOML) to score with instead of the configured model.
    #[arg(long, value_name = "PATH", conflicts_with = "model")]
    pub model_metadata: Option<PathBuf>,

    #[command(flatten)]
    pub conditions: ConditionArgs,

    #[command(flatten)]
    pub process: ProcessArgs,
}

/// Arguments for the `optimize` subcommand.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    #[arg(long, value_name = "NAME")]
    pub api: String,

    #[arg(long, value_name = "NAME")]
    pub polymer: String,

    /// Lower end of the searched loading range.
    #[arg(long, value_name = "FRACTION")]
    pub min_loading: Option<f64>,

    /// Upper end of the searched loading range.
    #[arg(long, value_name = "FRACTION")]
    pub max_loading: Option<f64>,

    /// Minimum acceptable stability score.
    #[arg(long, value_name = "SCORE")]
    pub min_stability: Option<f64>,

    /// Search strategy: grid or binary.
    #[arg(long, value_name = "NAME")]
    pub strategy: Option<String>,

    #[command(flatten)]
    pub conditions: ConditionArgs,

    #[command(flatten)]
    pub process: ProcessArgs,
}

/// Arguments for the `screen` subcommand.
#[derive(Args, Debug)]
pub struct ScreenArgs {
    #[arg(long, value_name = "NAME")]
    pub api: String,

    /// Candidate polymer. Can be used multiple times; defaults to every polymer in the database.
    #[arg(long = "polymer", value_name = "NAME")]
    pub polymers: Vec<String>,

    /// Drug loading as an API weight fraction in [0, 1].
    #[arg(long, value_name = "FRACTION")]
    pub loading: Option<f64>,

    /// Screen one polymer at a time instead of on a worker pool.
    #[arg(long)]
    pub sequential: bool,

    /// Ranking criterion (stability, miscibility, shelf_life, thermodynamic_stability,
    /// kinetic_stability, glass_transition_temp).
    #[arg(long, value_name = "CRITERION", default_value = "stability")]
    pub rank_by: String,

    /// Show only the best N polymers.
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    #[command(flatten)]
    pub conditions: ConditionArgs,

    #[command(flatten)]
    pub process: ProcessArgs,
}

/// Arguments for the `materials` subcommand.
#[derive(Args, Debug)]
pub struct MaterialsArgs {
    #[command(subcommand)]
    pub command: MaterialsCommands,
}

#[derive(Subcommand, Debug)]
pub enum MaterialsCommands {
    /// List the names of known substances.
    List {
        /// Restrict the listing to `api` or `polymer`.
        #[arg(long, value_name = "KIND")]
        kind: Option<String>,
    },
    /// Show every known property of one substance.
    Show {
        #[arg(required = true)]
        name: String,

        /// `api` or `polymer`.
        #[arg(long, value_name = "KIND")]
        kind: String,
    },
}
