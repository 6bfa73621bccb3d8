use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileWeightsConfig};
use crate::cli::{Cli, ConditionArgs, OptimizeArgs, ScreenArgs};
use crate::error::{CliError, Result};
use asdkit::core::error::PropertyError;
use asdkit::core::miscibility::MiscibilityMethod;
use asdkit::core::thermal::TgMixingLaw;
use asdkit::engine::config::{
    ExecutionMode, FactorWeights, OptimizerConfig, OptimizerConfigBuilder, ScoringConfig,
    ScoringConfigBuilder, ScreeningConfig, ScreeningConfigBuilder, SearchStrategy,
    ShelfLifeLadder, StabilityModel, StorageConditions, Timeframe,
};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Merged view of the configuration file, `--set` overrides and built-in defaults.
///
/// Command-line flags are applied last, when a command asks for its engine configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    file: FileConfig,
    source: Option<PathBuf>,
}

impl AppConfig {
    pub fn load(cli: &Cli) -> Result<Self> {
        let (file, source) = match &cli.config {
            Some(path) => (FileConfig::from_file(path)?, Some(path.clone())),
            None => match default_config_path().filter(|path| path.is_file()) {
                Some(path) => (FileConfig::from_file(&path)?, Some(path)),
                None => (FileConfig::default(), None),
            },
        };
        debug!(source = ?source, overrides = cli.set_values.len(), "Resolved configuration.");
        Self::from_parts(file, source, &cli.set_values)
    }

    pub fn from_parts(
        file: FileConfig,
        source: Option<PathBuf>,
        set_values: &[String],
    ) -> Result<Self> {
        Ok(Self {
            file: apply_set_values(file, set_values)?,
            source,
        })
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// Materials files from the config file followed by those given on the command line.
    pub fn database_paths(&self, cli_paths: &[PathBuf]) -> Vec<PathBuf> {
        self.file
            .databases
            .iter()
            .chain(cli_paths)
            .cloned()
            .collect()
    }

    pub fn scoring(&self, model_override: Option<&str>) -> Result<ScoringConfig> {
        let defaults = DefaultsConfig::default();
        let file = self.file.scoring.clone().unwrap_or_default();

        let model: StabilityModel = parse_named(
            "scoring.model",
            model_override.or(file.model.as_deref()).unwrap_or(&defaults.model),
        )?;
        let mut mixing_law: TgMixingLaw = parse_named(
            "scoring.mixing-law",
            file.mixing_law.as_deref().unwrap_or(&defaults.mixing_law),
        )?;
        if let Some(k) = file.gordon_taylor_k {
            match mixing_law {
                TgMixingLaw::GordonTaylor(_) => mixing_law = TgMixingLaw::gordon_taylor(Some(k)),
                _ => {
                    return Err(CliError::Config(format!(
                        "`gordon-taylor-k` only applies to the gordon_taylor mixing law, not {}",
                        mixing_law
                    )));
                }
            }
        }
        let miscibility: MiscibilityMethod = parse_named(
            "scoring.miscibility-method",
            file.miscibility_method
                .as_deref()
                .unwrap_or(&defaults.miscibility_method),
        )?;

        let mut builder = ScoringConfigBuilder::new()
            .model(model)
            .mixing_law(mixing_law)
            .miscibility(miscibility);
        if let Some(weights) = file.weights {
            builder = builder.weights(merge_weights(model.default_weights(), weights));
        }
        if let Some(span) = file.tg_margin_span {
            builder = builder.tg_margin_span_c(span);
        }
        if let Some(required) = file.require_miscibility {
            builder = builder.require_miscibility(required);
        }
        if let Some(ladder) = file.shelf_life.as_deref() {
            builder = builder.shelf_life(parse_shelf_life(ladder)?);
        }
        Ok(builder.build()?)
    }

    pub fn conditions(&self, args: &ConditionArgs) -> Result<(StorageConditions, Timeframe)> {
        let defaults = DefaultsConfig::default();
        let file = self.file.conditions.clone().unwrap_or_default();

        let temperature = args
            .temperature
            .or(file.temperature)
            .unwrap_or(defaults.temperature);
        let humidity = args.humidity.or(file.humidity).unwrap_or(defaults.humidity);
        let timeframe = parse_named(
            "conditions.timeframe",
            args.timeframe
                .as_deref()
                .or(file.timeframe.as_deref())
                .unwrap_or(&defaults.timeframe),
        )?;
        Ok((StorageConditions::new(temperature, humidity)?, timeframe))
    }

    pub fn optimizer(&self, args: &OptimizeArgs) -> Result<OptimizerConfig> {
        let defaults = DefaultsConfig::default();
        let file = self.file.optimizer.clone().unwrap_or_default();
        let (conditions, timeframe) = self.conditions(&args.conditions)?;

        let strategy: SearchStrategy = parse_named(
            "optimizer.strategy",
            args.strategy
                .as_deref()
                .or(file.strategy.as_deref())
                .unwrap_or(&defaults.strategy),
        )?;

        let mut builder = OptimizerConfigBuilder::new()
            .loading_range(
                args.min_loading
                    .or(file.min_loading)
                    .unwrap_or(defaults.min_loading),
                args.max_loading
                    .or(file.max_loading)
                    .unwrap_or(defaults.max_loading),
            )
            .min_stability(
                args.min_stability
                    .or(file.min_stability)
                    .unwrap_or(defaults.min_stability),
            )
            .strategy(strategy)
            .conditions(conditions)
            .timeframe(timeframe);
        if let Some(points) = file.grid_points {
            builder = builder.grid_points(points);
        }
        if let Some(iterations) = file.max_iterations {
            builder = builder.max_iterations(iterations);
        }
        if let Some(tolerance) = file.tolerance {
            builder = builder.tolerance(tolerance);
        }
        Ok(builder.build()?)
    }

    /// `threads` is the global `-j` flag, which takes precedence over `max-workers`.
    pub fn screening(&self, args: &ScreenArgs, threads: Option<usize>) -> Result<ScreeningConfig> {
        let defaults = DefaultsConfig::default();
        let file = self.file.screening.clone().unwrap_or_default();
        let (conditions, timeframe) = self.conditions(&args.conditions)?;

        let execution = if args.sequential || file.sequential.unwrap_or(false) {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel {
                max_workers: threads.or(file.max_workers).unwrap_or(defaults.max_workers),
            }
        };

        let mut builder = ScreeningConfigBuilder::new()
            .drug_loading(
                args.loading
                    .or(file.drug_loading)
                    .unwrap_or(defaults.screening_loading),
            )
            .execution(execution)
            .conditions(conditions)
            .timeframe(timeframe);
        if let Some(secs) = file.timeout_secs {
            let timeout = Duration::try_from_secs_f64(secs).map_err(|_| {
                CliError::Config(format!(
                    "`screening.timeout-secs` must be a non-negative number, got {}",
                    secs
                ))
            })?;
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "asdkit", "asdkit").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn parse_named<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = PropertyError>,
{
    value
        .parse()
        .map_err(|e: PropertyError| CliError::Config(format!("{}: {}", key, e)))
}

fn parse_shelf_life(name: &str) -> Result<ShelfLifeLadder> {
    match name.trim().to_ascii_lowercase().as_str() {
        "default" => Ok(ShelfLifeLadder::default()),
        "extended" => Ok(ShelfLifeLadder::extended()),
        _ => Err(CliError::Config(format!(
            "Invalid shelf-life ladder '{}'. Valid values are: default, extended",
            name
        ))),
    }
}

fn merge_weights(base: FactorWeights, file: FileWeightsConfig) -> FactorWeights {
    FactorWeights {
        tg: file.tg.unwrap_or(base.tg),
        miscibility: file.miscibility.unwrap_or(base.miscibility),
        loading: file.loading.unwrap_or(base.loading),
        hygroscopicity: file.hygroscopicity.unwrap_or(base.hygroscopicity),
        crystallization: file.crystallization.unwrap_or(base.crystallization),
        process: file.process.unwrap_or(base.process),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        if let Some(weight) = key.strip_prefix("scoring.weights.") {
            let weights = config
                .scoring
                .get_or_insert_with(Default::default)
                .weights
                .get_or_insert_with(Default::default);
            let slot = match weight {
                "tg" => &mut weights.tg,
                "miscibility" => &mut weights.miscibility,
                "loading" => &mut weights.loading,
                "hygroscopicity" => &mut weights.hygroscopicity,
                "crystallization" => &mut weights.crystallization,
                "process" => &mut weights.process,
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            };
            *slot = Some(parse_value(key, value_str, "float")?);
            continue;
        }

        match key {
            "scoring.model" => {
                config.scoring.get_or_insert_with(Default::default).model =
                    Some(value_str.to_string());
            }
            "scoring.mixing-law" => {
                config.scoring.get_or_insert_with(Default::default).mixing_law =
                    Some(value_str.to_string());
            }
            "scoring.gordon-taylor-k" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .gordon_taylor_k = Some(parse_value(key, value_str, "float")?);
            }
            "scoring.miscibility-method" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .miscibility_method = Some(value_str.to_string());
            }
            "scoring.tg-margin-span" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .tg_margin_span = Some(parse_value(key, value_str, "float")?);
            }
            "scoring.require-miscibility" => {
                config
                    .scoring
                    .get_or_insert_with(Default::default)
                    .require_miscibility = Some(parse_value(key, value_str, "boolean")?);
            }
            "scoring.shelf-life" => {
                config.scoring.get_or_insert_with(Default::default).shelf_life =
                    Some(value_str.to_string());
            }
            "conditions.temperature" => {
                config
                    .conditions
                    .get_or_insert_with(Default::default)
                    .temperature = Some(parse_value(key, value_str, "float")?);
            }
            "conditions.humidity" => {
                config.conditions.get_or_insert_with(Default::default).humidity =
                    Some(parse_value(key, value_str, "float")?);
            }
            "conditions.timeframe" => {
                config
                    .conditions
                    .get_or_insert_with(Default::default)
                    .timeframe = Some(value_str.to_string());
            }
            "optimizer.min-loading" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .min_loading = Some(parse_value(key, value_str, "float")?);
            }
            "optimizer.max-loading" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .max_loading = Some(parse_value(key, value_str, "float")?);
            }
            "optimizer.min-stability" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .min_stability = Some(parse_value(key, value_str, "float")?);
            }
            "optimizer.strategy" => {
                config.optimizer.get_or_insert_with(Default::default).strategy =
                    Some(value_str.to_string());
            }
            "optimizer.grid-points" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .grid_points = Some(parse_value(key, value_str, "integer")?);
            }
            "optimizer.max-iterations" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value_str, "integer")?);
            }
            "optimizer.tolerance" => {
                config
                    .optimizer
                    .get_or_insert_with(Default::default)
                    .tolerance = Some(parse_value(key, value_str, "float")?);
            }
            "screening.drug-loading" => {
                config
                    .screening
                    .get_or_insert_with(Default::default)
                    .drug_loading = Some(parse_value(key, value_str, "float")?);
            }
            "screening.sequential" => {
                config
                    .screening
                    .get_or_insert_with(Default::default)
                    .sequential = Some(parse_value(key, value_str, "boolean")?);
            }
            "screening.max-workers" => {
                config
                    .screening
                    .get_or_insert_with(Default::default)
                    .max_workers = Some(parse_value(key, value_str, "integer")?);
            }
            "screening.timeout-secs" => {
                config
                    .screening
                    .get_or_insert_with(Default::default)
                    .timeout_secs = Some(parse_value(key, value_str, "float")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
