pub mod materials;
pub mod optimize;
pub mod score;
pub mod screen;

use crate::cli::{Cli, OutputFormat, ProcessArgs};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use asdkit::core::materials::{MaterialsDatabase, PropertyProvider};
use asdkit::core::models::formulation::{Formulation, ProcessMethod, ProcessParameters};
use asdkit::core::models::substance::{ParameterValue, SubstanceKind};
use std::path::PathBuf;
use tracing::info;

/// Settings every subcommand shares, resolved once from the global flags.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: AppConfig,
    pub databases: Vec<PathBuf>,
    pub format: OutputFormat,
    pub threads: Option<usize>,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let databases = config.database_paths(&cli.databases);
        Ok(Self {
            config,
            databases,
            format: cli.format,
            threads: cli.threads,
            quiet: cli.quiet,
        })
    }

    /// The built-in catalogue with every configured materials file layered on top, in order.
    pub fn load_database(&self) -> Result<MaterialsDatabase> {
        let mut db = MaterialsDatabase::new()?;
        for path in &self.databases {
            let loaded = db.load(path)?;
            info!(path = %path.display(), records = loaded, "Loaded materials file.");
        }
        Ok(db)
    }

    /// Progress bars stay off the terminal for quiet runs and machine-readable output.
    pub fn progress_handler(&self) -> CliProgressHandler {
        if self.quiet || self.format == OutputFormat::Json {
            CliProgressHandler::hidden()
        } else {
            CliProgressHandler::new()
        }
    }
}

fn parse_parameter_value(raw: &str) -> ParameterValue {
    let trimmed = raw.trim();
    if let Ok(number) = trimmed.parse::<f64>() {
        return ParameterValue::Number(number);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => ParameterValue::Flag(true),
        "false" => ParameterValue::Flag(false),
        _ => ParameterValue::Text(trimmed.to_string()),
    }
}

pub fn parse_process(args: &ProcessArgs) -> Result<Option<(ProcessMethod, ProcessParameters)>> {
    let Some(name) = &args.process else {
        return Ok(None);
    };
    let method: ProcessMethod = name.parse()?;
    let mut parameters = ProcessParameters::new();
    for pair in &args.process_params {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CliError::Argument(format!(
                "Invalid --process-param format: '{}'. Expected KEY=VALUE.",
                pair
            )));
        };
        parameters.insert(key.trim().to_string(), parse_parameter_value(value));
    }
    Ok(Some((method, parameters)))
}

pub fn build_formulation(
    db: &MaterialsDatabase,
    api: &str,
    polymer: &str,
    loading: f64,
    process: &ProcessArgs,
) -> Result<Formulation> {
    let api = db.lookup(api, SubstanceKind::Api)?;
    let polymer = db.lookup(polymer, SubstanceKind::Polymer)?;
    let mut formulation = Formulation::new(api, polymer, loading)?;
    if let Some((method, parameters)) = parse_process(process)? {
        formulation = formulation.with_process(method, parameters);
        let missing = formulation.missing_process_parameters();
        if !missing.is_empty() {
            info!(
                process = %method,
                missing = ?missing,
                "Process parameters not supplied; they do not affect scoring."
            );
        }
    }
    Ok(formulation)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::AppConfig;

    pub fn context(format: OutputFormat) -> CommandContext {
        CommandContext {
            config: AppConfig::default(),
            databases: vec![],
            format,
            threads: None,
            quiet: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdkit::core::error::PropertyError;

    fn process_args(process: &str, params: &[&str]) -> ProcessArgs {
        ProcessArgs {
            process: Some(process.to_string()),
            process_params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn process_parameters_are_typed_by_content() {
        let (method, parameters) = parse_process(&process_args(
            "hot-melt-extrusion",
            &["temperature=160", "vented=true", "screw=twin"],
        ))
        .unwrap()
        .unwrap();
        assert_eq!(method, ProcessMethod::HotMeltExtrusion);
        assert_eq!(parameters["temperature"], ParameterValue::Number(160.0));
        assert_eq!(parameters["vented"], ParameterValue::Flag(true));
        assert_eq!(parameters["screw"], ParameterValue::Text("twin".to_string()));
    }

    #[test]
    fn absent_process_yields_none_and_bad_pairs_are_rejected() {
        assert!(parse_process(&ProcessArgs::default()).unwrap().is_none());
        assert!(matches!(
            parse_process(&process_args("spray_drying", &["inlet"])),
            Err(CliError::Argument(_))
        ));
        assert!(matches!(
            parse_process(&process_args("microwave", &[])),
            Err(CliError::Property(PropertyError::InvalidInput(_)))
        ));
    }

    #[test]
    fn formulation_is_built_from_catalogue_names() {
        let db = MaterialsDatabase::new().unwrap();
        let formulation = build_formulation(
            &db,
            "Felodipine",
            "hpmcas",
            0.3,
            &process_args("spray_drying", &["inlet_temperature=120"]),
        )
        .unwrap();
        assert_eq!(formulation.api().name(), "felodipine");
        assert_eq!(formulation.polymer().name(), "HPMCAS");
        assert_eq!(formulation.process(), Some(ProcessMethod::SprayDrying));
    }

    #[test]
    fn unknown_substances_and_swapped_kinds_are_reported() {
        let db = MaterialsDatabase::new().unwrap();
        assert!(matches!(
            build_formulation(&db, "aspirin", "HPMC", 0.3, &ProcessArgs::default()),
            Err(CliError::Property(PropertyError::NotFound { .. }))
        ));
        assert!(matches!(
            build_formulation(&db, "HPMC", "ibuprofen", 0.3, &ProcessArgs::default()),
            Err(CliError::Property(PropertyError::NotFound { .. }))
        ));
    }

    #[test]
    fn configured_materials_files_extend_the_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.toml");
        std::fs::write(
            &path,
            "[polymers.\"Kollidon VA\"]\ntg = 101.0\nhygroscopicity = 0.55\n",
        )
        .unwrap();
        let mut ctx = test_support::context(OutputFormat::Table);
        ctx.databases = vec![path];

        let db = ctx.load_database().unwrap();
        assert!(db.lookup("kollidon va", SubstanceKind::Polymer).is_ok());
        assert!(db.lookup("PVP K30", SubstanceKind::Polymer).is_ok());
    }
}
