use crate::error::{CliError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::LevelFilter,
    fmt::{self},
    prelude::*,
    registry::LookupSpan,
};

pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Opens the log file, creating missing parent directories.
fn create_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(CliError::Io)?;
    }
    File::create(path).map_err(CliError::Io)
}

/// Plain-text layer for log files; keeps targets so library events can be traced to
/// the scorer, optimizer or screener that emitted them.
fn file_layer<S>(file: File) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter(verbosity, quiet))
        .with(stderr_layer);

    match log_file {
        Some(path) => subscriber.with(file_layer(create_log_file(&path)?)).init(),
        None => subscriber.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use asdkit::core::models::formulation::Formulation;
    use asdkit::core::models::substance::{HansenParameters, SubstanceKind, SubstanceProperties};
    use asdkit::engine::config::{StorageConditions, Timeframe};
    use asdkit::engine::stability::StabilityScorer;
    use serial_test::serial;
    use std::sync::Arc;

    fn formulation_without_polymer_tg() -> Formulation {
        let api = SubstanceProperties::builder("nifedipine", SubstanceKind::Api)
            .glass_transition_c(45.0)
            .solubility_parameters(HansenParameters::new(19.2, 8.8, 7.4).unwrap())
            .build()
            .unwrap();
        let polymer = SubstanceProperties::builder("uncharacterised copolymer", SubstanceKind::Polymer)
            .solubility_parameters(HansenParameters::new(17.5, 7.0, 9.0).unwrap())
            .build()
            .unwrap();
        Formulation::new(Arc::new(api), Arc::new(polymer), 0.25).unwrap()
    }

    #[test]
    fn verbosity_maps_onto_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[test]
    #[serial]
    fn scorer_fallback_warnings_reach_the_log_file_with_their_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("asdkit.log");

        let file = create_log_file(&log_path).unwrap();
        let subscriber = tracing_subscriber::registry().with(file_layer(file));
        let result = tracing::subscriber::with_default(subscriber, || {
            StabilityScorer::default()
                .score(
                    &formulation_without_polymer_tg(),
                    &StorageConditions::default(),
                    Timeframe::LongTerm,
                )
                .unwrap()
        });
        assert!(!result.defaulted_factors.is_empty());

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Tg margin falls back to neutral"));
        assert!(content.contains("uncharacterised copolymer"));
        assert!(content.contains("asdkit::engine::stability"));
        assert!(content.contains(" WARN "));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains('\u{1b}'));
    }

    #[test]
    fn log_file_parent_directories_are_created() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("runs").join("screen").join("asdkit.log");

        create_log_file(&log_path).unwrap();
        assert!(log_path.is_file());
    }

    #[test]
    #[serial]
    fn unwritable_log_file_is_an_io_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
