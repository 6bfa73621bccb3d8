use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileWeightsConfig {
    pub tg: Option<f64>,
    pub miscibility: Option<f64>,
    pub loading: Option<f64>,
    pub hygroscopicity: Option<f64>,
    pub crystallization: Option<f64>,
    pub process: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScoringConfig {
    pub model: Option<String>,
    pub mixing_law: Option<String>,
    pub gordon_taylor_k: Option<f64>,
    pub miscibility_method: Option<String>,
    pub tg_margin_span: Option<f64>,
    pub require_miscibility: Option<bool>,
    /// `default` or `extended`.
    pub shelf_life: Option<String>,
    pub weights: Option<FileWeightsConfig>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConditionsConfig {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub timeframe: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileOptimizerConfig {
    pub min_loading: Option<f64>,
    pub max_loading: Option<f64>,
    pub min_stability: Option<f64>,
    pub strategy: Option<String>,
    pub grid_points: Option<usize>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileScreeningConfig {
    pub drug_loading: Option<f64>,
    pub sequential: Option<bool>,
    pub max_workers: Option<usize>,
    pub timeout_secs: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    /// Materials files loaded before any given with `--database`.
    #[serde(default)]
    pub databases: Vec<PathBuf>,
    pub scoring: Option<FileScoringConfig>,
    pub conditions: Option<FileConditionsConfig>,
    pub optimizer: Option<FileOptimizerConfig>,
    pub screening: Option<FileScreeningConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn full_file_parses_into_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            databases = ["lab-polymers.toml"]

            [scoring]
            model = "combined"
            mixing-law = "fox"
            require-miscibility = false
            shelf-life = "extended"

            [scoring.weights]
            tg = 0.3
            process = 0.05

            [conditions]
            temperature = 40.0
            humidity = 75.0
            timeframe = "intermediate"

            [optimizer]
            min-stability = 0.65
            strategy = "grid"
            grid-points = 17

            [screening]
            drug-loading = 0.25
            max-workers = 8
            timeout-secs = 2.5
            "#,
        )
        .unwrap();

        let config = FileConfig::from_file(&path).unwrap();
        assert_eq!(config.databases, vec![PathBuf::from("lab-polymers.toml")]);
        let scoring = config.scoring.unwrap();
        assert_eq!(scoring.model.as_deref(), Some("combined"));
        assert_eq!(scoring.require_miscibility, Some(false));
        assert_eq!(scoring.weights.unwrap().tg, Some(0.3));
        assert_eq!(config.conditions.unwrap().humidity, Some(75.0));
        assert_eq!(config.optimizer.unwrap().grid_points, Some(17));
        assert_eq!(config.screening.unwrap().max_workers, Some(8));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[optimizer]\nmin-stabilty = 0.7\n").unwrap();
        assert!(matches!(
            FileConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
