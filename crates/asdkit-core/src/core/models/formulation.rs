use super::substance::{ParameterValue, SubstanceKind, SubstanceProperties};
use crate::core::error::{PropertyError, check_fraction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMethod {
    HotMeltExtrusion,
    SprayDrying,
    FreezeDrying,
    CoPrecipitation,
    Kinetisol,
    CoMilling,
    SolventEvaporation,
}

impl ProcessMethod {
    pub const ALL: [ProcessMethod; 7] = [
        ProcessMethod::HotMeltExtrusion,
        ProcessMethod::SprayDrying,
        ProcessMethod::FreezeDrying,
        ProcessMethod::CoPrecipitation,
        ProcessMethod::Kinetisol,
        ProcessMethod::CoMilling,
        ProcessMethod::SolventEvaporation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessMethod::HotMeltExtrusion => "hot_melt_extrusion",
            ProcessMethod::SprayDrying => "spray_drying",
            ProcessMethod::FreezeDrying => "freeze_drying",
            ProcessMethod::CoPrecipitation => "co_precipitation",
            ProcessMethod::Kinetisol => "kinetisol",
            ProcessMethod::CoMilling => "co_milling",
            ProcessMethod::SolventEvaporation => "solvent_evaporation",
        }
    }

    /// Parameter names that characterise a run of this process.
    pub fn characteristic_parameters(&self) -> &'static [&'static str] {
        match self {
            ProcessMethod::HotMeltExtrusion => &["temperature", "screw_speed"],
            ProcessMethod::SprayDrying => {
                &["inlet_temperature", "outlet_temperature", "feed_rate"]
            }
            ProcessMethod::FreezeDrying => &[
                "freezing_temperature",
                "drying_temperature",
                "drying_pressure",
            ],
            ProcessMethod::CoPrecipitation => &["solvent", "anti_solvent", "solvent_ratio"],
            ProcessMethod::Kinetisol => &["processing_temperature", "processing_time", "rpm"],
            ProcessMethod::CoMilling => &["milling_time", "rotation_speed"],
            ProcessMethod::SolventEvaporation => &["solvent", "evaporation_temperature"],
        }
    }
}

impl fmt::Display for ProcessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessMethod {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                PropertyError::unknown_name("process method", s, &valid)
            })
    }
}

pub type ProcessParameters = BTreeMap<String, ParameterValue>;

/// An API dispersed in a polymer at a fixed drug loading (API weight fraction).
#[derive(Debug, Clone, PartialEq)]
pub struct Formulation {
    api: Arc<SubstanceProperties>,
    polymer: Arc<SubstanceProperties>,
    drug_loading: f64,
    process: Option<ProcessMethod>,
    process_parameters: ProcessParameters,
}

impl Formulation {
    pub fn new(
        api: Arc<SubstanceProperties>,
        polymer: Arc<SubstanceProperties>,
        drug_loading: f64,
    ) -> Result<Self, PropertyError> {
        if api.kind() != SubstanceKind::Api {
            return Err(PropertyError::InvalidInput(format!(
                "'{}' is a {}, expected an API",
                api.name(),
                api.kind()
            )));
        }
        if polymer.kind() != SubstanceKind::Polymer {
            return Err(PropertyError::InvalidInput(format!(
                "'{}' is an {}, expected a polymer",
                polymer.name(),
                polymer.kind()
            )));
        }
        let drug_loading = check_fraction(drug_loading, "drug_loading")?;
        Ok(Self {
            api,
            polymer,
            drug_loading,
            process: None,
            process_parameters: ProcessParameters::new(),
        })
    }

    pub fn with_process(mut self, method: ProcessMethod, parameters: ProcessParameters) -> Self {
        self.process = Some(method);
        self.process_parameters = parameters;
        self
    }

    /// Same pair and process at another loading.
    pub fn with_loading(&self, drug_loading: f64) -> Result<Self, PropertyError> {
        let drug_loading = check_fraction(drug_loading, "drug_loading")?;
        Ok(Self {
            api: Arc::clone(&self.api),
            polymer: Arc::clone(&self.polymer),
            drug_loading,
            process: self.process,
            process_parameters: self.process_parameters.clone(),
        })
    }

    /// Same API and process with another carrier polymer.
    pub fn with_polymer(&self, polymer: Arc<SubstanceProperties>) -> Result<Self, PropertyError> {
        let mut next = Self::new(Arc::clone(&self.api), polymer, self.drug_loading)?;
        next.process = self.process;
        next.process_parameters = self.process_parameters.clone();
        Ok(next)
    }

    pub fn api(&self) -> &SubstanceProperties {
        &self.api
    }
    pub fn api_arc(&self) -> &Arc<SubstanceProperties> {
        &self.api
    }
    pub fn polymer(&self) -> &SubstanceProperties {
        &self.polymer
    }
    pub fn polymer_arc(&self) -> &Arc<SubstanceProperties> {
        &self.polymer
    }
    pub fn drug_loading(&self) -> f64 {
        self.drug_loading
    }
    pub fn polymer_fraction(&self) -> f64 {
        1.0 - self.drug_loading
    }
    pub fn process(&self) -> Option<ProcessMethod> {
        self.process
    }
    pub fn process_parameters(&self) -> &ProcessParameters {
        &self.process_parameters
    }

    /// Characteristic parameters of the chosen process that were not supplied.
    pub fn missing_process_parameters(&self) -> Vec<&'static str> {
        self.process
            .map(|method| {
                method
                    .characteristic_parameters()
                    .iter()
                    .copied()
                    .filter(|name| !self.process_parameters.contains_key(*name))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> FormulationSnapshot {
        FormulationSnapshot {
            api: self.api.name().to_string(),
            polymer: self.polymer.name().to_string(),
            drug_loading: self.drug_loading,
            process_method: self.process,
            process_parameters: self.process_parameters.clone(),
        }
    }
}

impl fmt::Display for Formulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {} ({:.1}% drug loading)",
            self.api.name(),
            self.polymer.name(),
            self.drug_loading * 100.0
        )?;
        if let Some(method) = self.process {
            write!(f, " via {}", method)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulationSnapshot {
    pub api: String,
    pub polymer: String,
    pub drug_loading: f64,
    pub process_method: Option<ProcessMethod>,
    pub process_parameters: ProcessParameters,
}
