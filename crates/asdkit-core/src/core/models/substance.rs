use crate::core::error::{PropertyError, check_fraction};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstanceKind {
    Api,
    Polymer,
}

impl fmt::Display for SubstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstanceKind::Api => write!(f, "API"),
            SubstanceKind::Polymer => write!(f, "polymer"),
        }
    }
}

impl FromStr for SubstanceKind {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(SubstanceKind::Api),
            "polymer" => Ok(SubstanceKind::Polymer),
            other => Err(PropertyError::unknown_name(
                "substance kind",
                other,
                &["api", "polymer"],
            )),
        }
    }
}

/// Hansen solubility parameter triple, in MPa^0.5.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HansenParameters {
    pub dispersive: f64,
    pub polar: f64,
    pub hydrogen: f64,
}

impl HansenParameters {
    pub fn new(dispersive: f64, polar: f64, hydrogen: f64) -> Result<Self, PropertyError> {
        for (name, value) in [
            ("dispersive", dispersive),
            ("polar", polar),
            ("hydrogen", hydrogen),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PropertyError::InvalidInput(format!(
                    "Hansen component '{}' must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(Self {
            dispersive,
            polar,
            hydrogen,
        })
    }

    #[inline]
    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.dispersive, self.polar, self.hydrogen)
    }

    /// Total (Hildebrand) solubility parameter.
    #[inline]
    pub fn total(&self) -> f64 {
        self.as_vector().norm()
    }
}

/// Free-form value for parameter maps and the extension side channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Number(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Flag(v)
    }
}

/// Physical property record of one API or polymer.
///
/// Temperatures are in degrees Celsius. Records are built once through
/// [`SubstanceBuilder`] and only change through the explicit `recompute_*` calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstanceProperties {
    name: String,
    kind: SubstanceKind,
    structure: Option<String>,
    glass_transition_c: Option<f64>,
    melting_point_c: Option<f64>,
    molar_mass: Option<f64>,
    log_p: Option<f64>,
    solubility_parameters: Option<HansenParameters>,
    hygroscopicity: Option<f64>,
    hydrophilicity: Option<f64>,
    crystallization_tendency: Option<f64>,
    degradation_temperature_c: Option<f64>,
    polymer_class: Option<String>,
    extensions: BTreeMap<String, ParameterValue>,
}

impl SubstanceProperties {
    pub fn builder(name: impl Into<String>, kind: SubstanceKind) -> SubstanceBuilder {
        SubstanceBuilder::new(name, kind)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> SubstanceKind {
        self.kind
    }
    pub fn structure(&self) -> Option<&str> {
        self.structure.as_deref()
    }
    pub fn glass_transition_c(&self) -> Option<f64> {
        self.glass_transition_c
    }
    pub fn melting_point_c(&self) -> Option<f64> {
        self.melting_point_c
    }
    pub fn molar_mass(&self) -> Option<f64> {
        self.molar_mass
    }
    pub fn log_p(&self) -> Option<f64> {
        self.log_p
    }
    pub fn solubility_parameters(&self) -> Option<&HansenParameters> {
        self.solubility_parameters.as_ref()
    }
    pub fn hygroscopicity(&self) -> Option<f64> {
        self.hygroscopicity
    }
    pub fn hydrophilicity(&self) -> Option<f64> {
        self.hydrophilicity
    }
    pub fn crystallization_tendency(&self) -> Option<f64> {
        self.crystallization_tendency
    }
    pub fn degradation_temperature_c(&self) -> Option<f64> {
        self.degradation_temperature_c
    }
    pub fn polymer_class(&self) -> Option<&str> {
        self.polymer_class.as_deref()
    }
    pub fn extensions(&self) -> &BTreeMap<String, ParameterValue> {
        &self.extensions
    }
    pub fn extension(&self, key: &str) -> Option<&ParameterValue> {
        self.extensions.get(key)
    }

    /// Hansen triple, or `MissingParameter` naming this substance.
    pub fn require_solubility_parameters(&self) -> Result<&HansenParameters, PropertyError> {
        self.solubility_parameters
            .as_ref()
            .ok_or_else(|| PropertyError::missing(&self.name, "solubility_parameters"))
    }

    pub fn require_glass_transition(&self) -> Result<f64, PropertyError> {
        self.glass_transition_c
            .ok_or_else(|| PropertyError::missing(&self.name, "glass_transition_temp"))
    }

    /// Overwrites the solubility triple with a freshly derived one.
    pub fn recompute_solubility_parameters(&mut self, parameters: HansenParameters) {
        self.solubility_parameters = Some(parameters);
    }

    pub(crate) fn set_derived_molecular_fields(&mut self, molar_mass: f64, log_p: f64) {
        self.molar_mass = Some(molar_mass);
        self.log_p = Some(log_p);
    }
}

impl fmt::Display for SubstanceProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(mw) = self.molar_mass {
            parts.push(format!("MW: {:.2} g/mol", mw));
        }
        if let Some(mp) = self.melting_point_c {
            parts.push(format!("MP: {:.1}°C", mp));
        }
        if let Some(tg) = self.glass_transition_c {
            parts.push(format!("Tg: {:.1}°C", tg));
        }
        if let Some(h) = self.hygroscopicity {
            parts.push(format!("Hygroscopicity: {:.2}", h));
        }
        if parts.is_empty() {
            write!(f, "{} ({})", self.name, self.kind)
        } else {
            write!(f, "{} ({}; {})", self.name, self.kind, parts.join(", "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubstanceBuilder {
    name: String,
    kind: SubstanceKind,
    structure: Option<String>,
    glass_transition_c: Option<f64>,
    melting_point_c: Option<f64>,
    molar_mass: Option<f64>,
    log_p: Option<f64>,
    solubility_parameters: Option<HansenParameters>,
    hygroscopicity: Option<f64>,
    hydrophilicity: Option<f64>,
    crystallization_tendency: Option<f64>,
    degradation_temperature_c: Option<f64>,
    polymer_class: Option<String>,
    extensions: BTreeMap<String, ParameterValue>,
}

impl SubstanceBuilder {
    pub fn new(name: impl Into<String>, kind: SubstanceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            structure: None,
            glass_transition_c: None,
            melting_point_c: None,
            molar_mass: None,
            log_p: None,
            solubility_parameters: None,
            hygroscopicity: None,
            hydrophilicity: None,
            crystallization_tendency: None,
            degradation_temperature_c: None,
            polymer_class: None,
            extensions: BTreeMap::new(),
        }
    }

    pub fn structure(mut self, structure: impl Into<String>) -> Self {
        self.structure = Some(structure.into());
        self
    }
    pub fn glass_transition_c(mut self, tg: f64) -> Self {
        self.glass_transition_c = Some(tg);
        self
    }
    pub fn melting_point_c(mut self, mp: f64) -> Self {
        self.melting_point_c = Some(mp);
        self
    }
    pub fn molar_mass(mut self, mass: f64) -> Self {
        self.molar_mass = Some(mass);
        self
    }
    pub fn log_p(mut self, log_p: f64) -> Self {
        self.log_p = Some(log_p);
        self
    }
    pub fn solubility_parameters(mut self, parameters: HansenParameters) -> Self {
        self.solubility_parameters = Some(parameters);
        self
    }
    pub fn hygroscopicity(mut self, value: f64) -> Self {
        self.hygroscopicity = Some(value);
        self
    }
    pub fn hydrophilicity(mut self, value: f64) -> Self {
        self.hydrophilicity = Some(value);
        self
    }
    pub fn crystallization_tendency(mut self, value: f64) -> Self {
        self.crystallization_tendency = Some(value);
        self
    }
    pub fn degradation_temperature_c(mut self, value: f64) -> Self {
        self.degradation_temperature_c = Some(value);
        self
    }
    pub fn polymer_class(mut self, class: impl Into<String>) -> Self {
        self.polymer_class = Some(class.into());
        self
    }
    pub fn extension(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<SubstanceProperties, PropertyError> {
        if self.name.trim().is_empty() {
            return Err(PropertyError::InvalidInput(
                "Substance name must not be empty".to_string(),
            ));
        }
        if let Some(h) = self.hygroscopicity {
            check_fraction(h, "hygroscopicity")?;
        }
        if let Some(h) = self.hydrophilicity {
            check_fraction(h, "hydrophilicity")?;
        }
        if let Some(c) = self.crystallization_tendency {
            check_fraction(c, "crystallization_tendency")?;
        }
        if let Some(mass) = self.molar_mass {
            if !(mass > 0.0) {
                return Err(PropertyError::InvalidInput(format!(
                    "molar_mass must be positive, got {}",
                    mass
                )));
            }
        }
        for (label, temp) in [
            ("glass_transition_temp", self.glass_transition_c),
            ("melting_point", self.melting_point_c),
            ("degradation_temperature", self.degradation_temperature_c),
        ] {
            if let Some(t) = temp {
                if !t.is_finite() || t <= -273.15 {
                    return Err(PropertyError::InvalidInput(format!(
                        "{} must lie above absolute zero, got {}",
                        label, t
                    )));
                }
            }
        }

        let hygroscopicity = match (self.kind, self.hygroscopicity, self.hydrophilicity) {
            (SubstanceKind::Polymer, None, Some(hydrophilicity)) => {
                Some(hygroscopicity_from_hydrophilicity(hydrophilicity))
            }
            (_, measured, _) => measured,
        };

        Ok(SubstanceProperties {
            name: self.name,
            kind: self.kind,
            structure: self.structure,
            glass_transition_c: self.glass_transition_c,
            melting_point_c: self.melting_point_c,
            molar_mass: self.molar_mass,
            log_p: self.log_p,
            solubility_parameters: self.solubility_parameters,
            hygroscopicity,
            hydrophilicity: self.hydrophilicity,
            crystallization_tendency: self.crystallization_tendency,
            degradation_temperature_c: self.degradation_temperature_c,
            polymer_class: self.polymer_class,
            extensions: self.extensions,
        })
    }
}

/// Polymer moisture uptake estimated from hydrophilicity when it was not measured.
pub fn hygroscopicity_from_hydrophilicity(hydrophilicity: f64) -> f64 {
    (0.8 * hydrophilicity + 0.1).clamp(0.0, 1.0)
}
