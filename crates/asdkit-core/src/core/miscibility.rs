//! API/polymer miscibility from solubility parameters.
//!
//! Two estimators map a pair of Hansen triples onto a score in `[0, 1]`:
//! the weighted Hansen distance (default) and a Flory-Huggins interaction parameter
//! computed from the scalar Hildebrand parameters. Both mappings are linear clamps
//! against a fixed reference scale, a tunable simplification rather than a physical law.

use super::error::{PropertyError, check_fraction};
use super::models::substance::{HansenParameters, SubstanceProperties};
use std::fmt;
use std::str::FromStr;

/// Hansen distance at which a pair is treated as fully immiscible.
pub const HANSEN_REFERENCE_DISTANCE: f64 = 10.0;
/// Flory-Huggins χ at which a pair is treated as fully immiscible.
pub const FLORY_HUGGINS_REFERENCE_CHI: f64 = 5.0;
/// Reference molar volume in cm³/mol.
pub const REFERENCE_MOLAR_VOLUME: f64 = 100.0;
/// J/(mol·K)
pub const GAS_CONSTANT: f64 = 8.314;
pub const STANDARD_TEMPERATURE_K: f64 = 298.15;

/// `Ra = sqrt(4·Δd² + Δp² + Δh²)`
pub fn hansen_distance(a: &HansenParameters, b: &HansenParameters) -> f64 {
    let delta = a.as_vector() - b.as_vector();
    (4.0 * delta.x.powi(2) + delta.y.powi(2) + delta.z.powi(2)).sqrt()
}

pub fn hildebrand_parameter(parameters: &HansenParameters) -> f64 {
    parameters.total()
}

/// `χ = Vref·(δ1 - δ2)² / (R·T)` with the temperature in kelvin.
pub fn flory_huggins_chi(a: &HansenParameters, b: &HansenParameters, temperature_k: f64) -> f64 {
    let delta = hildebrand_parameter(a) - hildebrand_parameter(b);
    REFERENCE_MOLAR_VOLUME * delta.powi(2) / (GAS_CONSTANT * temperature_k)
}

/// Volume-fraction weighted solubility parameters of a binary mixture.
pub fn mixture_solubility_parameters(
    a: &HansenParameters,
    b: &HansenParameters,
    fraction_a: f64,
) -> Result<HansenParameters, PropertyError> {
    let fraction_a = check_fraction(fraction_a, "volume fraction")?;
    let mixed = a.as_vector() * fraction_a + b.as_vector() * (1.0 - fraction_a);
    HansenParameters::new(mixed.x, mixed.y, mixed.z)
}

pub trait MiscibilityModel {
    fn score(&self, api: &HansenParameters, polymer: &HansenParameters) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HansenDistance {
    pub reference_distance: f64,
}

impl Default for HansenDistance {
    fn default() -> Self {
        Self {
            reference_distance: HANSEN_REFERENCE_DISTANCE,
        }
    }
}

impl MiscibilityModel for HansenDistance {
    fn score(&self, api: &HansenParameters, polymer: &HansenParameters) -> f64 {
        (1.0 - hansen_distance(api, polymer) / self.reference_distance).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloryHuggins {
    pub temperature_k: f64,
    pub reference_chi: f64,
}

impl Default for FloryHuggins {
    fn default() -> Self {
        Self {
            temperature_k: STANDARD_TEMPERATURE_K,
            reference_chi: FLORY_HUGGINS_REFERENCE_CHI,
        }
    }
}

impl MiscibilityModel for FloryHuggins {
    fn score(&self, api: &HansenParameters, polymer: &HansenParameters) -> f64 {
        let chi = flory_huggins_chi(api, polymer, self.temperature_k);
        (1.0 - chi / self.reference_chi).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MiscibilityMethod {
    Hansen(HansenDistance),
    FloryHuggins(FloryHuggins),
}

impl Default for MiscibilityMethod {
    fn default() -> Self {
        MiscibilityMethod::Hansen(HansenDistance::default())
    }
}

impl MiscibilityMethod {
    pub const NAMES: [&'static str; 2] = ["hansen", "flory_huggins"];

    pub fn name(&self) -> &'static str {
        match self {
            MiscibilityMethod::Hansen(_) => "hansen",
            MiscibilityMethod::FloryHuggins(_) => "flory_huggins",
        }
    }

    /// Scores a substance pair, failing when either side lacks a solubility triple.
    pub fn estimate(
        &self,
        api: &SubstanceProperties,
        polymer: &SubstanceProperties,
    ) -> Result<f64, PropertyError> {
        let api_hsp = api.require_solubility_parameters()?;
        let polymer_hsp = polymer.require_solubility_parameters()?;
        Ok(self.score(api_hsp, polymer_hsp))
    }
}

impl MiscibilityModel for MiscibilityMethod {
    fn score(&self, api: &HansenParameters, polymer: &HansenParameters) -> f64 {
        match self {
            MiscibilityMethod::Hansen(model) => model.score(api, polymer),
            MiscibilityMethod::FloryHuggins(model) => model.score(api, polymer),
        }
    }
}

impl fmt::Display for MiscibilityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MiscibilityMethod {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "hansen" => Ok(MiscibilityMethod::Hansen(HansenDistance::default())),
            "flory_huggins" => Ok(MiscibilityMethod::FloryHuggins(FloryHuggins::default())),
            _ => Err(PropertyError::unknown_name(
                "miscibility method",
                s,
                &Self::NAMES,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::substance::SubstanceKind;
    use proptest::prelude::*;

    fn hsp(d: f64, p: f64, h: f64) -> HansenParameters {
        HansenParameters::new(d, p, h).unwrap()
    }

    #[test]
    fn ibuprofen_and_pvp_distance_and_score_match_hand_calculation() {
        let api = hsp(18.2, 3.8, 8.0);
        let polymer = hsp(17.0, 8.0, 12.0);

        let distance = hansen_distance(&api, &polymer);
        assert!((distance - 39.4f64.sqrt()).abs() < 1e-9);
        assert!((distance - 6.277).abs() < 0.001);

        let score = MiscibilityMethod::default().score(&api, &polymer);
        assert!((score - (1.0 - 39.4f64.sqrt() / 10.0)).abs() < 1e-9);
        assert!((score - 0.373).abs() < 0.001);
    }

    #[test]
    fn hansen_distance_weights_dispersive_term_by_four() {
        let a = hsp(15.0, 6.0, 9.0);
        let b = hsp(18.5, 6.0, 9.0);
        assert!((hansen_distance(&a, &b) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn identical_triples_score_exactly_one_for_both_methods() {
        let a = hsp(17.5, 7.0, 9.0);
        assert_eq!(MiscibilityMethod::default().score(&a, &a), 1.0);
        assert_eq!("flory_huggins".parse::<MiscibilityMethod>().unwrap().score(&a, &a), 1.0);
    }

    #[test]
    fn flory_huggins_chi_uses_hildebrand_difference() {
        let a = hsp(3.0, 4.0, 0.0);
        let b = hsp(0.0, 0.0, 0.0);
        let expected = 100.0 * 25.0 / (8.314 * 298.15);
        assert!((flory_huggins_chi(&a, &b, STANDARD_TEMPERATURE_K) - expected).abs() < 1e-12);
    }

    #[test]
    fn mixture_parameters_interpolate_by_volume_fraction() {
        let mixed =
            mixture_solubility_parameters(&hsp(20.0, 10.0, 0.0), &hsp(10.0, 0.0, 10.0), 0.25)
                .unwrap();
        assert!((mixed.dispersive - 12.5).abs() < 1e-12);
        assert!((mixed.polar - 2.5).abs() < 1e-12);
        assert!((mixed.hydrogen - 7.5).abs() < 1e-12);
        assert!(mixture_solubility_parameters(&mixed, &mixed, 1.2).is_err());
    }

    #[test]
    fn estimate_fails_with_missing_parameter_when_polymer_has_no_triple() {
        let api = SubstanceProperties::builder("ibuprofen", SubstanceKind::Api)
            .solubility_parameters(hsp(18.2, 3.8, 8.0))
            .build()
            .unwrap();
        let polymer = SubstanceProperties::builder("mystery polymer", SubstanceKind::Polymer)
            .build()
            .unwrap();
        let err = MiscibilityMethod::default()
            .estimate(&api, &polymer)
            .unwrap_err();
        assert_eq!(
            err,
            PropertyError::MissingParameter {
                substance: "mystery polymer".to_string(),
                parameter: "solubility_parameters",
            }
        );
    }

    #[test]
    fn unknown_method_name_is_invalid_input() {
        assert!(matches!(
            "unifac".parse::<MiscibilityMethod>(),
            Err(PropertyError::InvalidInput(_))
        ));
        assert_eq!(
            "Flory-Huggins".parse::<MiscibilityMethod>().unwrap().name(),
            "flory_huggins"
        );
    }

    fn triple() -> impl Strategy<Value = HansenParameters> {
        (0.0f64..40.0, 0.0f64..30.0, 0.0f64..45.0).prop_map(|(d, p, h)| hsp(d, p, h))
    }

    proptest! {
        #[test]
        fn scores_stay_in_unit_interval(a in triple(), b in triple()) {
            for method in ["hansen", "flory_huggins"] {
                let score = method.parse::<MiscibilityMethod>().unwrap().score(&a, &b);
                prop_assert!((0.0..=1.0).contains(&score));
            }
        }

        #[test]
        fn dispersive_only_difference_doubles_the_distance(
            base in triple(),
            delta in 0.0f64..10.0,
        ) {
            let shifted = hsp(base.dispersive + delta, base.polar, base.hydrogen);
            prop_assert!((hansen_distance(&base, &shifted) - 2.0 * delta).abs() < 1e-9);
        }
    }
}
