//! Thermal behaviour of API/polymer mixtures.
//!
//! Mixing laws combine pure-component glass transition temperatures on the absolute scale;
//! every public function here takes and returns degrees Celsius.

use super::error::{PropertyError, check_fraction};
use super::miscibility::GAS_CONSTANT;
use std::fmt;
use std::str::FromStr;

pub const CELSIUS_OFFSET: f64 = 273.15;

/// Placeholder heat capacity increments at Tg, used when real values are unavailable.
pub const DEFAULT_CP_API: f64 = 1.0;
pub const DEFAULT_CP_POLYMER: f64 = 2.0;

/// J/(mol·K)
pub const DEFAULT_ENTROPY_OF_FUSION: f64 = 55.0;
pub const DEFAULT_DEGREE_OF_POLYMERIZATION: f64 = 100.0;
pub const DEFAULT_INTERACTION_PARAMETER: f64 = 0.5;
pub const DEFAULT_GORDON_TAYLOR_TOLERANCE_C: f64 = 5.0;

#[inline]
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + CELSIUS_OFFSET
}

#[inline]
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - CELSIUS_OFFSET
}

/// A mixing rule for the glass transition of a binary blend.
///
/// Temperatures are absolute; `w_api` is the API weight fraction, strictly inside `(0, 1)`
/// when called through [`TgMixingLaw::estimate`].
pub trait MixingLaw {
    fn mixture_tg_k(&self, tg_api_k: f64, tg_polymer_k: f64, w_api: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GordonTaylor {
    /// Falls back to `Tg_api / Tg_polymer` (absolute), a crude stand-in for the
    /// density and heat-capacity ratio the true constant requires.
    pub k: Option<f64>,
}

impl GordonTaylor {
    pub fn constant(&self, tg_api_k: f64, tg_polymer_k: f64) -> f64 {
        self.k.unwrap_or(tg_api_k / tg_polymer_k)
    }
}

impl MixingLaw for GordonTaylor {
    fn mixture_tg_k(&self, tg_api_k: f64, tg_polymer_k: f64, w_api: f64) -> f64 {
        let k = self.constant(tg_api_k, tg_polymer_k);
        let w_polymer = 1.0 - w_api;
        (w_api * tg_api_k + k * w_polymer * tg_polymer_k) / (w_api + k * w_polymer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fox;

impl MixingLaw for Fox {
    fn mixture_tg_k(&self, tg_api_k: f64, tg_polymer_k: f64, w_api: f64) -> f64 {
        let w_polymer = 1.0 - w_api;
        if w_api == 0.0 {
            return tg_polymer_k;
        }
        if w_polymer == 0.0 {
            return tg_api_k;
        }
        1.0 / (w_api / tg_api_k + w_polymer / tg_polymer_k)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouchmanKarasz {
    pub cp_api: f64,
    pub cp_polymer: f64,
}

impl Default for CouchmanKarasz {
    fn default() -> Self {
        Self {
            cp_api: DEFAULT_CP_API,
            cp_polymer: DEFAULT_CP_POLYMER,
        }
    }
}

impl MixingLaw for CouchmanKarasz {
    fn mixture_tg_k(&self, tg_api_k: f64, tg_polymer_k: f64, w_api: f64) -> f64 {
        let w_polymer = 1.0 - w_api;
        if w_api == 0.0 {
            return tg_polymer_k;
        }
        if w_polymer == 0.0 {
            return tg_api_k;
        }
        let a = w_api * self.cp_api;
        let b = w_polymer * self.cp_polymer;
        ((a * tg_api_k.ln() + b * tg_polymer_k.ln()) / (a + b)).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TgMixingLaw {
    GordonTaylor(GordonTaylor),
    Fox(Fox),
    CouchmanKarasz(CouchmanKarasz),
}

impl Default for TgMixingLaw {
    fn default() -> Self {
        TgMixingLaw::GordonTaylor(GordonTaylor::default())
    }
}

impl TgMixingLaw {
    pub const NAMES: [&'static str; 3] = ["gordon_taylor", "fox", "couchman_karasz"];

    pub fn gordon_taylor(k: Option<f64>) -> Self {
        TgMixingLaw::GordonTaylor(GordonTaylor { k })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TgMixingLaw::GordonTaylor(_) => "gordon_taylor",
            TgMixingLaw::Fox(_) => "fox",
            TgMixingLaw::CouchmanKarasz(_) => "couchman_karasz",
        }
    }

    /// Mixture Tg in °C for an API weight fraction `loading`.
    ///
    /// Pure-component loadings return the matching input unchanged.
    pub fn estimate(
        &self,
        tg_api_c: f64,
        tg_polymer_c: f64,
        loading: f64,
    ) -> Result<f64, PropertyError> {
        let loading = check_fraction(loading, "drug_loading")?;
        if loading == 0.0 {
            return Ok(tg_polymer_c);
        }
        if loading == 1.0 {
            return Ok(tg_api_c);
        }
        let tg_api_k = celsius_to_kelvin(tg_api_c);
        let tg_polymer_k = celsius_to_kelvin(tg_polymer_c);
        if tg_api_k <= 0.0 || tg_polymer_k <= 0.0 {
            return Err(PropertyError::InvalidInput(format!(
                "glass transition temperatures must lie above absolute zero, got {} and {}",
                tg_api_c, tg_polymer_c
            )));
        }
        Ok(kelvin_to_celsius(self.mixture_tg_k(
            tg_api_k,
            tg_polymer_k,
            loading,
        )))
    }
}

impl MixingLaw for TgMixingLaw {
    fn mixture_tg_k(&self, tg_api_k: f64, tg_polymer_k: f64, w_api: f64) -> f64 {
        match self {
            TgMixingLaw::GordonTaylor(law) => law.mixture_tg_k(tg_api_k, tg_polymer_k, w_api),
            TgMixingLaw::Fox(law) => law.mixture_tg_k(tg_api_k, tg_polymer_k, w_api),
            TgMixingLaw::CouchmanKarasz(law) => law.mixture_tg_k(tg_api_k, tg_polymer_k, w_api),
        }
    }
}

impl fmt::Display for TgMixingLaw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TgMixingLaw {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "gordon_taylor" => Ok(TgMixingLaw::GordonTaylor(GordonTaylor::default())),
            "fox" => Ok(TgMixingLaw::Fox(Fox)),
            "couchman_karasz" => Ok(TgMixingLaw::CouchmanKarasz(CouchmanKarasz::default())),
            _ => Err(PropertyError::unknown_name("mixing law", s, &Self::NAMES)),
        }
    }
}

/// Melting point of the API depressed by the polymer (Flory-Huggins), in °C.
pub fn melting_point_depression(
    tm_pure_c: f64,
    loading: f64,
    interaction_parameter: Option<f64>,
) -> Result<f64, PropertyError> {
    let phi_api = check_fraction(loading, "drug_loading")?;
    if phi_api == 0.0 {
        return Err(PropertyError::InvalidInput(
            "melting point depression is undefined at zero drug loading".to_string(),
        ));
    }
    let chi = interaction_parameter.unwrap_or(DEFAULT_INTERACTION_PARAMETER);
    let phi_polymer = 1.0 - phi_api;
    let tm_pure_k = celsius_to_kelvin(tm_pure_c);

    let mixing_term = phi_api.ln()
        + (1.0 - 1.0 / DEFAULT_DEGREE_OF_POLYMERIZATION) * phi_polymer
        + chi * phi_polymer.powi(2);

    // 1/Tm - 1/Tm0 = -(R / ΔHf)·term, with ΔHf = ΔSf·Tm0
    let denominator = 1.0 - GAS_CONSTANT * mixing_term / DEFAULT_ENTROPY_OF_FUSION;
    if denominator <= 0.0 {
        return Err(PropertyError::InvalidInput(format!(
            "interaction parameter {} gives no finite melting point",
            chi
        )));
    }
    Ok(kelvin_to_celsius(tm_pure_k / denominator))
}

/// Crystallization temperature on cooling from the melt, in °C.
///
/// Sits between Tm and Tg, closer to Tg the faster the cooling (°C/min, saturating at 100).
pub fn crystallization_temperature(tg_c: f64, tm_c: f64, cooling_rate: f64) -> f64 {
    let span = tm_c - tg_c;
    let rate_factor = (cooling_rate / 100.0).min(1.0);
    let position = 0.3 + 0.6 * rate_factor;
    tm_c - position * span
}

pub fn follows_gordon_taylor(measured_c: f64, predicted_c: f64, tolerance_c: f64) -> bool {
    (measured_c - predicted_c).abs() <= tolerance_c
}
