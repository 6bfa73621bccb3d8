//! Structure-derived estimates.
//!
//! No chemical structure parser lives in this crate. Descriptors come from a
//! [`DescriptorProvider`]; [`DescriptorTable`] serves pre-computed values keyed by the
//! structure identifier (typically a SMILES string).

use super::error::PropertyError;
use super::materials::LoadError;
use super::models::substance::{HansenParameters, SubstanceBuilder, SubstanceKind, SubstanceProperties};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MolecularDescriptors {
    pub molar_mass: f64,
    pub log_p: f64,
    pub h_bond_donors: u32,
    pub h_bond_acceptors: u32,
    pub rotatable_bonds: u32,
    pub tpsa: f64,
    #[serde(default)]
    pub heavy_atoms: u32,
    #[serde(default)]
    pub ring_count: u32,
    #[serde(default)]
    pub aromatic_rings: u32,
    #[serde(default)]
    pub bond_count: u32,
}

pub trait DescriptorProvider {
    fn descriptors(&self, structure: &str) -> Result<MolecularDescriptors, PropertyError>;
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    entries: HashMap<String, MolecularDescriptors>,
}

#[derive(Debug, Deserialize)]
struct DescriptorRow {
    structure: String,
    molar_mass: f64,
    log_p: f64,
    h_bond_donors: u32,
    h_bond_acceptors: u32,
    rotatable_bonds: u32,
    tpsa: f64,
    #[serde(default)]
    heavy_atoms: u32,
    #[serde(default)]
    ring_count: u32,
    #[serde(default)]
    aromatic_rings: u32,
    #[serde(default)]
    bond_count: u32,
}

impl DescriptorRow {
    fn into_entry(self) -> (String, MolecularDescriptors) {
        let descriptors = MolecularDescriptors {
            molar_mass: self.molar_mass,
            log_p: self.log_p,
            h_bond_donors: self.h_bond_donors,
            h_bond_acceptors: self.h_bond_acceptors,
            rotatable_bonds: self.rotatable_bonds,
            tpsa: self.tpsa,
            heavy_atoms: self.heavy_atoms,
            ring_count: self.ring_count,
            aromatic_rings: self.aromatic_rings,
            bond_count: self.bond_count,
        };
        (self.structure, descriptors)
    }
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, structure: impl Into<String>, descriptors: MolecularDescriptors) {
        self.entries.insert(structure.into(), descriptors);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads a CSV with a `structure` column followed by descriptor columns.
    pub fn load_csv(path: &Path) -> Result<Self, LoadError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| LoadError::Csv {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;

        let mut table = Self::new();
        for row in reader.deserialize::<DescriptorRow>() {
            let row = row.map_err(|e| LoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            let (structure, descriptors) = row.into_entry();
            table.insert(structure, descriptors);
        }
        Ok(table)
    }
}

impl DescriptorProvider for DescriptorTable {
    fn descriptors(&self, structure: &str) -> Result<MolecularDescriptors, PropertyError> {
        self.entries
            .get(structure.trim())
            .cloned()
            .ok_or_else(|| PropertyError::InvalidStructure(structure.to_string()))
    }
}

/// Simplified group-contribution estimate of the Hansen triple.
pub fn estimate_hansen(descriptors: &MolecularDescriptors) -> HansenParameters {
    let dispersive = (15.0
        + 10.0 * (1.0 - (-0.005 * descriptors.molar_mass).exp())
        + 2.0 * descriptors.log_p)
        .clamp(15.0, 30.0);
    let polar = (0.25 * descriptors.tpsa).clamp(0.0, 20.0);
    let hydrogen = (2.0 * descriptors.h_bond_donors as f64 + descriptors.h_bond_acceptors as f64)
        .clamp(0.0, 30.0);
    HansenParameters {
        dispersive,
        polar,
        hydrogen,
    }
}

/// Rule-of-thumb score in `[0, 1]`; higher means the API more readily stays amorphous.
pub fn amorphization_tendency(
    api: &SubstanceProperties,
    descriptors: &MolecularDescriptors,
) -> Result<f64, PropertyError> {
    let melting_point = api
        .melting_point_c()
        .ok_or_else(|| PropertyError::missing(api.name(), "melting_point"))?;
    let molar_mass = api.molar_mass().unwrap_or(descriptors.molar_mass);
    let log_p = api.log_p().unwrap_or(descriptors.log_p);

    let mw_factor = (molar_mass / 500.0).min(1.0);
    let mp_factor = (1.0 - (melting_point - 100.0) / 200.0).clamp(0.0, 1.0);
    let logp_factor = (1.0 - (log_p - 2.5).abs() / 5.0).clamp(0.0, 1.0);
    let hb_total = (descriptors.h_bond_donors + descriptors.h_bond_acceptors) as f64;
    let hb_factor = (1.0 - (hb_total - 5.0).abs() / 10.0).clamp(0.0, 1.0);
    let rb_factor = (descriptors.rotatable_bonds as f64 / 10.0).min(1.0);

    Ok(0.3 * mw_factor + 0.2 * mp_factor + 0.2 * logp_factor + 0.15 * hb_factor + 0.15 * rb_factor)
}

/// Crude QSPR estimate of a small molecule's Tg in °C, clamped to `[-150, 250]`.
pub fn estimate_glass_transition(descriptors: &MolecularDescriptors) -> f64 {
    let rotatable = descriptors.rotatable_bonds as f64;
    let rigid = descriptors.bond_count.saturating_sub(descriptors.rotatable_bonds) as f64;
    let tg = -50.0 + 0.5 * descriptors.molar_mass - 7.0 * rotatable
        + 5.0 * rigid
        + 10.0 * descriptors.h_bond_donors as f64
        + 5.0 * descriptors.h_bond_acceptors as f64
        + 15.0 * descriptors.aromatic_rings as f64;
    tg.clamp(-150.0, 250.0)
}

/// Rule-of-five violations.
pub fn lipinski_violations(descriptors: &MolecularDescriptors) -> u8 {
    [
        descriptors.molar_mass > 500.0,
        descriptors.log_p > 5.0,
        descriptors.h_bond_donors > 5,
        descriptors.h_bond_acceptors > 10,
    ]
    .iter()
    .filter(|v| **v)
    .count() as u8
}

impl SubstanceProperties {
    /// Record with molar mass, logP and an estimated Hansen triple taken from descriptors.
    pub fn from_descriptors(
        name: impl Into<String>,
        kind: SubstanceKind,
        structure: impl Into<String>,
        descriptors: &MolecularDescriptors,
    ) -> Result<Self, PropertyError> {
        Self::descriptor_builder(name, kind, structure, descriptors).build()
    }

    /// Starts a builder pre-filled from descriptors so callers can add measured values.
    pub fn descriptor_builder(
        name: impl Into<String>,
        kind: SubstanceKind,
        structure: impl Into<String>,
        descriptors: &MolecularDescriptors,
    ) -> SubstanceBuilder {
        SubstanceBuilder::new(name, kind)
            .structure(structure)
            .molar_mass(descriptors.molar_mass)
            .log_p(descriptors.log_p)
            .solubility_parameters(estimate_hansen(descriptors))
    }

    pub fn from_structure<P: DescriptorProvider + ?Sized>(
        name: impl Into<String>,
        kind: SubstanceKind,
        structure: &str,
        provider: &P,
    ) -> Result<Self, PropertyError> {
        let descriptors = provider.descriptors(structure)?;
        Self::from_descriptors(name, kind, structure, &descriptors)
    }

    /// Overwrites the descriptor-derived fields (molar mass, logP, Hansen triple).
    pub fn recompute_from_descriptors(&mut self, descriptors: &MolecularDescriptors) {
        self.set_derived_molecular_fields(descriptors.molar_mass, descriptors.log_p);
        self.recompute_solubility_parameters(estimate_hansen(descriptors));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // Ibuprofen, as an RDKit descriptor pass would report it.
    fn ibuprofen() -> MolecularDescriptors {
        MolecularDescriptors {
            molar_mass: 206.29,
            log_p: 3.07,
            h_bond_donors: 1,
            h_bond_acceptors: 1,
            rotatable_bonds: 4,
            tpsa: 37.3,
            heavy_atoms: 15,
            ring_count: 1,
            aromatic_rings: 1,
            bond_count: 15,
        }
    }

    #[test]
    fn estimate_hansen_clamps_each_component() {
        let hsp = estimate_hansen(&ibuprofen());
        let expected_d = 15.0 + 10.0 * (1.0 - (-0.005f64 * 206.29).exp()) + 2.0 * 3.07;
        assert!((hsp.dispersive - expected_d.min(30.0)).abs() < 1e-12);
        assert!((hsp.polar - 9.325).abs() < 1e-12);
        assert_eq!(hsp.hydrogen, 3.0);

        let greasy = MolecularDescriptors {
            log_p: 12.0,
            tpsa: 400.0,
            h_bond_donors: 20,
            ..ibuprofen()
        };
        let hsp = estimate_hansen(&greasy);
        assert_eq!((hsp.dispersive, hsp.polar, hsp.hydrogen), (30.0, 20.0, 30.0));
    }

    #[test]
    fn amorphization_tendency_requires_melting_point() {
        let api = SubstanceProperties::from_descriptors(
            "ibuprofen",
            SubstanceKind::Api,
            "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
            &ibuprofen(),
        )
        .unwrap();
        assert_eq!(
            amorphization_tendency(&api, &ibuprofen()),
            Err(PropertyError::missing("ibuprofen", "melting_point"))
        );
    }

    #[test]
    fn amorphization_tendency_combines_weighted_factors() {
        let api = SubstanceProperties::descriptor_builder(
            "ibuprofen",
            SubstanceKind::Api,
            "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
            &ibuprofen(),
        )
        .melting_point_c(76.0)
        .build()
        .unwrap();
        let score = amorphization_tendency(&api, &ibuprofen()).unwrap();
        let expected = 0.3 * (206.29 / 500.0)
            + 0.2 * 1.0
            + 0.2 * (1.0 - 0.57 / 5.0)
            + 0.15 * (1.0 - 3.0 / 10.0)
            + 0.15 * 0.4;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn descriptor_table_reports_unknown_structures_as_invalid() {
        let mut table = DescriptorTable::new();
        table.insert("CCO", ibuprofen());
        assert!(table.descriptors("CCO").is_ok());
        assert_eq!(
            table.descriptors("C1CC"),
            Err(PropertyError::InvalidStructure("C1CC".to_string()))
        );
    }

    #[test]
    fn descriptor_table_loads_from_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("descriptors.csv");
        fs::write(
            &path,
            "structure,molar_mass,log_p,h_bond_donors,h_bond_acceptors,rotatable_bonds,tpsa\n\
             CCO,46.07,-0.0014,1,1,0,20.23\n",
        )
        .unwrap();

        let table = DescriptorTable::load_csv(&path).unwrap();
        assert_eq!(table.len(), 1);
        let ethanol = table.descriptors("CCO").unwrap();
        assert_eq!(ethanol.h_bond_donors, 1);
        assert_eq!(ethanol.aromatic_rings, 0);
    }

    #[test]
    fn recompute_from_descriptors_overwrites_derived_fields() {
        let mut api = SubstanceProperties::from_descriptors(
            "ibuprofen",
            SubstanceKind::Api,
            "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
            &ibuprofen(),
        )
        .unwrap();
        let heavier = MolecularDescriptors {
            molar_mass: 400.0,
            tpsa: 80.0,
            ..ibuprofen()
        };
        api.recompute_from_descriptors(&heavier);
        assert_eq!(api.molar_mass(), Some(400.0));
        assert_eq!(api.solubility_parameters().map(|h| h.polar), Some(20.0));
    }

    #[test]
    fn lipinski_counts_each_rule_once() {
        assert_eq!(lipinski_violations(&ibuprofen()), 0);
        let big = MolecularDescriptors {
            molar_mass: 650.0,
            log_p: 6.2,
            ..ibuprofen()
        };
        assert_eq!(lipinski_violations(&big), 2);
    }

    #[test]
    fn glass_transition_estimate_is_clamped() {
        let huge = MolecularDescriptors {
            molar_mass: 5000.0,
            ..ibuprofen()
        };
        assert_eq!(estimate_glass_transition(&huge), 250.0);
    }
}
