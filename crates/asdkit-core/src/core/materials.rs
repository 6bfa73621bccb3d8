use super::error::PropertyError;
use super::models::substance::{
    HansenParameters, ParameterValue, SubstanceBuilder, SubstanceKind, SubstanceProperties,
};
use phf::{Map, phf_map};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid record in '{path}': {source}")]
    Record {
        path: String,
        source: PropertyError,
    },
    #[error("Unsupported materials file '{path}': expected a .toml or .csv extension")]
    UnsupportedFormat { path: String },
}

/// Name-keyed source of substance records.
pub trait PropertyProvider: Send + Sync {
    /// Case-insensitive exact-name lookup.
    fn lookup(&self, name: &str, kind: SubstanceKind)
    -> Result<Arc<SubstanceProperties>, PropertyError>;

    /// Display names of every record of `kind`, sorted.
    fn names(&self, kind: SubstanceKind) -> Vec<String>;

    fn all(&self, kind: SubstanceKind) -> Vec<Arc<SubstanceProperties>> {
        self.names(kind)
            .iter()
            .filter_map(|name| self.lookup(name, kind).ok())
            .collect()
    }
}

struct BuiltinApi {
    name: &'static str,
    smiles: &'static str,
    molar_mass: f64,
    melting_point: f64,
    glass_transition: f64,
    log_p: f64,
    hansen: [f64; 3],
}

struct BuiltinPolymer {
    name: &'static str,
    class: &'static str,
    monomer_smiles: Option<&'static str>,
    molar_mass: f64,
    glass_transition: f64,
    hansen: [f64; 3],
    hydrophilicity: f64,
    hygroscopicity: f64,
}

static BUILTIN_APIS: Map<&'static str, BuiltinApi> = phf_map! {
    "ibuprofen" => BuiltinApi {
        name: "ibuprofen",
        smiles: "CC(C)CC1=CC=C(C=C1)C(C)C(=O)O",
        molar_mass: 206.29,
        melting_point: 76.0,
        glass_transition: -45.0,
        log_p: 3.97,
        hansen: [18.2, 3.8, 8.0],
    },
    "indomethacin" => BuiltinApi {
        name: "indomethacin",
        smiles: "COC1=C(C=C2C(=C1)C(=O)OC2C3=CC=C(C=C3)Cl)CC(=O)O",
        molar_mass: 357.79,
        melting_point: 162.0,
        glass_transition: 41.0,
        log_p: 4.27,
        hansen: [19.5, 5.3, 9.8],
    },
    "ketoconazole" => BuiltinApi {
        name: "ketoconazole",
        smiles: "CC(=O)N1CCN(CC1)C2=CC=C(C=C2)OCC3COC(O3)(CN4C=CN=C4)C5=C(C=C(C=C5)Cl)Cl",
        molar_mass: 531.43,
        melting_point: 146.0,
        glass_transition: 45.0,
        log_p: 4.20,
        hansen: [18.8, 7.2, 10.0],
    },
    "felodipine" => BuiltinApi {
        name: "felodipine",
        smiles: "CCOC(=O)C1=C(NC(=C(C1C2=CC=CC=C2Cl)C(=O)OC)C)C",
        molar_mass: 384.26,
        melting_point: 145.0,
        glass_transition: 43.0,
        log_p: 3.86,
        hansen: [19.1, 7.8, 9.5],
    },
    "griseofulvin" => BuiltinApi {
        name: "griseofulvin",
        smiles: "COC1=CC(=CC(=C1OC)OC)C2C(=O)CC3(C(=O)C=COC3=C2Cl)C",
        molar_mass: 352.77,
        melting_point: 220.0,
        glass_transition: 89.0,
        log_p: 2.18,
        hansen: [18.5, 5.5, 7.8],
    },
};

static BUILTIN_POLYMERS: Map<&'static str, BuiltinPolymer> = phf_map! {
    "pvp k30" => BuiltinPolymer {
        name: "PVP K30",
        class: "vinyl",
        monomer_smiles: Some("C1CCNC(=O)C1"),
        molar_mass: 50000.0,
        glass_transition: 149.0,
        hansen: [17.0, 8.0, 12.0],
        hydrophilicity: 0.85,
        hygroscopicity: 0.80,
    },
    "hpmc" => BuiltinPolymer {
        name: "HPMC",
        class: "cellulosic",
        monomer_smiles: None,
        molar_mass: 22000.0,
        glass_transition: 175.0,
        hansen: [18.0, 8.6, 11.9],
        hydrophilicity: 0.70,
        hygroscopicity: 0.65,
    },
    "hpmcas" => BuiltinPolymer {
        name: "HPMCAS",
        class: "cellulosic",
        monomer_smiles: None,
        molar_mass: 18000.0,
        glass_transition: 120.0,
        hansen: [18.5, 9.5, 10.0],
        hydrophilicity: 0.60,
        hygroscopicity: 0.50,
    },
    "soluplus" => BuiltinPolymer {
        name: "Soluplus",
        class: "graft copolymer",
        monomer_smiles: None,
        molar_mass: 90000.0,
        glass_transition: 70.0,
        hansen: [17.5, 7.0, 9.0],
        hydrophilicity: 0.55,
        hygroscopicity: 0.45,
    },
    "eudragit l100" => BuiltinPolymer {
        name: "Eudragit L100",
        class: "acrylic",
        monomer_smiles: None,
        molar_mass: 125000.0,
        glass_transition: 150.0,
        hansen: [16.8, 9.0, 8.0],
        hydrophilicity: 0.50,
        hygroscopicity: 0.40,
    },
    "pvpva 64" => BuiltinPolymer {
        name: "PVPVA 64",
        class: "vinyl",
        monomer_smiles: None,
        molar_mass: 45000.0,
        glass_transition: 100.0,
        hansen: [16.5, 7.5, 10.5],
        hydrophilicity: 0.65,
        hygroscopicity: 0.60,
    },
    "peg 6000" => BuiltinPolymer {
        name: "PEG 6000",
        class: "polyether",
        monomer_smiles: Some("C(CO)O"),
        molar_mass: 6000.0,
        glass_transition: -20.0,
        hansen: [17.0, 3.0, 9.0],
        hydrophilicity: 0.90,
        hygroscopicity: 0.85,
    },
    "pva" => BuiltinPolymer {
        name: "PVA",
        class: "vinyl",
        monomer_smiles: Some("C(CO)O"),
        molar_mass: 30000.0,
        glass_transition: 85.0,
        hansen: [16.0, 10.8, 17.6],
        hydrophilicity: 0.75,
        hygroscopicity: 0.70,
    },
};

fn hansen_from(values: [f64; 3]) -> HansenParameters {
    HansenParameters {
        dispersive: values[0],
        polar: values[1],
        hydrogen: values[2],
    }
}

impl BuiltinApi {
    fn to_properties(&self) -> Result<SubstanceProperties, PropertyError> {
        SubstanceBuilder::new(self.name, SubstanceKind::Api)
            .structure(self.smiles)
            .molar_mass(self.molar_mass)
            .melting_point_c(self.melting_point)
            .glass_transition_c(self.glass_transition)
            .log_p(self.log_p)
            .solubility_parameters(hansen_from(self.hansen))
            .build()
    }
}

impl BuiltinPolymer {
    fn to_properties(&self) -> Result<SubstanceProperties, PropertyError> {
        let mut builder = SubstanceBuilder::new(self.name, SubstanceKind::Polymer)
            .polymer_class(self.class)
            .molar_mass(self.molar_mass)
            .glass_transition_c(self.glass_transition)
            .solubility_parameters(hansen_from(self.hansen))
            .hydrophilicity(self.hydrophilicity)
            .hygroscopicity(self.hygroscopicity);
        if let Some(smiles) = self.monomer_smiles {
            builder = builder.structure(smiles);
        }
        builder.build()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PartialHansen {
    dispersive: Option<f64>,
    polar: Option<f64>,
    hydrogen: Option<f64>,
}

impl PartialHansen {
    fn complete(&self, substance: &str) -> Result<Option<HansenParameters>, PropertyError> {
        match (self.dispersive, self.polar, self.hydrogen) {
            (None, None, None) => Ok(None),
            (Some(d), Some(p), Some(h)) => HansenParameters::new(d, p, h).map(Some),
            (None, _, _) => Err(PropertyError::missing(substance, "solubility_parameters.dispersive")),
            (_, None, _) => Err(PropertyError::missing(substance, "solubility_parameters.polar")),
            (_, _, None) => Err(PropertyError::missing(substance, "solubility_parameters.hydrogen")),
        }
    }
}

/// One substance entry of a TOML materials file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TomlRecord {
    #[serde(alias = "structure")]
    smiles: Option<String>,
    #[serde(alias = "molecular-weight")]
    molar_mass: Option<f64>,
    melting_point: Option<f64>,
    #[serde(alias = "tg")]
    glass_transition_temp: Option<f64>,
    log_p: Option<f64>,
    solubility_parameters: Option<PartialHansen>,
    hygroscopicity: Option<f64>,
    hydrophilicity: Option<f64>,
    crystallization_tendency: Option<f64>,
    degradation_temperature: Option<f64>,
    #[serde(rename = "type")]
    polymer_class: Option<String>,
    #[serde(flatten)]
    extensions: BTreeMap<String, ParameterValue>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlMaterialsFile {
    #[serde(default)]
    apis: BTreeMap<String, TomlRecord>,
    #[serde(default)]
    polymers: BTreeMap<String, TomlRecord>,
}

/// One row of a CSV materials file.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    name: String,
    kind: String,
    #[serde(alias = "structure")]
    smiles: Option<String>,
    #[serde(alias = "molecular_weight")]
    molar_mass: Option<f64>,
    melting_point: Option<f64>,
    glass_transition_temp: Option<f64>,
    log_p: Option<f64>,
    dispersive: Option<f64>,
    polar: Option<f64>,
    hydrogen: Option<f64>,
    hygroscopicity: Option<f64>,
    hydrophilicity: Option<f64>,
    crystallization_tendency: Option<f64>,
    degradation_temperature: Option<f64>,
    #[serde(rename = "type")]
    polymer_class: Option<String>,
}

impl TomlRecord {
    fn into_properties(
        self,
        name: &str,
        kind: SubstanceKind,
    ) -> Result<SubstanceProperties, PropertyError> {
        let hansen = match &self.solubility_parameters {
            Some(partial) => partial.complete(name)?,
            None => None,
        };
        let mut builder = SubstanceBuilder::new(name, kind);
        if let Some(smiles) = self.smiles {
            builder = builder.structure(smiles);
        }
        if let Some(mass) = self.molar_mass {
            builder = builder.molar_mass(mass);
        }
        if let Some(mp) = self.melting_point {
            builder = builder.melting_point_c(mp);
        }
        if let Some(tg) = self.glass_transition_temp {
            builder = builder.glass_transition_c(tg);
        }
        if let Some(log_p) = self.log_p {
            builder = builder.log_p(log_p);
        }
        if let Some(hansen) = hansen {
            builder = builder.solubility_parameters(hansen);
        }
        if let Some(value) = self.hygroscopicity {
            builder = builder.hygroscopicity(value);
        }
        if let Some(value) = self.hydrophilicity {
            builder = builder.hydrophilicity(value);
        }
        if let Some(value) = self.crystallization_tendency {
            builder = builder.crystallization_tendency(value);
        }
        if let Some(value) = self.degradation_temperature {
            builder = builder.degradation_temperature_c(value);
        }
        if let Some(class) = self.polymer_class {
            builder = builder.polymer_class(class);
        }
        for (key, value) in self.extensions {
            builder = builder.extension(key, value);
        }
        builder.build()
    }
}

impl CsvRecord {
    fn into_properties(self) -> Result<SubstanceProperties, PropertyError> {
        let kind: SubstanceKind = self.kind.parse()?;
        let record = TomlRecord {
            smiles: self.smiles.filter(|s| !s.trim().is_empty()),
            molar_mass: self.molar_mass,
            melting_point: self.melting_point,
            glass_transition_temp: self.glass_transition_temp,
            log_p: self.log_p,
            solubility_parameters: Some(PartialHansen {
                dispersive: self.dispersive,
                polar: self.polar,
                hydrogen: self.hydrogen,
            }),
            hygroscopicity: self.hygroscopicity,
            hydrophilicity: self.hydrophilicity,
            crystallization_tendency: self.crystallization_tendency,
            degradation_temperature: self.degradation_temperature,
            polymer_class: self.polymer_class.filter(|s| !s.trim().is_empty()),
            extensions: BTreeMap::new(),
        };
        record.into_properties(&self.name, kind)
    }
}

/// In-memory materials store: the built-in catalogue plus any records loaded from files.
#[derive(Debug, Clone, Default)]
pub struct MaterialsDatabase {
    apis: BTreeMap<String, Arc<SubstanceProperties>>,
    polymers: BTreeMap<String, Arc<SubstanceProperties>>,
}

impl MaterialsDatabase {
    /// A database holding only the built-in catalogue.
    pub fn new() -> Result<Self, PropertyError> {
        let mut db = Self::empty();
        for api in BUILTIN_APIS.values() {
            db.insert(api.to_properties()?);
        }
        for polymer in BUILTIN_POLYMERS.values() {
            db.insert(polymer.to_properties()?);
        }
        Ok(db)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn table(&self, kind: SubstanceKind) -> &BTreeMap<String, Arc<SubstanceProperties>> {
        match kind {
            SubstanceKind::Api => &self.apis,
            SubstanceKind::Polymer => &self.polymers,
        }
    }

    /// Adds a record, replacing any existing one with the same case-insensitive name.
    pub fn insert(&mut self, record: SubstanceProperties) -> Option<Arc<SubstanceProperties>> {
        let key = record.name().to_lowercase();
        let table = match record.kind() {
            SubstanceKind::Api => &mut self.apis,
            SubstanceKind::Polymer => &mut self.polymers,
        };
        table.insert(key, Arc::new(record))
    }

    pub fn len(&self, kind: SubstanceKind) -> usize {
        self.table(kind).len()
    }

    /// Every polymer record, the default candidate list for screening.
    pub fn common_polymers(&self) -> Vec<Arc<SubstanceProperties>> {
        self.polymers.values().cloned().collect()
    }

    /// Case-insensitive substring search over name, structure and polymer class.
    pub fn search(&self, kind: SubstanceKind, query: &str) -> Vec<Arc<SubstanceProperties>> {
        let needle = query.to_lowercase();
        self.table(kind)
            .values()
            .filter(|record| {
                [record.name(), record.structure().unwrap_or(""), record.polymer_class().unwrap_or("")]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    /// Loads a `.toml` or `.csv` file on top of the current records.
    pub fn load(&mut self, path: &Path) -> Result<usize, LoadError> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => self.load_toml(path),
            Some("csv") => self.load_csv(path),
            _ => Err(LoadError::UnsupportedFormat {
                path: path.to_string_lossy().to_string(),
            }),
        }
    }

    pub fn load_toml(&mut self, path: &Path) -> Result<usize, LoadError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let file: TomlMaterialsFile = toml::from_str(&content).map_err(|e| LoadError::Toml {
            path: path_str.clone(),
            source: e,
        })?;

        let mut loaded = 0;
        for (kind, records) in [
            (SubstanceKind::Api, file.apis),
            (SubstanceKind::Polymer, file.polymers),
        ] {
            for (name, record) in records {
                let properties =
                    record
                        .into_properties(&name, kind)
                        .map_err(|e| LoadError::Record {
                            path: path_str.clone(),
                            source: e,
                        })?;
                self.insert(properties);
                loaded += 1;
            }
        }
        debug!(path = %path_str, records = loaded, "Loaded materials from TOML.");
        Ok(loaded)
    }

    pub fn load_csv(&mut self, path: &Path) -> Result<usize, LoadError> {
        let path_str = path.to_string_lossy().to_string();
        let mut reader = csv::Reader::from_path(path).map_err(|e| LoadError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

        let mut loaded = 0;
        for row in reader.deserialize::<CsvRecord>() {
            let row = row.map_err(|e| LoadError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let properties = row.into_properties().map_err(|e| LoadError::Record {
                path: path_str.clone(),
                source: e,
            })?;
            self.insert(properties);
            loaded += 1;
        }
        debug!(path = %path_str, records = loaded, "Loaded materials from CSV.");
        Ok(loaded)
    }
}

impl PropertyProvider for MaterialsDatabase {
    fn lookup(
        &self,
        name: &str,
        kind: SubstanceKind,
    ) -> Result<Arc<SubstanceProperties>, PropertyError> {
        self.table(kind)
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| PropertyError::NotFound {
                kind,
                name: name.to_string(),
            })
    }

    fn names(&self, kind: SubstanceKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .table(kind)
            .values()
            .map(|record| record.name().to_string())
            .collect();
        names.sort_by_key(|name| name.to_lowercase());
        names
    }
}
