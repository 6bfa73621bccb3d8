//! # Core Module
//!
//! Stateless building blocks for amorphous solid dispersion (ASD) formulation design.
//!
//! ## Overview
//!
//! Everything in this layer is either a plain value type or a pure function of its
//! inputs. The stateful and algorithmic parts (scoring configuration, search strategies,
//! caching) live in [`crate::engine`].
//!
//! - **Data Models** ([`models`]) - Substance property records and formulations
//! - **Miscibility** ([`miscibility`]) - Hansen distance and Flory-Huggins estimators
//! - **Thermal Behaviour** ([`thermal`]) - Mixture glass transition laws, melting point
//!   depression and crystallization temperature
//! - **Structure Descriptors** ([`descriptors`]) - Descriptor provider interface and
//!   structure-derived estimates
//! - **Materials** ([`materials`]) - The name-keyed property provider and its built-in
//!   catalogue of common APIs and carrier polymers
//!
//! ## Units
//!
//! Temperatures are degrees Celsius at every public boundary. Solubility parameters are
//! in MPa^0.5, molar masses in g/mol, and drug loading is the API weight fraction.

pub mod descriptors;
pub mod error;
pub mod materials;
pub mod miscibility;
pub mod models;
pub mod thermal;
