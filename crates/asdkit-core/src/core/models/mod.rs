//! # Core Models Module
//!
//! Value types describing what is being formulated.
//!
//! - [`substance`] - Physical property records of APIs and polymers, with their Hansen
//!   solubility parameters and a typed extension side channel.
//! - [`formulation`] - An API/polymer pair at a fixed drug loading, optionally tied to a
//!   manufacturing process.
//!
//! Both are immutable once built. Exploring a different loading means building a new
//! [`formulation::Formulation`]; substance records are shared between formulations through
//! `Arc`, so screening many polymers against one API never copies the API record.

pub mod formulation;
pub mod substance;
