//! # Engine Module
//!
//! The scoring and search machinery that the workflows are assembled from.
//!
//! ## Overview
//!
//! Where [`crate::core`] answers single physical questions (how miscible is this pair,
//! what is the Tg of this mixture), the engine turns those answers into a stability
//! verdict and searches the loading axis for the best one.
//!
//! - **Configuration** ([`config`]) - Scoring, optimizer and screening settings and their builders
//! - **Stability Scoring** ([`stability`]) - The six-factor scorer and its model variants
//! - **Evaluation** ([`evaluation`]) - One formulation scored at one loading
//! - **Caching** ([`cache`]) - Append-only evaluation store keyed by loading
//! - **Search** ([`search`]) - Grid and binary search over drug loading
//! - **Progress Monitoring** ([`progress`]) - Phase and task events for front ends
//! - **Error Handling** ([`error`]) - The engine error type
//!
//! ## Determinism
//!
//! Nothing in this layer reads the clock or a random source while scoring, so the same
//! formulation under the same conditions always scores bit-identically.

pub mod cache;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod progress;
pub mod search;
pub mod stability;
