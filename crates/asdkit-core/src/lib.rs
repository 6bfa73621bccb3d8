//! # ASDkit Core Library
//!
//! Stability prediction and formulation design for amorphous solid dispersions (ASDs):
//! an active pharmaceutical ingredient molecularly dispersed in a carrier polymer.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that each layer can be tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless substance and formulation models, the
//!   miscibility and mixture-thermal estimators, structure descriptors and the materials
//!   database behind the `PropertyProvider` interface.
//!
//! - **[`engine`]: The Logic Core.** Configuration and builders, the `StabilityScorer` with
//!   its model variants, the evaluation cache and the loading search strategies.
//!
//! - **[`workflows`]: The Public API.** The `LoadingOptimizer`, which finds the highest drug
//!   loading that stays stable, and the `PolymerScreener`, which ranks carrier polymers for an
//!   API, sequentially or on a worker pool.

pub mod core;
pub mod engine;
pub mod workflows;
