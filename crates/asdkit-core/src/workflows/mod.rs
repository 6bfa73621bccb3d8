//! # Workflows Module
//!
//! High-level procedures built on the stability scorer.
//!
//! ## Overview
//!
//! Workflows are the entry points front ends call. Each one validates its inputs, reports
//! progress through a [`crate::engine::progress::ProgressReporter`] and returns a result that
//! can be serialized as-is or reduced to a snapshot.
//!
//! - **Loading Optimization** ([`optimize`]) - Highest drug loading meeting a stability threshold,
//!   by grid or binary search, with every evaluated loading retained as a profile
//! - **Polymer Screening** ([`screen`]) - One API against many carrier polymers, sequentially or
//!   on a bounded worker pool, with per-polymer failures captured instead of propagated

pub mod optimize;
pub mod screen;
