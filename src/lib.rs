// ABOUTME: Crate root for macrolens, a layered macro-nutrient correction engine
// ABOUTME: Declares the stage modules and re-exports the public pipeline surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! # macrolens
//!
//! Algorithmic core of a three-stage menu-item nutrition estimation
//! pipeline. An external collaborator produces a baseline macro estimate;
//! this crate corrects it in two learned stages and reports how much to
//! trust the result:
//!
//! 1. **Calibration** — context multipliers learned from empirical
//!    truth/baseline ratios, selected per macro through a specificity
//!    fallback hierarchy (restaurant, cuisine, cooking method, ...).
//! 2. **Refinement** — the dish is embedded, its nearest training-corpus
//!    neighbors are found by cosine similarity, and their macro deltas are
//!    blended in within empirical percentile bounds.
//!
//! All learned state arrives as versioned JSON artifacts loaded once into
//! an [`EngineContext`]; a missing artifact degrades the stage that needs
//! it and never fails a request. Completed responses are memoized in a
//! bounded LRU keyed on a price-free request fingerprint.
//!
//! ```no_run
//! use macrolens::{
//!     CachedPipeline, EngineConfig, EngineContext, EngineError, NutritionRequest, Pipeline,
//! };
//! use std::sync::Arc;
//!
//! let context = Arc::new(EngineContext::load(EngineConfig::from_env()));
//! let provider = |_request: &NutritionRequest| -> Result<serde_json::Value, EngineError> {
//!     Err(EngineError::baseline("wire up the real collaborator here"))
//! };
//! let pipeline = CachedPipeline::new(Pipeline::new(context, provider));
//! ```

pub mod artifacts;
pub mod cache;
pub mod calibration;
pub mod config;
pub mod context;
pub mod errors;
pub mod models;
pub mod pipeline;
pub mod refinement;

pub use cache::RequestCache;
pub use calibration::{CalibrationModel, CalibrationResult, TrainingObservation};
pub use config::EngineConfig;
pub use context::EngineContext;
pub use errors::{EngineError, Result};
pub use models::{
    BaselineEstimate, Macro, MacroVector, NutritionRequest, NutritionResponse, PortionClass,
};
pub use pipeline::{BaselineProvider, CachedPipeline, Pipeline};
pub use refinement::{RefineOptions, RefineRequest, RefineResult};
