// ABOUTME: Pipeline orchestrator: baseline, calibration, refinement, confidence aggregation
// ABOUTME: Handoff payloads are contract-checked; the cached variant memoizes successes only
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Pipeline orchestration.
//!
//! The orchestrator owns stage sequencing and the handoff contracts between
//! stages. The baseline stage is an external collaborator behind the
//! [`BaselineProvider`] seam; its untyped output is validated before
//! anything downstream touches it. Aggregate confidence weights the stages
//! 0.5 / 0.3 / 0.2 in pipeline order.

use crate::cache::RequestCache;
use crate::calibration::{self, CalibrationResult};
use crate::context::EngineContext;
use crate::errors::EngineError;
use crate::models::{
    BaselineEstimate, DebugPayload, Macro, NutritionRequest, NutritionResponse, RefinementSummary,
};
use crate::refinement::{self, DishFeatures, RefineOptions, RefineRequest, RefineResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Stage weights for aggregate confidence, in pipeline order
const BASELINE_WEIGHT: f64 = 0.5;
const CALIBRATION_WEIGHT: f64 = 0.3;
const REFINEMENT_WEIGHT: f64 = 0.2;

/// Similar dish ids surfaced in the debug payload
const DEBUG_NEIGHBOR_CAP: usize = 5;

/// The external baseline estimation collaborator.
///
/// Implementations return untyped JSON; the orchestrator validates it
/// against the handoff contract before calibration runs.
pub trait BaselineProvider: Send + Sync {
    /// Produce a baseline estimate for the request.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Baseline`] when no estimate can be produced.
    fn estimate(&self, request: &NutritionRequest) -> Result<Value, EngineError>;
}

impl<F> BaselineProvider for F
where
    F: Fn(&NutritionRequest) -> Result<Value, EngineError> + Send + Sync,
{
    fn estimate(&self, request: &NutritionRequest) -> Result<Value, EngineError> {
        self(request)
    }
}

/// The three-stage estimation pipeline
pub struct Pipeline<P> {
    context: Arc<EngineContext>,
    provider: P,
}

impl<P: BaselineProvider> Pipeline<P> {
    /// Build a pipeline over a loaded context and a baseline collaborator
    pub fn new(context: Arc<EngineContext>, provider: P) -> Self {
        Self { context, provider }
    }

    /// Shared engine context
    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Run the full pipeline for one request.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for a blank item name,
    /// [`EngineError::Baseline`] when the collaborator fails, and
    /// [`EngineError::ContractViolation`] when its output is missing
    /// required keys.
    pub fn estimate(&self, request: &NutritionRequest) -> Result<NutritionResponse, EngineError> {
        if request.item_name.trim().is_empty() {
            return Err(EngineError::invalid_input("item_name must not be blank"));
        }

        let raw = self.provider.estimate(request)?;
        let baseline = BaselineEstimate::from_value(&raw, &request.item_name)?;

        let features = calibration::extract_features(
            &baseline,
            request.restaurant.as_deref(),
            request.price,
        );
        let calibrated = calibration::calibrate_with_features(
            self.context.calibration.as_ref(),
            &baseline,
            &features,
        );

        let refined = self.refine_stage(request, &baseline, &features, &calibrated);

        let confidence = BASELINE_WEIGHT
            .mul_add(
                baseline.confidence,
                CALIBRATION_WEIGHT.mul_add(
                    calibrated.mean_confidence(),
                    REFINEMENT_WEIGHT * refined.confidence,
                ),
            )
            .clamp(0.0, 1.0);

        debug!(
            item = %request.item_name,
            confidence,
            neighbors = refined.neighbors.len(),
            "pipeline complete"
        );

        Ok(NutritionResponse {
            macros: refined.macros,
            confidence,
            debug: debug_payload(&calibrated, &refined),
        })
    }

    fn refine_stage(
        &self,
        request: &NutritionRequest,
        baseline: &BaselineEstimate,
        features: &calibration::FeatureVector,
        calibrated: &CalibrationResult,
    ) -> RefineResult {
        let dish_id = request.item_name.trim().to_lowercase();
        let options = RefineOptions {
            top_k: self.context.config.top_k,
            weight_by_similarity: self.context.config.weight_by_similarity,
            use_median_delta: false,
        };
        refinement::refine(
            self.context.refinement.as_ref(),
            &options,
            &RefineRequest {
                dish_id: Some(&dish_id),
                features: DishFeatures {
                    ingredients: &baseline.ingredients,
                    cooking_methods: &features.cooking_methods,
                    sauce_intensity: features.sauce_level.intensity(),
                    portion: baseline.portion_class.size(),
                },
                base: calibrated.macros,
            },
        )
    }
}

fn debug_payload(calibrated: &CalibrationResult, refined: &RefineResult) -> DebugPayload {
    DebugPayload {
        calibration_adjustments: Macro::ALL
            .iter()
            .map(|&m| {
                let adjustment = calibrated.adjustments.get(m);
                (
                    m.as_str().to_owned(),
                    serde_json::to_value(adjustment).unwrap_or(Value::Null),
                )
            })
            .collect(),
        refinement_summary: RefinementSummary {
            similar_dish_ids: refined
                .neighbors
                .iter()
                .take(DEBUG_NEIGHBOR_CAP)
                .map(|n| n.id.clone())
                .collect(),
        },
    }
}

/// A pipeline with response memoization in front of it
pub struct CachedPipeline<P> {
    pipeline: Pipeline<P>,
    cache: RequestCache,
}

impl<P: BaselineProvider> CachedPipeline<P> {
    /// Wrap a pipeline with a cache sized from its configuration
    pub fn new(pipeline: Pipeline<P>) -> Self {
        let cache = RequestCache::new(pipeline.context.config.cache_max_entries);
        Self { pipeline, cache }
    }

    /// Run the pipeline, serving repeats from the cache.
    ///
    /// Only successful responses are stored; a failed request leaves no
    /// trace and is retried in full next time.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Pipeline::estimate`].
    pub fn estimate(&self, request: &NutritionRequest) -> Result<NutritionResponse, EngineError> {
        let key = RequestCache::fingerprint(request);
        if let Some(cached) = self.cache.get(&key) {
            debug!(item = %request.item_name, "request cache hit");
            return Ok(cached);
        }
        let response = self.pipeline.estimate(request)?;
        self.cache.put(key, response.clone());
        Ok(response)
    }

    /// The cache in front of the pipeline
    #[must_use]
    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }
}
