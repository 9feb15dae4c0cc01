// ABOUTME: Calibration engine: feature extraction, multiplier lookup, adjustment audit
// ABOUTME: Degrades to neutral multipliers with floor confidence when no model is loaded
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Stage 2: restaurant/context calibration.
//!
//! Adjusts the baseline estimate with context-dependent multipliers learned
//! from empirical truth/baseline ratios, and reports per-macro confidence
//! plus a full adjustment audit trail.

pub mod confidence;
pub mod features;
pub mod model;
pub mod ontology;

use crate::models::{BaselineEstimate, Macro, MacroVector, PerMacro};
use serde::{Deserialize, Serialize};

pub use confidence::confidence_score;
pub use features::{extract_features, FeatureVector};
pub use model::{CalibrationLevel, CalibrationModel, TrainingObservation};

/// Where a macro's multiplier came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentSource {
    /// No calibration model was loaded at all
    NoModel,
    /// A populated fallback level (untagged, so it must stay last)
    #[serde(untagged)]
    Level(CalibrationLevel),
}

/// Audit record for one macro's calibration adjustment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AppliedAdjustment {
    /// Multiplier applied to the baseline value
    pub multiplier: f64,
    /// Fallback level the multiplier came from
    pub source: AdjustmentSource,
    /// Baseline value before adjustment
    pub baseline: f64,
    /// Value after adjustment
    pub adjusted: f64,
}

/// Stage-2 output: adjusted macros with confidence and audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalibrationResult {
    /// Calibrated nutrient profile
    pub macros: MacroVector,
    /// Per-macro confidence in [0, 1]
    pub confidence: PerMacro<f64>,
    /// Per-macro adjustment audit
    pub adjustments: PerMacro<AppliedAdjustment>,
}

impl CalibrationResult {
    /// Mean of the per-macro confidences (the stage's scalar confidence)
    #[must_use]
    pub fn mean_confidence(&self) -> f64 {
        Macro::ALL
            .iter()
            .map(|&m| self.confidence.get(m))
            .sum::<f64>()
            / Macro::ALL.len() as f64
    }
}

/// Calibrate a baseline estimate against pre-extracted features.
///
/// With no model loaded the baseline passes through unchanged at the floor
/// confidence of 0.1 per macro, audited as `no_model`.
#[must_use]
pub fn calibrate_with_features(
    model: Option<&CalibrationModel>,
    baseline: &BaselineEstimate,
    features: &FeatureVector,
) -> CalibrationResult {
    let Some(model) = model else {
        return fallback_calibration(baseline);
    };

    let mut macros = MacroVector::ZERO;
    let confidence = PerMacro::from_fn(|m| confidence_score(model, features, m));
    let adjustments = PerMacro::from_fn(|m| {
        let baseline_val = baseline.macros.get(m);
        let (multiplier, level) = model.multiplier_for(features, m);
        let adjusted = baseline_val * multiplier;
        macros.set(m, adjusted);
        AppliedAdjustment {
            multiplier,
            source: AdjustmentSource::Level(level),
            baseline: baseline_val,
            adjusted,
        }
    });

    CalibrationResult {
        macros,
        confidence,
        adjustments,
    }
}

/// Calibrate a baseline estimate given raw restaurant metadata
#[must_use]
pub fn calibrate(
    model: Option<&CalibrationModel>,
    baseline: &BaselineEstimate,
    restaurant: Option<&str>,
    price: Option<f64>,
) -> CalibrationResult {
    let features = extract_features(baseline, restaurant, price);
    calibrate_with_features(model, baseline, &features)
}

fn fallback_calibration(baseline: &BaselineEstimate) -> CalibrationResult {
    CalibrationResult {
        macros: baseline.macros,
        confidence: PerMacro::from_fn(|_| confidence::NO_DATA_CONFIDENCE),
        adjustments: PerMacro::from_fn(|m| {
            let value = baseline.macros.get(m);
            AppliedAdjustment {
                multiplier: model::DEFAULT_MULTIPLIER,
                source: AdjustmentSource::NoModel,
                baseline: value,
                adjusted: value,
            }
        }),
    }
}
