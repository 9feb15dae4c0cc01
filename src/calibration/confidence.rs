// ABOUTME: Per-macro calibration confidence from sample count, variance, and ontology match
// ABOUTME: Weighted 0.5/0.3/0.2 policy combination, clamped to [0, 1]
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Calibration confidence scoring.
//!
//! The weights and thresholds here are policy constants carried over from
//! the trained service, not derived quantities; recalibrating them is a
//! config concern, not a code concern.

use crate::calibration::features::FeatureVector;
use crate::calibration::model::{mean, std_dev, CalibrationModel};
use crate::calibration::ontology::{ProcessingLevel, SauceLevel};
use crate::models::Macro;

/// Samples required before confidence leaves the low ramp
const MIN_SAMPLES_FOR_CONFIDENCE: u64 = 5;

/// Sample count where the upper confidence ramp saturates
const SAMPLE_SATURATION: f64 = 50.0;

/// Confidence when a macro has no backing samples at all
pub const NO_DATA_CONFIDENCE: f64 = 0.1;

/// Stage weights: sample evidence, ratio variance, ontology match strength
const SAMPLE_WEIGHT: f64 = 0.5;
const VARIANCE_WEIGHT: f64 = 0.3;
const ONTOLOGY_WEIGHT: f64 = 0.2;

/// Confidence in one macro's calibration adjustment, in [0, 1]
#[must_use]
pub fn confidence_score(model: &CalibrationModel, features: &FeatureVector, m: Macro) -> f64 {
    let sample_count = model.sample_count(features, m);
    if sample_count == 0 {
        return NO_DATA_CONFIDENCE;
    }

    let sample_confidence = if sample_count < MIN_SAMPLES_FOR_CONFIDENCE {
        (sample_count as f64 / MIN_SAMPLES_FOR_CONFIDENCE as f64).mul_add(0.3, 0.3)
    } else {
        (sample_count as f64 / SAMPLE_SATURATION)
            .mul_add(0.3, 0.6)
            .min(0.9)
    };

    let variance_confidence = variance_confidence(model, features, m);
    let ontology_confidence = ontology_confidence(features);

    let combined = SAMPLE_WEIGHT * sample_confidence
        + VARIANCE_WEIGHT * variance_confidence
        + ONTOLOGY_WEIGHT * ontology_confidence;
    combined.clamp(0.0, 1.0)
}

/// Confidence from the coefficient of variation of the backing ratios at
/// the best available level (restaurant, else cuisine). Neutral 0.5 when
/// fewer than two ratios exist.
fn variance_confidence(model: &CalibrationModel, features: &FeatureVector, m: Macro) -> f64 {
    let ratios = model.variance_ratios(features, m);
    if ratios.len() < 2 {
        return 0.5;
    }
    let mu = mean(ratios);
    if mu <= 0.0 {
        return 0.5;
    }
    let cv = std_dev(ratios) / mu;
    if cv < 0.1 {
        0.9
    } else if cv < 0.3 {
        0.7
    } else if cv < 0.5 {
        0.5
    } else {
        0.3
    }
}

/// Ontology match strength: penalize defaulted features, lightly boost
/// specific ones, capped at 1.0
fn ontology_confidence(features: &FeatureVector) -> f64 {
    let mut confidence = 1.0_f64;
    if features.restaurant == "unknown" {
        confidence *= 0.7;
    }
    // American is the default cuisine, so a known restaurant mapped there
    // is a weaker signal
    if features.cuisine == "american" && features.restaurant != "unknown" {
        confidence *= 0.9;
    }
    if features.methods_are_default() {
        confidence *= 0.9;
    }
    if features.sauce_level != SauceLevel::None {
        confidence *= 1.05;
    }
    if features.processing_level != ProcessingLevel::Processed {
        confidence *= 1.05;
    }
    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::{confidence_score, NO_DATA_CONFIDENCE};
    use crate::calibration::features::extract_features;
    use crate::calibration::model::{CalibrationModel, TrainingObservation};
    use crate::models::{BaselineEstimate, Macro, MacroVector, PortionClass};

    fn baseline() -> BaselineEstimate {
        BaselineEstimate {
            item_name: "item".into(),
            ingredients: vec![],
            cooking_methods: vec!["grilled".into()],
            sauces: vec!["mayo".into()],
            portion_class: PortionClass::Entree,
            macros: MacroVector {
                calories: 500.0,
                fat: 25.0,
                carbs: 45.0,
                protein: 20.0,
                sodium: 900.0,
            },
            confidence: 1.0,
        }
    }

    fn observation(restaurant: &str, calories_ratio: f64) -> TrainingObservation {
        let base = baseline();
        let truth = MacroVector {
            calories: base.macros.calories * calories_ratio,
            fat: base.macros.fat,
            carbs: base.macros.carbs,
            protein: base.macros.protein,
            sodium: base.macros.sodium,
        };
        TrainingObservation {
            baseline: base,
            truth,
            restaurant: Some(restaurant.into()),
            price: None,
        }
    }

    #[test]
    fn zero_samples_is_floor_confidence() {
        let model = CalibrationModel::new();
        let features = extract_features(&baseline(), Some("nowhere"), None);
        assert_eq!(
            confidence_score(&model, &features, Macro::Calories),
            NO_DATA_CONFIDENCE
        );
    }

    #[test]
    fn low_variance_restaurant_samples_score_high() {
        let mut model = CalibrationModel::new();
        let observations: Vec<_> = (0..12)
            .map(|i| observation("taco bell", 1.2 + f64::from(i % 2) * 0.01))
            .collect();
        model.train(&observations);

        let features = extract_features(&baseline(), Some("taco bell"), None);
        let confidence = confidence_score(&model, &features, Macro::Calories);
        // 12 samples, CV < 0.1, fully specific ontology: at or above 0.8
        assert!(confidence >= 0.8, "got {confidence}");
        assert!(confidence <= 1.0);
    }

    #[test]
    fn confidence_always_in_unit_interval() {
        let mut model = CalibrationModel::new();
        model.train(&[
            observation("mcdonalds", 1.2),
            observation("mcdonalds", 3.5),
            observation("mcdonalds", 0.2),
        ]);
        let features = extract_features(&baseline(), Some("mcdonalds"), None);
        for m in Macro::ALL {
            let c = confidence_score(&model, &features, m);
            assert!((0.0..=1.0).contains(&c), "{m}: {c}");
        }
    }
}
