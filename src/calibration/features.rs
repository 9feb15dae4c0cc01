// ABOUTME: Deterministic feature extraction from a baseline estimate and restaurant metadata
// ABOUTME: Pure rule-based normalization onto the calibration ontology; no state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

use crate::calibration::ontology::{
    infer_oil_intensity, infer_price_bucket, infer_processing_level, infer_sauce_level,
    normalize_cooking_method, normalize_cuisine, OilIntensity, PriceBucket, ProcessingLevel,
    SauceLevel,
};
use crate::models::{BaselineEstimate, PortionClass};
use serde::{Deserialize, Serialize};

/// Normalized calibration context for one request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    /// Lowercased restaurant name ("unknown" when absent)
    pub restaurant: String,
    /// Cuisine derived from the restaurant name
    pub cuisine: String,
    /// Canonical cooking methods (never empty; defaults to `["fried"]`)
    pub cooking_methods: Vec<String>,
    /// Oil intensity inferred from the cooking methods
    pub oil_intensity: OilIntensity,
    /// Sauce level inferred from the sauce list
    pub sauce_level: SauceLevel,
    /// Processing level inferred from the restaurant name
    pub processing_level: ProcessingLevel,
    /// Portion classification from the baseline
    pub portion_class: PortionClass,
    /// Price bucket from the numeric price or restaurant keywords
    pub price_bucket: PriceBucket,
}

impl FeatureVector {
    /// True when the cooking methods are the unmatched-input default
    #[must_use]
    pub fn methods_are_default(&self) -> bool {
        self.cooking_methods.len() == 1 && self.cooking_methods[0] == "fried"
    }
}

/// Extract the calibration feature vector for one request.
///
/// Deterministic and side-effect free: the same baseline and metadata always
/// produce the same features.
#[must_use]
pub fn extract_features(
    baseline: &BaselineEstimate,
    restaurant: Option<&str>,
    price: Option<f64>,
) -> FeatureVector {
    // Lowercased so table keys match across menu casings
    let restaurant = restaurant
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map_or_else(|| "unknown".to_owned(), str::to_lowercase);

    let mut cooking_methods: Vec<String> = baseline
        .cooking_methods
        .iter()
        .map(|m| normalize_cooking_method(m).to_owned())
        .collect();
    if cooking_methods.is_empty() {
        // Most common fast-food default
        cooking_methods.push("fried".to_owned());
    }

    let cuisine = normalize_cuisine(&restaurant).to_owned();
    let oil_intensity = infer_oil_intensity(&cooking_methods);
    let sauce_level = infer_sauce_level(&baseline.sauces);
    let processing_level = infer_processing_level(&restaurant);
    let price_bucket = infer_price_bucket(price, &restaurant);

    FeatureVector {
        restaurant,
        cuisine,
        cooking_methods,
        oil_intensity,
        sauce_level,
        processing_level,
        portion_class: baseline.portion_class,
        price_bucket,
    }
}
