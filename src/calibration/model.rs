// ABOUTME: Calibration model: empirical truth/baseline ratio tables per specificity level
// ABOUTME: Robust multipliers (3-sigma trim, median, trimmed mean) with per-macro fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! The calibration model.
//!
//! The model accumulates observed truth/baseline ratios at seven levels of
//! specificity and derives a robust multiplier for a request by walking the
//! fallback hierarchy per macro: each macro uses the most specific level
//! that holds any ratios for it, down to the neutral default of 1.0.
//!
//! Lookups never mutate the tables; absent keys read as empty.

use crate::calibration::features::{extract_features, FeatureVector};
use crate::models::{BaselineEstimate, Macro, MacroVector, PerMacro};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Use the median below this many surviving samples
const MEDIAN_FALLBACK_THRESHOLD: usize = 3;

/// Fraction trimmed from each tail of the sorted ratios
const TRIMMED_MEAN_PERCENT: f64 = 0.1;

/// Neutral multiplier applied when no data exists anywhere
pub const DEFAULT_MULTIPLIER: f64 = 1.0;

/// Specificity levels of the fallback hierarchy, most specific first
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationLevel {
    /// Exact restaurant match
    Restaurant,
    /// Cuisine derived from the restaurant
    Cuisine,
    /// First canonical cooking method
    CookingMethod,
    /// Sauce level bucket
    SauceLevel,
    /// Portion class bucket
    PortionClass,
    /// Oil intensity bucket
    OilIntensity,
    /// Processing level bucket
    ProcessingLevel,
    /// No data anywhere; neutral multiplier
    Default,
}

impl CalibrationLevel {
    /// Fallback order, ending at the always-available default
    pub const FALLBACK_ORDER: [Self; 8] = [
        Self::Restaurant,
        Self::Cuisine,
        Self::CookingMethod,
        Self::SauceLevel,
        Self::PortionClass,
        Self::OilIntensity,
        Self::ProcessingLevel,
        Self::Default,
    ];

    /// Canonical snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Cuisine => "cuisine",
            Self::CookingMethod => "cooking_method",
            Self::SauceLevel => "sauce_level",
            Self::PortionClass => "portion_class",
            Self::OilIntensity => "oil_intensity",
            Self::ProcessingLevel => "processing_level",
            Self::Default => "default",
        }
    }

    /// The table key this level reads from a feature vector.
    ///
    /// `Default` has no key; `CookingMethod` uses the first canonical method.
    #[must_use]
    pub fn key<'a>(self, features: &'a FeatureVector) -> Option<&'a str> {
        match self {
            Self::Restaurant => Some(&features.restaurant),
            Self::Cuisine => Some(&features.cuisine),
            Self::CookingMethod => features.cooking_methods.first().map(String::as_str),
            Self::SauceLevel => Some(features.sauce_level.as_str()),
            Self::PortionClass => Some(features.portion_class.as_str()),
            Self::OilIntensity => Some(features.oil_intensity.as_str()),
            Self::ProcessingLevel => Some(features.processing_level.as_str()),
            Self::Default => None,
        }
    }
}

/// One table per specificity level, keyed by the level's feature value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LevelMap<T> {
    /// Restaurant-level entries
    #[serde(default = "BTreeMap::new")]
    pub restaurant: BTreeMap<String, T>,
    /// Cuisine-level entries
    #[serde(default = "BTreeMap::new")]
    pub cuisine: BTreeMap<String, T>,
    /// Cooking-method-level entries
    #[serde(default = "BTreeMap::new")]
    pub cooking_method: BTreeMap<String, T>,
    /// Sauce-level entries
    #[serde(default = "BTreeMap::new")]
    pub sauce_level: BTreeMap<String, T>,
    /// Portion-class entries
    #[serde(default = "BTreeMap::new")]
    pub portion_class: BTreeMap<String, T>,
    /// Oil-intensity entries
    #[serde(default = "BTreeMap::new")]
    pub oil_intensity: BTreeMap<String, T>,
    /// Processing-level entries
    #[serde(default = "BTreeMap::new")]
    pub processing_level: BTreeMap<String, T>,
}

impl<T> LevelMap<T> {
    /// The table for one level (`None` for the keyless default level)
    #[must_use]
    pub fn table(&self, level: CalibrationLevel) -> Option<&BTreeMap<String, T>> {
        match level {
            CalibrationLevel::Restaurant => Some(&self.restaurant),
            CalibrationLevel::Cuisine => Some(&self.cuisine),
            CalibrationLevel::CookingMethod => Some(&self.cooking_method),
            CalibrationLevel::SauceLevel => Some(&self.sauce_level),
            CalibrationLevel::PortionClass => Some(&self.portion_class),
            CalibrationLevel::OilIntensity => Some(&self.oil_intensity),
            CalibrationLevel::ProcessingLevel => Some(&self.processing_level),
            CalibrationLevel::Default => None,
        }
    }

    fn table_mut(&mut self, level: CalibrationLevel) -> Option<&mut BTreeMap<String, T>> {
        match level {
            CalibrationLevel::Restaurant => Some(&mut self.restaurant),
            CalibrationLevel::Cuisine => Some(&mut self.cuisine),
            CalibrationLevel::CookingMethod => Some(&mut self.cooking_method),
            CalibrationLevel::SauceLevel => Some(&mut self.sauce_level),
            CalibrationLevel::PortionClass => Some(&mut self.portion_class),
            CalibrationLevel::OilIntensity => Some(&mut self.oil_intensity),
            CalibrationLevel::ProcessingLevel => Some(&mut self.processing_level),
            CalibrationLevel::Default => None,
        }
    }
}

/// One paired training observation: a baseline estimate and the matching
/// restaurant truth, plus the request metadata the features derive from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingObservation {
    /// Stage-1 baseline estimate for the item
    pub baseline: BaselineEstimate,
    /// Ground-truth macros published by the restaurant
    pub truth: MacroVector,
    /// Restaurant name, if known
    pub restaurant: Option<String>,
    /// Menu price, if known
    pub price: Option<f64>,
}

/// Accumulated calibration knowledge, read-only during serving
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CalibrationModel {
    /// Observed truth/baseline ratios per level, key, and macro
    pub ratios: LevelMap<PerMacro<Vec<f64>>>,
    /// Observation counts backing each ratio list
    pub sample_counts: LevelMap<PerMacro<u64>>,
}

impl CalibrationModel {
    /// Empty model (all multipliers default, minimal confidence)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest paired baseline/truth observations into the ratio tables.
    ///
    /// Ratios where either side is missing or non-positive are skipped.
    pub fn train(&mut self, observations: &[TrainingObservation]) {
        for obs in observations {
            let features =
                extract_features(&obs.baseline, obs.restaurant.as_deref(), obs.price);
            for m in Macro::ALL {
                let baseline_val = obs.baseline.macros.get(m);
                let truth_val = obs.truth.get(m);
                if baseline_val <= 0.0 || truth_val <= 0.0 {
                    continue;
                }
                let ratio = truth_val / baseline_val;
                for level in CalibrationLevel::FALLBACK_ORDER {
                    if level == CalibrationLevel::CookingMethod {
                        // Every canonical method observed on the dish learns
                        for method in &features.cooking_methods {
                            self.record(level, method, m, ratio);
                        }
                    } else if let Some(key) = level.key(&features) {
                        let key = key.to_owned();
                        self.record(level, &key, m, ratio);
                    }
                }
            }
        }
    }

    fn record(&mut self, level: CalibrationLevel, key: &str, m: Macro, ratio: f64) {
        if let Some(table) = self.ratios.table_mut(level) {
            table
                .entry(key.to_owned())
                .or_default()
                .get_mut(m)
                .push(ratio);
        }
        if let Some(table) = self.sample_counts.table_mut(level) {
            *table.entry(key.to_owned()).or_default().get_mut(m) += 1;
        }
    }

    /// Observed ratios for one (level, key, macro) triple; empty when absent.
    /// Pure read: never inserts missing keys.
    #[must_use]
    pub fn ratios_at(&self, level: CalibrationLevel, key: &str, m: Macro) -> &[f64] {
        self.ratios
            .table(level)
            .and_then(|table| table.get(key))
            .map_or(&[], |per_macro| per_macro.get(m).as_slice())
    }

    /// Multiplier and the level it came from, walking the fallback hierarchy
    /// independently for this macro
    #[must_use]
    pub fn multiplier_for(&self, features: &FeatureVector, m: Macro) -> (f64, CalibrationLevel) {
        for level in CalibrationLevel::FALLBACK_ORDER {
            if level == CalibrationLevel::Default {
                break;
            }
            if let Some(key) = level.key(features) {
                let ratios = self.ratios_at(level, key, m);
                if !ratios.is_empty() {
                    return (robust_multiplier(ratios), level);
                }
            }
        }
        (DEFAULT_MULTIPLIER, CalibrationLevel::Default)
    }

    /// Sample count backing this macro's multiplier: restaurant level first,
    /// then cuisine, then the first cooking method
    #[must_use]
    pub fn sample_count(&self, features: &FeatureVector, m: Macro) -> u64 {
        for level in [
            CalibrationLevel::Restaurant,
            CalibrationLevel::Cuisine,
            CalibrationLevel::CookingMethod,
        ] {
            let count = level
                .key(features)
                .and_then(|key| {
                    self.sample_counts
                        .table(level)
                        .and_then(|table| table.get(key))
                })
                .map_or(0, |per_macro| *per_macro.get(m));
            if count > 0 {
                return count;
            }
        }
        0
    }

    /// Ratios at the best available level for variance scoring: restaurant,
    /// else cuisine, else empty
    #[must_use]
    pub fn variance_ratios(&self, features: &FeatureVector, m: Macro) -> &[f64] {
        let at_restaurant = self.ratios_at(CalibrationLevel::Restaurant, &features.restaurant, m);
        if at_restaurant.is_empty() {
            self.ratios_at(CalibrationLevel::Cuisine, &features.cuisine, m)
        } else {
            at_restaurant
        }
    }
}

/// Population mean of a sample (0.0 when empty)
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation of a sample (0.0 when empty)
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let len = sorted.len();
    if len % 2 == 0 {
        f64::midpoint(sorted[len / 2 - 1], sorted[len / 2])
    } else {
        sorted[len / 2]
    }
}

/// Robust multiplier from a list of observed ratios.
///
/// Drops observations beyond three standard deviations from the mean
/// (keeping the unfiltered list if that would empty it), then takes the
/// median for small samples and a 10% two-sided trimmed mean otherwise.
#[must_use]
pub fn robust_multiplier(ratios: &[f64]) -> f64 {
    if ratios.is_empty() {
        return DEFAULT_MULTIPLIER;
    }

    let m = mean(ratios);
    let sd = std_dev(ratios);
    let filtered: Vec<f64> = if sd > 0.0 {
        let kept: Vec<f64> = ratios
            .iter()
            .copied()
            .filter(|r| (r - m).abs() <= 3.0 * sd)
            .collect();
        if kept.is_empty() {
            ratios.to_vec()
        } else {
            kept
        }
    } else {
        ratios.to_vec()
    };

    if filtered.len() < MEDIAN_FALLBACK_THRESHOLD {
        return median(&filtered);
    }

    let trim_count = (filtered.len() as f64 * TRIMMED_MEAN_PERCENT) as usize;
    if trim_count > 0 && filtered.len() > trim_count * 2 {
        let mut sorted = filtered;
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        return mean(&sorted[trim_count..sorted.len() - trim_count]);
    }
    mean(&filtered)
}

#[cfg(test)]
mod tests {
    use super::{robust_multiplier, CalibrationLevel, CalibrationModel, DEFAULT_MULTIPLIER};
    use crate::calibration::features::extract_features;
    use crate::models::{BaselineEstimate, Macro, MacroVector, PortionClass};

    fn baseline_with_macros(calories: f64) -> BaselineEstimate {
        BaselineEstimate {
            item_name: "item".into(),
            ingredients: vec![],
            cooking_methods: vec!["grilled".into()],
            sauces: vec![],
            portion_class: PortionClass::Entree,
            macros: MacroVector {
                calories,
                fat: 10.0,
                carbs: 10.0,
                protein: 10.0,
                sodium: 100.0,
            },
            confidence: 1.0,
        }
    }

    #[test]
    fn empty_ratios_return_default_multiplier() {
        assert_eq!(robust_multiplier(&[]), DEFAULT_MULTIPLIER);
    }

    #[test]
    fn small_samples_use_median() {
        // Two points: median is the midpoint
        assert!((robust_multiplier(&[1.0, 1.4]) - 1.2).abs() < 1e-9);
    }

    #[test]
    fn extreme_outlier_is_discarded() {
        // Fifteen tight points and one far outlier; the outlier sits beyond
        // three sigma and must not drag the result away from 1.2
        let mut ratios = vec![1.2; 15];
        ratios.push(50.0);
        let result = robust_multiplier(&ratios);
        assert!((result - 1.2).abs() < 1e-9, "got {result}");
    }

    #[test]
    fn trimmed_mean_ignores_tails() {
        // Twenty points: 18 at 1.0, extremes at the tails get trimmed
        let mut ratios = vec![1.0; 18];
        ratios.push(0.5);
        ratios.push(1.5);
        let result = robust_multiplier(&ratios);
        assert!((result - 1.0).abs() < 1e-9, "got {result}");
    }

    #[test]
    fn macro_without_data_anywhere_lands_on_default() {
        let model = CalibrationModel::new();
        let features = extract_features(&baseline_with_macros(500.0), Some("nowhere"), None);
        let (multiplier, level) = model.multiplier_for(&features, Macro::Protein);
        assert_eq!(multiplier, DEFAULT_MULTIPLIER);
        assert_eq!(level, CalibrationLevel::Default);
    }

    #[test]
    fn training_populates_every_level() {
        let mut model = CalibrationModel::new();
        let obs = super::TrainingObservation {
            baseline: baseline_with_macros(500.0),
            truth: MacroVector {
                calories: 600.0,
                fat: 12.0,
                carbs: 12.0,
                protein: 12.0,
                sodium: 120.0,
            },
            restaurant: Some("mcdonalds".into()),
            price: None,
        };
        model.train(&[obs]);

        let ratios = model.ratios_at(CalibrationLevel::Restaurant, "mcdonalds", Macro::Calories);
        assert_eq!(ratios, &[1.2]);
        let cuisine = model.ratios_at(CalibrationLevel::Cuisine, "american", Macro::Fat);
        assert_eq!(cuisine, &[1.2]);
        let method = model.ratios_at(CalibrationLevel::CookingMethod, "grilled", Macro::Sodium);
        assert_eq!(method, &[1.2]);
    }

    #[test]
    fn reads_never_create_keys() {
        let model = CalibrationModel::new();
        let _ = model.ratios_at(CalibrationLevel::Restaurant, "ghost", Macro::Calories);
        assert!(model.ratios.restaurant.is_empty());
    }

    #[test]
    fn macros_fall_back_independently() {
        let mut model = CalibrationModel::new();
        // Calories has restaurant-level data; protein only cuisine-level
        model.record(
            CalibrationLevel::Restaurant,
            "mcdonalds",
            Macro::Calories,
            1.3,
        );
        model.record(CalibrationLevel::Cuisine, "american", Macro::Protein, 0.9);

        let features = extract_features(&baseline_with_macros(500.0), Some("mcdonalds"), None);
        let (_, calories_level) = model.multiplier_for(&features, Macro::Calories);
        let (protein_mult, protein_level) = model.multiplier_for(&features, Macro::Protein);
        assert_eq!(calories_level, CalibrationLevel::Restaurant);
        assert_eq!(protein_level, CalibrationLevel::Cuisine);
        assert!((protein_mult - 0.9).abs() < 1e-9);
    }
}
