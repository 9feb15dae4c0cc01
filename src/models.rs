// ABOUTME: Core value types: macros, portion classes, request/response shapes
// ABOUTME: Handoff payloads validate exact macro key sets with descriptive errors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Shared data model for the estimation pipeline.
//!
//! Every macro table in the crate is keyed on the closed [`Macro`] enum and
//! every nutrient profile is a [`MacroVector`]. Payloads arriving from the
//! external baseline collaborator are untyped JSON and are validated here,
//! with missing keys reported by name.

use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The five tracked macro-nutrients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Macro {
    /// Energy (kcal)
    Calories,
    /// Fat (g)
    Fat,
    /// Carbohydrate (g)
    Carbs,
    /// Protein (g)
    Protein,
    /// Sodium (mg)
    Sodium,
}

impl Macro {
    /// All macros, in canonical order
    pub const ALL: [Self; 5] = [
        Self::Calories,
        Self::Fat,
        Self::Carbs,
        Self::Protein,
        Self::Sodium,
    ];

    /// Canonical lowercase name, matching the wire format
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calories => "calories",
            Self::Fat => "fat",
            Self::Carbs => "carbs",
            Self::Protein => "protein",
            Self::Sodium => "sodium",
        }
    }
}

impl std::fmt::Display for Macro {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value of type `T` per macro; backing store for ratio lists, counts,
/// confidences, and percentile bounds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerMacro<T> {
    /// Calories entry
    pub calories: T,
    /// Fat entry
    pub fat: T,
    /// Carbs entry
    pub carbs: T,
    /// Protein entry
    pub protein: T,
    /// Sodium entry
    pub sodium: T,
}

impl<T> PerMacro<T> {
    /// Build by evaluating `f` for each macro
    pub fn from_fn(mut f: impl FnMut(Macro) -> T) -> Self {
        Self {
            calories: f(Macro::Calories),
            fat: f(Macro::Fat),
            carbs: f(Macro::Carbs),
            protein: f(Macro::Protein),
            sodium: f(Macro::Sodium),
        }
    }

    /// Shared access to one macro's entry
    pub const fn get(&self, m: Macro) -> &T {
        match m {
            Macro::Calories => &self.calories,
            Macro::Fat => &self.fat,
            Macro::Carbs => &self.carbs,
            Macro::Protein => &self.protein,
            Macro::Sodium => &self.sodium,
        }
    }

    /// Mutable access to one macro's entry
    pub fn get_mut(&mut self, m: Macro) -> &mut T {
        match m {
            Macro::Calories => &mut self.calories,
            Macro::Fat => &mut self.fat,
            Macro::Carbs => &mut self.carbs,
            Macro::Protein => &mut self.protein,
            Macro::Sodium => &mut self.sodium,
        }
    }
}

/// A complete nutrient profile: one `f64` per macro
///
/// Values are expected (but not enforced) to be non-negative. The vector is
/// `Copy` and passed by value between stages; no stage mutates its input.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MacroVector {
    /// Energy (kcal)
    pub calories: f64,
    /// Fat (g)
    pub fat: f64,
    /// Carbohydrate (g)
    pub carbs: f64,
    /// Protein (g)
    pub protein: f64,
    /// Sodium (mg)
    pub sodium: f64,
}

impl MacroVector {
    /// The all-zero profile
    pub const ZERO: Self = Self {
        calories: 0.0,
        fat: 0.0,
        carbs: 0.0,
        protein: 0.0,
        sodium: 0.0,
    };

    /// One macro's value
    #[must_use]
    pub const fn get(&self, m: Macro) -> f64 {
        match m {
            Macro::Calories => self.calories,
            Macro::Fat => self.fat,
            Macro::Carbs => self.carbs,
            Macro::Protein => self.protein,
            Macro::Sodium => self.sodium,
        }
    }

    /// Set one macro's value
    pub fn set(&mut self, m: Macro, value: f64) {
        match m {
            Macro::Calories => self.calories = value,
            Macro::Fat => self.fat = value,
            Macro::Carbs => self.carbs = value,
            Macro::Protein => self.protein = value,
            Macro::Sodium => self.sodium = value,
        }
    }

    /// Build by evaluating `f` for each macro
    pub fn from_fn(mut f: impl FnMut(Macro) -> f64) -> Self {
        Self {
            calories: f(Macro::Calories),
            fat: f(Macro::Fat),
            carbs: f(Macro::Carbs),
            protein: f(Macro::Protein),
            sodium: f(Macro::Sodium),
        }
    }

    /// Parse from a JSON object, requiring the exact macro key set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContractViolation`] naming every missing or
    /// non-numeric macro key, attributed to `stage`.
    pub fn from_value(stage: &'static str, value: &Value) -> Result<Self, EngineError> {
        let Some(map) = value.as_object() else {
            return Err(EngineError::contract_violation(
                stage,
                Macro::ALL.iter().map(|m| m.as_str().into()).collect(),
            ));
        };
        let mut missing = Vec::new();
        let mut out = Self::ZERO;
        for m in Macro::ALL {
            match map.get(m.as_str()).and_then(Value::as_f64) {
                Some(v) => out.set(m, v),
                None => missing.push(m.as_str().into()),
            }
        }
        if missing.is_empty() {
            Ok(out)
        } else {
            Err(EngineError::contract_violation(stage, missing))
        }
    }

    /// Lowercase-name map view, used by debug payloads
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        Macro::ALL
            .iter()
            .map(|&m| (m.as_str().into(), self.get(m)))
            .collect()
    }
}

/// Portion classification as reported by the baseline collaborator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortionClass {
    /// Snack-sized item
    Snack,
    /// Standard entree
    #[default]
    Entree,
    /// Shared or oversized platter
    Platter,
}

impl PortionClass {
    /// Parse with the default (`Entree`) for unrecognized values
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "snack" => Self::Snack,
            "platter" => Self::Platter,
            _ => Self::Entree,
        }
    }

    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Snack => "snack",
            Self::Entree => "entree",
            Self::Platter => "platter",
        }
    }

    /// Portion size used by the embedding vocabulary
    #[must_use]
    pub const fn size(self) -> PortionSize {
        match self {
            Self::Snack => PortionSize::Small,
            Self::Entree => PortionSize::Medium,
            Self::Platter => PortionSize::Large,
        }
    }
}

/// Portion size vocabulary used by dish embeddings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortionSize {
    /// Small portion
    Small,
    /// Medium portion
    #[default]
    Medium,
    /// Large portion
    Large,
}

impl PortionSize {
    /// One-hot index into the portion segment of a dish embedding
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Small => 0,
            Self::Medium => 1,
            Self::Large => 2,
        }
    }
}

/// An estimation request as received from the transport layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NutritionRequest {
    /// Menu item name
    pub item_name: String,
    /// Free-form item description
    #[serde(default)]
    pub description: String,
    /// Restaurant or chain name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<String>,
    /// Menu price; excluded from the cache key so price variation does not
    /// fragment the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Item modifiers (e.g. "extra cheese")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Vec<String>>,
}

/// Stage-1 output: the unadjusted estimate from the external collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaselineEstimate {
    /// Menu item name
    pub item_name: String,
    /// Parsed ingredient names
    pub ingredients: Vec<String>,
    /// Cooking method strings (free-form; normalized downstream)
    pub cooking_methods: Vec<String>,
    /// Sauce names
    pub sauces: Vec<String>,
    /// Portion classification
    pub portion_class: PortionClass,
    /// Baseline nutrient profile
    pub macros: MacroVector,
    /// Collaborator's confidence in the baseline, in [0, 1]
    pub confidence: f64,
}

impl BaselineEstimate {
    /// Required keys at the baseline handoff; descriptive fields degrade to
    /// defaults, the estimate itself may not.
    const REQUIRED_KEYS: [&'static str; 2] = ["macros", "confidence"];

    /// Validate and parse the collaborator's raw JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ContractViolation`] naming the missing keys if
    /// `macros` (with its exact five-macro key set) or `confidence` is absent.
    pub fn from_value(value: &Value, item_name: &str) -> Result<Self, EngineError> {
        let Some(map) = value.as_object() else {
            return Err(EngineError::contract_violation(
                "baseline",
                Self::REQUIRED_KEYS.iter().map(|&k| k.into()).collect(),
            ));
        };

        let missing: Vec<String> = Self::REQUIRED_KEYS
            .iter()
            .filter(|&&k| !map.contains_key(k))
            .map(|&k| k.into())
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::contract_violation("baseline", missing));
        }

        let macros = MacroVector::from_value("baseline", &map["macros"])?;
        let confidence = map["confidence"].as_f64().unwrap_or(1.0).clamp(0.0, 1.0);

        Ok(Self {
            item_name: map
                .get("item_name")
                .and_then(Value::as_str)
                .unwrap_or(item_name)
                .into(),
            ingredients: string_list(map.get("ingredients")),
            cooking_methods: string_list(map.get("cooking_methods")),
            sauces: string_list(map.get("sauces")),
            portion_class: map
                .get("portion_class")
                .and_then(Value::as_str)
                .map(PortionClass::from_str_lossy)
                .unwrap_or_default(),
            macros,
            confidence,
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(Into::into)
                .collect()
        })
        .unwrap_or_default()
}

/// Final pipeline output handed to the transport layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NutritionResponse {
    /// Final (refined) nutrient profile
    pub macros: MacroVector,
    /// Aggregate confidence in [0, 1]
    pub confidence: f64,
    /// Per-stage audit trail
    pub debug: DebugPayload,
}

/// Audit trail attached to every response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DebugPayload {
    /// Per-macro calibration adjustments (stage 2)
    pub calibration_adjustments: BTreeMap<String, Value>,
    /// Refinement neighbor summary (stage 3)
    pub refinement_summary: RefinementSummary,
}

/// Which neighbors influenced the refinement stage
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefinementSummary {
    /// Most similar dish ids, capped at five
    pub similar_dish_ids: Vec<String>,
}
