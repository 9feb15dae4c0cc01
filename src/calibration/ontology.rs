// ABOUTME: Fixed controlled vocabularies and normalizers for calibration features
// ABOUTME: Maps free-form restaurant/method/sauce strings onto closed enums
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! The calibration ontology.
//!
//! All normalization is pure table lookup with substring matching; no
//! request-time I/O and no learned components. Defaults are chosen for the
//! fast-food-heavy corpus: unmatched cooking methods map to `fried`,
//! unmatched restaurants to `american` cuisine.

use serde::{Deserialize, Serialize};

/// Canonical cooking method vocabulary
pub const COOKING_METHODS: [&str; 9] = [
    "grilled",
    "fried",
    "deep_fried",
    "baked",
    "roasted",
    "steamed",
    "raw",
    "sauteed",
    "pressure_cooked",
];

/// Aliases from common menu phrasing to canonical cooking methods
const METHOD_ALIASES: [(&str, &str); 29] = [
    ("grill", "grilled"),
    ("grilling", "grilled"),
    ("char-grilled", "grilled"),
    ("flame-grilled", "grilled"),
    ("flame grilled", "grilled"),
    ("fry", "fried"),
    ("frying", "fried"),
    ("pan-fried", "fried"),
    ("pan fried", "fried"),
    ("stir-fried", "fried"),
    ("stir fried", "fried"),
    // Wok cooking is typically stir-frying
    ("wok", "fried"),
    ("deep-fried", "deep_fried"),
    ("deep fried", "deep_fried"),
    ("deepfry", "deep_fried"),
    ("bake", "baked"),
    ("baking", "baked"),
    ("oven-baked", "baked"),
    ("oven baked", "baked"),
    ("roast", "roasted"),
    ("roasting", "roasted"),
    // Tandoor is a type of roasting
    ("tandoor", "roasted"),
    ("steam", "steamed"),
    ("steaming", "steamed"),
    ("uncooked", "raw"),
    ("saute", "sauteed"),
    ("sauté", "sauteed"),
    ("pressure-cooked", "pressure_cooked"),
    ("pressure cooked", "pressure_cooked"),
];

/// Curated restaurant-substring → cuisine table
const CUISINE_TABLE: [(&str, &str); 46] = [
    ("mcdonalds", "american"),
    ("burger king", "american"),
    ("wendys", "american"),
    ("chick-fil-a", "american"),
    ("chick fil a", "american"),
    ("arbys", "american"),
    ("sonic", "american"),
    ("jack in the box", "american"),
    ("five guys", "american"),
    ("shake shack", "american"),
    ("in-n-out", "american"),
    ("in n out", "american"),
    ("dennys", "american"),
    ("ihop", "american"),
    ("applebees", "american"),
    ("applebee's", "american"),
    ("taco bell", "mexican"),
    ("chipotle", "mexican"),
    ("qdoba", "mexican"),
    ("moes southwest grill", "mexican"),
    ("moes", "mexican"),
    ("dominos", "italian"),
    ("domino's", "italian"),
    ("pizza hut", "italian"),
    ("olive garden", "italian"),
    ("fazolis", "italian"),
    ("panda express", "chinese"),
    ("pf changs", "chinese"),
    ("p.f. chang's", "chinese"),
    ("pei wei", "chinese"),
    ("kfc", "asian"),
    ("curry house", "indian"),
    ("bombay express", "indian"),
    ("cava", "mediterranean"),
    ("nandos", "african"),
    ("nando's", "african"),
    ("red lobster", "seafood"),
    ("long john silvers", "seafood"),
    ("outback steakhouse", "steakhouse"),
    ("outback", "steakhouse"),
    ("texas roadhouse", "steakhouse"),
    ("starbucks", "coffee"),
    ("dunkin'", "coffee"),
    ("dunkin", "coffee"),
    ("subway", "sandwich"),
    ("panera bread", "sandwich"),
];

/// Sauce names that force a heavy sauce level regardless of count
const HEAVY_SAUCE_KEYWORDS: [&str; 6] = ["gravy", "cream", "cheese sauce", "mayo", "ranch", "heavy"];

/// Restaurant keywords by processing bucket
const FAST_FOOD_KEYWORDS: [&str; 9] = [
    "mcdonalds",
    "burger king",
    "wendys",
    "taco bell",
    "kfc",
    "pizza hut",
    "dominos",
    "subway",
    "dunkin",
];
const CASUAL_DINING_KEYWORDS: [&str; 7] = [
    "olive garden",
    "applebees",
    "red lobster",
    "outback",
    "texas roadhouse",
    "dennys",
    "ihop",
];
const FRESH_KEYWORDS: [&str; 5] = ["five guys", "shake shack", "chipotle", "cava", "panera"];

/// Restaurant keywords by price bucket (used when no numeric price is given)
const PREMIUM_PRICE_KEYWORDS: [&str; 7] = [
    "five guys",
    "shake shack",
    "pf changs",
    "olive garden",
    "red lobster",
    "outback",
    "texas roadhouse",
];
const MID_PRICE_KEYWORDS: [&str; 5] = ["chipotle", "panera", "cava", "panda express", "subway"];

/// Oil intensity inferred from canonical cooking methods
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum OilIntensity {
    /// Steamed / raw / grilled
    Low,
    /// Sauteed / roasted / baked, and the unknown default
    #[default]
    Medium,
    /// Fried / deep-fried
    High,
}

impl OilIntensity {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Sauce level derived from the sauce list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum SauceLevel {
    /// No sauces
    #[default]
    None,
    /// One sauce
    Light,
    /// Two sauces
    Medium,
    /// Three or more sauces, or any heavy-keyword sauce
    Heavy,
}

impl SauceLevel {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
        }
    }

    /// Ordinal rank (none=0 .. heavy=3)
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Light => 1,
            Self::Medium => 2,
            Self::Heavy => 3,
        }
    }

    /// Sauce intensity scalar in [0, 1] used by dish embeddings
    #[must_use]
    pub fn intensity(self) -> f64 {
        f64::from(self.rank()) / 3.0
    }
}

/// How industrially processed the restaurant's food is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingLevel {
    /// Fast-casual / premium kitchens
    Fresh,
    /// Casual dining, and the unknown default
    #[default]
    Processed,
    /// Fast-food chains
    UltraProcessed,
}

impl ProcessingLevel {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Processed => "processed",
            Self::UltraProcessed => "ultra_processed",
        }
    }
}

/// Price bucket from numeric price or restaurant keywords
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceBucket {
    /// Under $10, or unknown fast food
    #[default]
    Cheap,
    /// $10 to $20, or mid-range keywords
    Mid,
    /// Over $20, or premium keywords
    Premium,
}

impl PriceBucket {
    /// Canonical lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cheap => "cheap",
            Self::Mid => "mid",
            Self::Premium => "premium",
        }
    }
}

/// Normalize a free-form cooking method to the canonical vocabulary.
///
/// Tries an exact vocabulary match, then the alias table, then a two-way
/// partial match against the aliases. Defaults to `fried` (the most common
/// fast-food method) when nothing matches.
#[must_use]
pub fn normalize_cooking_method(method: &str) -> &'static str {
    let lowered = method.trim().to_lowercase();
    if let Some(&canonical) = COOKING_METHODS.iter().find(|&&m| m == lowered) {
        return canonical;
    }
    if let Some(&(_, canonical)) = METHOD_ALIASES.iter().find(|&&(alias, _)| alias == lowered) {
        return canonical;
    }
    for (alias, canonical) in METHOD_ALIASES {
        if lowered.contains(alias) || alias.contains(lowered.as_str()) {
            return canonical;
        }
    }
    "fried"
}

/// Map a restaurant name to a cuisine via substring matching.
///
/// Defaults to `american` when no table entry matches.
#[must_use]
pub fn normalize_cuisine(restaurant: &str) -> &'static str {
    let lowered = restaurant
        .trim()
        .to_lowercase()
        .replace(" (pdf)", "")
        .replace(" (html)", "");
    if let Some(&(_, cuisine)) = CUISINE_TABLE.iter().find(|&&(name, _)| name == lowered) {
        return cuisine;
    }
    for (name, cuisine) in CUISINE_TABLE {
        if lowered.contains(name) {
            return cuisine;
        }
    }
    "american"
}

/// Infer oil intensity from canonical cooking methods
#[must_use]
pub fn infer_oil_intensity(cooking_methods: &[String]) -> OilIntensity {
    if cooking_methods.is_empty() {
        return OilIntensity::Medium;
    }
    let has = |candidates: &[&str]| {
        cooking_methods
            .iter()
            .any(|m| candidates.contains(&m.as_str()))
    };
    if has(&["deep_fried", "fried"]) {
        OilIntensity::High
    } else if has(&["sauteed", "roasted", "baked"]) {
        OilIntensity::Medium
    } else if has(&["steamed", "raw", "grilled"]) {
        OilIntensity::Low
    } else {
        OilIntensity::Medium
    }
}

/// Derive the sauce level from the sauce list
#[must_use]
pub fn infer_sauce_level(sauces: &[String]) -> SauceLevel {
    if sauces.is_empty() {
        return SauceLevel::None;
    }
    let has_heavy = sauces.iter().any(|sauce| {
        let lowered = sauce.to_lowercase();
        HEAVY_SAUCE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
    });
    if has_heavy || sauces.len() >= 3 {
        SauceLevel::Heavy
    } else if sauces.len() == 2 {
        SauceLevel::Medium
    } else {
        SauceLevel::Light
    }
}

/// Infer processing level from the restaurant name
#[must_use]
pub fn infer_processing_level(restaurant: &str) -> ProcessingLevel {
    let lowered = restaurant.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));
    if matches(&FAST_FOOD_KEYWORDS) {
        ProcessingLevel::UltraProcessed
    } else if matches(&CASUAL_DINING_KEYWORDS) {
        ProcessingLevel::Processed
    } else if matches(&FRESH_KEYWORDS) {
        ProcessingLevel::Fresh
    } else {
        ProcessingLevel::Processed
    }
}

/// Price bucket from a numeric price when given, else restaurant keywords
#[must_use]
pub fn infer_price_bucket(price: Option<f64>, restaurant: &str) -> PriceBucket {
    if let Some(p) = price {
        return if p < 10.0 {
            PriceBucket::Cheap
        } else if p < 20.0 {
            PriceBucket::Mid
        } else {
            PriceBucket::Premium
        };
    }
    let lowered = restaurant.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));
    if matches(&PREMIUM_PRICE_KEYWORDS) {
        PriceBucket::Premium
    } else if matches(&MID_PRICE_KEYWORDS) {
        PriceBucket::Mid
    } else {
        PriceBucket::Cheap
    }
}
