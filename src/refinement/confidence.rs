// ABOUTME: Refinement confidence: interpolated similarity curve minus coverage penalty
// ABOUTME: Curves come from the confidence params artifact, with built-in defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

use crate::artifacts::{ConfidenceParams, IngredientEmbeddings, LookupCurve};
use std::collections::BTreeSet;

/// Linear interpolation through a lookup curve, clamped at both ends.
///
/// A degenerate curve (fewer than two points, or mismatched lengths) reads
/// as its first value, or 0.0 when empty.
#[must_use]
pub fn interpolate(curve: &LookupCurve, x: f64) -> f64 {
    if curve.bin_edges.len() != curve.values.len() || curve.values.is_empty() {
        return curve.values.first().copied().unwrap_or(0.0);
    }
    if curve.values.len() == 1 || x <= curve.bin_edges[0] {
        return curve.values[0];
    }
    let last = curve.values.len() - 1;
    if x >= curve.bin_edges[last] {
        return curve.values[last];
    }
    for i in 0..last {
        let (lo, hi) = (curve.bin_edges[i], curve.bin_edges[i + 1]);
        if x <= hi {
            let span = hi - lo;
            if span <= 0.0 {
                return curve.values[i + 1];
            }
            let t = (x - lo) / span;
            return t.mul_add(curve.values[i + 1] - curve.values[i], curve.values[i]);
        }
    }
    curve.values[last]
}

/// Fraction of the dish's distinct ingredients present in the embedding
/// table. Names are deduplicated after normalization so a repeated
/// ingredient counts once; a dish with no ingredients listed counts as
/// fully covered.
#[must_use]
pub fn ingredient_coverage(table: &IngredientEmbeddings, ingredients: &[String]) -> f64 {
    let unique: BTreeSet<String> = ingredients.iter().map(|i| i.trim().to_lowercase()).collect();
    if unique.is_empty() {
        return 1.0;
    }
    let known = unique
        .iter()
        .filter(|i| table.embeddings.contains_key(*i))
        .count();
    known as f64 / unique.len() as f64
}

/// Refinement-stage confidence: base value from the mean neighbor
/// similarity, reduced by the coverage penalty, clamped to [0, 1]
#[must_use]
pub fn refinement_confidence(
    params: &ConfidenceParams,
    mean_similarity: f64,
    coverage: f64,
) -> f64 {
    let base = interpolate(&params.similarity_to_confidence, mean_similarity);
    let penalty = interpolate(&params.coverage_penalty, coverage);
    (base - penalty).clamp(0.0, 1.0)
}
