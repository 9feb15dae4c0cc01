// ABOUTME: Bounded macro refinement from neighbor deltas, plus the learned linear model
// ABOUTME: Every adjustment path is clamped to the empirical [p10, p90] delta bounds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Bounded refinement.
//!
//! Neighbors suggest relative corrections; the percentile bounds learned
//! from training data cap how far any suggestion can move a macro. The
//! learned model, when present, replaces the heuristic blend but never the
//! clamp.

use crate::artifacts::{MacroDeltaStats, RefinementModel};
use crate::models::{Macro, MacroVector, PerMacro};
use tracing::warn;

/// Base values at or below this magnitude use an absolute-scale denominator
const BASE_EPSILON: f64 = 1e-9;

/// Total neighbor weight below this refines nothing
const WEIGHT_EPSILON: f64 = 1e-12;

/// Neighbor blocks in the learned model's fixed feature layout
pub const MODEL_NEIGHBOR_BLOCKS: usize = 7;

/// One neighbor's contribution to the refinement of a query dish
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborContribution<'a> {
    /// Cosine similarity to the query
    pub similarity: f64,
    /// The neighbor's known macros
    pub macros: MacroVector,
    /// The neighbor's stored embedding, when available
    pub embedding: Option<&'a [f32]>,
    /// Precomputed relative deltas from the neighbor index, when available
    pub cached_deltas: Option<PerMacro<f64>>,
}

/// Relative delta of a neighbor value against the base, with an absolute
/// scale when the base is (near) zero
fn relative_delta(base: f64, neighbor: f64) -> f64 {
    let denom = if base.abs() > BASE_EPSILON { base } else { 1.0 };
    (neighbor - base) / denom
}

fn clamp_delta(stats: &MacroDeltaStats, m: Macro, delta: f64) -> f64 {
    let bounds = stats.stats.get(m);
    let (lo, hi) = (bounds.p10.min(bounds.p90), bounds.p10.max(bounds.p90));
    delta.clamp(lo, hi)
}

/// Blend neighbor suggestions into the base macros.
///
/// Per macro: each neighbor's relative delta (cached when the index
/// provides it, recomputed otherwise) is clamped to [p10, p90], averaged
/// with similarity weights (or equal weights), and applied as
/// `base * (1 + avg)`. Zero total weight leaves the base untouched.
#[must_use]
pub fn blend_neighbors(
    base: MacroVector,
    neighbors: &[NeighborContribution<'_>],
    stats: &MacroDeltaStats,
    weight_by_similarity: bool,
) -> MacroVector {
    let weight_sum: f64 = neighbors
        .iter()
        .map(|n| if weight_by_similarity { n.similarity } else { 1.0 })
        .sum();
    if neighbors.is_empty() || weight_sum < WEIGHT_EPSILON {
        return base;
    }

    MacroVector::from_fn(|m| {
        let base_val = base.get(m);
        let weighted: f64 = neighbors
            .iter()
            .map(|n| {
                let delta = n.cached_deltas.as_ref().map_or_else(
                    || relative_delta(base_val, n.macros.get(m)),
                    |deltas| *deltas.get(m),
                );
                let weight = if weight_by_similarity { n.similarity } else { 1.0 };
                clamp_delta(stats, m, delta) * weight
            })
            .sum();
        base_val * (1.0 + weighted / weight_sum)
    })
}

/// Apply the stats' median delta directly, with no neighbors involved
#[must_use]
pub fn apply_median_delta(base: MacroVector, stats: &MacroDeltaStats) -> MacroVector {
    MacroVector::from_fn(|m| {
        let median = clamp_delta(stats, m, stats.stats.get(m).median);
        base.get(m) * (1.0 + median)
    })
}

/// Predict refined macros with the learned linear model.
///
/// Features are laid out as query embedding ⧺ base macros ⧺ a fixed number
/// of neighbor blocks (embedding ⧺ macros ⧺ similarity), zero-padded when
/// fewer neighbors exist. Predictions are clamped to the same percentile
/// envelope as the heuristic blend. Returns `None` (with a warning) when
/// the model's declared width does not match this layout.
#[must_use]
pub fn apply_model(
    model: &RefinementModel,
    query: &[f32],
    base: MacroVector,
    neighbors: &[NeighborContribution<'_>],
    stats: &MacroDeltaStats,
) -> Option<MacroVector> {
    let features = build_features(query, base, neighbors);
    if !model.is_well_formed() || features.len() != model.feature_dim {
        warn!(
            declared = model.feature_dim,
            actual = features.len(),
            "refinement model feature width mismatch, falling back to neighbor blend"
        );
        return None;
    }

    let scaled: Vec<f64> = features
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let std = model.scaler_std[i];
            let std = if std.abs() < WEIGHT_EPSILON { 1.0 } else { std };
            (x - model.scaler_mean[i]) / std
        })
        .collect();

    let mut refined = MacroVector::ZERO;
    for (i, &m) in Macro::ALL.iter().enumerate() {
        let prediction = model.weights[i]
            .iter()
            .zip(&scaled)
            .fold(model.bias[i], |acc, (&w, &x)| w.mul_add(x, acc));
        let base_val = base.get(m);
        let bounds = stats.stats.get(m);
        let (lo, hi) = (base_val * (1.0 + bounds.p10), base_val * (1.0 + bounds.p90));
        refined.set(m, prediction.clamp(lo.min(hi), lo.max(hi)));
    }
    Some(refined)
}

fn build_features(
    query: &[f32],
    base: MacroVector,
    neighbors: &[NeighborContribution<'_>],
) -> Vec<f64> {
    let dim = query.len();
    let block_width = dim + Macro::ALL.len() + 1;
    let mut features =
        Vec::with_capacity(dim + Macro::ALL.len() + MODEL_NEIGHBOR_BLOCKS * block_width);

    features.extend(query.iter().map(|&v| f64::from(v)));
    features.extend(Macro::ALL.iter().map(|&m| base.get(m)));

    for slot in 0..MODEL_NEIGHBOR_BLOCKS {
        match neighbors.get(slot) {
            Some(neighbor) => {
                match neighbor.embedding {
                    Some(embedding) if embedding.len() == dim => {
                        features.extend(embedding.iter().map(|&v| f64::from(v)));
                    }
                    _ => features.extend(std::iter::repeat_n(0.0, dim)),
                }
                features.extend(Macro::ALL.iter().map(|&m| neighbor.macros.get(m)));
                features.push(neighbor.similarity);
            }
            None => features.extend(std::iter::repeat_n(0.0, block_width)),
        }
    }
    features
}
