// ABOUTME: Refinement engine entry point: neighbors in, bounded macro corrections out
// ABOUTME: Degrades to an identity pass at full confidence when no artifacts are loaded
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Stage 3: similarity-based refinement.
//!
//! Embeds the dish, finds its nearest training-corpus neighbors, and nudges
//! the calibrated macros toward them within empirical percentile bounds.
//! Dishes already seen at training time take the precomputed neighbor index
//! path instead of a live scan.

pub mod confidence;
pub mod embedding;
pub mod refiner;
pub mod similarity;

use crate::artifacts::{
    ConfidenceParams, DishEmbeddings, DishRecord, IngredientEmbeddings, MacroDeltaStats,
    NeighborIndex, RefinementModel,
};
use crate::models::{Macro, MacroVector};
use std::collections::HashMap;
use tracing::debug;

pub use confidence::{ingredient_coverage, refinement_confidence};
pub use embedding::{embed_dish, DishFeatures};
pub use refiner::NeighborContribution;
pub use similarity::{cosine_similarity, top_k_neighbors};

/// Everything the refinement stage loaded at startup.
///
/// Constructed only when both embedding tables are present; the remaining
/// artifacts degrade to defaults individually.
#[derive(Debug)]
pub struct RefinementArtifacts {
    /// Ingredient embedding table
    pub ingredients: IngredientEmbeddings,
    /// Training-corpus dish embeddings, in stable order
    pub dishes: DishEmbeddings,
    /// Precomputed neighbors for known dish ids
    pub neighbor_index: Option<NeighborIndex>,
    /// Percentile bounds for relative macro deltas
    pub delta_stats: MacroDeltaStats,
    /// Confidence lookup curves
    pub confidence_params: ConfidenceParams,
    /// Optional learned linear correction model
    pub model: Option<RefinementModel>,
    oov_embedding: Vec<f32>,
    dish_positions: HashMap<String, usize>,
}

impl RefinementArtifacts {
    /// Bundle loaded artifacts and precompute the lookup structures
    #[must_use]
    pub fn new(
        ingredients: IngredientEmbeddings,
        dishes: DishEmbeddings,
        neighbor_index: Option<NeighborIndex>,
        delta_stats: Option<MacroDeltaStats>,
        confidence_params: Option<ConfidenceParams>,
        model: Option<RefinementModel>,
    ) -> Self {
        let oov_embedding = ingredients
            .mean_embedding()
            .unwrap_or_else(|| vec![0.0; ingredients.dim]);
        let dish_positions = dishes
            .dishes
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        Self {
            ingredients,
            dishes,
            neighbor_index,
            delta_stats: delta_stats.unwrap_or_default(),
            confidence_params: confidence_params.unwrap_or_default(),
            model,
            oov_embedding,
            dish_positions,
        }
    }

    fn dish(&self, id: &str) -> Option<&DishRecord> {
        self.dish_positions.get(id).map(|&i| &self.dishes.dishes[i])
    }
}

/// Refinement tuning knobs, resolved by the orchestrator from config
#[derive(Debug, Clone, Copy)]
pub struct RefineOptions {
    /// Neighbors to consider
    pub top_k: usize,
    /// Weight neighbor deltas by similarity instead of equally
    pub weight_by_similarity: bool,
    /// Skip neighbors entirely and apply the stored median delta
    pub use_median_delta: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            top_k: 7,
            weight_by_similarity: true,
            use_median_delta: false,
        }
    }
}

/// One refinement request
#[derive(Debug, Clone, PartialEq)]
pub struct RefineRequest<'a> {
    /// Stable dish id, when the caller has one (enables the index path)
    pub dish_id: Option<&'a str>,
    /// Dish features for embedding
    pub features: DishFeatures<'a>,
    /// Calibrated macros to refine
    pub base: MacroVector,
}

/// A neighbor that influenced a refinement, for the audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSummary {
    /// Neighbor dish id
    pub id: String,
    /// Cosine similarity to the query
    pub similarity: f64,
}

/// Stage-3 output
#[derive(Debug, Clone, PartialEq)]
pub struct RefineResult {
    /// Refined nutrient profile
    pub macros: MacroVector,
    /// Stage confidence in [0, 1]
    pub confidence: f64,
    /// Neighbors in influence order
    pub neighbors: Vec<NeighborSummary>,
    /// Base macros the deltas were applied to
    pub base: MacroVector,
    /// The query embedding (empty when refinement is inactive)
    pub embedding: Vec<f32>,
}

/// Refine calibrated macros against the training corpus.
///
/// With no artifacts loaded this is an identity pass at confidence 1.0, so
/// an artifact-free deployment serves calibrated estimates unpenalized.
#[must_use]
pub fn refine(
    artifacts: Option<&RefinementArtifacts>,
    options: &RefineOptions,
    request: &RefineRequest<'_>,
) -> RefineResult {
    let Some(artifacts) = artifacts else {
        return RefineResult {
            macros: request.base,
            confidence: 1.0,
            neighbors: Vec::new(),
            base: request.base,
            embedding: Vec::new(),
        };
    };

    let query = embed_dish(&artifacts.ingredients, &artifacts.oov_embedding, &request.features);
    let named = gather_neighbors(artifacts, options, request.dish_id, &query);
    let base = resolve_base(request.base, &named);
    let contributions: Vec<NeighborContribution<'_>> =
        named.iter().map(|(_, c)| c.clone()).collect();

    let macros = if options.use_median_delta {
        refiner::apply_median_delta(base, &artifacts.delta_stats)
    } else {
        artifacts
            .model
            .as_ref()
            .and_then(|model| {
                refiner::apply_model(model, &query, base, &contributions, &artifacts.delta_stats)
            })
            .unwrap_or_else(|| {
                refiner::blend_neighbors(
                    base,
                    &contributions,
                    &artifacts.delta_stats,
                    options.weight_by_similarity,
                )
            })
    };

    let mean_similarity = if contributions.is_empty() {
        0.0
    } else {
        contributions.iter().map(|c| c.similarity).sum::<f64>() / contributions.len() as f64
    };
    let coverage = ingredient_coverage(&artifacts.ingredients, request.features.ingredients);
    let confidence =
        refinement_confidence(&artifacts.confidence_params, mean_similarity, coverage);

    RefineResult {
        macros,
        confidence,
        neighbors: named
            .into_iter()
            .map(|(id, c)| NeighborSummary {
                id,
                similarity: c.similarity,
            })
            .collect(),
        base,
        embedding: query,
    }
}

type NamedContribution<'a> = (String, NeighborContribution<'a>);

/// Neighbor set for a query: the precomputed index when the dish id is
/// known there, a live cosine scan otherwise
fn gather_neighbors<'a>(
    artifacts: &'a RefinementArtifacts,
    options: &RefineOptions,
    dish_id: Option<&str>,
    query: &[f32],
) -> Vec<NamedContribution<'a>> {
    if let Some(cached) = dish_id
        .and_then(|id| artifacts.neighbor_index.as_ref().map(|index| (id, index)))
        .and_then(|(id, index)| index.neighbors.get(id))
    {
        debug!(count = cached.len(), "serving neighbors from the precomputed index");
        // The index is authoritative: its stored list is used as-is
        return cached
            .iter()
            .map(|n| {
                let record = artifacts.dish(&n.neighbor_id);
                (
                    n.neighbor_id.clone(),
                    NeighborContribution {
                        similarity: n.similarity,
                        macros: record.map_or(MacroVector::ZERO, |r| r.macros),
                        embedding: record.map(|r| r.embedding.as_slice()),
                        cached_deltas: Some(n.macro_deltas.clone()),
                    },
                )
            })
            .collect();
    }

    top_k_neighbors(query, &artifacts.dishes.dishes, options.top_k)
        .into_iter()
        .map(|scored| {
            let record = &artifacts.dishes.dishes[scored.index];
            (
                record.id.clone(),
                NeighborContribution {
                    similarity: scored.similarity,
                    macros: record.macros,
                    embedding: Some(record.embedding.as_slice()),
                    cached_deltas: None,
                },
            )
        })
        .collect()
}

/// The macros deltas apply to: the calibrated macros when any are set,
/// else the plain neighbor mean, else zeros
fn resolve_base(calibrated: MacroVector, neighbors: &[NamedContribution<'_>]) -> MacroVector {
    let any_set = Macro::ALL.iter().any(|&m| calibrated.get(m).abs() > 0.0);
    if any_set {
        return calibrated;
    }
    if neighbors.is_empty() {
        return MacroVector::ZERO;
    }
    let n = neighbors.len() as f64;
    MacroVector::from_fn(|m| neighbors.iter().map(|(_, c)| c.macros.get(m)).sum::<f64>() / n)
}
