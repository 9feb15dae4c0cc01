// ABOUTME: Dish embedding: ingredient vector mean plus fixed categorical segments
// ABOUTME: Layout is ingredient ⧺ method multi-hot ⧺ sauce scalar ⧺ portion one-hot
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

//! Dish embedding.
//!
//! Embeddings must line up exactly with the vectors stored in the dish
//! embedding artifact, so the segment layout and method vocabulary here are
//! fixed: changing either requires regenerating the artifacts and bumping
//! the schema version.

use crate::artifacts::IngredientEmbeddings;
use crate::models::PortionSize;

/// Cooking-method vocabulary for the multi-hot segment, in slot order.
/// Unrecognized methods land in the trailing `other` slot.
pub const METHOD_VOCAB: [&str; 9] = [
    "raw", "steamed", "boiled", "baked", "grilled", "fried", "sauteed", "roasted", "other",
];

const SAUCE_WIDTH: usize = 1;
const PORTION_WIDTH: usize = 3;

/// Everything about a dish that participates in its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct DishFeatures<'a> {
    /// Ingredient names, matched lowercase against the embedding table
    pub ingredients: &'a [String],
    /// Canonical cooking methods
    pub cooking_methods: &'a [String],
    /// Sauce intensity scalar in [0, 1]
    pub sauce_intensity: f64,
    /// Portion size bucket
    pub portion: PortionSize,
}

/// Total embedding width for an ingredient table of width `ingredient_dim`
#[must_use]
pub const fn embedding_dim(ingredient_dim: usize) -> usize {
    ingredient_dim + METHOD_VOCAB.len() + SAUCE_WIDTH + PORTION_WIDTH
}

/// Slot of a canonical cooking method in the multi-hot segment
fn method_slot(method: &str) -> usize {
    let canonical = match method {
        "deep_fried" => "fried",
        other => other,
    };
    METHOD_VOCAB
        .iter()
        .position(|&v| v == canonical)
        .unwrap_or(METHOD_VOCAB.len() - 1)
}

/// Embed a dish against the ingredient table.
///
/// The ingredient segment is the elementwise mean of the per-ingredient
/// vectors; out-of-vocabulary ingredients substitute `oov` (the table's
/// global mean). A dish with no ingredients gets a zero ingredient segment.
#[must_use]
pub fn embed_dish(
    table: &IngredientEmbeddings,
    oov: &[f32],
    features: &DishFeatures<'_>,
) -> Vec<f32> {
    let mut embedding = vec![0.0f32; embedding_dim(table.dim)];

    if !features.ingredients.is_empty() {
        let mut sum = vec![0.0f64; table.dim];
        for ingredient in features.ingredients {
            let key = ingredient.trim().to_lowercase();
            let vector = table.embeddings.get(&key).map_or(oov, Vec::as_slice);
            for (acc, &v) in sum.iter_mut().zip(vector) {
                *acc += f64::from(v);
            }
        }
        let n = features.ingredients.len() as f64;
        for (slot, v) in embedding.iter_mut().zip(sum) {
            *slot = (v / n) as f32;
        }
    }

    let methods_base = table.dim;
    for method in features.cooking_methods {
        embedding[methods_base + method_slot(method)] = 1.0;
    }

    let sauce_slot = methods_base + METHOD_VOCAB.len();
    embedding[sauce_slot] = features.sauce_intensity.clamp(0.0, 1.0) as f32;

    embedding[sauce_slot + SAUCE_WIDTH + features.portion.index()] = 1.0;
    embedding
}
