// ABOUTME: Cosine similarity and parallel top-k scan over stored dish embeddings
// ABOUTME: Deterministic ordering: similarity descending, artifact order on ties
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Macrolens Project

use crate::artifacts::DishRecord;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Norm product below this is treated as a zero vector
const NORM_EPSILON: f64 = 1e-12;

/// One scored neighbor from a similarity scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredNeighbor {
    /// Index into the dish artifact's record list
    pub index: usize,
    /// Cosine similarity to the query, in [-1, 1]
    pub similarity: f64,
}

/// Cosine similarity between two vectors; 0.0 when either is (near) zero
/// or the lengths disagree
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot = x.mul_add(y, dot);
        norm_a = x.mul_add(x, norm_a);
        norm_b = y.mul_add(y, norm_b);
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < NORM_EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// The `k` most similar stored dishes to `query`.
///
/// The scan is a rayon-parallel linear pass; fine at corpus scale and
/// trivially exact. Ordering is similarity descending with ties broken by
/// artifact position, so results are stable across runs.
#[must_use]
pub fn top_k_neighbors(query: &[f32], dishes: &[DishRecord], k: usize) -> Vec<ScoredNeighbor> {
    if k == 0 || dishes.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<ScoredNeighbor> = dishes
        .par_iter()
        .enumerate()
        .map(|(index, dish)| ScoredNeighbor {
            index,
            similarity: cosine_similarity(query, &dish.embedding),
        })
        .collect();
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    scored.truncate(k);
    scored
}
